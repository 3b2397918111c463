//! Dispatcher: owns the current registration table, consumes the config and
//! device streams, and runs matching actions.
//!
//! The table is copy-on-write. A reload builds a complete new
//! [`RegistrationTable`] and swaps the shared pointer; every dispatch clones
//! the pointer once and looks up against that snapshot. Actions run as
//! independent tasks, so a slow or failing action never holds up the next
//! event.

use std::{fmt, sync::Arc, time::Duration};

use config::Config;
use keycode::KeyIdentity;
use parking_lot::{Mutex, RwLock};
use tokio::{task::JoinHandle, time};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, trace, warn};

use crate::{
    Error, Result,
    action::ActionFactory,
    device::DeviceEvent,
    registration::{Registration, RegistrationTable},
    stream::EventStream,
};

/// How long abandoned actions get to observe cancellation.
const ABANDON_GRACE: Duration = Duration::from_millis(250);

/// Lifecycle of a [`Dispatcher`]. There is no way back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, not started.
    Idle,
    /// Consuming both streams.
    Running,
    /// Stop requested; streams torn down.
    Stopped,
}

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatchCfg {
    /// How long `stop` waits for in-flight actions before abandoning them.
    pub drain_timeout: Duration,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// Correlates device events with the installed registration table.
///
/// Cheap to clone; clones share the same table, tasks and lifecycle.
#[derive(Clone)]
pub struct Dispatcher {
    /// Current table; replaced wholesale on reload.
    table: Arc<RwLock<Arc<RegistrationTable>>>,
    /// Lifecycle state.
    state: Arc<Mutex<DispatcherState>>,
    /// Resolves config action descriptors into actions.
    factory: Arc<dyn ActionFactory>,
    /// Tuning.
    cfg: DispatchCfg,
    /// In-flight action tasks.
    actions: TaskTracker,
    /// Stops the subscription tasks.
    cancel: CancellationToken,
    /// Abandons in-flight actions once the drain period is over.
    abandon: CancellationToken,
    /// Subscription task handles, joined by `stop`.
    subscriptions: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("registrations", &self.table.read().len())
            .field("in_flight", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create an idle dispatcher with an empty table.
    pub fn new(factory: Arc<dyn ActionFactory>, cfg: DispatchCfg) -> Self {
        Self {
            table: Arc::new(RwLock::new(Arc::new(RegistrationTable::empty()))),
            state: Arc::new(Mutex::new(DispatcherState::Idle)),
            factory,
            cfg,
            actions: TaskTracker::new(),
            cancel: CancellationToken::new(),
            abandon: CancellationToken::new(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        *self.state.lock()
    }

    /// Snapshot of the installed table.
    pub fn table(&self) -> Arc<RegistrationTable> {
        Arc::clone(&self.table.read())
    }

    /// Number of actions currently running.
    pub fn in_flight(&self) -> usize {
        self.actions.len()
    }

    /// Build a table from `config` and make it current.
    pub fn install(&self, config: &Config) -> Arc<RegistrationTable> {
        let table = Arc::new(RegistrationTable::build(config, self.factory.as_ref()));
        *self.table.write() = Arc::clone(&table);
        info!(
            registrations = table.len(),
            collisions = table.collisions().len(),
            "registration_table_installed"
        );
        table
    }

    /// Start consuming `configs` and `devices`. Only valid once, from `Idle`.
    pub fn start(
        &self,
        configs: EventStream<Config>,
        devices: EventStream<DeviceEvent>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != DispatcherState::Idle {
                return Err(Error::InvalidState(format!(
                    "cannot start dispatcher in state {:?}",
                    *state
                )));
            }
            *state = DispatcherState::Running;
        }
        info!("dispatcher_started");
        let config_task = tokio::spawn(self.clone().consume_configs(configs));
        let device_task = tokio::spawn(self.clone().consume_devices(devices));
        self.subscriptions.lock().extend([config_task, device_task]);
        Ok(())
    }

    /// Handle one device event. Returns `true` when an action was started.
    ///
    /// The table is read once, at call time; a reload while the action runs
    /// does not affect it.
    pub fn dispatch(&self, event: &DeviceEvent) -> bool {
        let key = match event {
            DeviceEvent::Connected { serial } => {
                info!(serial = ?serial, "keypad_connected");
                return false;
            }
            DeviceEvent::Disconnected { serial } => {
                info!(serial = ?serial, "keypad_disconnected");
                return false;
            }
            DeviceEvent::KeyTransition {
                code, transition, ..
            } => KeyIdentity::new(*code, *transition),
        };
        if self.state() == DispatcherState::Stopped {
            debug!(key = %key, "dispatch_after_stop_ignored");
            return false;
        }

        let table = self.table();
        let Some(registration) = table.lookup(&key) else {
            trace!(key = %key, "no_registration");
            return false;
        };
        debug!(key = %key, description = %registration.description, "dispatching");
        self.spawn_action(registration.clone());
        true
    }

    /// Run `registration`'s action as an independent task.
    fn spawn_action(&self, registration: Registration) {
        let abandon = self.abandon.clone();
        self.actions.spawn(async move {
            let Registration {
                key,
                description,
                action,
            } = registration;
            tokio::select! {
                _ = abandon.cancelled() => {
                    warn!(key = %key, description = %description, "action_abandoned");
                }
                res = action.execute() => match res {
                    Ok(output) => {
                        info!(key = %key, description = %description, output = %output, "action_completed");
                    }
                    Err(e) => {
                        warn!(key = %key, description = %description, error = %e, "action_failed");
                    }
                },
            }
        });
    }

    /// Install every config the stream yields until cancelled.
    async fn consume_configs(self, mut configs: EventStream<Config>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = configs.next() => next,
            };
            match next {
                Some(config) => {
                    self.install(&config);
                }
                None => {
                    debug!("config_stream_ended");
                    break;
                }
            }
        }
        configs.shutdown().await;
    }

    /// Dispatch every device event the stream yields until cancelled.
    async fn consume_devices(self, mut devices: EventStream<DeviceEvent>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = devices.next() => next,
            };
            match next {
                Some(event) => {
                    self.dispatch(&event);
                }
                None => {
                    warn!("device_stream_ended");
                    break;
                }
            }
        }
        devices.shutdown().await;
    }

    /// Stop the dispatcher.
    ///
    /// Cancels both subscriptions and waits for them to release their
    /// resources, then gives in-flight actions up to
    /// [`DispatchCfg::drain_timeout`] to finish. Whatever is still running
    /// after that is abandoned. Returns the number of abandoned actions.
    /// Calling `stop` again is a no-op.
    pub async fn stop(&self) -> usize {
        {
            let mut state = self.state.lock();
            if *state == DispatcherState::Stopped {
                return 0;
            }
            *state = DispatcherState::Stopped;
        }
        info!(in_flight = self.actions.len(), "dispatcher_stopping");
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self.subscriptions.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                error!("subscription_task_panicked");
            }
        }

        self.actions.close();
        if time::timeout(self.cfg.drain_timeout, self.actions.wait())
            .await
            .is_ok()
        {
            info!("dispatcher_stopped");
            return 0;
        }

        let abandoned = self.actions.len();
        warn!(abandoned, "abandoning_actions");
        self.abandon.cancel();
        if time::timeout(ABANDON_GRACE, self.actions.wait())
            .await
            .is_err()
        {
            debug!(left = self.actions.len(), "actions_still_unwinding");
        }
        abandoned
    }
}
