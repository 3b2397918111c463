//! Device source: the keypad as a stream of [`DeviceEvent`]s.
//!
//! A blocking reader thread opens the keypad, polls it with a short read
//! timeout and decodes each report. Transient read failures are retried; a run
//! of consecutive failures counts as losing the device, which emits
//! `Disconnected` and then either waits for the device to come back or ends
//! the stream, per [`ReconnectPolicy`]. Consecutive duplicate events are
//! coalesced before they reach the consumer.

use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use keycode::{KeyCode, KeyIdentity, Transition};
use keypad::{DeviceId, report};
use tracing::{debug, info, trace, warn};

use crate::{
    deps::{DeviceApi, DeviceLink, RealDeviceApi},
    stream::{Emitter, EventStream},
};

/// Channel capacity between the reader thread and the consumer.
const EVENT_CAPACITY: usize = 64;
/// Read buffer; larger than any report the keypad sends.
const READ_BUF_LEN: usize = 64;

/// Something the device source observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device was opened.
    Connected {
        /// Serial number, when the device reports one.
        serial: Option<String>,
    },
    /// The device went away.
    Disconnected {
        /// Serial number, when the device reports one.
        serial: Option<String>,
    },
    /// A key changed state.
    KeyTransition {
        /// Serial number, when the device reports one.
        serial: Option<String>,
        /// Key code.
        code: KeyCode,
        /// Pressed or released.
        transition: Transition,
    },
}

impl DeviceEvent {
    /// Lookup key for key transitions; `None` for connection events.
    pub fn key(&self) -> Option<KeyIdentity> {
        match self {
            Self::KeyTransition {
                code, transition, ..
            } => Some(KeyIdentity::new(*code, *transition)),
            _ => None,
        }
    }
}

/// What the device source does after losing the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Keep waiting for the device to be attached again.
    #[default]
    Resume,
    /// End the stream after the first disconnect.
    Stop,
}

impl ReconnectPolicy {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ReconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconnectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            other => Err(format!(
                "unknown reconnect policy '{}' (expected resume or stop)",
                other
            )),
        }
    }
}

/// Device source timing and policy.
#[derive(Debug, Clone)]
pub struct DeviceCfg {
    /// Which device to open.
    pub device: DeviceId,
    /// Read timeout; also bounds how long cancellation takes to be noticed.
    pub poll_interval: Duration,
    /// Delay between attempts to open an absent device.
    pub reconnect_interval: Duration,
    /// Consecutive read failures treated as losing the device.
    pub read_error_limit: u32,
    /// Behavior after the device is lost.
    pub policy: ReconnectPolicy,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            device: DeviceId::KEYPAD,
            poll_interval: Duration::from_millis(200),
            reconnect_interval: Duration::from_secs(1),
            read_error_limit: 3,
            policy: ReconnectPolicy::Resume,
        }
    }
}

/// Produces [`DeviceEvent`] streams for one device.
#[derive(Clone)]
pub struct DeviceSource {
    /// Transport used to open the device.
    api: Arc<dyn DeviceApi>,
    /// Timing and policy.
    cfg: DeviceCfg,
}

impl fmt::Debug for DeviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSource")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl DeviceSource {
    /// Create a source over an arbitrary device API.
    pub fn new(api: Arc<dyn DeviceApi>, cfg: DeviceCfg) -> Self {
        Self { api, cfg }
    }

    /// Create a source over the real HID transport.
    pub fn real(cfg: DeviceCfg) -> Self {
        Self::new(Arc::new(RealDeviceApi), cfg)
    }

    /// Start the reader and return its (deduplicated) event stream.
    ///
    /// Cancelling the stream stops the reader within one poll interval and
    /// releases the device; `shutdown().await` waits for that to happen.
    pub fn subscribe(&self) -> EventStream<DeviceEvent> {
        let api = Arc::clone(&self.api);
        let cfg = self.cfg.clone();
        EventStream::spawn_blocking(EVENT_CAPACITY, move |tx| {
            run_reader(api.as_ref(), &cfg, &tx);
        })
        .dedup()
    }
}

/// How a read session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The consumer cancelled; the reader must exit.
    Cancelled,
    /// The device stopped answering.
    Lost,
}

/// Reader thread body: open, read, and reopen per policy until cancelled.
fn run_reader(api: &dyn DeviceApi, cfg: &DeviceCfg, tx: &Emitter<DeviceEvent>) {
    let mut announced_wait = false;
    let mut announced_failure = false;
    while !tx.is_cancelled() {
        let link = match api.open(cfg.device) {
            Ok(Some(link)) => link,
            Ok(None) => {
                if !announced_wait {
                    info!(device = %cfg.device, "waiting_for_device");
                    announced_wait = true;
                }
                if !pause(tx, cfg.reconnect_interval, cfg.poll_interval) {
                    break;
                }
                continue;
            }
            Err(e) => {
                // Repeats every reconnect interval while the failure persists.
                if announced_failure {
                    debug!(device = %cfg.device, error = %e, "device_open_failed");
                } else {
                    warn!(device = %cfg.device, error = %e, "device_open_failed");
                    announced_failure = true;
                }
                if !pause(tx, cfg.reconnect_interval, cfg.poll_interval) {
                    break;
                }
                continue;
            }
        };
        announced_wait = false;
        announced_failure = false;
        match read_session(link, cfg, tx) {
            SessionEnd::Cancelled => break,
            SessionEnd::Lost if cfg.policy == ReconnectPolicy::Stop => {
                info!(device = %cfg.device, "device_lost_not_resuming");
                break;
            }
            SessionEnd::Lost => {
                debug!(device = %cfg.device, "device_lost_resuming");
            }
        }
    }
    debug!(device = %cfg.device, "device_reader_exit");
}

/// Read reports from one open link until it is lost or the stream is
/// cancelled. The link is dropped before this returns.
fn read_session(
    mut link: Box<dyn DeviceLink>,
    cfg: &DeviceCfg,
    tx: &Emitter<DeviceEvent>,
) -> SessionEnd {
    let serial = link.serial();
    info!(device = %cfg.device, serial = ?serial, "device_connected");
    if !tx.blocking_emit(DeviceEvent::Connected {
        serial: serial.clone(),
    }) {
        return SessionEnd::Cancelled;
    }

    let mut buf = [0u8; READ_BUF_LEN];
    let mut failures: u32 = 0;
    loop {
        if tx.is_cancelled() {
            return SessionEnd::Cancelled;
        }
        match link.read(&mut buf, cfg.poll_interval) {
            Ok(0) => failures = 0,
            Ok(n) => {
                failures = 0;
                match report::decode(&buf[..n]) {
                    Ok((code, transition)) => {
                        trace!(code, transition = %transition, "key_report");
                        let event = DeviceEvent::KeyTransition {
                            serial: serial.clone(),
                            code,
                            transition,
                        };
                        if !tx.blocking_emit(event) {
                            return SessionEnd::Cancelled;
                        }
                    }
                    Err(e) => warn!(device = %cfg.device, error = %e, "report_dropped"),
                }
            }
            Err(e) => {
                failures += 1;
                if failures >= cfg.read_error_limit.max(1) {
                    warn!(device = %cfg.device, serial = ?serial, error = %e, "device_lost");
                    break;
                }
                warn!(device = %cfg.device, error = %e, attempt = failures, "device_read_failed");
                if !pause(tx, cfg.poll_interval, cfg.poll_interval) {
                    return SessionEnd::Cancelled;
                }
            }
        }
    }

    drop(link);
    if !tx.blocking_emit(DeviceEvent::Disconnected { serial }) {
        return SessionEnd::Cancelled;
    }
    SessionEnd::Lost
}

/// Sleep for `total` in `step` slices. Returns `false` if cancelled meanwhile.
fn pause<T: Send>(tx: &Emitter<T>, total: Duration, step: Duration) -> bool {
    let deadline = Instant::now() + total;
    let step = step.max(Duration::from_millis(1));
    loop {
        if tx.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(step.min(deadline - now));
    }
}
