//! Test support utilities for hotvay-engine integration/unit tests.
//! These helpers are public so the `tests/` suite can use them; they never
//! touch real hardware or spawn real processes.

use std::{
    collections::{HashSet, VecDeque},
    future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use async_trait::async_trait;
use config::ActionSpec;
use keypad::DeviceId;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep, timeout};

use crate::{
    Error, Result,
    action::{Action, ActionFactory},
    deps::{AppControl, DeviceApi, DeviceLink},
    device::{DeviceCfg, ReconnectPolicy},
    stream::EventStream,
};

/// Device timings short enough for tests.
pub fn fast_device_cfg(policy: ReconnectPolicy) -> DeviceCfg {
    DeviceCfg {
        poll_interval: Duration::from_millis(2),
        reconnect_interval: Duration::from_millis(5),
        read_error_limit: 3,
        policy,
        ..DeviceCfg::default()
    }
}

/// A raw keypad report for `code` (state byte `0` means pressed).
pub fn key_report(code: u8, pressed: bool) -> Vec<u8> {
    vec![0, 0, 0, code, if pressed { 0 } else { 1 }, 0, 0, 0]
}

/// One scripted step of a mock read session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Deliver these bytes as a report.
    Report(Vec<u8>),
    /// The read times out with no report.
    Idle,
    /// The read fails.
    Fail,
}

/// A scripted device attachment.
#[derive(Debug, Clone, Default)]
struct MockSession {
    /// Serial reported by the link.
    serial: Option<String>,
    /// Reads, in order. Once exhausted the link idles.
    steps: VecDeque<ReadStep>,
}

/// Scripted [`DeviceApi`]: each `open` consumes the next scripted attachment.
///
/// `None` entries (and anything past the end of the script) report the device
/// as absent.
#[derive(Debug, Default)]
pub struct MockDeviceApi {
    /// Remaining attachments.
    sessions: Mutex<VecDeque<Option<MockSession>>>,
    /// Number of successful opens.
    opens: AtomicUsize,
    /// Links currently alive.
    live: Arc<AtomicUsize>,
}

impl MockDeviceApi {
    /// Empty script: the device is never attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `open` that finds no device.
    pub fn absent(self) -> Self {
        self.sessions.lock().push_back(None);
        self
    }

    /// Append an attachment that plays `steps`.
    pub fn session(self, serial: Option<&str>, steps: Vec<ReadStep>) -> Self {
        self.sessions.lock().push_back(Some(MockSession {
            serial: serial.map(str::to_string),
            steps: steps.into(),
        }));
        self
    }

    /// Number of successful opens so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of links not yet dropped.
    pub fn live_links(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DeviceApi for MockDeviceApi {
    fn open(&self, _id: DeviceId) -> keypad::Result<Option<Box<dyn DeviceLink>>> {
        let Some(Some(session)) = self.sessions.lock().pop_front() else {
            return Ok(None);
        };
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Box::new(MockLink {
            session,
            live: Arc::clone(&self.live),
        })))
    }
}

/// Link handed out by [`MockDeviceApi`].
#[derive(Debug)]
struct MockLink {
    /// Remaining script.
    session: MockSession,
    /// Decremented on drop.
    live: Arc<AtomicUsize>,
}

impl DeviceLink for MockLink {
    fn serial(&self) -> Option<String> {
        self.session.serial.clone()
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> keypad::Result<usize> {
        match self.session.steps.pop_front() {
            Some(ReadStep::Report(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(ReadStep::Fail) => Err(keypad::Error::Read("scripted failure".into())),
            Some(ReadStep::Idle) | None => {
                thread::sleep(timeout.min(Duration::from_millis(2)));
                Ok(0)
            }
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared bookkeeping for [`MockActions`].
#[derive(Debug, Default)]
struct MockActionsInner {
    /// Labels of started executions, in start order.
    started: Mutex<Vec<String>>,
    /// Labels of completed executions, in completion order.
    completed: Mutex<Vec<String>>,
    /// Labels whose executions fail.
    failing: Mutex<HashSet<String>>,
    /// Number of upcoming executions that never finish.
    hang_next: AtomicUsize,
}

/// [`ActionFactory`] whose actions only record that they ran.
///
/// Actions are labelled with [`ActionSpec::label`], e.g. `command:/bin/echo`.
#[derive(Debug, Clone, Default)]
pub struct MockActions {
    /// Shared with every created action.
    inner: Arc<MockActionsInner>,
}

impl MockActions {
    /// Factory with no failures and no hangs.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` executions (of any action) never complete.
    pub fn hang_next(&self, n: usize) {
        self.inner.hang_next.store(n, Ordering::SeqCst);
    }

    /// Executions of the action labelled `label` fail.
    pub fn fail(&self, label: &str) {
        self.inner.failing.lock().insert(label.to_string());
    }

    /// Number of executions started.
    pub fn started(&self) -> usize {
        self.inner.started.lock().len()
    }

    /// Number of executions that ran to completion (success or failure).
    pub fn completed(&self) -> usize {
        self.inner.completed.lock().len()
    }

    /// Labels of started executions, in start order.
    pub fn started_labels(&self) -> Vec<String> {
        self.inner.started.lock().clone()
    }

    /// Wait until at least `n` executions completed, up to `timeout_ms`.
    pub async fn wait_completed(&self, n: usize, timeout_ms: u64) -> bool {
        wait_until(timeout_ms, || self.completed() >= n).await
    }
}

impl ActionFactory for MockActions {
    fn create(&self, spec: &ActionSpec) -> Arc<dyn Action> {
        Arc::new(MockAction {
            label: spec.label(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Action created by [`MockActions`].
#[derive(Debug)]
struct MockAction {
    /// Label of the spec it was created from.
    label: String,
    /// Factory bookkeeping.
    inner: Arc<MockActionsInner>,
}

#[async_trait]
impl Action for MockAction {
    async fn execute(&self) -> Result<String> {
        self.inner.started.lock().push(self.label.clone());
        let hang = self
            .inner
            .hang_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hang {
            future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
        self.inner.completed.lock().push(self.label.clone());
        if self.inner.failing.lock().contains(&self.label) {
            return Err(Error::Unsupported(format!("{} is scripted to fail", self.label)));
        }
        Ok(self.label.clone())
    }
}

/// Scripted [`AppControl`]: a fixed frontmost app and set of running apps.
///
/// Every call that would change the system is recorded as `activate:<id>`,
/// `cycle_windows` or `launch:<id>`.
#[derive(Debug)]
pub struct MockApps {
    /// Frontmost bundle id.
    frontmost: Option<String>,
    /// Bundle ids with a running instance.
    running: HashSet<String>,
    /// Accessibility permission.
    trusted: bool,
    /// Whether the window shortcut is enabled.
    shortcut_enabled: bool,
    /// Recorded side effects, in order.
    calls: Mutex<Vec<String>>,
}

impl Default for MockApps {
    fn default() -> Self {
        Self {
            frontmost: None,
            running: HashSet::new(),
            trusted: true,
            shortcut_enabled: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockApps {
    /// Nothing running, permissions granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// `bundle_id` runs and is frontmost.
    pub fn frontmost(mut self, bundle_id: &str) -> Self {
        self.frontmost = Some(bundle_id.to_string());
        self.running(bundle_id)
    }

    /// `bundle_id` runs in the background.
    pub fn running(mut self, bundle_id: &str) -> Self {
        self.running.insert(bundle_id.to_string());
        self
    }

    /// Accessibility permission is missing.
    pub fn untrusted(mut self) -> Self {
        self.trusted = false;
        self
    }

    /// The user disabled the window shortcut.
    pub fn shortcut_disabled(mut self) -> Self {
        self.shortcut_enabled = false;
        self
    }

    /// Recorded side effects, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AppControl for MockApps {
    fn frontmost_bundle_id(&self) -> Option<String> {
        self.frontmost.clone()
    }

    fn accessibility_ok(&self) -> bool {
        self.trusted
    }

    fn activate(&self, bundle_id: &str) -> bool {
        if !self.running.contains(bundle_id) {
            return false;
        }
        self.calls.lock().push(format!("activate:{}", bundle_id));
        true
    }

    async fn cycle_windows(&self) -> Result<bool> {
        if !self.shortcut_enabled {
            return Ok(false);
        }
        self.calls.lock().push("cycle_windows".to_string());
        Ok(true)
    }

    async fn launch(&self, bundle_id: &str) -> Result<()> {
        self.calls.lock().push(format!("launch:{}", bundle_id));
        Ok(())
    }
}

/// Poll `pred` every 2 ms until it holds or `timeout_ms` elapses.
pub async fn wait_until<F>(timeout_ms: u64, mut pred: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(2)).await;
    }
}

/// Next item from `stream` within `timeout_ms`.
pub async fn next_within<T: Send + 'static>(
    stream: &mut EventStream<T>,
    timeout_ms: u64,
) -> Option<T> {
    timeout(Duration::from_millis(timeout_ms), stream.next())
        .await
        .ok()
        .flatten()
}

/// Receive items until `pred` matches one, up to `timeout_ms`. Returns every
/// item seen, the matching one last, or `None` on timeout or stream end.
pub async fn recv_until<T, F>(
    stream: &mut EventStream<T>,
    timeout_ms: u64,
    mut pred: F,
) -> Option<Vec<T>>
where
    T: Send + 'static,
    F: FnMut(&T) -> bool,
{
    timeout(Duration::from_millis(timeout_ms), async {
        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            let done = pred(&item);
            seen.push(item);
            if done {
                return Some(seen);
            }
        }
        None
    })
    .await
    .unwrap_or(None)
}
