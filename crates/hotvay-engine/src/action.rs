//! Actions: what a matched key does.
//!
//! The dispatcher only sees [`Action`]; [`ActionFactory`] turns a validated
//! [`ActionSpec`] into one. [`SystemActions`] is the production factory.

use std::{fmt, process::Stdio, sync::Arc};

use async_trait::async_trait;
use config::{ActionSpec, CommandSpec};
use tokio::process::Command;
use tracing::info;

use crate::{
    Error, Result,
    deps::{AppControl, RealAppControl},
    focus,
};

/// Placeholder result when a command prints nothing.
pub const NO_OUTPUT: &str = "<< no output >>";

/// A unit of work bound to a key.
///
/// Implementations capture everything they need at construction and must be
/// safe to run concurrently and repeatedly.
#[async_trait]
pub trait Action: Send + Sync + fmt::Debug {
    /// Run the action, yielding a short textual result.
    async fn execute(&self) -> Result<String>;
}

/// Builds actions from their declarative form.
pub trait ActionFactory: Send + Sync {
    /// Create the action described by `spec`.
    fn create(&self, spec: &ActionSpec) -> Arc<dyn Action>;
}

/// Factory for actions that touch the real system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemActions;

impl ActionFactory for SystemActions {
    fn create(&self, spec: &ActionSpec) -> Arc<dyn Action> {
        match spec {
            ActionSpec::Command(cmd) => Arc::new(CommandAction::new(cmd.clone())),
            ActionSpec::FocusApp { bundle_id } => Arc::new(FocusAppAction::new(bundle_id.clone())),
        }
    }
}

/// Runs an executable with fixed arguments, without a shell.
#[derive(Debug, Clone)]
pub struct CommandAction {
    /// What to run.
    spec: CommandSpec,
}

impl CommandAction {
    /// Action running `spec`.
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    /// Command line for logs and errors.
    fn display(&self) -> String {
        let mut line = self.spec.executable.clone();
        for arg in &self.spec.arguments {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn execute(&self) -> Result<String> {
        let label = self.display();
        info!(command = %label, "executing_command");
        let mut cmd = Command::new(&self.spec.executable);
        cmd.args(&self.spec.arguments);
        if let Some(dir) = &self.spec.working_dir {
            cmd.current_dir(dir);
        }
        run_captured(cmd, label).await
    }
}

/// Focus toggle for an application: launch it, bring it to the front, or
/// cycle its windows when it already is frontmost.
#[derive(Debug, Clone)]
pub struct FocusAppAction {
    /// Bundle identifier of the target application.
    bundle_id: String,
    /// Window-server access.
    apps: Arc<dyn AppControl>,
}

impl FocusAppAction {
    /// Action focusing `bundle_id` on the real system.
    pub fn new(bundle_id: String) -> Self {
        Self::with_apps(bundle_id, Arc::new(RealAppControl))
    }

    /// Action focusing `bundle_id` through `apps`.
    pub fn with_apps(bundle_id: String, apps: Arc<dyn AppControl>) -> Self {
        Self { bundle_id, apps }
    }
}

#[async_trait]
impl Action for FocusAppAction {
    async fn execute(&self) -> Result<String> {
        info!(bundle_id = %self.bundle_id, "focusing_app");
        let outcome = focus::toggle(self.apps.as_ref(), &self.bundle_id).await?;
        Ok(format!("{}: {}", self.bundle_id, outcome))
    }
}

/// Run `cmd` to completion with stdin closed, returning merged output.
///
/// The child is killed if the returned future is dropped before it exits.
pub(crate) async fn run_captured(mut cmd: Command, label: String) -> Result<String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let output = cmd.output().await?;
    let text = merge_output(&output.stdout, &output.stderr);
    if output.status.success() {
        Ok(text)
    } else {
        Err(Error::CommandFailed {
            command: label,
            status: output.status,
            output: text,
        })
    }
}

/// Unify stdout and stderr into one message, trimming blank edge lines.
fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::new();
    let out = String::from_utf8_lossy(stdout);
    let err = String::from_utf8_lossy(stderr);
    if !out.is_empty() {
        combined.push_str(&out);
    }
    if !err.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&err);
    }

    let lines: Vec<&str> = combined.lines().collect();
    let first_nonblank = lines.iter().position(|l| !l.trim().is_empty());
    let last_nonblank = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first_nonblank, last_nonblank) {
        (Some(s), Some(e)) if s <= e => lines[s..=e].join("\n"),
        _ => NO_OUTPUT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_trims_and_joins() {
        assert_eq!(merge_output(b"\n\nhi\n\n", b""), "hi");
        assert_eq!(merge_output(b"out", b"err\n"), "out\nerr");
        assert_eq!(merge_output(b"  \n", b"\n"), NO_OUTPUT);
    }

    #[test]
    fn factory_maps_each_kind() {
        let cmd = SystemActions.create(&ActionSpec::Command(CommandSpec {
            executable: "/bin/echo".into(),
            arguments: vec!["hi".into()],
            working_dir: None,
        }));
        assert!(format!("{:?}", cmd).contains("CommandAction"));
        let app = SystemActions.create(&ActionSpec::FocusApp {
            bundle_id: "com.apple.Terminal".into(),
        });
        assert!(format!("{:?}", app).contains("com.apple.Terminal"));
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn focus_app_unsupported_off_macos() {
        let err = FocusAppAction::new("com.apple.Terminal".into())
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
