//! Validated configuration types, independent of the on-disk encoding.

use std::path::PathBuf;

use keycode::KeyIdentity;
use serde::{Deserialize, Serialize};

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Path to (or name of) the executable.
    pub executable: String,
    /// Arguments passed verbatim, without shell interpretation.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// What a registration does when its key fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Run a command.
    Command(CommandSpec),
    /// Launch the application, or bring it to the front when already running.
    FocusApp {
        /// Application bundle identifier, e.g. `com.apple.Terminal`.
        bundle_id: String,
    },
}

impl ActionSpec {
    /// Short label used in logs.
    pub fn label(&self) -> String {
        match self {
            Self::Command(c) => format!("command:{}", c.executable),
            Self::FocusApp { bundle_id } => format!("app:{}", bundle_id),
        }
    }
}

/// One validated registration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Key code and transition that trigger this entry.
    pub key: KeyIdentity,
    /// Human-readable description.
    pub description: String,
    /// The action to run.
    pub action: ActionSpec,
}

/// A validated configuration: registration entries in file order.
///
/// Duplicate keys are preserved here; the registration table resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Entries in the order they appear in the file.
    pub entries: Vec<Entry>,
}

impl Config {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the config has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
