//! On-disk JSON schema.
//!
//! These types mirror the file exactly; `loader` validates them into the
//! encoding-independent types in `types`.

use keycode::{KeyCode, Transition};
use serde::Deserialize;

use crate::CommandSpec;

/// Top-level file layout.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    /// Ordered registration entries.
    pub registrations: Vec<RawEntry>,
}

/// One registration entry, tagged by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawEntry {
    /// Run an executable.
    Command {
        /// Key code on the keypad.
        key: KeyCode,
        /// Human-readable description.
        description: String,
        /// Triggering transition; defaults to released.
        #[serde(default)]
        transition: Option<Transition>,
        /// What to run.
        command: CommandSpec,
    },
    /// Launch or focus an application.
    App {
        /// Key code on the keypad.
        key: KeyCode,
        /// Human-readable description.
        description: String,
        /// Triggering transition; defaults to released.
        #[serde(default)]
        transition: Option<Transition>,
        /// Bundle identifier of the target application.
        #[serde(rename = "appBundleId")]
        app_bundle_id: String,
    },
    /// Any `type` this build does not know about.
    #[serde(other)]
    Unsupported,
}
