use std::{io, process::ExitStatus, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the hotvay engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be located, read or parsed.
    #[error("Config error: {0}")]
    Config(#[from] config::Error),

    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The filesystem watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A command ran but exited unsuccessfully.
    #[error("'{command}' failed ({status}): {output}")]
    CommandFailed {
        /// Command that was run.
        command: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// The window-cycling shortcut could not be read.
    #[error("Malformed window shortcut: {0}")]
    Shortcut(String),

    /// A synthetic key event could not be created.
    #[error("Keystroke error: {0}")]
    Keystroke(String),

    /// The action is not available on this platform.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An operation was attempted in the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
