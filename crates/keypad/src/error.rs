//! Error types and result alias for the keypad crate.
use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Error variants produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The HID library reported a failure.
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
    /// Reading from an open device failed.
    #[error("Device read failed: {0}")]
    Read(String),
    /// A raw report did not have the size the keypad protocol requires.
    #[error("Unexpected report length {len} (expected {min}..={max} bytes)")]
    ReportLength {
        /// Number of bytes received.
        len: usize,
        /// Smallest accepted report.
        min: usize,
        /// Largest accepted report.
        max: usize,
    },
}
