//! keypad: HID transport for the Vaydeer 9-key smart keypad.
//!
//! - [`DeviceId`]: vendor/product pair identifying the supported hardware.
//! - [`Keypad`]: an open device handle that reads raw input reports.
//! - [`report::decode`]: turns a raw report into a key code and transition.
//!
//! This crate does not loop, retry or reconnect; the engine's device source
//! owns that policy and drives a `Keypad` from a dedicated reader thread.

use std::fmt;

mod error;
pub mod report;
mod sys;

pub use error::{Error, Result};
pub use sys::Keypad;

/// USB identity of a HID device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceId {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
}

impl DeviceId {
    /// Vaydeer 9-key smart keypad.
    pub const KEYPAD: Self = Self::new(0x0483, 0x5752);

    /// Construct a device id.
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::KEYPAD
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}
