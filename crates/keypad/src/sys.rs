//! hidapi integration: locate, open and read the keypad.
//!
//! Each `Keypad::open` builds a fresh `HidApi` so that a device plugged in
//! after startup shows up in the enumeration. The handle is closed when the
//! `Keypad` is dropped.

use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, trace};

use crate::{DeviceId, Error, Result};

/// An open handle to the keypad.
pub struct Keypad {
    /// Kept alive for the lifetime of the device handle.
    _api: HidApi,
    /// Open device handle.
    device: HidDevice,
    /// Serial number reported at enumeration time, if any.
    serial: Option<String>,
}

impl Keypad {
    /// Open the first device matching `id`.
    ///
    /// Returns `Ok(None)` when no such device is attached.
    pub fn open(id: DeviceId) -> Result<Option<Self>> {
        let api = HidApi::new()?;
        let info = api
            .device_list()
            .find(|d| d.vendor_id() == id.vendor_id && d.product_id() == id.product_id);
        let Some(info) = info else {
            trace!(device = %id, "device_not_enumerated");
            return Ok(None);
        };
        let serial = info
            .serial_number()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let device = info.open_device(&api)?;
        debug!(device = %id, serial = ?serial, "device_opened");
        Ok(Some(Self {
            _api: api,
            device,
            serial,
        }))
    }

    /// Serial number of the open device, if it reports one.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Read one report into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes read; `0` means no report arrived in time.
    pub fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self.device
            .read_timeout(buf, ms)
            .map_err(|e| Error::Read(e.to_string()))
    }
}
