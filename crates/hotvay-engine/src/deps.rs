use std::{fmt, time::Duration};

use async_trait::async_trait;
use keypad::{DeviceId, Keypad};

#[cfg(target_os = "macos")]
use tracing::debug;

#[cfg(target_os = "macos")]
use crate::focus::sys;
use crate::Result;
#[cfg(not(target_os = "macos"))]
use crate::Error;

// ---- Keypad API abstraction ----

/// An open connection to the keypad.
///
/// Links are used from the device source's blocking thread only, so they need
/// not be `Send`.
pub trait DeviceLink {
    /// Serial number reported by the device, if any.
    fn serial(&self) -> Option<String>;
    /// Read one report into `buf`, waiting at most `timeout`. `Ok(0)` means no
    /// report arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> keypad::Result<usize>;
}

/// Minimal device API used by the device source.
pub trait DeviceApi: Send + Sync {
    /// Open the device identified by `id`; `Ok(None)` when it is not attached.
    fn open(&self, id: DeviceId) -> keypad::Result<Option<Box<dyn DeviceLink>>>;
}

/// [`DeviceApi`] backed by hidapi.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealDeviceApi;

impl DeviceApi for RealDeviceApi {
    fn open(&self, id: DeviceId) -> keypad::Result<Option<Box<dyn DeviceLink>>> {
        Ok(Keypad::open(id)?.map(|k| Box::new(k) as Box<dyn DeviceLink>))
    }
}

impl DeviceLink for Keypad {
    fn serial(&self) -> Option<String> {
        Self::serial(self).map(str::to_string)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> keypad::Result<usize> {
        Self::read(self, buf, timeout)
    }
}

// ---- Application API abstraction ----

/// Window-server and launch services used by the focus toggle.
#[async_trait]
pub trait AppControl: Send + Sync + fmt::Debug {
    /// Bundle identifier of the frontmost application.
    fn frontmost_bundle_id(&self) -> Option<String>;
    /// Whether synthetic key events may be posted.
    fn accessibility_ok(&self) -> bool;
    /// Bring a running instance of `bundle_id` to the front. `false` when no
    /// instance is running.
    fn activate(&self, bundle_id: &str) -> bool;
    /// Post the system "move focus to next window" shortcut. `Ok(false)` when
    /// the user disabled it.
    async fn cycle_windows(&self) -> Result<bool>;
    /// Launch `bundle_id`.
    async fn launch(&self, bundle_id: &str) -> Result<()>;
}

/// [`AppControl`] backed by AppKit and CoreGraphics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealAppControl;

#[cfg(target_os = "macos")]
#[async_trait]
impl AppControl for RealAppControl {
    fn frontmost_bundle_id(&self) -> Option<String> {
        sys::frontmost_bundle_id()
    }

    fn accessibility_ok(&self) -> bool {
        sys::accessibility_ok()
    }

    fn activate(&self, bundle_id: &str) -> bool {
        sys::activate(bundle_id)
    }

    async fn cycle_windows(&self) -> Result<bool> {
        let shortcut = sys::read_window_shortcut().await?;
        debug!(?shortcut, "window_shortcut");
        if !shortcut.enabled {
            return Ok(false);
        }
        sys::post_shortcut(&shortcut)?;
        Ok(true)
    }

    async fn launch(&self, bundle_id: &str) -> Result<()> {
        sys::launch(bundle_id).await
    }
}

/// Only macOS has applications to focus.
#[cfg(not(target_os = "macos"))]
#[async_trait]
impl AppControl for RealAppControl {
    fn frontmost_bundle_id(&self) -> Option<String> {
        None
    }

    fn accessibility_ok(&self) -> bool {
        false
    }

    fn activate(&self, _bundle_id: &str) -> bool {
        false
    }

    async fn cycle_windows(&self) -> Result<bool> {
        Err(Error::Unsupported("cycling windows requires macOS".to_string()))
    }

    async fn launch(&self, bundle_id: &str) -> Result<()> {
        Err(Error::Unsupported(format!(
            "focusing application '{}' requires macOS",
            bundle_id
        )))
    }
}
