//! Application focus toggle.
//!
//! Pressing a focus key for an app that is already frontmost cycles through
//! its windows by posting the user's "move focus to next window" shortcut. A
//! running app is activated; an app that is not running is launched.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Error, Result, deps::AppControl};

/// Symbolic hotkey id of "Move focus to next window".
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const MOVE_FOCUS_TO_NEXT_WINDOW: &str = "27";

/// Modifier mask bits used by symbolic hotkeys (same as `CGEventFlags`).
const MASK_SHIFT: u64 = 0x2_0000;
/// Control bit.
const MASK_CONTROL: u64 = 0x4_0000;
/// Option bit.
const MASK_OPTION: u64 = 0x8_0000;
/// Command bit.
const MASK_COMMAND: u64 = 0x10_0000;

/// A keyboard shortcut read from the symbolic hotkeys preferences.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowShortcut {
    /// Disabled shortcuts are never posted.
    pub(crate) enabled: bool,
    /// Virtual key code of the non-modifier key.
    pub(crate) key_code: u16,
    /// Modifier mask.
    pub(crate) modifiers: u64,
}

impl Default for WindowShortcut {
    /// The macOS default: Command + `.
    fn default() -> Self {
        Self {
            enabled: true,
            key_code: 50,
            modifiers: MASK_COMMAND,
        }
    }
}

/// On-disk shape of one symbolic hotkey.
#[derive(Debug, Deserialize)]
struct SymbolicHotKey {
    /// Whether the shortcut is active.
    enabled: bool,
    /// Key binding.
    value: SymbolicHotKeyValue,
}

/// Binding of a symbolic hotkey: `[character, key code, modifier mask]`.
#[derive(Debug, Deserialize)]
struct SymbolicHotKeyValue {
    /// Raw parameters.
    parameters: Vec<i64>,
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
impl WindowShortcut {
    /// Parse one `AppleSymbolicHotKeys` entry rendered as JSON.
    pub(crate) fn from_symbolic_hotkey(json: &str) -> Result<Self> {
        let raw: SymbolicHotKey =
            serde_json::from_str(json).map_err(|e| Error::Shortcut(e.to_string()))?;
        let &[_, key_code, mask, ..] = raw.value.parameters.as_slice() else {
            return Err(Error::Shortcut(format!(
                "expected at least 3 parameters, got {}",
                raw.value.parameters.len()
            )));
        };
        let key_code = u16::try_from(key_code)
            .map_err(|_| Error::Shortcut(format!("key code {} out of range", key_code)))?;
        let modifiers = u64::try_from(mask)
            .map_err(|_| Error::Shortcut(format!("modifier mask {} out of range", mask)))?;
        Ok(Self {
            enabled: raw.enabled,
            key_code,
            modifiers,
        })
    }

    /// Virtual key codes of the modifiers to hold, in press order.
    pub(crate) fn modifier_key_codes(&self) -> Vec<u16> {
        [
            (MASK_COMMAND, 0x37),
            (MASK_OPTION, 0x3A),
            (MASK_CONTROL, 0x3B),
            (MASK_SHIFT, 0x38),
        ]
        .into_iter()
        .filter(|(bit, _)| self.modifiers & bit != 0)
        .map(|(_, code)| code)
        .collect()
    }
}

/// What a focus toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FocusOutcome {
    /// The app was frontmost; its next window was focused.
    CycledWindows,
    /// The app was frontmost but the window shortcut is disabled.
    ShortcutDisabled,
    /// The app was frontmost but synthetic keys need Accessibility.
    NotTrusted,
    /// A running instance was brought to the front.
    Activated,
    /// The app was not running and was launched.
    Launched,
}

impl fmt::Display for FocusOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CycledWindows => "cycled windows",
            Self::ShortcutDisabled => "already frontmost; window shortcut disabled",
            Self::NotTrusted => "already frontmost; accessibility permission missing",
            Self::Activated => "activated",
            Self::Launched => "launched",
        })
    }
}

/// Bring `bundle_id` forward, cycling its windows when it already is.
pub(crate) async fn toggle(apps: &dyn AppControl, bundle_id: &str) -> Result<FocusOutcome> {
    let frontmost = apps.frontmost_bundle_id();
    debug!(bundle_id, frontmost = ?frontmost, "focus_toggle");

    if frontmost.as_deref() == Some(bundle_id) {
        if !apps.accessibility_ok() {
            warn!(bundle_id, "accessibility_permission_missing");
            return Ok(FocusOutcome::NotTrusted);
        }
        return Ok(if apps.cycle_windows().await? {
            FocusOutcome::CycledWindows
        } else {
            FocusOutcome::ShortcutDisabled
        });
    }

    if apps.activate(bundle_id) {
        return Ok(FocusOutcome::Activated);
    }
    apps.launch(bundle_id).await?;
    Ok(FocusOutcome::Launched)
}

/// AppKit, CoreGraphics and LaunchServices access.
#[cfg(target_os = "macos")]
pub(crate) mod sys {
    use std::{env, path::PathBuf};

    use core_graphics::{
        event::{CGEvent, CGEventFlags, CGEventTapLocation},
        event_source::{CGEventSource, CGEventSourceStateID},
    };
    use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication, NSWorkspace};
    use objc2_foundation::NSString;
    use tokio::process::Command;
    use tracing::{debug, warn};

    use super::{MOVE_FOCUS_TO_NEXT_WINDOW, WindowShortcut};
    use crate::{Error, Result, action::run_captured};

    #[link(name = "ApplicationServices", kind = "framework")]
    unsafe extern "C" {
        fn AXIsProcessTrusted() -> bool;
    }

    /// Whether this process may post synthetic input.
    pub(crate) fn accessibility_ok() -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    /// Bundle identifier of the frontmost application.
    pub(crate) fn frontmost_bundle_id() -> Option<String> {
        unsafe {
            let workspace = NSWorkspace::sharedWorkspace();
            let app = workspace.frontmostApplication()?;
            app.bundleIdentifier().map(|id| id.to_string())
        }
    }

    /// Activate a running instance of `bundle_id`. `false` when none runs.
    pub(crate) fn activate(bundle_id: &str) -> bool {
        let id = NSString::from_str(bundle_id);
        unsafe {
            let running = NSRunningApplication::runningApplicationsWithBundleIdentifier(&id);
            let Some(app) = running.firstObject() else {
                return false;
            };
            #[allow(deprecated)]
            let ok =
                app.activateWithOptions(NSApplicationActivationOptions::ActivateIgnoringOtherApps);
            if !ok {
                warn!(bundle_id, "activate_with_options_refused");
            }
        }
        true
    }

    /// Launch `bundle_id` through LaunchServices.
    pub(crate) async fn launch(bundle_id: &str) -> Result<()> {
        let mut cmd = Command::new("/usr/bin/open");
        cmd.arg("-b").arg(bundle_id);
        run_captured(cmd, format!("open -b {}", bundle_id)).await?;
        Ok(())
    }

    /// Location of the per-user symbolic hotkeys preferences.
    fn symbolic_hotkeys_path() -> Option<PathBuf> {
        let home = env::var_os("HOME").filter(|h| !h.is_empty())?;
        Some(PathBuf::from(home).join("Library/Preferences/com.apple.symbolichotkeys.plist"))
    }

    /// Current "move focus to next window" shortcut.
    ///
    /// Read on every call so edits in System Settings apply without a
    /// restart. Falls back to the system default when the user never
    /// customised it.
    pub(crate) async fn read_window_shortcut() -> Result<WindowShortcut> {
        let Some(plist) = symbolic_hotkeys_path() else {
            return Ok(WindowShortcut::default());
        };
        let key_path = format!("AppleSymbolicHotKeys.{}", MOVE_FOCUS_TO_NEXT_WINDOW);
        let mut cmd = Command::new("/usr/bin/plutil");
        cmd.arg("-extract")
            .arg(&key_path)
            .arg("json")
            .arg("-o")
            .arg("-")
            .arg(&plist);
        match run_captured(cmd, format!("plutil -extract {}", key_path)).await {
            Ok(json) => WindowShortcut::from_symbolic_hotkey(&json),
            Err(Error::CommandFailed { output, .. }) => {
                debug!(output = %output, "window_shortcut_default");
                Ok(WindowShortcut::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Post `shortcut` to the HID event tap: modifiers down, key down and
    /// up, modifiers up.
    pub(crate) fn post_shortcut(shortcut: &WindowShortcut) -> Result<()> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| Error::Keystroke("failed to create CGEventSource".into()))?;
        let key = |code: u16, down: bool| {
            CGEvent::new_keyboard_event(source.clone(), code, down)
                .map_err(|_| Error::Keystroke(format!("failed to create key event {}", code)))
        };
        let flags = CGEventFlags::from_bits_retain(shortcut.modifiers);
        let modifiers = shortcut.modifier_key_codes();

        for &code in &modifiers {
            key(code, true)?.post(CGEventTapLocation::HID);
        }
        for down in [true, false] {
            let event = key(shortcut.key_code, down)?;
            event.set_flags(flags);
            event.post(CGEventTapLocation::HID);
        }
        for &code in modifiers.iter().rev() {
            key(code, false)?.post(CGEventTapLocation::HID);
        }
        Ok(())
    }
}
