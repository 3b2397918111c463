//! keycode: key codes and transitions reported by the hotvay keypad.
//!
//! - `KeyCode`: the raw code the keypad reports for a physical key.
//! - `Transition`: whether the key went down (`Pressed`) or up (`Released`).
//! - `KeyIdentity`: code plus transition, the lookup key for registrations.
//!
//! The keypad reports small integer codes, one per physical key. Codes are
//! not translated into a keyboard layout; configuration refers to them directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw key code as reported by the keypad.
pub type KeyCode = u8;

/// Direction of a key state change.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// The key went down.
    Pressed,
    /// The key came back up. This is the default when a binding does not say.
    #[default]
    Released,
}

impl Transition {
    /// Canonical lowercase name (`pressed` / `released`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pressed => "pressed",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key code together with its transition.
///
/// Equality is structural: `3/pressed` and `3/released` are different identities.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct KeyIdentity {
    /// Key code reported by the device.
    pub code: KeyCode,
    /// Transition that triggers the binding.
    pub transition: Transition,
}

impl KeyIdentity {
    /// Construct an identity from parts.
    pub const fn new(code: KeyCode, transition: Transition) -> Self {
        Self { code, transition }
    }

    /// Identity for a key release.
    pub const fn released(code: KeyCode) -> Self {
        Self::new(code, Transition::Released)
    }

    /// Identity for a key press.
    pub const fn pressed(code: KeyCode) -> Self {
        Self::new(code, Transition::Pressed)
    }
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.code, self.transition)
    }
}
