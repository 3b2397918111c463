//! Configuration for hotvay: where the file lives, what it looks like, and how
//! it is turned into a validated [`Config`].
//!
//! The file is JSON with a single `registrations` list. Each entry binds a
//! keypad key (plus an optional transition) to exactly one action:
//!
//! ```json
//! { "registrations": [
//!     { "type": "command", "key": 3, "description": "say hi",
//!       "command": { "executable": "/bin/echo", "arguments": ["hi"] } },
//!     { "type": "app", "key": 4, "description": "terminal",
//!       "transition": "pressed", "appBundleId": "com.apple.Terminal" } ] }
//! ```

use std::{
    env,
    path::{Path, PathBuf},
};

mod error;
mod loader;
mod raw;
mod types;

#[cfg(test)]
mod test_parse;

pub use error::{Error, excerpt_at};
pub use loader::{load_from_path, parse, parse_bytes, read_config_bytes};
pub use types::{ActionSpec, CommandSpec, Config, Entry};

/// File name of the per-user config inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".hotvay";

/// Config path for a given home directory.
pub fn config_path_in(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE_NAME)
}

/// Determine the preferred user config path (`~/.hotvay`).
///
/// Fails when the home directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf, Error> {
    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => Ok(config_path_in(Path::new(&home))),
        _ => Err(Error::Read {
            path: None,
            message: "Could not determine home directory (HOME is not set)".to_string(),
        }),
    }
}

/// Resolve the effective config path and check that it exists.
///
/// Policy:
/// 1) Use `explicit` when provided.
/// 2) Else use `~/.hotvay`.
///
/// A path that does not exist is [`Error::Missing`].
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    if !path.exists() {
        return Err(Error::Missing { path });
    }
    Ok(path)
}
