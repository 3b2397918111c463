//! Parse and load user configuration.

use std::{
    fs, io,
    path::{Path, PathBuf},
    str,
};

use keycode::KeyIdentity;
use tracing::warn;

use crate::{
    ActionSpec, Config, Entry, Error,
    error::excerpt_at,
    raw::{RawConfig, RawEntry},
};

/// Read the raw bytes of the config file at `path`.
///
/// A file that does not exist is reported as [`Error::Missing`] so callers can
/// tell "no config" apart from "unreadable config".
pub fn read_config_bytes(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::Missing {
            path: path.to_path_buf(),
        },
        _ => Error::Read {
            path: Some(path.to_path_buf()),
            message: format!("Failed to read config: {}", e),
        },
    })
}

/// Load and validate the config file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    let bytes = read_config_bytes(path)?;
    parse_bytes(&bytes, Some(path))
}

/// Parse raw file content. Non-UTF-8 content is a validation error.
pub fn parse_bytes(bytes: &[u8], path: Option<&Path>) -> Result<Config, Error> {
    let source = str::from_utf8(bytes).map_err(|e| Error::Validation {
        path: path.map(Path::to_path_buf),
        entry: None,
        message: format!("Config is not valid UTF-8: {}", e),
    })?;
    parse(source, path)
}

/// Parse and validate a JSON config document.
///
/// Structural problems fail the whole document. Entries with an unknown
/// `type` are skipped with a warning so newer files still load.
pub fn parse(source: &str, path: Option<&Path>) -> Result<Config, Error> {
    let raw: RawConfig = serde_json::from_str(source).map_err(|e| {
        let (line, col) = (e.line(), e.column());
        Error::Parse {
            path: path.map(Path::to_path_buf),
            line,
            col,
            message: e.to_string(),
            excerpt: excerpt_at(source, line, col),
        }
    })?;

    let owned_path: Option<PathBuf> = path.map(Path::to_path_buf);
    let invalid = |entry: usize, message: String| Error::Validation {
        path: owned_path.clone(),
        entry: Some(entry),
        message,
    };

    let mut entries = Vec::with_capacity(raw.registrations.len());
    for (idx, raw_entry) in raw.registrations.into_iter().enumerate() {
        let (key, transition, description, action) = match raw_entry {
            RawEntry::Command {
                key,
                description,
                transition,
                command,
            } => {
                if command.executable.trim().is_empty() {
                    return Err(invalid(idx, "command.executable must not be empty".into()));
                }
                (key, transition, description, ActionSpec::Command(command))
            }
            RawEntry::App {
                key,
                description,
                transition,
                app_bundle_id,
            } => {
                if app_bundle_id.trim().is_empty() {
                    return Err(invalid(idx, "appBundleId must not be empty".into()));
                }
                (
                    key,
                    transition,
                    description,
                    ActionSpec::FocusApp {
                        bundle_id: app_bundle_id,
                    },
                )
            }
            RawEntry::Unsupported => {
                warn!(entry = idx, "skipping registration with unsupported type");
                continue;
            }
        };
        if description.trim().is_empty() {
            return Err(invalid(idx, "description must not be empty".into()));
        }
        entries.push(Entry {
            key: KeyIdentity::new(key, transition.unwrap_or_default()),
            description,
            action,
        });
    }
    Ok(Config { entries })
}
