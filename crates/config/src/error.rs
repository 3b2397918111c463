//! Error types for configuration loading and validation.

use std::{
    cmp::{max, min},
    fmt::Write as _,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error, Clone)]
/// Errors produced while locating, reading, parsing, or validating a configuration.
pub enum Error {
    #[error("{message}")]
    /// I/O or filesystem read error.
    Read {
        /// Optional path associated with the read error.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },
    #[error("config file not found: {}", path.display())]
    /// The config file does not exist.
    Missing {
        /// Path that was expected to hold the config.
        path: PathBuf,
    },
    #[error("{message}")]
    /// JSON syntax or schema error with a concrete line/column location and excerpt.
    Parse {
        /// Optional path associated with the parse error.
        path: Option<PathBuf>,
        /// 1-based line number.
        line: usize,
        /// 1-based column number.
        col: usize,
        /// Human-readable error message.
        message: String,
        /// Rendered excerpt including a caret at the error location.
        excerpt: String,
    },
    #[error("{message}")]
    /// A well-formed file whose content is not acceptable.
    Validation {
        /// Optional path associated with the validation error.
        path: Option<PathBuf>,
        /// Index of the offending registration entry, if any.
        entry: Option<usize>,
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Render a human-friendly error message including location and an excerpt when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Read { path, message } => match path {
                Some(p) => format!("Read error at {}: {}", p.display(), message),
                None => format!("Read error: {}", message),
            },
            Self::Missing { path } => format!(
                "No config found at {}. Create it with a \"registrations\" list.",
                path.display()
            ),
            Self::Parse {
                path,
                line,
                col,
                message,
                excerpt,
            } => match path {
                Some(p) => format!(
                    "Config parse error at {}:{}:{}\n{}\n{}",
                    p.display(),
                    line,
                    col,
                    message,
                    excerpt
                ),
                None => format!(
                    "Config parse error at line {}, column {}\n{}\n{}",
                    line, col, message, excerpt
                ),
            },
            Self::Validation {
                path,
                entry,
                message,
            } => {
                let loc = entry
                    .map(|i| format!(" (registration #{})", i))
                    .unwrap_or_default();
                match path {
                    Some(p) => format!(
                        "Config validation error at {}{}\n{}",
                        p.display(),
                        loc,
                        message
                    ),
                    None => format!("Config validation error{}\n{}", loc, message),
                }
            }
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Validation { path, .. } => {
                path.as_deref()
            }
            Self::Missing { path } => Some(path),
        }
    }

    /// True when the error means "there is no config file at all".
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Build a small 2–3 line excerpt with a caret at `(line_no, col_no)`.
pub fn excerpt_at(source: &str, line_no: usize, col_no: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let total = lines.len();
    let start = max(1usize, line_no.saturating_sub(2));
    let end = min(total, line_no + 1);

    let mut out = String::new();
    for n in start..=end {
        let text = lines.get(n - 1).copied().unwrap_or("");
        let _ignored = writeln!(out, " {:>4} | {}", n, text);
        if n == line_no {
            let prefix = format!(" {:>4} | ", n);
            let _ignored = writeln!(
                out,
                "{}{}^",
                " ".repeat(prefix.len()),
                " ".repeat(col_no.saturating_sub(1))
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_points_at_column() {
        let src = "{\n  \"registrations\": [\n    oops\n  ]\n}";
        let ex = excerpt_at(src, 3, 5);
        assert!(ex.contains("    3 |     oops"));
        let caret_line = ex.lines().find(|l| l.trim_end().ends_with('^')).unwrap();
        // " {:>4} | " renders as 8 columns, then col - 1 spaces.
        assert_eq!(caret_line.find('^'), Some(8 + 4));
    }

    #[test]
    fn missing_is_distinct() {
        let e = Error::Missing {
            path: PathBuf::from("/nope/.hotvay"),
        };
        assert!(e.is_missing());
        assert_eq!(e.path(), Some(Path::new("/nope/.hotvay")));
        assert!(e.pretty().contains("/nope/.hotvay"));
    }
}
