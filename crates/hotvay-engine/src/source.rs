//! Config source: the config file as a stream of validated [`Config`]s.
//!
//! Change detection is a stream of payload-less ticks. [`watch_file`] produces
//! them from filesystem notifications; tests feed them by hand. Every tick
//! re-reads the file. Identical bytes are ignored, parse failures are logged
//! and emit nothing, so the consumer keeps its previous table.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use config::Config;
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{AccessKind, AccessMode},
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    Result,
    stream::{Dedup, Emitter, EventStream},
};

/// Channel capacity for emitted configs.
const CONFIG_CAPACITY: usize = 4;

/// Watch `path` for changes and emit one tick per relevant notification.
///
/// The parent directory is watched, so editors that save by writing a
/// temporary file and renaming it over `path` are still seen. When `path` is
/// a symlink, the directory of its resolved target is watched as well. Ticks
/// coalesce while the consumer is busy. The watcher is released when the
/// stream is cancelled.
pub fn watch_file(path: &Path) -> Result<EventStream<()>> {
    let targets = watch_targets(path);
    let names: Vec<OsString> = targets.iter().map(|(_, name)| name.clone()).collect();

    let (tx, stream) = EventStream::channel(1);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_relevant(&event, &names) {
                trace!(kind = ?event.kind, "config_file_event");
                // A full channel means a tick is already pending.
                tx.try_emit(());
            }
        }
        Err(e) => warn!(error = %e, "config_watch_error"),
    })?;
    let mut dirs: Vec<PathBuf> = Vec::new();
    for (dir, _) in targets {
        if !dirs.contains(&dir) {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            debug!(dir = %dir.display(), "config_watch_started");
            dirs.push(dir);
        }
    }

    Ok(stream.on_teardown(move || {
        drop(watcher);
        debug!(dirs = dirs.len(), "config_watch_stopped");
    }))
}

/// Directory and file name pairs to watch for `path`: the path itself and,
/// for a symlink, its resolved target.
fn watch_targets(path: &Path) -> Vec<(PathBuf, OsString)> {
    let mut targets = vec![split_path(path)];
    let is_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_link {
        match fs::canonicalize(path) {
            Ok(target) => {
                debug!(
                    link = %path.display(),
                    target = %target.display(),
                    "config_symlink_resolved"
                );
                targets.push(split_path(&target));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "config_symlink_unresolved"),
        }
    }
    targets
}

/// Parent directory (`.` when there is none) and file name of `path`.
fn split_path(path: &Path) -> (PathBuf, OsString) {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path.file_name().map(OsString::from).unwrap_or_default();
    (dir, name)
}

/// True when `event` may have changed one of the watched files.
fn is_relevant(event: &Event, names: &[OsString]) -> bool {
    let touches_file = event
        .paths
        .iter()
        .any(|p| p.file_name().is_some_and(|n| names.iter().any(|w| w == n)));
    let content_change = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    };
    touches_file && content_change
}

/// Reads, deduplicates and parses the config file on every tick.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Config file location.
    path: PathBuf,
}

impl ConfigSource {
    /// Source for the config file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Config file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe using filesystem notifications as the change signal.
    pub fn watch(&self) -> Result<EventStream<Config>> {
        let ticks = watch_file(&self.path)?;
        self.subscribe(ticks)
    }

    /// Subscribe with an explicit change signal.
    ///
    /// The file is read before this returns: a missing or unreadable file is
    /// an error here, not a logged failure. The first emission is the
    /// current content, provided it parses.
    pub fn subscribe(&self, ticks: EventStream<()>) -> Result<EventStream<Config>> {
        let initial = config::read_config_bytes(&self.path)?;
        let path = self.path.clone();
        Ok(EventStream::spawn(CONFIG_CAPACITY, move |tx| {
            run_reloader(path, initial, ticks, tx)
        }))
    }
}

/// Producer task: emit the initial config, then one per changed read.
async fn run_reloader(
    path: PathBuf,
    initial: Vec<u8>,
    mut ticks: EventStream<()>,
    tx: Emitter<Config>,
) {
    let mut seen = Dedup::new();
    seen.admit(&initial);
    let mut open = match parse_logged(&path, &initial) {
        Some(cfg) => tx.emit(cfg).await,
        None => true,
    };

    while open {
        let tick = tokio::select! {
            _ = tx.cancelled() => break,
            tick = ticks.next() => tick,
        };
        if tick.is_none() {
            debug!(path = %path.display(), "config_ticks_ended");
            break;
        }
        let bytes = match config::read_config_bytes(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config_reread_failed");
                continue;
            }
        };
        if !seen.admit(&bytes) {
            trace!(path = %path.display(), "config_unchanged");
            continue;
        }
        if let Some(cfg) = parse_logged(&path, &bytes) {
            open = tx.emit(cfg).await;
        }
    }
    ticks.shutdown().await;
}

/// Parse `bytes`, logging the outcome. `None` on failure.
fn parse_logged(path: &Path, bytes: &[u8]) -> Option<Config> {
    match config::parse_bytes(bytes, Some(path)) {
        Ok(cfg) => {
            info!(path = %path.display(), entries = cfg.len(), "config_loaded");
            Some(cfg)
        }
        Err(e) => {
            error!(path = %path.display(), "config_rejected\n{}", e.pretty());
            None
        }
    }
}
