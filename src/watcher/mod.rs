//! Markdown file source.
//!
//! Watches a file with notify and turns each debounced change into a
//! [`ChangeEvent`] carrying the file's current lines. Editors save by
//! rename or truncate depending on the platform, so the parent directory is
//! watched and events are matched against the file name.
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::cancel::CancelToken;
use crate::session::{ChangeEvent, EventSender};

/// Debounce applied when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Emits a snapshot of a markdown file each time it settles after a change.
pub struct FileSource {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
    cursor_line: usize,
}

impl FileSource {
    /// Watch `path`, reporting `cursor_line` with every snapshot.
    ///
    /// # Errors
    /// Returns an error if the file watcher cannot be created or the path cannot be watched.
    pub fn new(
        path: impl AsRef<Path>,
        debounce: Duration,
        cursor_line: usize,
    ) -> notify::Result<Self> {
        // Event paths from the OS are absolute and canonical.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %target_path.display(), root = %watch_root.display(), "watching file");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
            cursor_line: cursor_line.max(1),
        })
    }

    /// The canonical path of the file being watched.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Current contents of the file as a text-changed event.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn snapshot(&self) -> io::Result<ChangeEvent> {
        read_snapshot(&self.target_path, self.cursor_line)
    }

    /// A fresh snapshot once a debounced change is ready, otherwise `None`.
    ///
    /// # Errors
    /// Returns an error if the changed file cannot be read.
    pub fn poll_change(&mut self) -> io::Result<Option<ChangeEvent>> {
        if self.take_change_ready() {
            self.snapshot().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Forward snapshots to `sender` from a background thread, checking every
    /// `poll`, until `shutdown` is cancelled or the receiver is gone.
    pub fn spawn(mut self, sender: EventSender, poll: Duration, shutdown: CancelToken) -> JoinHandle<()> {
        thread::spawn(move || {
            while !shutdown.is_cancelled() {
                match self.poll_change() {
                    Ok(Some(event)) => {
                        tracing::debug!(lines = event.lines.len(), "file changed");
                        if sender.submit(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(path = %self.target_path.display(), error = %err, "failed to read changed file");
                    }
                }
                thread::sleep(poll);
            }
        })
    }

    fn take_change_ready(&mut self) -> bool {
        let mut saw_relevant_event = false;
        let mut total_events = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            total_events += 1;
            match event {
                Ok(ev) if self.is_relevant(&ev) => saw_relevant_event = true,
                Ok(ev) => {
                    crate::perf::log_event(
                        "watcher.irrelevant",
                        format!("kind={:?} paths={:?}", ev.kind, ev.paths),
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                }
            }
        }

        if total_events > 0 {
            crate::perf::log_event(
                "watcher.poll",
                format!(
                    "total={total_events} relevant={saw_relevant_event} target={}",
                    self.target_path.display(),
                ),
            );
        }

        if saw_relevant_event {
            self.pending_since = Some(Instant::now());
        }

        let Some(pending_since) = self.pending_since else {
            return false;
        };
        if pending_since.elapsed() >= self.debounce {
            self.pending_since = None;
            return true;
        }
        false
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

/// Read `path` into a text-changed event.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_snapshot(path: &Path, cursor_line: usize) -> io::Result<ChangeEvent> {
    let text = std::fs::read_to_string(path)?;
    Ok(ChangeEvent::from_text(&text, cursor_line.max(1)))
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
