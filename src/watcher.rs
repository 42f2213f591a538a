//! Directory watching using the notify crate.

use crate::error::Result;
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Watches one directory (non-recursively) for changes to the files in it.
pub(crate) struct DirWatcher {
    watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    dir: PathBuf,
}

impl DirWatcher {
    /// Creates a new watcher for the directory; call `start_watching` to begin.
    pub(crate) fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
            dir,
        })
    }

    pub(crate) fn start_watching(&mut self) -> Result<()> {
        self.watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    pub(crate) fn stop_watching(&mut self) {
        // the directory may already be gone; nothing left to unwatch then
        let _ = self.watcher.unwatch(&self.dir);
    }

    /// Returns the next file system event.
    pub(crate) async fn next_event(&mut self) -> Option<notify::Result<Event>> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Whether an event kind can mean new, rewritten or removed content.
///
/// Plain opens and reads are ignored, so the viewer's own reads do not
/// trigger more reads.
pub(crate) fn is_relevant_kind(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

/// Stream names (file names) an event touches, skipping hidden files.
pub(crate) fn stream_names(event: &Event) -> Vec<String> {
    let mut names: Vec<String> = event
        .paths
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.dedup();
    names
}
