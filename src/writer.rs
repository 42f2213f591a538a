//! Size-bounded append-only stream files.

use crate::config::{RegistryConfig, WriteMode};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::reader::{FileId, file_identity};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-file policy of a [`RotatingFileWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePolicy {
    pub max_size_bytes: u64,
    pub mode: WriteMode,
    pub delete_on_start: bool,
    pub delete_on_exit: bool,
    pub keep_open: bool,
}

impl From<&RegistryConfig> for FilePolicy {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            mode: config.write_mode,
            delete_on_start: config.delete_on_start,
            delete_on_exit: config.delete_on_exit,
            keep_open: config.keep_open,
        }
    }
}

/// What a write did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Appended,
    /// The file was deleted first because the entry would have pushed it past its limit.
    Rotated,
}

/// Writer-side bookkeeping for the current file.
#[derive(Debug)]
struct FileState {
    path: PathBuf,
    known_size: u64,
    identity: Option<FileId>,
}

/// Appends entries to one stream file, recycling it once it outgrows its limit.
///
/// The file is deleted rather than truncated so a tailer sees a new file
/// identity and starts over instead of reading through rewritten bytes.
pub struct RotatingFileWriter {
    policy: FilePolicy,
    state: Option<FileState>,
    handle: Option<File>,
    console: Arc<dyn Console>,
}

impl std::fmt::Debug for RotatingFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileWriter")
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

impl RotatingFileWriter {
    pub fn new(policy: FilePolicy, console: Arc<dyn Console>) -> Self {
        Self {
            policy,
            state: None,
            handle: None,
            console,
        }
    }

    pub fn policy(&self) -> FilePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FilePolicy) {
        if !policy.keep_open {
            self.handle = None;
        }
        self.policy = policy;
    }

    /// Bytes this writer believes the current file holds.
    pub fn known_size(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.known_size)
    }

    /// Appends `"\n" + entry` to `path`.
    ///
    /// Async mode without a tokio runtime falls back to a synchronous append.
    pub fn write(&mut self, path: &Path, entry: &str) -> Result<WriteOutcome> {
        self.sync_state(path)?;
        let record_len = entry.len() as u64 + 1;

        let mut outcome = WriteOutcome::Appended;
        if let Some(state) = self.state.as_mut() {
            if should_rotate(state.known_size, record_len, self.policy.max_size_bytes) {
                self.handle = None;
                remove_if_exists(&state.path).map_err(|source| Error::WriteFailure {
                    path: state.path.clone(),
                    source,
                })?;
                debug!(path = %state.path.display(), size = state.known_size, "recycled log file");
                state.known_size = 0;
                state.identity = None;
                outcome = WriteOutcome::Rotated;
            }
        }

        let record = format!("\n{entry}");
        let written = match (self.policy.mode, tokio::runtime::Handle::try_current()) {
            (WriteMode::Async, Ok(runtime)) => {
                let path = path.to_path_buf();
                let console = Arc::clone(&self.console);
                runtime.spawn(async move {
                    if let Err(source) = append_async(&path, record.as_bytes()).await {
                        let err = Error::WriteFailure { path, source };
                        warn!(error = %err, "async log write failed");
                        console.write_line(&err.to_string());
                    }
                });
                None
            }
            _ => self.append_sync(path, record.as_bytes())?,
        };

        if let Some(state) = self.state.as_mut() {
            state.known_size += record_len;
            if written.is_some() {
                state.identity = written;
            }
        }
        Ok(outcome)
    }

    /// Closes a kept-open handle and applies the delete-on-exit policy.
    pub fn close(&mut self) {
        self.handle = None;
        if !self.policy.delete_on_exit {
            return;
        }
        if let Some(state) = self.state.take() {
            if let Err(err) = remove_if_exists(&state.path) {
                warn!(path = %state.path.display(), error = %err, "could not delete log file on exit");
            }
        }
    }

    /// Brings the bookkeeping in line with the file currently at `path`.
    fn sync_state(&mut self, path: &Path) -> Result<()> {
        let first_touch = self.state.as_ref().is_none_or(|s| s.path != path);
        if first_touch {
            self.handle = None;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            if self.policy.delete_on_start {
                remove_if_exists(path)?;
            }
            let (known_size, identity) = match std::fs::metadata(path) {
                Ok(meta) => (meta.len(), file_identity(&meta)),
                Err(err) if err.kind() == ErrorKind::NotFound => (0, None),
                Err(err) => return Err(err.into()),
            };
            self.state = Some(FileState {
                path: path.to_path_buf(),
                known_size,
                identity,
            });
            return Ok(());
        }

        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        match std::fs::metadata(path) {
            Ok(meta) => {
                let current = file_identity(&meta);
                let replaced = state.identity.is_some() && state.identity != current;
                if replaced || (state.identity.is_none() && state.known_size == 0) {
                    state.known_size = meta.len();
                }
                let stale_handle = self
                    .handle
                    .as_ref()
                    .is_some_and(|file| handle_identity(file) != current);
                if replaced || stale_handle {
                    self.handle = None;
                }
                state.identity = current;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // deleted behind our back
                state.known_size = 0;
                state.identity = None;
                self.handle = None;
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Appends `record` and returns the identity of the file it landed in.
    fn append_sync(&mut self, path: &Path, record: &[u8]) -> Result<Option<FileId>> {
        let failure = |source: std::io::Error| Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        };

        if !self.policy.keep_open {
            let mut file = open_append(path).map_err(failure)?;
            file.write_all(record).map_err(failure)?;
            return Ok(handle_identity(&file));
        }

        let file = match self.handle.take() {
            Some(file) => file,
            None => open_append(path).map_err(failure)?,
        };
        let file = self.handle.insert(file);
        file.write_all(record).map_err(failure)?;
        Ok(handle_identity(file))
    }
}

impl Drop for RotatingFileWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// The entry would cross the limit of a file that already holds data.
fn should_rotate(known_size: u64, record_len: u64, max_size_bytes: u64) -> bool {
    known_size > 0 && known_size.saturating_add(record_len) > max_size_bytes
}

fn handle_identity(file: &File) -> Option<FileId> {
    file.metadata().ok().as_ref().and_then(file_identity)
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

async fn append_async(path: &Path, record: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(record).await?;
    file.flush().await
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
