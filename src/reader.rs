//! Incremental reads of stream files for the tail watcher.

use crate::error::Result;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Identifies the file instance behind a path (device and inode on unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

/// File identity token for `meta`, `None` where the platform has none.
#[cfg(unix)]
pub fn file_identity(meta: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

/// File identity token for `meta`, `None` where the platform has none.
///
/// Without one, rotation is only detected when the file shrinks.
#[cfg(not(unix))]
pub fn file_identity(_meta: &Metadata) -> Option<FileId> {
    None
}

/// Viewer-side position in one stream file.
#[derive(Debug, Clone)]
pub struct TailState {
    path: PathBuf,
    offset: u64,
    identity: Option<FileId>,
    tag: String,
}

impl TailState {
    /// State that has emitted nothing yet; `tag` prefixes each line.
    pub fn new<P: AsRef<Path>>(path: P, tag: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            offset: 0,
            identity: None,
            tag: tag.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn identity(&self) -> Option<FileId> {
        self.identity
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Marks everything currently in the file as already seen.
    pub async fn skip_existing(&mut self) -> Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => {
                self.offset = meta.len();
                self.identity = file_identity(&meta);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.reset();
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.identity = None;
    }
}

/// Reads whatever was appended since the last call.
///
/// A replaced or shrunk file is read again from the start. A missing file
/// resets the state and yields nothing. Returned text has its line breaks
/// re-prefixed with the state's tag.
pub async fn read_new_content(state: &mut TailState) -> Result<Option<String>> {
    let mut file = match File::open(&state.path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %state.path.display(), "tailed file is gone");
            state.reset();
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(None);
    }
    let current_size = metadata.len();
    let current_identity = file_identity(&metadata);

    if detect_file_rotation(state.identity, current_identity, current_size, state.offset) {
        debug!(path = %state.path.display(), "tailed file was rotated");
        state.offset = 0;
    }
    state.identity = current_identity;

    let bytes_to_read = match calculate_bytes_to_read(current_size, state.offset) {
        Some(bytes) => bytes,
        None => return Ok(None),
    };

    file.seek(std::io::SeekFrom::Start(state.offset)).await?;
    let mut buf = Vec::with_capacity(bytes_to_read as usize);
    file.take(bytes_to_read).read_to_end(&mut buf).await?;

    // a half-written character stays for the next read
    let complete = complete_utf8_len(&buf);
    buf.truncate(complete);
    state.offset += complete as u64;
    if buf.is_empty() {
        return Ok(None);
    }

    let text = String::from_utf8_lossy(&buf);
    Ok(Some(tag_lines(&text, &state.tag)))
}

/// The file at the path is a different file, or got shorter than what was read.
fn detect_file_rotation(
    previous: Option<FileId>,
    current: Option<FileId>,
    current_size: u64,
    offset: u64,
) -> bool {
    (previous.is_some() && previous != current) || current_size < offset
}

/// Calculate bytes to read based on current size and last position
fn calculate_bytes_to_read(current_size: u64, last_position: u64) -> Option<u64> {
    if current_size <= last_position {
        None
    } else {
        Some(current_size - last_position)
    }
}

/// Length of `bytes` without a trailing incomplete UTF-8 sequence.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        _ => bytes.len(),
    }
}

/// Puts `tag` after every line break so interleaved streams stay attributable.
pub fn tag_lines(text: &str, tag: &str) -> String {
    if tag.is_empty() {
        text.to_string()
    } else {
        text.replace('\n', &format!("\n{tag}"))
    }
}
