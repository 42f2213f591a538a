//! Error types for the log0 library.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for log0 operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when writing, reading or listing stream files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory watching errors from the notify crate.
    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// The application identity was already committed to another value.
    #[error("app identity already set to '{current}', cannot change it to '{requested}'")]
    IdentityConflict { current: String, requested: String },

    /// An application identity that normalizes to nothing.
    #[error("invalid app identity '{0}': nothing left after normalization")]
    InvalidAppId(String),

    /// A stream path segment that cannot be turned into a file name.
    #[error("invalid stream name '{name}': {reason}")]
    InvalidStreamName { name: String, reason: String },

    /// An append to a stream file failed. Only ever reported to the console.
    #[error("error writing to log {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The viewer was started without an application identifier.
    #[error("need app's name/identifier to view its running logs")]
    MissingAppId,

    /// The tail watcher has been detached.
    #[error("Watch closed")]
    WatchClosed,
}

/// A convenient Result type for log0 operations.
pub type Result<T> = std::result::Result<T, Error>;
