//! On-demand, hierarchical debug streams persisted to size-bounded files,
//! plus a live tail of those files.
//!
//! A producer resolves dotted stream paths (`"net.retry"`) on a
//! [`StreamRegistry`] and emits entries to them. Once the application's
//! identity is known every stream appends to its own file under
//! `<root>/<app-id>/`, recycled when it grows past a size limit. A viewer
//! attaches a [`TailWatcher`] to that directory and receives whatever gets
//! appended, filtered by include/exclude directives.
//!
//! # Example
//!
//! ```rust,no_run
//! use log0::{AppIdentity, RegistryConfig, StdoutConsole, StreamRegistry, log0};
//! use std::sync::Arc;
//!
//! fn main() -> log0::Result<()> {
//!     let registry = StreamRegistry::new(
//!         Arc::new(AppIdentity::new()),
//!         RegistryConfig::default(),
//!         Arc::new(StdoutConsole),
//!     );
//!     registry.set_app("My App")?;
//!
//!     let retry = registry.resolve("net.retry")?;
//!     log0!(retry, "retrying", 3, "of", 5);
//!     Ok(())
//! }
//! ```

mod config;
mod console;
mod directive;
mod error;
mod format;
mod identity;
pub mod logging;
mod pipeline;
mod reader;
mod registry;
mod tail;
mod watcher;
mod writer;

#[cfg(test)]
mod test_helpers;

pub use config::{
    APP_ID_ENV, DEFAULT_MAX_SIZE_BYTES, ROOT_DIR_ENV, RegistryConfig, StartPosition, TailConfig,
    ViewerArgs, WriteMode, app_dir, default_root_dir,
};
pub use console::{BufferConsole, Console, StdoutConsole};
pub use directive::{DirectiveMatcher, DirectiveRule};
pub use error::{Error, Result};
pub use format::{InspectOptions, Value, to_debug_string};
pub use identity::{AppIdentity, IdentityListener, normalize_app_id, normalize_segment};
pub use pipeline::{Enabled, Formatted, Formatter, Predicate, StreamSettings};
pub use reader::{FileId, TailState, file_identity, read_new_content, tag_lines};
pub use registry::{ROOT_STREAM_NAME, Stream, StreamRegistry, derive_file_path};
pub use tail::{TailChunk, TailWatcher};
pub use writer::{FilePolicy, RotatingFileWriter, WriteOutcome};

use std::path::Path;

/// Emits the given arguments to a stream, recording the call site.
///
/// `log0!(stream, "fetched", count, "rows")` is `stream.emit(args![...])`.
#[macro_export]
macro_rules! log0 {
    ($stream:expr $(, $arg:expr)* $(,)?) => {
        $stream.emit($crate::args![$($arg),*])
    };
}

/// Tails the stream files of one application under `root_dir`.
///
/// `app_id` is normalized the same way producers normalize it. `directives`
/// are `[+|-]name` tokens where `...` is a wildcard; none shows every stream.
///
/// # Example
///
/// ```rust,no_run
/// use log0::{TailConfig, default_root_dir, watch_app};
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut tail = watch_app(default_root_dir(), "my-app", &["net..."], TailConfig::default()).await?;
///
///     while let Some(chunk) = tail.next().await {
///         print!("{}", chunk?.text);
///     }
///
///     Ok(())
/// }
/// ```
pub async fn watch_app<P, S>(
    root_dir: P,
    app_id: &str,
    directives: &[S],
    config: TailConfig,
) -> Result<TailWatcher>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let app_id = normalize_app_id(app_id);
    let matcher = DirectiveMatcher::compile(directives, config.tag_all);
    TailWatcher::attach(app_dir(root_dir.as_ref(), &app_id), matcher, config).await
}
