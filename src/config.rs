//! Settings for the stream registry, the tail watcher and the viewer command line.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Overrides the per-user root directory for all applications' streams.
pub const ROOT_DIR_ENV: &str = "LOG0_ROOT";

/// Default application identity for the viewer when none is given.
pub const APP_ID_ENV: &str = "LOG0_APP";

/// Files are recycled once they grow past this many bytes.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

const LOGS_SUBDIR: &str = ".log0/logs";

/// How entries reach the stream file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Append completes before `emit` returns; call order is preserved.
    #[default]
    Sync,
    /// Append runs on the tokio runtime; no ordering across calls.
    Async,
}

/// Defaults applied to every stream created by a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub root_dir: PathBuf,
    pub max_size_bytes: u64,
    pub write_mode: WriteMode,
    pub delete_on_start: bool,
    pub delete_on_exit: bool,
    pub keep_open: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            write_mode: WriteMode::default(),
            delete_on_start: false,
            delete_on_exit: false,
            keep_open: false,
        }
    }
}

impl RegistryConfig {
    /// Default settings rooted at `root_dir` instead of the per-user directory.
    pub fn with_root<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// `$LOG0_ROOT`, else `<home>/.log0/logs`, else a directory under the system temp dir.
pub fn default_root_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(ROOT_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(LOGS_SUBDIR)
}

/// Directory holding all stream files of one application.
pub fn app_dir(root_dir: &Path, app_id: &str) -> PathBuf {
    root_dir.join(app_id)
}

/// Where the viewer starts reading files that already exist when it attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Skip pre-existing content, show only what is appended from now on.
    #[default]
    End,
    /// Replay existing content first.
    Beginning,
}

/// Tail watcher behavior.
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub start: StartPosition,
    /// Prefix every line with the full stream name.
    pub tag_all: bool,
    /// Colorize line tags with ANSI escapes.
    pub color: bool,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            start: StartPosition::End,
            tag_all: true,
            color: false,
        }
    }
}

/// Viewer positional arguments once the app id and tag toggle are pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerArgs {
    pub app_id: String,
    pub tag_all: bool,
    pub directives: Vec<String>,
}

impl ViewerArgs {
    /// Interprets `[(+|-)tags] [appID] [(+|-)tags] [directive ...] [(+|-)tags]`.
    ///
    /// The app id is the first bare token; a list that starts with a signed
    /// directive (or is empty) falls back to `default_app`.
    pub fn from_tokens<I, S>(tokens: I, default_app: Option<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut tag_all = true;

        if let Some(flag) = tokens.first().and_then(|t| tag_toggle(t)) {
            tag_all = flag;
            tokens.remove(0);
        }

        let app_id = match tokens.first() {
            Some(first) if !first.starts_with(['+', '-']) => tokens.remove(0),
            _ => default_app
                .filter(|app| !app.trim().is_empty())
                .ok_or(Error::MissingAppId)?,
        };

        if let Some(flag) = tokens.first().and_then(|t| tag_toggle(t)) {
            tag_all = flag;
            tokens.remove(0);
        } else if let Some(flag) = tokens.last().and_then(|t| tag_toggle(t)) {
            tag_all = flag;
            tokens.pop();
        }

        Ok(Self {
            app_id,
            tag_all,
            directives: tokens,
        })
    }
}

/// `+tags` / `-tags` (any case) to their on/off value.
fn tag_toggle(token: &str) -> Option<bool> {
    let (sign, rest) = token.split_at_checked(1)?;
    if !rest.eq_ignore_ascii_case("tags") {
        return None;
    }
    match sign {
        "+" => Some(true),
        "-" => Some(false),
        _ => None,
    }
}
