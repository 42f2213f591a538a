//! The lazily grown tree of named streams.
//!
//! `resolve("parsing.substream1")` creates `parsing` and `parsing.substream1`
//! on first use and hands back the same [`Stream`] on every later call. A
//! stream's file lives under the application directory as its dotted full
//! path, so `<root>/<app>/parsing` is followed by `<root>/<app>/parsing.substream1`
//! and every descendant of a stream globs as `<ancestor>.*`.

use crate::config::{RegistryConfig, WriteMode, app_dir};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::format::{InspectOptions, Value};
use crate::identity::{AppIdentity, normalize_segment};
use crate::pipeline::{Enabled, Formatter, Predicate, StreamSettings, render_entry};
use crate::writer::{FilePolicy, RotatingFileWriter};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Display name of the root stream, which only ever writes to the console.
pub const ROOT_STREAM_NAME: &str = "stdout";

/// A named, hierarchical logging destination.
pub struct Stream {
    name: String,
    full_path: String,
    parent: Weak<Stream>,
    children: Mutex<HashMap<String, Arc<Stream>>>,
    aliases: Mutex<BTreeSet<String>>,
    file_path: RwLock<Option<PathBuf>>,
    settings: RwLock<StreamSettings>,
    writer: Mutex<RotatingFileWriter>,
    console: Arc<dyn Console>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("full_path", &self.full_path)
            .field("file_path", &*self.file_path.read())
            .finish_non_exhaustive()
    }
}

impl Stream {
    fn new(
        name: String,
        full_path: String,
        parent: Weak<Stream>,
        config: &RegistryConfig,
        console: Arc<dyn Console>,
    ) -> Self {
        Self {
            name,
            full_path,
            parent,
            children: Mutex::new(HashMap::new()),
            aliases: Mutex::new(BTreeSet::new()),
            file_path: RwLock::new(None),
            settings: RwLock::new(StreamSettings::default()),
            writer: Mutex::new(RotatingFileWriter::new(config.into(), Arc::clone(&console))),
            console,
        }
    }

    /// Leaf segment; empty for the root.
    pub fn leaf(&self) -> &str {
        &self.name
    }

    /// Dot-joined ancestry, e.g. `net.retry`; empty for the root.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Name shown to people: the full path, or `stdout` for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            ROOT_STREAM_NAME
        } else {
            &self.full_path
        }
    }

    pub fn is_root(&self) -> bool {
        self.full_path.is_empty()
    }

    pub fn parent(&self) -> Option<Arc<Stream>> {
        self.parent.upgrade()
    }

    /// Backing file, `None` for the root and while the app identity is unset.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_path.read().clone()
    }

    /// Alternate names registered for this stream on its parent.
    pub fn aliases(&self) -> Vec<String> {
        self.aliases.lock().iter().cloned().collect()
    }

    /// Already materialized child (or alias) named `name`.
    pub fn child(&self, name: &str) -> Option<Arc<Stream>> {
        self.children.lock().get(&normalize_segment(name)).cloned()
    }

    pub fn settings(&self) -> StreamSettings {
        self.settings.read().clone()
    }

    pub fn set_enabled(&self, on: bool) -> &Self {
        self.settings.write().enabled = on.into();
        self
    }

    pub fn set_enabled_when(&self, predicate: Predicate) -> &Self {
        self.settings.write().enabled = Enabled::When(predicate);
        self
    }

    pub fn set_formatter(&self, formatter: Formatter) -> &Self {
        self.settings.write().formatter = Some(formatter);
        self
    }

    /// Installs a formatter that drops every entry `keep` rejects.
    pub fn set_filter<F>(&self, keep: F) -> &Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        self.set_formatter(Formatter::filter(keep))
    }

    pub fn clear_formatter(&self) -> &Self {
        self.settings.write().formatter = None;
        self
    }

    /// Appends the caller's location to every entry.
    pub fn set_tracing(&self, on: bool) -> &Self {
        self.settings.write().tracing = on;
        self
    }

    pub fn set_inspect_options(&self, inspect: InspectOptions) -> &Self {
        self.settings.write().inspect = inspect;
        self
    }

    pub fn set_write_mode(&self, mode: WriteMode) -> &Self {
        self.update_policy(|policy| policy.mode = mode)
    }

    pub fn set_max_size(&self, max_size_bytes: u64) -> &Self {
        self.update_policy(|policy| policy.max_size_bytes = max_size_bytes)
    }

    /// Holds the file open between writes until [`Stream::close`].
    pub fn keep_open(&self, on: bool) -> &Self {
        self.update_policy(|policy| policy.keep_open = on)
    }

    pub fn delete_on_exit(&self, on: bool) -> &Self {
        self.update_policy(|policy| policy.delete_on_exit = on)
    }

    fn update_policy(&self, change: impl FnOnce(&mut FilePolicy)) -> &Self {
        let mut writer = self.writer.lock();
        let mut policy = writer.policy();
        change(&mut policy);
        writer.set_policy(policy);
        self
    }

    /// Bytes the writer has counted into the current file.
    pub fn written_size(&self) -> u64 {
        self.writer.lock().known_size()
    }

    /// Logs one entry. Returns `false` when it was suppressed.
    ///
    /// The root stream, and any stream whose file cannot be derived yet,
    /// writes to the primary console instead of a file.
    #[track_caller]
    pub fn emit<I>(&self, args: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let args: Vec<Value> = args.into_iter().map(Into::into).collect();
        self.emit_at(&args, Location::caller())
    }

    /// Logs only when `cond` holds, on top of the stream's own rule.
    #[track_caller]
    pub fn emit_if<I>(&self, cond: bool, args: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        cond && self.emit(args)
    }

    /// Logs only when `cond` does not hold.
    #[track_caller]
    pub fn emit_unless<I>(&self, cond: bool, args: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        !cond && self.emit(args)
    }

    fn emit_at(&self, args: &[Value], caller: &Location<'_>) -> bool {
        // user closures may call back into this stream's setters
        let settings = self.settings();
        let Some(entry) = render_entry(&settings, args, Some(caller)) else {
            return false;
        };

        if self.is_root() {
            self.console.write_line(&entry);
            return true;
        }

        let Some(path) = self.file_path() else {
            self.console
                .write_line(&format!("[{}] {}", self.full_path.to_uppercase(), entry));
            return true;
        };

        let result = self.writer.lock().write(&path, &entry);
        if let Err(err) = result {
            warn!(stream = %self.full_path, error = %err, "log write failed");
            self.console.write_line(&err.to_string());
        }
        true
    }

    /// Closes a kept-open file and applies the delete-on-exit policy.
    pub fn close(&self) {
        self.writer.lock().close();
    }

    fn set_file_path(&self, path: Option<PathBuf>) {
        *self.file_path.write() = path;
    }
}

struct RegistryInner {
    identity: Arc<AppIdentity>,
    config: RegistryConfig,
    console: Arc<dyn Console>,
    root: Arc<Stream>,
    by_path: Mutex<HashMap<String, Arc<Stream>>>,
}

impl RegistryInner {
    fn rederive_file_paths(&self, app_id: &str) {
        let streams: Vec<Arc<Stream>> = self.by_path.lock().values().cloned().collect();
        for stream in streams {
            stream.set_file_path(Some(derive_file_path(
                &self.config.root_dir,
                app_id,
                &stream.full_path,
            )));
        }
        debug!(app_id, count = self.by_path.lock().len(), "derived stream file paths");
    }
}

/// All streams of one application, rooted at a console-only stream.
pub struct StreamRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("identity", &self.inner.identity)
            .field("root_dir", &self.inner.config.root_dir)
            .field("streams", &self.inner.by_path.lock().len())
            .finish()
    }
}

impl StreamRegistry {
    pub fn new(
        identity: Arc<AppIdentity>,
        config: RegistryConfig,
        console: Arc<dyn Console>,
    ) -> Self {
        let root = Arc::new(Stream::new(
            String::new(),
            String::new(),
            Weak::new(),
            &config,
            Arc::clone(&console),
        ));
        let inner = Arc::new(RegistryInner {
            identity: Arc::clone(&identity),
            config,
            console,
            root,
            by_path: Mutex::new(HashMap::new()),
        });

        let weak = Arc::downgrade(&inner);
        identity.on_change(move |app_id| {
            if let (Some(app_id), Some(inner)) = (app_id, weak.upgrade()) {
                inner.rederive_file_paths(app_id);
            }
        });

        Self { inner }
    }

    pub fn identity(&self) -> &Arc<AppIdentity> {
        &self.inner.identity
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.inner.console
    }

    /// Commits the application identity; every stream gets its file path.
    pub fn set_app(&self, app_id: &str) -> Result<String> {
        self.inner.identity.set(app_id)
    }

    /// Directory holding this application's stream files, once known.
    pub fn app_dir(&self) -> Option<PathBuf> {
        self.inner
            .identity
            .get()
            .map(|id| app_dir(&self.inner.config.root_dir, &id))
    }

    /// The console-only root stream.
    pub fn root(&self) -> Arc<Stream> {
        Arc::clone(&self.inner.root)
    }

    /// Stream for a dotted path, creating it and any missing ancestor.
    ///
    /// An empty path resolves to the root.
    pub fn resolve(&self, path: &str) -> Result<Arc<Stream>> {
        let mut node = self.root();
        for segment in split_path(path)? {
            node = self.child_or_create(&node, &segment);
        }
        Ok(node)
    }

    /// Already created stream for `path`, without creating anything.
    pub fn get(&self, path: &str) -> Option<Arc<Stream>> {
        let mut node = self.root();
        for segment in split_path(path).ok()? {
            let next = node.children.lock().get(&segment).cloned()?;
            node = next;
        }
        Some(node)
    }

    /// Makes each of `names` resolve, under the parent of `existing`, to
    /// the stream at `existing`. An alias that shadows an existing child
    /// replaces it.
    pub fn alias(&self, existing: &str, names: &[&str]) -> Result<Arc<Stream>> {
        let target = self.resolve(existing)?;
        let Some(parent) = target.parent() else {
            return Err(Error::InvalidStreamName {
                name: existing.to_string(),
                reason: "the root stream cannot be aliased".to_string(),
            });
        };

        for raw in names {
            let alias = match split_path(raw)?.as_slice() {
                [single] => single.clone(),
                _ => {
                    return Err(Error::InvalidStreamName {
                        name: raw.to_string(),
                        reason: "an alias is a single name segment".to_string(),
                    });
                }
            };
            if alias == target.name {
                continue;
            }
            let shadowed = parent
                .children
                .lock()
                .insert(alias.clone(), Arc::clone(&target));
            if shadowed.is_some_and(|s| !Arc::ptr_eq(&s, &target)) {
                debug!(stream = %target.full_path, alias = %alias, "alias replaced an existing child");
            }
            target.aliases.lock().insert(alias);
        }
        Ok(target)
    }

    /// Every stream created so far, sorted by full path.
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        let mut streams: Vec<Arc<Stream>> = self.inner.by_path.lock().values().cloned().collect();
        streams.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        streams
    }

    /// Closes kept-open files and deletes the ones marked delete-on-exit.
    pub fn close(&self) {
        for stream in self.streams() {
            stream.close();
        }
    }

    fn child_or_create(&self, parent: &Arc<Stream>, segment: &str) -> Arc<Stream> {
        let child = {
            let mut children = parent.children.lock();
            if let Some(existing) = children.get(segment) {
                return Arc::clone(existing);
            }
            let full_path = if parent.is_root() {
                segment.to_string()
            } else {
                format!("{}.{}", parent.full_path, segment)
            };
            let child = Arc::new(Stream::new(
                segment.to_string(),
                full_path,
                Arc::downgrade(parent),
                &self.inner.config,
                Arc::clone(&self.inner.console),
            ));
            children.insert(segment.to_string(), Arc::clone(&child));
            child
        };

        self.inner
            .by_path
            .lock()
            .insert(child.full_path.clone(), Arc::clone(&child));
        // after registering, so an identity committed meanwhile is never missed
        if let Some(app_id) = self.inner.identity.get() {
            child.set_file_path(Some(derive_file_path(
                &self.inner.config.root_dir,
                &app_id,
                &child.full_path,
            )));
        }
        debug!(stream = %child.full_path, "creating new logging stream");
        child
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

/// `<root>/<app>/<name>` for top-level streams; deeper streams append
/// `.<name>` to their parent's file, which is the same as the full path.
pub fn derive_file_path(root_dir: &Path, app_id: &str, full_path: &str) -> PathBuf {
    app_dir(root_dir, app_id).join(full_path)
}

/// Splits a dotted path into normalized segments.
fn split_path(path: &str) -> Result<Vec<String>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('.')
        .map(|raw| {
            let segment = normalize_segment(raw);
            let invalid = |reason: &str| Error::InvalidStreamName {
                name: path.to_string(),
                reason: reason.to_string(),
            };
            if segment.is_empty() {
                Err(invalid("empty name segment"))
            } else if segment.contains(['/', '\\', '\0']) {
                Err(invalid("name segments cannot contain path separators"))
            } else {
                Ok(segment)
            }
        })
        .collect()
}
