//! Live tail of every stream file in an application directory.

use crate::config::{StartPosition, TailConfig};
use crate::directive::DirectiveMatcher;
use crate::error::{Error, Result};
use crate::reader::{TailState, read_new_content};
use crate::watcher::{DirWatcher, is_relevant_kind, stream_names};
use futures::Stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Newly appended text of one stream, already tagged for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailChunk {
    pub stream: String,
    pub text: String,
}

/// Watches a directory of stream files and yields what gets appended to them.
///
/// Offsets are kept per file together with the file's identity, so a file
/// that is deleted and recreated (rotated) is replayed from its start rather
/// than read past. Notifications may be coalesced by the platform; the state
/// found on disk when one arrives is what gets reported.
pub struct TailWatcher {
    receiver: mpsc::UnboundedReceiver<Result<TailChunk>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl TailWatcher {
    /// Starts watching `dir` (created if missing) for the streams `matcher` selects.
    pub async fn attach<P: AsRef<Path>>(
        dir: P,
        matcher: DirectiveMatcher,
        config: TailConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        // watch before listing so nothing written in between is missed
        let mut watcher = DirWatcher::new(&dir)?;
        watcher.start_watching()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // existing content is settled before returning; later appends are new
        let mut tails = Tails::new(dir, matcher, config);
        tails.register_existing(&tx).await;

        let task_handle = tokio::spawn(tail_task(tails, watcher, tx, shutdown_rx));

        Ok(TailWatcher {
            receiver: rx,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    /// Stops watching. Calling it again does nothing.
    pub fn detach(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
        self.receiver.close();
    }

    pub fn is_attached(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Next chunk, or [`Error::WatchClosed`] once detached and drained.
    pub async fn next_chunk(&mut self) -> Result<TailChunk> {
        match self.receiver.recv().await {
            Some(item) => item,
            None => Err(Error::WatchClosed),
        }
    }
}

impl Drop for TailWatcher {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Stream for TailWatcher {
    type Item = Result<TailChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Per-stream tail states of one directory.
struct Tails {
    dir: PathBuf,
    matcher: DirectiveMatcher,
    config: TailConfig,
    states: HashMap<String, TailState>,
}

impl Tails {
    fn new(dir: PathBuf, matcher: DirectiveMatcher, config: TailConfig) -> Self {
        Self {
            dir,
            matcher,
            config,
            states: HashMap::new(),
        }
    }

    fn state_for(&mut self, name: &str) -> &mut TailState {
        let Self {
            dir,
            matcher,
            config,
            states,
        } = self;
        states
            .entry(name.to_string())
            .or_insert_with(|| TailState::new(dir.join(name), matcher.tag(name, config.color)))
    }

    /// Registers the files already present when attaching. A failed listing
    /// is reported to the consumer and following carries on.
    async fn register_existing(&mut self, tx: &mpsc::UnboundedSender<Result<TailChunk>>) {
        if let Err(e) = self.scan(tx).await {
            warn!(dir = %self.dir.display(), error = %e, "could not list stream directory");
            let _ = tx.send(Err(e));
        }
    }

    async fn scan(&mut self, tx: &mpsc::UnboundedSender<Result<TailChunk>>) -> Result<()> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_file && !name.starts_with('.') && self.matcher.matches(&name) {
                names.push(name);
            }
        }
        names.sort();

        for name in names {
            match self.config.start {
                StartPosition::End => {
                    if let Err(e) = self.state_for(&name).skip_existing().await {
                        warn!(stream = %name, error = %e, "could not stat stream file");
                    }
                }
                StartPosition::Beginning => self.refresh(&name, tx).await,
            }
        }
        Ok(())
    }

    /// Emits whatever is new in one stream file.
    async fn refresh(&mut self, name: &str, tx: &mpsc::UnboundedSender<Result<TailChunk>>) {
        if !self.matcher.matches(name) {
            return;
        }
        let state = self.state_for(name);
        match read_new_content(state).await {
            Ok(Some(text)) => {
                let _ = tx.send(Ok(TailChunk {
                    stream: name.to_string(),
                    text,
                }));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(stream = %name, error = %e, "could not read stream file");
                let _ = tx.send(Err(e));
            }
        }
    }
}

/// Background task that follows the directory's changes.
async fn tail_task(
    mut tails: Tails,
    mut watcher: DirWatcher,
    tx: mpsc::UnboundedSender<Result<TailChunk>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }

            event = watcher.next_event() => {
                match event {
                    Some(Ok(event)) => {
                        if !is_relevant_kind(&event.kind) {
                            continue;
                        }
                        for name in stream_names(&event) {
                            tails.refresh(&name, &tx).await;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "directory watch error");
                        let _ = tx.send(Err(Error::Watcher(e)));
                    }
                    None => break,
                }
            }
        }

        if tx.is_closed() {
            debug!("tail receiver dropped");
            break;
        }
    }

    watcher.stop_watching();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TempLogDir;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn from_start() -> TailConfig {
        TailConfig {
            start: StartPosition::Beginning,
            ..TailConfig::default()
        }
    }

    /// Collects chunk text until `done` holds or the timeout passes.
    async fn collect_until(
        watcher: &mut TailWatcher,
        timeout: Duration,
        done: impl Fn(&str) -> bool,
    ) -> String {
        let mut seen = String::new();
        let deadline = tokio::time::Instant::now() + timeout;
        while !done(&seen) {
            match tokio::time::timeout_at(deadline, watcher.next()).await {
                Ok(Some(Ok(chunk))) => seen.push_str(&chunk.text),
                Ok(Some(Err(_))) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_attach_creates_missing_directory() {
        let dir = TempLogDir::new().unwrap();
        let app_dir = dir.path().join("fresh-app");

        let watcher = TailWatcher::attach(
            &app_dir,
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            TailConfig::default(),
        )
        .await
        .unwrap();

        assert!(app_dir.is_dir());
        assert!(watcher.is_attached());
    }

    #[tokio::test]
    async fn test_existing_content_replayed_from_start() {
        let dir = TempLogDir::new().unwrap();
        dir.write("net", "\none\ntwo").unwrap();

        let mut watcher = TailWatcher::attach(
            dir.path(),
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            from_start(),
        )
        .await
        .unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(2), watcher.next_chunk())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk.stream, "net");
        assert_eq!(chunk.text, "\n[NET] one\n[NET] two");
    }

    #[tokio::test]
    async fn test_existing_content_skipped_by_default() {
        let dir = TempLogDir::new().unwrap();
        dir.write("net", "\nold").unwrap();

        let mut watcher = TailWatcher::attach(
            dir.path(),
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            TailConfig::default(),
        )
        .await
        .unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), watcher.next()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_appended_content_is_followed() {
        let dir = TempLogDir::new().unwrap();
        dir.write("net", "\nold").unwrap();

        let mut watcher = TailWatcher::attach(
            dir.path(),
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            TailConfig::default(),
        )
        .await
        .unwrap();

        dir.append("net", "\nnew").unwrap();
        let seen = collect_until(&mut watcher, Duration::from_secs(5), |s| s.contains("new")).await;
        assert_eq!(seen, "\n[NET] new");
    }

    #[tokio::test]
    async fn test_append_right_after_attach_is_not_skipped() {
        for _ in 0..3 {
            let dir = TempLogDir::new().unwrap();
            dir.write("net", "\nold").unwrap();

            let mut watcher = TailWatcher::attach(
                dir.path(),
                DirectiveMatcher::compile(Vec::<&str>::new(), true),
                TailConfig::default(),
            )
            .await
            .unwrap();
            dir.append("net", "\nnew").unwrap();

            let seen =
                collect_until(&mut watcher, Duration::from_secs(5), |s| s.contains("new")).await;
            assert_eq!(seen, "\n[NET] new");
        }
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported_not_fatal() {
        let dir = TempLogDir::new().unwrap();
        let mut tails = Tails::new(
            dir.file("missing"),
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            TailConfig::default(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        tails.register_existing(&tx).await;

        assert!(matches!(rx.try_recv(), Ok(Err(Error::Io(_)))));
        assert!(!tx.is_closed());
    }

    #[tokio::test]
    async fn test_unselected_streams_are_not_shown() {
        let dir = TempLogDir::new().unwrap();
        dir.write("db.error", "\nboom").unwrap();
        dir.write("db.errorlog", "\nboom again").unwrap();
        dir.write("warning", "\ncareful").unwrap();

        let mut watcher = TailWatcher::attach(
            dir.path(),
            DirectiveMatcher::compile(["+...error..."], true),
            from_start(),
        )
        .await
        .unwrap();

        let mut streams = Vec::new();
        while let Ok(Some(Ok(chunk))) =
            tokio::time::timeout(Duration::from_millis(300), watcher.next()).await
        {
            streams.push(chunk.stream);
        }
        assert_eq!(streams, vec!["db.error", "db.errorlog"]);
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let dir = TempLogDir::new().unwrap();
        let mut watcher = TailWatcher::attach(
            dir.path(),
            DirectiveMatcher::compile(Vec::<&str>::new(), true),
            TailConfig::default(),
        )
        .await
        .unwrap();

        watcher.detach();
        watcher.detach();
        assert!(!watcher.is_attached());
        assert!(matches!(watcher.next_chunk().await, Err(Error::WatchClosed)));
    }

    #[tokio::test]
    async fn test_multiple_watchers_are_independent() {
        let dir = TempLogDir::new().unwrap();
        dir.write("net", "\nshared").unwrap();
        let all = || DirectiveMatcher::compile(Vec::<&str>::new(), true);

        let first = TailWatcher::attach(dir.path(), all(), from_start()).await.unwrap();
        let mut second = TailWatcher::attach(dir.path(), all(), from_start()).await.unwrap();
        drop(first);

        let chunk = tokio::time::timeout(Duration::from_secs(2), second.next_chunk())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk.text, "\n[NET] shared");
    }
}
