//! File-system watcher feeding the per-file indexing pipeline.
//!
//! One notify subscription covers the project root recursively, so newly
//! created directories join the watch set without bookkeeping. Modify and
//! create events land in a per-path deadline queue; the loop sleeps until
//! the earliest deadline and re-indexes whatever is due. Removals cancel the
//! path's pending deadline and delete its rows immediately. Stopping clears
//! the queue without firing.

pub mod debouncer;

pub use debouncer::DebounceQueue;

use crate::error::WatchError;
use crate::indexing::Indexer;
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct FileWatcher {
    indexer: Arc<Indexer>,
    window: Duration,
    cancel: CancellationToken,
}

impl FileWatcher {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        let window = Duration::from_millis(indexer.settings().watch.debounce_ms);
        Self {
            indexer,
            window,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the event loop at the next boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a stop; the running loop finishes its current step, clears
    /// pending deadlines without firing them and returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run the event loop until stopped.
    pub async fn watch(&self) -> Result<(), WatchError> {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let mut watcher = notify::recommended_watcher(move |res| {
            // notify delivers on its own thread; losing an event when the
            // loop has shut down is fine.
            let _ = tx.blocking_send(res);
        })?;
        watcher.watch(self.indexer.root(), RecursiveMode::Recursive)?;
        info!("watching {}", self.indexer.root().display());

        let mut queue = DebounceQueue::new(self.window);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    queue.clear();
                    break;
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(Ok(event)) => self.handle_event(event, &mut queue).await,
                        Some(Err(err)) => error!("watch error: {err}"),
                        None => {
                            queue.clear();
                            return Err(WatchError::ChannelClosed);
                        }
                    }
                }
                _ = sleep_until_deadline(queue.next_deadline()) => {
                    let now = Instant::now();
                    while let Some(path) = queue.pop_due(now) {
                        self.process(&path).await;
                    }
                }
            }
        }

        info!("watcher stopped");
        Ok(())
    }

    async fn handle_event(&self, event: Event, queue: &mut DebounceQueue) {
        for path in event.paths {
            if !self.relevant(&path) {
                continue;
            }
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    debug!("debouncing {}", path.display());
                    queue.push(path);
                }
                EventKind::Remove(_) => {
                    queue.discard(&path);
                    self.delete(&path).await;
                }
                _ => {}
            }
        }
    }

    /// Ignored paths and unsupported extensions never enter the pipeline.
    fn relevant(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(self.indexer.root()) else {
            return false;
        };
        if self.indexer.matcher().should_ignore(relative, false) {
            return false;
        }
        self.indexer.registry().supports(path)
    }

    /// A ripe deadline: re-index the current bytes, or treat a path that
    /// vanished in the meantime as a deletion (covers rename-away).
    async fn process(&self, path: &Path) {
        if !path.exists() {
            self.delete(path).await;
            return;
        }
        let indexer = Arc::clone(&self.indexer);
        let owned = path.to_path_buf();
        let result =
            tokio::task::spawn_blocking(move || indexer.index_file(&owned)).await;
        match result {
            Ok(Ok(outcome)) => debug!("{}: {outcome:?}", path.display()),
            Ok(Err(err)) => warn!("re-index of {} failed: {err}", path.display()),
            Err(err) => error!("indexing task panicked for {}: {err}", path.display()),
        }
    }

    async fn delete(&self, path: &Path) {
        let indexer = Arc::clone(&self.indexer);
        let owned: PathBuf = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || indexer.remove_file(&owned)).await;
        match result {
            Ok(Ok(true)) => info!("removed {} from index", path.display()),
            Ok(Ok(false)) => debug!("{} was not indexed", path.display()),
            Ok(Err(err)) => warn!("removal of {} failed: {err}", path.display()),
            Err(err) => error!("removal task panicked for {}: {err}", path.display()),
        }
    }
}

/// Sleep until the given deadline, or forever when the queue is idle; an
/// incoming event or cancellation wakes the select either way.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
