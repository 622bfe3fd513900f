//! The watch thread.
//!
//! One named thread owns the notify watcher and applies events to the
//! source in arrival order. It is the repository's only writer.

use crate::source::Source;
use resync_watcher::{FileWatcher, WatchError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Source {
    /// Attaches to the root and starts applying filesystem events.
    ///
    /// Attaching happens before the thread starts, so a
    /// [`WatchError::Setup`] is returned here and nothing runs.
    pub fn watch(self: &Arc<Self>) -> Result<WatchHandle, WatchError> {
        let watcher = FileWatcher::new(self.root(), Arc::clone(&self.repository))?;
        let stop = Arc::new(AtomicBool::new(false));

        let source = Arc::clone(self);
        let flag = Arc::clone(&stop);
        let interval = self.config().poll_interval();

        let thread = std::thread::Builder::new()
            .name("resync-watch".to_string())
            .spawn(move || run_watch_loop(source, watcher, flag, interval))
            .map_err(WatchError::Spawn)?;

        Ok(WatchHandle {
            source: Arc::clone(self),
            stop,
            thread: Some(thread),
        })
    }
}

fn run_watch_loop(
    source: Arc<Source>,
    mut watcher: FileWatcher,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    debug!("Watch loop started for {}", source.root().display());

    while !stop.load(Ordering::SeqCst) {
        if let Some(event) = watcher.recv_timeout(interval) {
            source.handle_event(&event);
        }
    }

    // Releases the OS watch before the handle reports shutdown.
    drop(watcher);
    debug!("Watch loop stopped for {}", source.root().display());
}

/// Handle to a running watch thread.
///
/// Dropping the handle stops the thread too; [`WatchHandle::shutdown`]
/// additionally closes the change feed.
pub struct WatchHandle {
    source: Arc<Source>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Stops watching, then drops every subscriber.
    pub fn shutdown(mut self) {
        self.stop_thread();
        self.source.notifier.close();
        info!("Source shut down");
        self.source.log_stats();
    }

    fn stop_thread(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Watch thread panicked");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
