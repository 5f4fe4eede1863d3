//! Periodic background task that re-lists the corpus and refreshes the index.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::index::InvertedIndex;
use crate::pool::WorkerPool;

/// Owns a single dedicated thread that periodically calls
/// [`InvertedIndex::build`].
///
/// Sleeps in one-second increments between ticks so that shutdown (the
/// stopping flag) is observed within one second regardless of how long
/// `refresh_interval_seconds` is.
pub struct RefreshScheduler {
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawns the scheduler thread immediately.
    pub fn start(index: Arc<InvertedIndex>, ingest_pool: Arc<WorkerPool>, refresh_interval_seconds: u64) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let thread_stopping = stopping.clone();

        let handle = std::thread::Builder::new()
            .name("refresh-scheduler".into())
            .spawn(move || run(index, ingest_pool, refresh_interval_seconds, thread_stopping))
            .expect("failed to spawn refresh scheduler thread");

        Self {
            stopping,
            handle: Some(handle),
        }
    }

    /// Sets the stopping flag and joins the scheduler thread.
    pub fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(index: Arc<InvertedIndex>, pool: Arc<WorkerPool>, interval_seconds: u64, stopping: Arc<AtomicBool>) {
    while !stopping.load(Ordering::SeqCst) {
        let mut slept = 0u64;
        while slept < interval_seconds {
            if stopping.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_secs(1));
            slept += 1;
        }

        if stopping.load(Ordering::SeqCst) {
            break;
        }

        log::info!("scheduler: refreshing index");
        let before = index.indexed_count();
        index.build(&pool);
        let after = index.indexed_count();
        log::info!(
            "scheduler: index refresh complete, {} documents indexed ({} new)",
            after,
            after.saturating_sub(before)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusProvider;
    use std::path::{Path, PathBuf};

    struct EmptyCorpus;
    impl CorpusProvider for EmptyCorpus {
        fn list_paths(&self) -> Vec<PathBuf> {
            Vec::new()
        }
        fn read(&self, _path: &Path) -> String {
            String::new()
        }
    }

    #[test]
    fn stop_returns_promptly() {
        let index = Arc::new(InvertedIndex::new(Arc::new(EmptyCorpus)));
        let pool = Arc::new(WorkerPool::new("ingest", 1));
        let mut scheduler = RefreshScheduler::start(index, pool, 60);

        let start = std::time::Instant::now();
        scheduler.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
