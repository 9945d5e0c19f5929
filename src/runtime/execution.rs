use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::runtime::executor::{Executor, InlineExecutor, TaskExecutor};
use crate::runtime::work::Work;

/// Shared pool behind [`crate::Placement::Pooled`] for futures that have no home executor, and
/// behind [`crate::spawn_detached`].
///
/// It is only built on first use. Code that cares about pool size or thread names should build
/// its own [`ThreadPool`] and pass it around as an [`Executor`] instead.
static DEFAULT_EXECUTOR: Lazy<Executor> = Lazy::new(|| {
    let config = PoolConfig::default().named("threadkit-default");
    match ThreadPool::new(config) {
        Ok(pool) => Executor::new(pool),
        Err(err) => {
            tracing::error!(%err, "failed to start default pool, running work inline");
            Executor::new(InlineExecutor)
        }
    }
});

/// Handle to the default pool.
pub fn default_executor() -> Executor {
    DEFAULT_EXECUTOR.clone()
}

/// Thread pool settings.
///
/// Can be loaded from TOML; missing keys fall back to [`PoolConfig::default`]:
///
/// ```
/// # use threadkit::PoolConfig;
/// let config = PoolConfig::from_toml_str(r#"
///     workers = 10
///     thread_name = "counter"
/// "#).unwrap();
/// assert_eq!(config.workers, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of worker threads. Must be at least one.
    pub workers: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            thread_name: "threadkit-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Parse a configuration from TOML. Missing keys take their default value, unknown keys are
    /// rejected.
    ///
    /// # Arguments
    ///
    /// * `source` - TOML document, for example `workers = 4`.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| Error::Config(err.to_string()))
    }

    /// # Arguments
    ///
    /// * `workers` - Number of worker threads. Must not be zero.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// # Arguments
    ///
    /// * `thread_name` - Prefix of the worker thread names, which are `{thread_name}-{index}`.
    pub fn named(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("a pool needs at least one worker".to_string()));
        }
        if self.thread_name.is_empty() {
            return Err(Error::Config("thread name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Fixed-size pool of worker threads draining a shared queue.
///
/// Work is taken from the queue in submission order by whichever worker is free. Dropping the
/// pool lets the workers finish everything already queued, then joins them.
pub struct ThreadPool {
    name: String,
    workers: Vec<JoinHandle<()>>,
    /// Cleared by [`ThreadPool::shutdown`]; new work is rejected from then on.
    accepting: Arc<AtomicBool>,
    work_tx: Option<Sender<Work>>,
}

impl ThreadPool {
    /// Start the workers described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Pool size and thread names.
    ///
    /// Fails with [`Error::Config`] if the configuration is invalid or a worker thread could not
    /// be spawned.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let (work_tx, work_rx) = unbounded::<Work>();

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let name = format!("{}-{}", config.thread_name, index);
            let join_handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn({
                    let work_rx = work_rx.clone();
                    move || Self::worker(name, work_rx)
                })
                .map_err(|err| Error::Config(format!("failed to spawn worker thread: {err}")))?;
            workers.push(join_handle);
        }

        tracing::debug!(pool = %config.thread_name, workers = config.workers, "thread pool started");

        Ok(ThreadPool {
            name: config.thread_name,
            workers,
            accepting: Arc::new(AtomicBool::new(true)),
            work_tx: Some(work_tx),
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting new work. Work that is already queued still runs.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        !self.accepting.load(Ordering::Acquire)
    }

    /// Worker loop. Receives work from the queue and executes it until the queue is closed and
    /// empty.
    ///
    /// A panic in the work is caught and logged so that one bad item does not shrink the pool.
    fn worker(name: String, work_rx: Receiver<Work>) {
        while let Ok(work) = work_rx.recv() {
            let label = work.label();
            tracing::trace!(worker = %name, work = label, "running work");
            if let Err(err) = work.run_catching() {
                tracing::error!(worker = %name, work = label, %err, "work panicked");
            }
        }
        tracing::trace!(worker = %name, "worker stopped");
    }
}

impl TaskExecutor for ThreadPool {
    fn execute(&self, work: Work) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::ExecutorShutdown);
        }
        match &self.work_tx {
            Some(work_tx) => work_tx.send(work).map_err(|_| Error::ExecutorShutdown),
            None => Err(Error::ExecutorShutdown),
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        // Closing the channel makes every worker leave its loop once the queue is drained.
        drop(self.work_tx.take());

        let current = std::thread::current().id();
        for join_handle in self.workers.drain(..) {
            // The last handle to a pool can be released by a future that one of its own workers
            // is completing. That worker cannot join itself; it exits on its own once the
            // channel is drained.
            if join_handle.thread().id() == current {
                continue;
            }
            if join_handle.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread panicked");
            }
        }
        tracing::debug!(pool = %self.name, "thread pool stopped");
    }
}
