use std::convert::Infallible;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};
use crate::runtime::future::{run_thunks, Completer, Future};
use crate::runtime::work::Work;

/// Anything that accepts [`Work`] and runs it, eventually and exactly once.
///
/// Implementations decide where and when the work runs. They must either run it, or drop it
/// without running it (for instance on shutdown); in the latter case a future waiting on it
/// fails with [`Error::ExecutorShutdown`].
pub trait TaskExecutor: Send + Sync {
    /// Hand over `work`. An error means the work was rejected and has been dropped.
    fn execute(&self, work: Work) -> Result<()>;
}

/// Clonable handle to a shared [`TaskExecutor`].
///
/// This is what futures remember as their home executor and what [`crate::Placement::On`]
/// carries.
///
/// # Usage
///
/// ```
/// # use threadkit::{Executor, PoolConfig, ThreadPool};
/// let pool = Executor::new(ThreadPool::new(PoolConfig::default().with_workers(2)).unwrap());
/// let answer = pool.submit(|| 42);
/// assert_eq!(answer.get().unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct Executor(Arc<dyn TaskExecutor>);

impl Executor {
    /// # Arguments
    ///
    /// * `executor` - Executor to share. It lives until the last handle is dropped.
    pub fn new(executor: impl TaskExecutor + 'static) -> Self {
        Executor(Arc::new(executor))
    }

    /// Executor that runs everything synchronously on the submitting thread.
    pub fn inline() -> Self {
        Self::new(InlineExecutor)
    }

    /// Hand raw `work` to the executor, see [`TaskExecutor::execute`].
    ///
    /// # Arguments
    ///
    /// * `work` - Work to run.
    #[inline]
    pub fn execute(&self, work: Work) -> Result<()> {
        self.0.execute(work)
    }

    /// Run `task` on this executor and return a future for its return value.
    ///
    /// The returned future has this executor as its home, so [`crate::Placement::Pooled`]
    /// continuations on it come back here.
    ///
    /// # Arguments
    ///
    /// * `task` - Closure to execute. It runs exactly once, unless the executor rejects it, in
    ///   which case the future fails with [`Error::ExecutorShutdown`].
    ///
    /// A panic inside `task` fails the future with
    /// [`crate::ComputationError::Panicked`].
    pub fn submit<T, F>(&self, task: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.try_submit(move || Ok::<T, Infallible>(task()))
    }

    /// Run a fallible `task` on this executor. An error it returns fails the future with
    /// [`Error::Computation`].
    ///
    /// # Arguments
    ///
    /// * `task` - Closure to execute, same rules as for [`Executor::submit`].
    pub fn try_submit<T, E, F>(&self, task: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        let future = Future::with_home(Some(self.clone()));
        let completer = Completer::new(future.clone()).on_drop(Error::ExecutorShutdown);
        let work = Work::labeled("task", move || {
            run_thunks(completer.run(move || task().map_err(Error::computation)))
        });
        // A rejected work item drops its completer, which fails the future.
        if let Err(err) = self.execute(work) {
            tracing::debug!(%err, "task rejected by executor");
        }
        future
    }

    /// Whether both handles refer to the same executor.
    pub fn ptr_eq(&self, other: &Executor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Executor")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Runs work immediately on the calling thread. Deterministic stand-in for a pool in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, work: Work) -> Result<()> {
        work.run();
        Ok(())
    }
}
