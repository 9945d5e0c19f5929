use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::ComputationError;

/// Unit of work accepted by a [`crate::TaskExecutor`]. Holds a closure and a short label that
/// shows up in logs.
///
/// The closure is explictly [`Send`] because it may cross to a worker thread, and `'static`
/// because the executor may run it after the submitting scope is gone.
///
/// # Usage
///
/// ```
/// # use threadkit::Work;
/// let work = Work::labeled("flush", || {
///     // ...
/// });
/// assert_eq!(work.label(), "flush");
/// work.run();
/// ```
pub struct Work {
    label: &'static str,
    f: Box<dyn FnOnce() + Send + 'static>,
}

impl Work {
    /// Create unlabeled work.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure to execute.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self::labeled("work", f)
    }

    /// Create work with a label that shows up in logs.
    ///
    /// # Arguments
    ///
    /// * `label` - Short description of what the work is for.
    /// * `f` - Closure to execute.
    pub fn labeled(label: &'static str, f: impl FnOnce() + Send + 'static) -> Self {
        Work {
            label,
            f: Box::new(f),
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Execute work on the current thread. A panic inside the closure propagates.
    pub fn run(self) {
        (self.f)();
    }

    /// Execute work on the current thread, turning a panic into an error so that the calling
    /// worker survives it.
    pub(crate) fn run_catching(self) -> Result<(), ComputationError> {
        let Work { f, .. } = self;
        catch_unwind(AssertUnwindSafe(f)).map_err(ComputationError::panicked)
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Work").field("label", &self.label).finish()
    }
}
