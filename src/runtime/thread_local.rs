use std::cell::RefCell;

use crate::error::Result;
use crate::runtime::execution::default_executor;
use crate::runtime::work::Work;

thread_local! {
    /// Futures whose producing computation is running on this thread, innermost last.
    ///
    /// This is a stack rather than a single slot because an inline executor runs nested
    /// computations on the same thread.
    static PRODUCING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Pops the entry pushed by [`producing`], also when the computation unwinds.
struct ProducingGuard;

impl Drop for ProducingGuard {
    fn drop(&mut self) {
        PRODUCING.with(|producing| {
            producing.borrow_mut().pop();
        });
    }
}

/// Run `f` while recording that this thread is producing the future identified by `id`.
pub(super) fn producing<R>(id: usize, f: impl FnOnce() -> R) -> R {
    PRODUCING.with(|producing| producing.borrow_mut().push(id));
    let _guard = ProducingGuard;
    f()
}

/// Whether the current thread is inside the computation that produces the future `id`.
pub(super) fn is_producing(id: usize) -> bool {
    PRODUCING.with(|producing| producing.borrow().contains(&id))
}

/// Run `f` on the default pool without caring about its outcome. This is useful for fire and
/// forget side work, like logging or releasing a resource, that nobody will ever wait for.
///
/// A panic in `f` is logged by the pool worker and otherwise ignored.
///
/// # Arguments
///
/// * `f` - Closure to execute.
///
/// # Example
///
/// ```
/// # use threadkit::spawn_detached;
/// spawn_detached(move || {
///     // ...
/// })
/// .unwrap();
/// ```
#[inline]
pub fn spawn_detached(f: impl FnOnce() + Send + 'static) -> Result<()> {
    default_executor().execute(Work::labeled("detached", f))
}
