use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;

/// Callback invoked with the error of a failed future that nobody observed.
pub type FailureHook = Arc<dyn Fn(&Error) + Send + Sync + 'static>;

static UNHANDLED_FAILURE_HOOK: RwLock<Option<FailureHook>> = RwLock::new(None);

/// Replace the process-wide hook for unobserved failures, returning the previous one.
///
/// A failure counts as unobserved when the last handle to a failed [`crate::Future`] is dropped
/// without its error ever having been read by `get`, `try_get` or `.await`, and without any
/// continuation having been attached. Pass `None` to go back to the default, which logs the error
/// with `tracing` at warn level.
///
/// The hook runs on whichever thread drops the last handle, so it should be quick.
///
/// # Arguments
///
/// * `hook` - New hook, or `None` for the default.
///
/// # Return value
///
/// The hook that was installed before, if any.
pub fn set_unhandled_failure_hook(hook: Option<FailureHook>) -> Option<FailureHook> {
    std::mem::replace(&mut *UNHANDLED_FAILURE_HOOK.write(), hook)
}

pub(super) fn report_unhandled(error: &Error) {
    // Clone the hook out so that it does not run under the lock; a hook that drops futures of its
    // own would otherwise deadlock on re-entry.
    let hook = UNHANDLED_FAILURE_HOOK.read().clone();
    match hook {
        Some(hook) => hook(error),
        None => tracing::warn!(%error, "future failed and its error was never observed"),
    }
}
