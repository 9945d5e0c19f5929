use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};

use crate::error::{BoxError, ComputationError, Error, Result};
use crate::runtime::execution::default_executor;
use crate::runtime::executor::Executor;
use crate::runtime::failure::report_unhandled;
use crate::runtime::thread_local;
use crate::runtime::work::Work;

/// Continuation stored on a pending future. Receives a copy of the outcome exactly once, and
/// returns the continuations of whatever future it settled in turn.
type Continuation<T> = Box<dyn FnOnce(Result<T>) -> Vec<Thunk> + Send + 'static>;

/// A continuation bound to the outcome it is about to receive.
///
/// Settling a future from inside a continuation does not run the next continuations there and
/// then. They are handed back as thunks to the loop in [`run_thunks`], so the stack depth stays
/// the same however long an inline chain is.
pub(crate) struct Thunk(Box<dyn FnOnce() -> Vec<Thunk>>);

/// Run `thunks` and every thunk they hand back.
pub(crate) fn run_thunks(thunks: Vec<Thunk>) {
    let mut queue = VecDeque::from(thunks);
    while let Some(Thunk(thunk)) = queue.pop_front() {
        queue.extend(thunk());
    }
}

/// Where a continuation runs once its source future reaches a terminal state.
#[derive(Debug, Clone, Default)]
pub enum Placement {
    /// On the thread that registers the continuation if the source is already terminal,
    /// otherwise on the thread that completes the source.
    #[default]
    Inline,
    /// Always on the source's home executor, or on the default pool if it has none.
    Pooled,
    /// Always on the given executor.
    On(Executor),
}

/// Single-assignment result container with chainable continuations.
///
/// A [`Future`] starts out pending and reaches exactly one terminal state: completed with a value
/// or failed with an [`Error`]. Handles are cheap to clone; every clone observes the same state
/// and any of them may complete it.
///
/// # Producing
///
/// A future is either produced by an executor ([`Executor::submit`]) or completed by hand, like a
/// promise:
///
/// ```
/// # use threadkit::Future;
/// let future = Future::new();
/// future.complete(5).unwrap();
/// assert_eq!(future.get().unwrap(), 5);
/// ```
///
/// # Chaining
///
/// [`Future::map`], [`Future::on_value`] and [`Future::on_complete`] return a derived future
/// that settles once the continuation has run. A failure skips every downstream continuation
/// and is carried to the end of the chain unchanged.
///
/// ```
/// # use threadkit::{Future, Placement};
/// let source = Future::new();
/// let result = source
///     .map(|x: i32| x + 1, Placement::Inline)
///     .map(|x| x * 2, Placement::Inline);
/// source.complete(5).unwrap();
/// assert_eq!(result.get().unwrap(), 12);
/// ```
///
/// # Awaiting
///
/// A [`Future`] is also a [`std::future::Future`], so async code can await it instead of
/// blocking in [`Future::get`]:
///
/// ```
/// # use threadkit::Future;
/// # tokio_test::block_on(async {
/// let future = Future::completed("ready");
/// assert_eq!(future.await.unwrap(), "ready");
/// # })
/// ```
///
/// # Silent failures
///
/// An error is only surfaced when someone asks for it. A failed future whose error is never
/// observed through [`Future::get`], `.await` or a continuation is reported to the unhandled
/// failure hook when its last handle is dropped (see [`crate::set_unhandled_failure_hook`]).
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    shared: Mutex<Shared<T>>,
    /// Notified when the state becomes terminal. Used by blocking [`Future::get`] callers.
    completed: Condvar,
    /// Executor that produced this future. Target of [`Placement::Pooled`].
    home: Option<Executor>,
}

/// Mutable state, only ever touched under [`Inner::shared`].
struct Shared<T> {
    state: State<T>,
    /// Async tasks waiting for this future.
    wakers: Vec<Waker>,
    /// Whether anybody has looked at (or subscribed to) the outcome.
    observed: bool,
}

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Completed(T),
    Failed(Error),
}

impl<T: Clone> Shared<T> {
    /// Copy of the outcome, or `None` while pending.
    fn outcome(&self) -> Option<Result<T>> {
        match &self.state {
            State::Pending(_) => None,
            State::Completed(value) => Some(Ok(value.clone())),
            State::Failed(error) => Some(Err(error.clone())),
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Create a pending future to be completed by hand.
    pub fn new() -> Self {
        Self::with_home(None)
    }

    /// Create a future that is already completed with `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - Value of the future.
    pub fn completed(value: T) -> Self {
        Self::settled(State::Completed(value))
    }

    /// Create a future that has already failed with `error`.
    pub fn failed(error: Error) -> Self {
        Self::settled(State::Failed(error))
    }

    pub(crate) fn with_home(home: Option<Executor>) -> Self {
        Self::from_state(State::Pending(Vec::new()), home)
    }

    fn settled(state: State<T>) -> Self {
        Self::from_state(state, None)
    }

    fn from_state(state: State<T>, home: Option<Executor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state,
                    wakers: Vec::new(),
                    observed: false,
                }),
                completed: Condvar::new(),
                home,
            }),
        }
    }

    /// Executor that produced this future, if any.
    pub fn home(&self) -> Option<&Executor> {
        self.inner.home.as_ref()
    }

    /// Complete the future with `value`.
    ///
    /// Continuations placed [`Placement::Inline`] run on this thread before the call returns,
    /// including those of the futures they settle in turn.
    ///
    /// # Arguments
    ///
    /// * `value` - Value handed to [`Future::get`] callers and to every continuation.
    ///
    /// Fails with [`Error::AlreadyCompleted`] if the future is already terminal. In that case the
    /// stored outcome is left untouched and no continuation runs again.
    pub fn complete(&self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    /// Fail the future with `error`. Same rules as [`Future::complete`].
    ///
    /// # Arguments
    ///
    /// * `error` - Error carried to the end of every chain derived from this future.
    pub fn fail(&self, error: Error) -> Result<()> {
        self.settle(Err(error))
    }

    /// Fail the future with an arbitrary error, wrapped as [`Error::Computation`].
    ///
    /// # Arguments
    ///
    /// * `error` - Any error type. It can be recovered with [`ComputationError::downcast_ref`].
    pub fn fail_with(&self, error: impl Into<BoxError>) -> Result<()> {
        self.fail(Error::computation(error))
    }

    /// Perform the single Pending -> terminal transition and run everything that was waiting.
    fn settle(&self, outcome: Result<T>) -> Result<()> {
        run_thunks(self.transition(outcome)?);
        Ok(())
    }

    /// Perform the single Pending -> terminal transition. Wakes blocked and async waiters, and
    /// returns the continuations bound to the outcome without running them.
    fn transition(&self, outcome: Result<T>) -> Result<Vec<Thunk>> {
        let mut shared = self.inner.shared.lock();
        let continuations = match &mut shared.state {
            State::Pending(continuations) => std::mem::take(continuations),
            State::Completed(_) | State::Failed(_) => return Err(Error::AlreadyCompleted),
        };
        shared.state = match &outcome {
            Ok(value) => State::Completed(value.clone()),
            Err(error) => State::Failed(error.clone()),
        };
        let wakers = std::mem::take(&mut shared.wakers);
        self.inner.completed.notify_all();
        drop(shared);

        tracing::trace!(
            failed = outcome.is_err(),
            continuations = continuations.len(),
            "future settled",
        );

        for waker in wakers {
            waker.wake();
        }
        // The continuations were taken out of the state under the lock, so each of them ends up
        // in exactly one thunk.
        Ok(continuations
            .into_iter()
            .map(|continuation| {
                let outcome = outcome.clone();
                Thunk(Box::new(move || continuation(outcome)))
            })
            .collect())
    }

    /// Block the calling thread until the future is terminal, then return its value or its error.
    ///
    /// Calling this from inside the task or continuation that is supposed to complete this very
    /// future can never succeed, and fails with [`Error::IllegalState`] instead of deadlocking.
    pub fn get(&self) -> Result<T> {
        let mut shared = self.inner.shared.lock();
        loop {
            if let Some(outcome) = shared.outcome() {
                shared.observed = true;
                return outcome;
            }
            if thread_local::is_producing(self.id()) {
                return Err(Error::IllegalState(
                    "get() called by the computation that produces this future",
                ));
            }
            self.inner.completed.wait(&mut shared);
        }
    }

    /// Outcome if the future is terminal, without blocking.
    pub fn try_get(&self) -> Option<Result<T>> {
        let mut shared = self.inner.shared.lock();
        let outcome = shared.outcome();
        if outcome.is_some() {
            shared.observed = true;
        }
        outcome
    }

    /// Whether the future reached a terminal state, successfully or not.
    pub fn is_done(&self) -> bool {
        !matches!(self.inner.shared.lock().state, State::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.inner.shared.lock().state, State::Failed(_))
    }

    /// Derive a future holding `f(value)`.
    ///
    /// `f` is skipped if this future fails; the derived future then fails with the same error.
    /// A panic inside `f` fails the derived future with [`ComputationError::Panicked`].
    ///
    /// # Arguments
    ///
    /// * `f` - Function applied to the value, at most once.
    /// * `placement` - Where `f` runs, see [`Placement`].
    pub fn map<U, F>(&self, f: F, placement: Placement) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.chain(placement, move |outcome| outcome.map(f))
    }

    /// Like [`Future::map`] for a function that can fail.
    ///
    /// # Arguments
    ///
    /// * `f` - Function applied to the value. An error it returns fails the derived future with
    ///   [`Error::Computation`].
    /// * `placement` - Where `f` runs.
    pub fn try_map<U, E, F>(&self, f: F, placement: Placement) -> Future<U>
    where
        U: Clone + Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(T) -> std::result::Result<U, E> + Send + 'static,
    {
        self.chain(placement, move |outcome| {
            outcome.and_then(|value| f(value).map_err(Error::computation))
        })
    }

    /// Derive a future that completes once `f` has consumed the value.
    ///
    /// # Arguments
    ///
    /// * `f` - Consumer of the value, skipped on failure.
    /// * `placement` - Where `f` runs.
    pub fn on_value<F>(&self, f: F, placement: Placement) -> Future<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.chain(placement, move |outcome| outcome.map(f))
    }

    /// Derive a future that completes once `f` has run. `f` never sees the value, but it is still
    /// skipped if this future fails.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure to execute once the value is there.
    /// * `placement` - Where `f` runs.
    pub fn on_complete<F>(&self, f: F, placement: Placement) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.chain(placement, move |outcome| outcome.map(|_| f()))
    }

    /// Derive a future that replaces a failure with `f(&error)`. Values pass through untouched.
    ///
    /// # Arguments
    ///
    /// * `f` - Fallback computing a value from the error. Only runs on failure.
    /// * `placement` - Where `f` runs.
    pub fn recover<F>(&self, f: F, placement: Placement) -> Future<T>
    where
        F: FnOnce(&Error) -> T + Send + 'static,
    {
        self.chain(placement, move |outcome| match outcome {
            Ok(value) => Ok(value),
            Err(error) => Ok(f(&error)),
        })
    }

    /// Register `stage` to turn this future's outcome into the outcome of a new derived future,
    /// running it wherever `placement` says.
    fn chain<U, F>(&self, placement: Placement, stage: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let derived = Future::with_home(self.inner.home.clone());
        let completer = Completer::new(derived.clone());
        let executor = match placement {
            Placement::Inline => None,
            Placement::Pooled => Some(self.inner.home.clone().unwrap_or_else(default_executor)),
            Placement::On(executor) => Some(executor),
        };

        self.register(Box::new(move |outcome| match executor {
            None => completer.run(move || stage(outcome)),
            Some(executor) => {
                let completer = completer.on_drop(Error::ExecutorShutdown);
                let work = Work::labeled("continuation", move || {
                    run_thunks(completer.run(move || stage(outcome)))
                });
                if let Err(err) = executor.execute(work) {
                    tracing::debug!(%err, "continuation rejected by executor");
                }
                Vec::new()
            }
        }));

        derived
    }

    /// Queue `continuation`, or run it right away on this thread if the future is terminal.
    fn register(&self, continuation: Continuation<T>) {
        let mut shared = self.inner.shared.lock();
        shared.observed = true;
        let outcome = match &mut shared.state {
            State::Pending(continuations) => {
                continuations.push(continuation);
                return;
            }
            State::Completed(value) => Ok(value.clone()),
            State::Failed(error) => Err(error.clone()),
        };
        drop(shared);
        run_thunks(continuation(outcome));
    }

    /// Identity of the shared state, the same for every clone of this handle.
    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: Clone + Send + 'static> std::future::Future for Future<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.inner.shared.lock();
        match shared.outcome() {
            Some(outcome) => {
                shared.observed = true;
                Poll::Ready(outcome)
            }
            None => {
                // Polling again from the same task must not grow the waker list.
                if !shared.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    shared.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.shared.lock().state {
            State::Pending(_) => "Pending",
            State::Completed(_) => "Completed",
            State::Failed(_) => "Failed",
        };
        f.debug_struct("Future").field("state", &state).finish()
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        if let State::Failed(error) = &shared.state {
            if !shared.observed {
                report_unhandled(error);
            }
        }
    }
}

/// Write side of a future held by the computation that is going to produce it.
///
/// The future is settled exactly once: by [`Completer::run`], or with the completer's drop error
/// if it is dropped before it got to run. That happens when the source of a continuation is
/// dropped while pending ([`Error::Abandoned`]), or when an executor discards the work carrying
/// the completer ([`Error::ExecutorShutdown`], see [`Completer::on_drop`]).
pub(crate) struct Completer<T: Clone + Send + 'static> {
    target: Option<Future<T>>,
    dropped: Error,
}

impl<T: Clone + Send + 'static> Completer<T> {
    pub(crate) fn new(target: Future<T>) -> Self {
        Self {
            target: Some(target),
            dropped: Error::Abandoned,
        }
    }

    /// Fail the target with `error` instead if the completer is dropped without running.
    pub(crate) fn on_drop(mut self, error: Error) -> Self {
        self.dropped = error;
        self
    }

    /// Run `compute` on the current thread and settle the target with its outcome. A panic in
    /// `compute` becomes [`ComputationError::Panicked`].
    ///
    /// Returns the target's continuations for the caller to run, see [`run_thunks`].
    pub(crate) fn run(mut self, compute: impl FnOnce() -> Result<T>) -> Vec<Thunk> {
        let Some(target) = self.target.take() else {
            return Vec::new();
        };
        let outcome = thread_local::producing(target.id(), || {
            catch_unwind(AssertUnwindSafe(compute))
                .unwrap_or_else(|payload| Err(ComputationError::panicked(payload).into()))
        });
        target.transition(outcome).unwrap_or_else(|_| {
            tracing::debug!("computation finished after its future was settled by hand");
            Vec::new()
        })
    }
}

impl<T: Clone + Send + 'static> Drop for Completer<T> {
    fn drop(&mut self) {
        // Settling the target here, before its handle goes, empties its continuation list. A
        // pending chain dropped from its source is therefore failed stage by stage in the
        // `run_thunks` loop instead of being torn down recursively.
        if let Some(target) = self.target.take() {
            if let Ok(thunks) = target.transition(Err(self.dropped.clone())) {
                run_thunks(thunks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::runtime::executor::InlineExecutor;

    #[derive(Debug, thiserror::Error)]
    #[error("no such user")]
    struct NoSuchUser;

    #[test]
    fn test_complete_then_get() {
        let future = Future::new();
        assert!(!future.is_done());
        assert!(future.complete("Future's Result").is_ok());
        assert!(future.is_done());
        assert!(!future.is_failed());
        assert_eq!(future.get().unwrap(), "Future's Result");
    }

    #[test]
    fn test_second_transition_rejected() {
        let future = Future::new();
        assert!(future.complete(1).is_ok());
        assert!(matches!(future.complete(2), Err(Error::AlreadyCompleted)));
        assert!(matches!(
            future.fail(Error::ExecutorShutdown),
            Err(Error::AlreadyCompleted),
        ));
        assert_eq!(future.get().unwrap(), 1);

        let future = Future::<i32>::new();
        assert!(future.fail_with(NoSuchUser).is_ok());
        assert!(matches!(future.complete(3), Err(Error::AlreadyCompleted)));
        assert!(future.is_failed());
    }

    #[test]
    fn test_second_transition_does_not_rerun_continuations() {
        let runs = Arc::new(AtomicUsize::new(0));
        let future = Future::new();
        let _derived = future.on_value(
            {
                let runs = runs.clone();
                move |_: u8| {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Placement::Inline,
        );
        assert!(future.complete(1).is_ok());
        assert!(future.complete(2).is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_blocks_until_completed() {
        let future = Future::new();
        let waiter = std::thread::spawn({
            let future = future.clone();
            move || future.get()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(future.complete(7u32).is_ok());
        assert_eq!(waiter.join().unwrap().unwrap(), 7);
    }

    #[test]
    fn test_try_get() {
        let future = Future::new();
        assert!(future.try_get().is_none());
        assert!(future.complete(2).is_ok());
        assert_eq!(future.try_get().unwrap().unwrap(), 2);
    }

    #[test]
    fn test_continuations_registered_before_and_after() {
        let future = Future::new();
        let before = future.map(|x: i32| x + 1, Placement::Inline);
        assert!(!before.is_done());
        assert!(future.complete(5).is_ok());
        let after = future.map(|x| x * 2, Placement::Inline);
        assert_eq!(before.get().unwrap(), 6);
        assert_eq!(after.get().unwrap(), 10);
    }

    #[test]
    fn test_inline_runs_on_completing_thread() {
        let future = Future::new();
        let ran_on = future.map(|_: ()| std::thread::current().id(), Placement::Inline);
        let completer = std::thread::spawn({
            let future = future.clone();
            move || {
                future.complete(()).unwrap();
                std::thread::current().id()
            }
        });
        let completer_id = completer.join().unwrap();
        assert_eq!(ran_on.get().unwrap(), completer_id);

        // Already terminal: runs on the registering thread.
        let ran_on = future.map(|_| std::thread::current().id(), Placement::Inline);
        assert_eq!(ran_on.get().unwrap(), std::thread::current().id());
    }

    #[test]
    fn test_on_explicit_executor() {
        let future = Future::completed(3);
        let derived = future.map(|x| x * 3, Placement::On(Executor::new(InlineExecutor)));
        assert_eq!(derived.get().unwrap(), 9);
    }

    #[test]
    fn test_failure_skips_continuations() {
        let runs = Arc::new(AtomicUsize::new(0));
        let source = Future::<i32>::new();
        let mapped = source.map(
            {
                let runs = runs.clone();
                move |x| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    x
                }
            },
            Placement::Inline,
        );
        let accepted = mapped.on_value(
            {
                let runs = runs.clone();
                move |_| {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Placement::Inline,
        );
        let finished = accepted.on_complete(
            {
                let runs = runs.clone();
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            Placement::Inline,
        );
        assert!(source.fail_with(NoSuchUser).is_ok());

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        for error in [
            mapped.get().unwrap_err(),
            accepted.get().unwrap_err(),
            finished.get().unwrap_err(),
        ] {
            assert!(error
                .as_computation()
                .and_then(|err| err.downcast_ref::<NoSuchUser>())
                .is_some());
        }
    }

    #[test]
    fn test_panic_in_continuation_fails_derived() {
        let derived = Future::completed(1).map(
            |_: i32| -> i32 { panic!("continuation blew up") },
            Placement::Inline,
        );
        assert!(matches!(
            derived.get(),
            Err(Error::Computation(ComputationError::Panicked(message)))
                if message == "continuation blew up",
        ));
    }

    #[test]
    fn test_try_map() {
        let ok = Future::completed(4).try_map(|x| Ok::<_, NoSuchUser>(x * 10), Placement::Inline);
        assert_eq!(ok.get().unwrap(), 40);
        let err = Future::completed(4).try_map(|_| Err::<i32, _>(NoSuchUser), Placement::Inline);
        assert!(err.is_failed());
        assert!(err.get().is_err());
    }

    #[test]
    fn test_recover() {
        let recovered = Future::<String>::failed(Error::computation(NoSuchUser))
            .recover(|error| format!("fallback after: {error}"), Placement::Inline);
        assert_eq!(
            recovered.get().unwrap(),
            "fallback after: computation failed: no such user",
        );
        let untouched = Future::completed(String::from("Rezvan"))
            .recover(|_| String::from("anonymous"), Placement::Inline);
        assert_eq!(untouched.get().unwrap(), "Rezvan");
    }

    #[test]
    fn test_get_from_own_continuation_is_illegal() {
        let slot: Arc<Mutex<Option<Future<i32>>>> = Arc::new(Mutex::new(None));
        let source = Future::new();
        let derived = source.map(
            {
                let slot = slot.clone();
                move |x: i32| {
                    let own = slot.lock().clone();
                    match own.map(|own| own.get()) {
                        Some(Err(Error::IllegalState(_))) => x,
                        _ => -1,
                    }
                }
            },
            Placement::Inline,
        );
        *slot.lock() = Some(derived.clone());
        assert!(source.complete(11).is_ok());
        assert_eq!(derived.get().unwrap(), 11);
    }

    #[test]
    fn test_dropped_completer_fails_future() {
        let future = Future::<u8>::new();
        drop(Completer::new(future.clone()));
        assert!(matches!(future.get(), Err(Error::Abandoned)));

        let future = Future::<u8>::new();
        drop(Completer::new(future.clone()).on_drop(Error::ExecutorShutdown));
        assert!(matches!(future.get(), Err(Error::ExecutorShutdown)));
    }

    #[test]
    fn test_dropped_source_abandons_chain() {
        let source = Future::<u8>::new();
        let derived = source
            .map(|x| x + 1, Placement::Inline)
            .map(|x| x * 2, Placement::Pooled);
        drop(source);
        assert!(matches!(derived.get(), Err(Error::Abandoned)));
    }

    /// Long enough to overflow a default 2 MiB thread stack if stages settled recursively.
    const DEEP_CHAIN: usize = 100_000;

    fn deep_chain(source: &Future<usize>) -> Future<usize> {
        let mut tail = source.map(|x| x + 1, Placement::Inline);
        for _ in 1..DEEP_CHAIN {
            tail = tail.map(|x| x + 1, Placement::Inline);
        }
        tail
    }

    #[test]
    fn test_deep_inline_chain_completes() {
        let result = std::thread::spawn(|| {
            let source = Future::new();
            let tail = deep_chain(&source);
            assert!(source.complete(0).is_ok());
            tail.get()
        })
        .join()
        .unwrap();
        assert_eq!(result.unwrap(), DEEP_CHAIN);
    }

    #[test]
    fn test_deep_inline_chain_registered_after_completion() {
        let result = std::thread::spawn(|| deep_chain(&Future::completed(1)).get())
            .join()
            .unwrap();
        assert_eq!(result.unwrap(), DEEP_CHAIN + 1);
    }

    #[test]
    fn test_deep_pending_chain_dropped() {
        let result = std::thread::spawn(|| {
            let source = Future::new();
            let tail = deep_chain(&source);
            drop(source);
            tail.get()
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(Error::Abandoned)));

        let dropped = std::thread::spawn(|| drop(deep_chain(&Future::new()))).join();
        assert!(dropped.is_ok());
    }

    #[test]
    fn test_debug() {
        assert_eq!(
            format!("{:?}", Future::completed(1)),
            "Future { state: \"Completed\" }",
        );
        assert_eq!(format!("{:?}", Future::<u8>::new()), "Future { state: \"Pending\" }");
    }

    #[tokio::test]
    async fn test_await_completed_later() {
        let future = Future::new();
        std::thread::spawn({
            let future = future.clone();
            move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                future.complete(true).unwrap();
            }
        });
        assert!(future.await.unwrap());
    }

    #[tokio::test]
    async fn test_await_failed() {
        let future = Future::<()>::failed(Error::computation(NoSuchUser));
        assert!(future.await.is_err());
    }
}
