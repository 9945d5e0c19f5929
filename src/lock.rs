//! Reader/writer locking with explicit and scoped acquisition.
//!
//! [`ReadWriteLock`] admits any number of concurrent readers or exactly one writer. It can be
//! used in two styles:
//!
//! * explicitly, pairing [`ReadWriteLock::acquire_read`] with [`ReadWriteLock::release_read`]
//!   (and likewise for writes). Releasing a lock that the calling thread does not hold is
//!   reported as [`Error::IllegalState`].
//! * scoped, through [`ReadWriteLock::with_read`] / [`ReadWriteLock::with_write`] or the RAII
//!   guards, which release on every exit path including unwinding.
//!
//! [`RwCell`] bundles a value with its own lock so the value cannot be reached without it.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// Reader/writer lock that is not tied to any particular piece of data.
///
/// Holds are owned by threads: a thread can only release what it acquired itself.
///
/// No fairness is promised: a steady stream of readers can keep a writer waiting.
///
/// # Reentrancy
///
/// A thread that already holds the lock may acquire it again, and must release it as many times
/// as it acquired it:
///
/// * a reader may take further read holds,
/// * the writer may take further write holds and read holds. Taking a read hold and then
///   releasing the write hold downgrades the writer to a reader.
///
/// Upgrading is not supported. A thread holding a read hold that calls
/// [`ReadWriteLock::acquire_write`] (or [`ReadWriteLock::with_write`]) waits for itself and
/// deadlocks; [`ReadWriteLock::try_acquire_write`] returns `false` in that situation.
///
/// ```
/// # use threadkit::ReadWriteLock;
/// let lock = ReadWriteLock::new();
/// let seen = lock.with_write(|| lock.with_read(|| lock.readers()));
/// assert_eq!(seen, 1);
/// assert!(!lock.is_write_locked());
/// ```
#[derive(Debug, Default)]
pub struct ReadWriteLock {
    state: Mutex<LockState>,
    /// Signalled when the writer leaves.
    readable: Condvar,
    /// Signalled when the last reader or the writer leaves.
    writable: Condvar,
}

#[derive(Debug, Default)]
struct LockState {
    /// Read holds per thread. Entries are removed when they drop to zero.
    readers: HashMap<ThreadId, usize>,
    writer: Option<ThreadId>,
    /// Write holds of `writer`.
    write_depth: usize,
}

impl LockState {
    /// Whether `me` may take a read hold: nobody writes, or `me` is the writer.
    fn readable_by(&self, me: ThreadId) -> bool {
        self.writer.map_or(true, |writer| writer == me)
    }

    /// Whether `me` may take the first write hold.
    fn writable(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }

    fn add_reader(&mut self, me: ThreadId) {
        *self.readers.entry(me).or_default() += 1;
    }

    fn add_writer(&mut self, me: ThreadId) {
        self.writer = Some(me);
        self.write_depth += 1;
    }
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until shared access is granted.
    pub fn acquire_read(&self) {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        while !state.readable_by(me) {
            self.readable.wait(&mut state);
        }
        state.add_reader(me);
    }

    /// Take shared access if no other thread holds the write lock.
    pub fn try_acquire_read(&self) -> bool {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        if !state.readable_by(me) {
            return false;
        }
        state.add_reader(me);
        true
    }

    /// Give up one shared hold of the calling thread.
    ///
    /// Fails with [`Error::IllegalState`] if the calling thread holds no read lock, including
    /// when other threads do.
    pub fn release_read(&self) -> Result<()> {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        let Some(holds) = state.readers.get_mut(&me) else {
            return Err(if state.readers.is_empty() {
                Error::IllegalState("read lock released without being held")
            } else {
                Error::IllegalState("read lock released by a thread that does not hold it")
            });
        };
        *holds -= 1;
        if *holds == 0 {
            state.readers.remove(&me);
        }
        if state.readers.is_empty() {
            self.writable.notify_one();
        }
        Ok(())
    }

    /// Block until exclusive access is granted.
    ///
    /// Deadlocks if the calling thread holds a read lock but not the write lock.
    pub fn acquire_write(&self) {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        if state.writer != Some(me) {
            while !state.writable() {
                self.writable.wait(&mut state);
            }
        }
        state.add_writer(me);
    }

    /// Take exclusive access if no other thread holds the lock.
    pub fn try_acquire_write(&self) -> bool {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        if state.writer != Some(me) && !state.writable() {
            return false;
        }
        state.add_writer(me);
        true
    }

    /// Give up one exclusive hold of the calling thread.
    ///
    /// Fails with [`Error::IllegalState`] if the lock is not write-locked, or if it was
    /// write-locked by another thread.
    pub fn release_write(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.writer {
            None => Err(Error::IllegalState("write lock released without being held")),
            Some(owner) if owner != std::thread::current().id() => Err(Error::IllegalState(
                "write lock released by a thread that does not hold it",
            )),
            Some(_) => {
                state.write_depth -= 1;
                if state.write_depth == 0 {
                    state.writer = None;
                    // Readers and the next writer race for the lock; whoever wins re-checks the
                    // condition under the state mutex.
                    self.readable.notify_all();
                    if state.readers.is_empty() {
                        self.writable.notify_one();
                    }
                }
                Ok(())
            }
        }
    }

    /// Acquire shared access for the lifetime of the returned guard.
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read();
        ReadGuard {
            lock: self,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Acquire exclusive access for the lifetime of the returned guard.
    pub fn write(&self) -> WriteGuard<'_> {
        self.acquire_write();
        WriteGuard {
            lock: self,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Run `f` while holding shared access.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure to run inside the read section. Its return value is passed through.
    pub fn with_read<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.read();
        f()
    }

    /// Run `f` while holding exclusive access.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure to run inside the write section. Its return value is passed through.
    pub fn with_write<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.write();
        f()
    }

    /// Number of read holds, summed over all threads.
    pub fn readers(&self) -> usize {
        self.state.lock().readers.values().sum()
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Whether the calling thread holds the write lock.
    fn is_writer(&self) -> bool {
        self.state.lock().writer == Some(std::thread::current().id())
    }

    /// Whether the calling thread holds the lock in either mode.
    fn is_held(&self) -> bool {
        let me = std::thread::current().id();
        let state = self.state.lock();
        state.writer == Some(me) || state.readers.contains_key(&me)
    }
}

/// Shared access to a [`ReadWriteLock`], released on drop.
///
/// Not [`Send`]: the read hold belongs to the thread that took it.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'lock> {
    lock: &'lock ReadWriteLock,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        // The guard was created by a successful acquire on this thread, so the release cannot be
        // unpaired.
        let _ = self.lock.release_read();
    }
}

/// Exclusive access to a [`ReadWriteLock`], released on drop.
///
/// Not [`Send`]: the write lock belongs to the thread that took it.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'lock> {
    lock: &'lock ReadWriteLock,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let _ = self.lock.release_write();
    }
}

/// A value that can only be reached through its own [`ReadWriteLock`].
///
/// Unlike the bare lock, access is not reentrant across modes: [`RwCell::read_with`] inside
/// [`RwCell::write_with`], or [`RwCell::write_with`] inside any access, on the same cell and
/// thread would alias the mutable reference and panics instead. Nested reads are fine.
///
/// # Usage
///
/// ```
/// # use threadkit::RwCell;
/// let counter = RwCell::new(0);
/// let after = counter.write_with(|count| {
///     *count += 1;
///     *count
/// });
/// assert_eq!(after, 1);
/// assert_eq!(counter.read_with(|count| *count), 1);
/// ```
#[derive(Debug, Default)]
pub struct RwCell<T> {
    lock: ReadWriteLock,
    value: UnsafeCell<T>,
}

// SAFETY: Access to `value` is only handed out while `lock` is held: shared references under the
// read lock (hence `T: Sync`) and a unique reference under the write lock (hence `T: Send`, since
// the value may be mutated from any thread).
unsafe impl<T: Send> Send for RwCell<T> {}
unsafe impl<T: Send + Sync> Sync for RwCell<T> {}

impl<T> RwCell<T> {
    /// # Arguments
    ///
    /// * `value` - Initial value, owned by the cell from now on.
    pub fn new(value: T) -> Self {
        Self {
            lock: ReadWriteLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Run `f` with shared access to the value.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure receiving a shared reference, valid for the duration of the call.
    ///
    /// # Panics
    ///
    /// If called from inside [`RwCell::write_with`] on the same cell.
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        assert!(
            !self.lock.is_writer(),
            "RwCell::read_with called while this thread is writing the same cell",
        );
        let _guard = self.lock.read();
        // SAFETY: The read lock excludes writers of other threads for as long as `_guard` lives,
        // the assertion above excludes a writer on this thread, and the reference does not escape
        // `f`.
        f(unsafe { &*self.value.get() })
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// # Arguments
    ///
    /// * `f` - Closure receiving the only reference to the value for the duration of the call.
    ///
    /// # Panics
    ///
    /// If called from inside [`RwCell::read_with`] or [`RwCell::write_with`] on the same cell.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(
            !self.lock.is_held(),
            "RwCell::write_with called while this thread is accessing the same cell",
        );
        let _guard = self.lock.write();
        // SAFETY: The write lock excludes every reader and writer of other threads for as long as
        // `_guard` lives, the assertion above excludes holds of this thread, and the reference
        // does not escape `f`.
        f(unsafe { &mut *self.value.get() })
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}
