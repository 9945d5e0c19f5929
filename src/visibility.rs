use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// Variable wrapper that makes every write immediately visible to reads on any other thread.
///
/// This is the "volatile" contract: a read always observes the most recent completed write,
/// never a stale copy. It does *not* make compound operations atomic. A caller doing
/// `cell.write(cell.read() + 1)` from several threads will lose updates; protect such sequences
/// with a [`crate::ReadWriteLock`] or use a [`crate::RwCell`].
///
/// # Usage
///
/// ```
/// # use threadkit::VisibilityCell;
/// let greeting = VisibilityCell::new(String::from("hello"));
/// greeting.write(String::from("goodbye"));
/// assert_eq!(greeting.read(), "goodbye");
/// ```
#[derive(Debug, Default)]
pub struct VisibilityCell<T> {
    value: RwLock<T>,
}

impl<T: Clone> VisibilityCell<T> {
    /// # Arguments
    ///
    /// * `value` - Initial value, visible to every thread that can reach the cell.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Latest published value.
    #[inline]
    pub fn read(&self) -> T {
        self.value.read().clone()
    }

    /// Publish a new value.
    #[inline]
    pub fn write(&self, value: T) {
        *self.value.write() = value;
    }

    /// Publish a new value and return the one it replaced.
    #[inline]
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.write(), value)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

/// Lock-free boolean with the same visibility contract as [`VisibilityCell`].
///
/// Stores use release ordering and loads use acquire ordering, so everything a thread wrote
/// before [`VisibilityFlag::set`] is visible to a thread that observes the new value.
#[derive(Debug, Default)]
pub struct VisibilityFlag(AtomicBool);

impl VisibilityFlag {
    pub const fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }

    /// Spin until the flag holds `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - Value to wait for.
    ///
    /// Backs off to [`std::thread::yield_now`] after a short burst of spinning so that waiting on
    /// a slow writer does not starve it of CPU time.
    pub fn wait_until(&self, value: bool) {
        let mut spins = 0u32;
        while self.get() != value {
            if spins < 64 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                std::thread::yield_now();
            }
        }
    }
}
