//! Concurrency primitives for shared-memory programs.
//!
//! * [`VisibilityCell`] and [`VisibilityFlag`] make writes on one thread visible to reads on
//!   every other thread.
//! * [`ReadWriteLock`] and [`RwCell`] give many readers or one writer access to shared state.
//! * [`Future`] is a single-assignment result that can be produced by any [`TaskExecutor`],
//!   chained with continuations, and either blocked on or awaited.

pub mod error;
pub mod lock;
pub mod runtime;
pub mod visibility;

pub use error::{BoxError, ComputationError, Error, Result};
pub use lock::{ReadGuard, ReadWriteLock, RwCell, WriteGuard};
pub use runtime::{
    default_executor, set_unhandled_failure_hook, spawn_detached, Executor, FailureHook, Future,
    InlineExecutor, Placement, PoolConfig, TaskExecutor, ThreadPool, Work,
};
pub use visibility::{VisibilityCell, VisibilityFlag};
