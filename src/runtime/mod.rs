mod execution;
mod executor;
mod failure;
mod future;
mod thread_local;
mod work;

pub use execution::{default_executor, PoolConfig, ThreadPool};
pub use executor::{Executor, InlineExecutor, TaskExecutor};
pub use failure::{set_unhandled_failure_hook, FailureHook};
pub use future::{Future, Placement};
pub use thread_local::spawn_detached;
pub use work::Work;
