use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error as returned by fallible tasks and continuations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by the locking primitives, the executors or a [`crate::Future`].
///
/// The error is [`Clone`] because a single failure is handed to every stage downstream of the
/// future that produced it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A future was completed or failed after it had already reached a terminal state.
    #[error("future already completed")]
    AlreadyCompleted,
    /// A primitive was used in a way its contract forbids, for example releasing a lock that is
    /// not held.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// The task or continuation that was supposed to produce the value failed.
    #[error(transparent)]
    Computation(#[from] ComputationError),
    /// The executor refused the work or dropped it without running it.
    #[error("executor has shut down")]
    ExecutorShutdown,
    /// The future a continuation was waiting on was dropped while still pending, so it can never
    /// be completed.
    #[error("source future dropped before it was completed")]
    Abandoned,
    /// Invalid pool configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an arbitrary task error.
    pub fn computation(err: impl Into<BoxError>) -> Self {
        Error::Computation(ComputationError::failed(err))
    }

    /// Inner computation error, if this is one.
    pub fn as_computation(&self) -> Option<&ComputationError> {
        match self {
            Error::Computation(err) => Some(err),
            _ => None,
        }
    }
}

/// Whatever a submitted task or a continuation raised: either an error it returned, or a panic.
#[derive(Error, Debug, Clone)]
pub enum ComputationError {
    #[error("computation failed: {0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync + 'static>),
    #[error("computation panicked: {0}")]
    Panicked(String),
}

impl ComputationError {
    pub fn failed(err: impl Into<BoxError>) -> Self {
        ComputationError::Failed(Arc::from(err.into()))
    }

    /// Convert the payload of a caught panic into an error. Only `&str` and `String` payloads
    /// carry a readable message.
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        ComputationError::Panicked(message)
    }

    /// Try to view the wrapped error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            ComputationError::Failed(err) => err.downcast_ref::<E>(),
            ComputationError::Panicked(_) => None,
        }
    }
}
