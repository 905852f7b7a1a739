//!
//! Error Types
//!
//! This module defines error types shared by the queue and the worker pool.
//! Errors fall into four categories:
//! - Argument errors: invalid parameters, rejected before any state change
//! - Primitive errors: the underlying lock or thread operation failed
//! - Logical errors: an operation was invoked in an invalid state
//! - Callback errors: a worker callback reported failure
//!

use std::io;
use std::sync::PoisonError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The queue was closed; no further values are accepted.
    #[error("queue is closed")]
    Closed,

    /// A comparator-equal value is already queued and duplicates are
    /// disallowed.
    #[error("equal value already queued and duplicates are not allowed")]
    DuplicateValue,

    /// The queue mutex was poisoned by a thread that panicked while
    /// holding it. The container contents should no longer be trusted.
    #[error("queue lock poisoned by a panicked thread")]
    Poisoned,

    /// Spawning a worker thread failed with the underlying OS error.
    #[error("unable to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked; observed by `join`.
    #[error("worker thread {index} panicked")]
    WorkerPanicked { index: usize },

    /// A worker callback reported failure.
    #[error("callback failed: {0}")]
    Callback(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::Poisoned
    }
}

pub type Result<T> = std::result::Result<T, Error>;
