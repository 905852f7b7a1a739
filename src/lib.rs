//!
//! workpool - Synchronized bounded work queue and worker thread pool
//!
//! Provides two pieces built on the platform's native mutex, condition
//! variable, and thread primitives (`std::sync`, `std::thread`):
//!
//! - `BoundedQueue<T>`: a capacity-bounded, mutex/condvar-guarded queue
//!   with blocking (`push`, `pop`), non-blocking (`try_push`, `try_pop`),
//!   and comparator-ordered (`push_sorted`) operations
//! - `WorkerPool<T>`: a fixed set of OS threads that drain one shared
//!   queue through a callback, with a drain-then-join exit protocol
//!
//! ## Blocking model
//!
//! Preemptive OS threads, no timeouts: `push` blocks while the queue is
//! full and `pop` blocks while it is empty, each re-checking its predicate
//! after every wake. The non-blocking variants return a would-block result
//! instead. Closing the queue is the only way to release a permanently
//! blocked waiter.
//!
//! ## Errors
//!
//! Every operation returns an explicit `Result`; see the `error` module for
//! the taxonomy. Nothing is retried internally.
//!

pub mod error;
pub mod pool;
pub mod queue;

pub use error::{Error, Result};
pub use pool::{PoolBuilder, Pusher, WorkerPool};
pub use queue::BoundedQueue;
