//!
//! Worker Thread Pool
//!
//! A fixed set of OS threads draining one shared `BoundedQueue`. Each
//! worker repeatedly pops a value and invokes the pool callback on it. The
//! pool's run/exit state is the queue's `closed` flag, guarded by the
//! queue's own mutex and condition variables, so a worker checking for exit
//! and `join` requesting it can never miss a wakeup.
//!
//! ## Exit protocol
//!
//! `join` closes the queue first, which atomically refuses further pushes,
//! then joins every worker. A worker only leaves its loop once `pop`
//! reports the queue closed *and* drained, so all enqueued work is
//! performed -- and every in-flight callback has returned -- before `join`
//! returns.
//!
//! ## Callback failures
//!
//! A failing callback does not stop its worker; the first failure per
//! worker is remembered and surfaced by `join`, earliest worker first.
//!

use std::sync::Arc;
use std::thread;

use crate::error::{Error, Result};
use crate::queue::BoundedQueue;

/// Upper bound on the worker count, matching the widest thread-identifier
/// type the pool may sit on.
const MAX_THREADS: usize = u32::MAX as usize;

/// Configures thread attributes and queue capacity before spawning a pool.
pub struct PoolBuilder {
    threads: usize,
    queue_capacity: usize,
    thread_name: String,
    stack_size: Option<usize>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolBuilder {
    /// Defaults: one worker per CPU core, queue capacity 32.
    pub fn new() -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            threads,
            queue_capacity: 32,
            thread_name: "workpool-worker".to_string(),
            stack_size: None,
        }
    }

    /// Number of worker threads; fixed for the lifetime of the pool.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Capacity of the shared work queue; producers block once it fills.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Name prefix for worker threads; the worker index is appended.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Stack size per worker thread, in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validates the configuration, allocates the shared queue, and spawns
    /// the workers. If any spawn fails partway through, the queue is closed
    /// and the already-spawned workers are joined before the error is
    /// returned, leaving no orphaned threads.
    pub fn build<T, F>(self, callback: F) -> Result<WorkerPool<T>>
    where
        T: Send + 'static,
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        if self.threads == 0 {
            return Err(Error::InvalidArgument("thread count must be positive"));
        }
        if self.threads > MAX_THREADS {
            return Err(Error::InvalidArgument("thread count exceeds maximum"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidArgument("queue capacity must be positive"));
        }
        let queue = Arc::new(BoundedQueue::new(self.queue_capacity)?);
        let callback = Arc::new(callback);
        let mut workers = Vec::with_capacity(self.threads);
        for index in 0..self.threads {
            let mut builder = thread::Builder::new().name(format!("{}-{}", self.thread_name, index));
            if let Some(bytes) = self.stack_size {
                builder = builder.stack_size(bytes);
            }
            let worker_queue = Arc::clone(&queue);
            let worker_callback = Arc::clone(&callback);
            match builder.spawn(move || worker_loop(&worker_queue, &*worker_callback)) {
                Ok(handle) => workers.push(Worker { index, handle }),
                Err(source) => {
                    queue.close();
                    for worker in workers {
                        let _ = worker.handle.join();
                    }
                    return Err(Error::Spawn { index, source });
                }
            }
        }
        tracing::debug!(
            threads = self.threads,
            queue_capacity = self.queue_capacity,
            "worker pool started"
        );
        Ok(WorkerPool { queue, workers })
    }
}

/// A cloneable producer handle onto the pool's queue, in the style of
/// `std::sync::mpsc::Sender`. Lets producer threads keep pushing while the
/// owning thread retains the right to `join`. Pushes fail with
/// `Error::Closed` once the pool has been joined.
pub struct Pusher<T> {
    queue: Arc<BoundedQueue<T>>,
}

impl<T> Clone for Pusher<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> Pusher<T> {
    /// Blocking push onto the pool's queue.
    pub fn push(&self, value: T) -> Result<()> {
        self.queue.push(value)
    }

    /// Non-blocking push; a full queue hands the value back as
    /// `Ok(Some(value))`.
    pub fn try_push(&self, value: T) -> Result<Option<T>> {
        self.queue.try_push(value)
    }
}

struct Worker {
    index: usize,
    handle: thread::JoinHandle<Result<()>>,
}

pub struct WorkerPool<T> {
    queue: Arc<BoundedQueue<T>>,
    workers: Vec<Worker>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool of `threads` workers over a queue of
    /// `queue_capacity`; shorthand for the builder with default thread
    /// attributes.
    pub fn new<F>(threads: usize, queue_capacity: usize, callback: F) -> Result<Self>
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        PoolBuilder::new()
            .threads(threads)
            .queue_capacity(queue_capacity)
            .build(callback)
    }

    /// Pushes a value onto the shared queue, blocking while it is full.
    pub fn push(&self, value: T) -> Result<()> {
        self.queue.push(value)
    }

    /// Non-blocking `push`; a full queue hands the value back as
    /// `Ok(Some(value))`.
    pub fn try_push(&self, value: T) -> Result<Option<T>> {
        self.queue.try_push(value)
    }

    /// Returns a cloneable producer handle that stays valid across `join`
    /// (pushes after the join fail with `Error::Closed`).
    pub fn pusher(&self) -> Pusher<T> {
        Pusher {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Drains and stops the pool: closes the queue (refusing further
    /// pushes), waits for every worker to finish the remaining work, and
    /// returns the first worker failure, if any. The pool handle is
    /// consumed; the queue is freed when the last worker reference drops.
    pub fn join(self) -> Result<()> {
        self.queue.close();
        let mut outcome = Ok(());
        for worker in self.workers {
            match worker.handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
                Err(_) => {
                    if outcome.is_ok() {
                        outcome = Err(Error::WorkerPanicked {
                            index: worker.index,
                        });
                    }
                }
            }
        }
        tracing::debug!("worker pool joined");
        outcome
    }
}

fn worker_loop<T, F>(queue: &BoundedQueue<T>, callback: &F) -> Result<()>
where
    F: Fn(T) -> Result<()>,
{
    let mut outcome = Ok(());
    loop {
        match queue.pop() {
            Ok(Some(value)) => {
                if let Err(err) = callback(value) {
                    tracing::warn!(error = %err, "callback failed");
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
            }
            // Closed and drained: exit.
            Ok(None) => break,
            Err(err) => {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    #[test]
    fn test_pool_processes_all_values() {
        let processed_sum = Arc::new(AtomicI64::new(0));
        let callback_sum = Arc::clone(&processed_sum);
        let pool: WorkerPool<i64> = WorkerPool::new(8, 32, move |value| {
            callback_sum.fetch_add(value, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        let mut expected_sum = 0;
        for iteration in 0..497 {
            let value = (98 * iteration) % 45;
            expected_sum += value;
            pool.push(value).unwrap();
        }
        pool.join().unwrap();

        assert_eq!(processed_sum.load(Ordering::SeqCst), expected_sum);
    }

    #[test]
    fn test_join_idle_pool() {
        let pool: WorkerPool<i32> = WorkerPool::new(4, 8, |_| Ok(())).unwrap();
        pool.join().unwrap();
    }

    #[test]
    fn test_callback_failure_does_not_stop_worker() {
        let processed = Arc::new(AtomicUsize::new(0));
        let callback_count = Arc::clone(&processed);
        let pool: WorkerPool<i32> = WorkerPool::new(1, 8, move |value| {
            callback_count.fetch_add(1, Ordering::SeqCst);
            if value < 0 {
                Err(Error::Callback(format!("negative value {value}")))
            } else {
                Ok(())
            }
        })
        .unwrap();

        pool.push(1).unwrap();
        pool.push(-2).unwrap();
        pool.push(3).unwrap();
        let result = pool.join();

        assert_eq!(processed.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(Error::Callback(_))));
    }

    #[test]
    fn test_worker_panic_reported_by_join() {
        let processed = Arc::new(AtomicUsize::new(0));
        let callback_count = Arc::clone(&processed);
        let pool: WorkerPool<i32> = WorkerPool::new(2, 8, move |value| {
            if value < 0 {
                panic!("poisoned value {value}");
            }
            callback_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        pool.push(1).unwrap();
        pool.push(-2).unwrap();
        pool.push(3).unwrap();
        let result = pool.join();

        assert!(matches!(result, Err(Error::WorkerPanicked { .. })));
        // The surviving worker still drains the remaining values.
        assert_eq!(processed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_spawn_failure_leaves_no_workers() {
        // A stack size no allocation can satisfy forces the first spawn to
        // fail; the rollback path must return promptly with the OS error.
        let result: Result<WorkerPool<i32>> = PoolBuilder::new()
            .threads(4)
            .queue_capacity(4)
            .stack_size(usize::MAX)
            .build(|_| Ok(()));
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }

    #[test]
    fn test_pusher_outlives_join() {
        let processed = Arc::new(AtomicUsize::new(0));
        let callback_count = Arc::clone(&processed);
        let pool: WorkerPool<i32> = WorkerPool::new(2, 8, move |_| {
            callback_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let pusher = pool.pusher();

        assert_eq!(pool.try_push(1).unwrap(), None);
        assert_eq!(pusher.try_push(2).unwrap(), None);
        pool.join().unwrap();

        assert!(matches!(pusher.try_push(3), Err(Error::Closed)));
        assert!(matches!(pusher.push(4), Err(Error::Closed)));
        assert_eq!(processed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let zero_threads: Result<WorkerPool<i32>> = WorkerPool::new(0, 8, |_| Ok(()));
        assert!(matches!(zero_threads, Err(Error::InvalidArgument(_))));

        let zero_capacity: Result<WorkerPool<i32>> = WorkerPool::new(4, 0, |_| Ok(()));
        assert!(matches!(zero_capacity, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_attributes() {
        let pool: WorkerPool<i32> = PoolBuilder::new()
            .threads(2)
            .queue_capacity(4)
            .thread_name("attr-test")
            .stack_size(512 * 1024)
            .build(|_| Ok(()))
            .unwrap();
        pool.push(1).unwrap();
        pool.join().unwrap();
    }
}
