//!
//! Bounded Work Queue
//!
//! A synchronized, capacity-bounded queue of owned work values. All shared
//! state lives behind a single `Mutex`; two condition variables, one per
//! predicate, coordinate blocked producers and consumers:
//!
//! - `not_empty` wakes consumers blocked in `pop`
//! - `not_full` wakes producers blocked in `push` / `push_sorted`
//!
//! Every waiter re-checks its predicate in a loop after each wake, so
//! spurious wakeups are harmless.
//!
//! ## Capacity
//!
//! A capacity of `0` means unbounded (subject to memory only). A bounded
//! queue never holds more than `capacity` values: `push` blocks until a
//! `pop` makes room, `try_push` hands the value back instead of blocking.
//!
//! ## Closing
//!
//! `close` marks the queue terminal: subsequent pushes fail with
//! `Error::Closed`, while consumers keep draining the remaining values.
//! Once the queue is closed *and* empty, `pop` returns `Ok(None)` instead
//! of blocking. Closing and the refusal of new pushes happen under the same
//! lock, so a producer can never slip a value in between "observed empty"
//! and "closed".
//!
//! ## Failure points
//!
//! Operations are not transactional: a mutation that completed before a
//! primitive failure in the same call stays in place. The only primitive
//! failure `std::sync` can report is lock poisoning; after `Error::Poisoned`
//! the container contents should not be trusted.
//!

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::{Error, Result};

struct State<T> {
    values: VecDeque<T>,
    closed: bool,
}

pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` values, or an unbounded
    /// queue when `capacity` is `0`. Bounded capacities are pre-allocated
    /// and must fit the value-array allocation limit.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > Self::max_capacity() {
            return Err(Error::InvalidArgument("capacity exceeds maximum"));
        }
        let values = if capacity > 0 {
            VecDeque::with_capacity(capacity)
        } else {
            VecDeque::new()
        };
        Ok(Self {
            state: Mutex::new(State {
                values,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Largest representable capacity: the value array may not exceed
    /// `isize::MAX` bytes.
    fn max_capacity() -> usize {
        let value_size = size_of::<T>().max(1);
        isize::MAX as usize / value_size
    }

    fn is_full(&self, state: &State<T>) -> bool {
        self.capacity > 0 && state.values.len() >= self.capacity
    }

    /// Appends `value` at the tail, blocking while the queue is full.
    ///
    /// Fails with `Error::Closed` if the queue is closed before space
    /// appears; the value is dropped in that case.
    pub fn push(&self, value: T) -> Result<()> {
        let mut state = self.state.lock()?;
        while self.is_full(&state) && !state.closed {
            state = self.not_full.wait(state)?;
        }
        if state.closed {
            return Err(Error::Closed);
        }
        state.values.push_back(value);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking `push`: on a full queue the value is handed back as
    /// `Ok(Some(value))` -- a would-block result, not an error.
    pub fn try_push(&self, value: T) -> Result<Option<T>> {
        let mut state = self.state.lock()?;
        if state.closed {
            return Err(Error::Closed);
        }
        if self.is_full(&state) {
            return Ok(Some(value));
        }
        state.values.push_back(value);
        drop(state);
        self.not_empty.notify_one();
        Ok(None)
    }

    /// Inserts `value` at the position that keeps the queue totally ordered
    /// under `compare`, blocking while the queue is full.
    ///
    /// The insertion point is found by a linear scan from the tail. When
    /// `allow_duplicates` is false, a comparator-equal element rejects the
    /// push with `Error::DuplicateValue` and the value is dropped.
    pub fn push_sorted<F>(&self, value: T, compare: F, allow_duplicates: bool) -> Result<()>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let mut state = self.state.lock()?;
        while self.is_full(&state) && !state.closed {
            state = self.not_full.wait(state)?;
        }
        if state.closed {
            return Err(Error::Closed);
        }
        let mut index = state.values.len();
        while index > 0 {
            match compare(&state.values[index - 1], &value) {
                Ordering::Greater => index -= 1,
                Ordering::Equal if !allow_duplicates => {
                    return Err(Error::DuplicateValue);
                }
                _ => break,
            }
        }
        state.values.insert(index, value);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes and returns the head value, blocking while the queue is
    /// empty. Returns `Ok(None)` only once the queue is closed and drained.
    pub fn pop(&self) -> Result<Option<T>> {
        let mut state = self.state.lock()?;
        while state.values.is_empty() && !state.closed {
            state = self.not_empty.wait(state)?;
        }
        match state.values.pop_front() {
            Some(value) => {
                drop(state);
                self.not_full.notify_one();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Non-blocking `pop`: returns `Ok(None)` when the queue is empty at
    /// the instant of the call.
    pub fn try_pop(&self) -> Result<Option<T>> {
        let mut state = self.state.lock()?;
        match state.values.pop_front() {
            Some(value) => {
                drop(state);
                self.not_full.notify_one();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Snapshot of whether the queue is empty; may be stale by the time the
    /// caller acts on it.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.state.lock()?.values.is_empty())
    }

    /// Snapshot of the current number of queued values.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.values.len())
    }

    /// Maximum number of values held at once; `0` means unbounded.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.state.lock()?.closed)
    }

    /// Marks the queue terminal and wakes every waiter on both condition
    /// variables. Further pushes fail with `Error::Closed`; consumers keep
    /// draining the remaining values.
    ///
    /// Infallible: a poisoned lock is recovered so shutdown cannot be
    /// blocked by a panicked thread. Remaining values are dropped with the
    /// queue itself.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.closed {
            state.closed = true;
            tracing::trace!(remaining = state.values.len(), "queue closed");
        }
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
