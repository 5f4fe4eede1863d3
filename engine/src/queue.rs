//! A thread-safe FIFO task queue with blocking pop and shutdown signalling.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::task::Task;

struct Inner {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

/// A FIFO queue of [`Task`]s, shared between producers and a pool of
/// consuming worker threads.
///
/// `pop` blocks until a task is available or the queue is shut down, at
/// which point it returns a no-op task so the caller can observe shutdown
/// without threading an extra `Option` through every worker loop. Shutdown
/// is not an error: it is signalled out-of-band via [`TaskQueue::shutdown`].
pub struct TaskQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Pushes a task to the back of the queue and wakes one waiting consumer.
    ///
    /// Never blocks. A no-op once the queue has been shut down.
    pub fn emplace(&self, task: Task) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return;
        }
        inner.tasks.push_back(task);
        self.not_empty.notify_one();
    }

    /// Blocks until a task is available or the queue is shut down.
    ///
    /// Returns [`Task::noop`] if the queue is empty and shut down.
    pub fn pop(&self) -> Task {
        let mut inner = self.inner.lock();
        while inner.tasks.is_empty() && !inner.shutdown {
            self.not_empty.wait(&mut inner);
        }

        match inner.tasks.pop_front() {
            Some(task) => task,
            None => Task::noop(),
        }
    }

    /// Pops a task if one is immediately available, without blocking.
    ///
    /// Unlike [`TaskQueue::pop`], never returns a no-op sentinel: an empty
    /// queue (shut down or not) simply yields `None`.
    pub fn try_pop(&self) -> Option<Task> {
        self.inner.lock().tasks.pop_front()
    }

    /// Marks the queue closed and wakes every waiting consumer.
    ///
    /// Tasks already queued remain available to `pop` until drained; new
    /// calls to `emplace` after shutdown are silently dropped.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        self.not_empty.notify_all();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn empty(&self) -> bool {
        self.inner.lock().tasks.is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().tasks.clear();
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
