//! Explicit cleanup callbacks.
//!
//! Instead of running a callback when some object is collected, the owner
//! registers the callback and receives a [`CleanupHandle`]. Handles are
//! reference counted; when the last clone is released (or dropped) the
//! callback is moved into the queue. Whoever owns the queue drains it with
//! [`CleanupQueue::run_pending`], on any thread and at any time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

type Callback = Box<dyn FnOnce() + Send>;
type Pending = Mutex<VecDeque<Callback>>;

/// Queue of callbacks whose handles have all been released.
#[derive(Clone, Default)]
pub struct CleanupQueue {
    pending: Arc<Pending>,
}

/// Reference-counted registration of one cleanup callback.
#[derive(Clone)]
pub struct CleanupHandle {
    registration: Arc<Registration>,
}

struct Registration {
    callback: Mutex<Option<Callback>>,
    queue: Weak<Pending>,
}

impl CleanupQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, to be queued once every clone of the returned
    /// handle is gone.
    pub fn register(&self, callback: impl FnOnce() + Send + 'static) -> CleanupHandle {
        CleanupHandle {
            registration: Arc::new(Registration {
                callback: Mutex::new(Some(Box::new(callback))),
                queue: Arc::downgrade(&self.pending),
            }),
        }
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every queued callback, returning how many ran.
    pub fn run_pending(&self) -> usize {
        let drained: Vec<Callback> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = drained.len();
        for callback in drained {
            callback();
        }
        if count > 0 {
            debug!(count, "ran cleanup callbacks");
        }
        count
    }
}

impl CleanupHandle {
    /// Release this handle. Same as dropping it.
    pub fn release(self) {}

    /// Discard the callback without ever queueing it.
    pub fn cancel(self) {
        self.registration
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Number of live clones of this handle.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.registration)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let callback = self
            .callback
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(callback) = callback else {
            return;
        };
        // A queue that is already gone has nobody left to run the callback.
        if let Some(queue) = self.queue.upgrade() {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_last_release_enqueues() {
        let queue = CleanupQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let handle = queue.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let other = handle.clone();
        assert_eq!(handle.holders(), 2);

        handle.release();
        assert_eq!(queue.pending(), 0);
        drop(other);
        assert_eq!(queue.pending(), 1);

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_cancel_never_runs() {
        let queue = CleanupQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        queue
            .register(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .cancel();
        assert_eq!(queue.run_pending(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drained_from_another_thread() {
        let queue = CleanupQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = ran.clone();
            queue.register(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        let worker = queue.clone();
        let count = std::thread::spawn(move || worker.run_pending())
            .join()
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }
}
