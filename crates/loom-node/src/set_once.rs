//! A lock-free nullable cell for lazily cached values.
//!
//! Several readers may race to populate the same cache entry. The cell offers
//! four operations with distinct ordering guarantees:
//!
//! - [`SetOnce::set`]: plain write, requires exclusive access
//! - [`SetOnce::publish`]: visibility-ordered write through a shared reference
//! - [`SetOnce::set_if_unset`]: compare-and-set, only the first writer wins
//! - [`SetOnce::get`]: visibility-ordered read
//!
//! Values replaced by `publish` are retired rather than freed, so references
//! obtained from `get` stay valid for as long as the shared borrow lives.
//! Retired values are reclaimed on the next exclusive access or on drop.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A nullable cell readers can access without locking.
pub struct SetOnce<T> {
    current: AtomicPtr<T>,
    retired: AtomicPtr<Retired<T>>,
}

struct Retired<T> {
    value: *mut T,
    next: *mut Retired<T>,
}

// SAFETY: the cell owns its values like a `Box<T>` would; sharing the cell
// hands out `&T` across threads, which needs `T: Sync`, and values may be
// dropped on whichever thread drops the cell, which needs `T: Send`.
unsafe impl<T: Send + Sync> Send for SetOnce<T> {}
unsafe impl<T: Send + Sync> Sync for SetOnce<T> {}

fn into_raw<T>(value: Option<T>) -> *mut T {
    match value {
        Some(value) => Box::into_raw(Box::new(value)),
        None => ptr::null_mut(),
    }
}

impl<T> SetOnce<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self {
            current: AtomicPtr::new(ptr::null_mut()),
            retired: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Create a cell holding `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            current: AtomicPtr::new(into_raw(Some(value))),
            retired: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Plain write.
    pub fn set(&mut self, value: Option<T>) {
        let old = std::mem::replace(self.current.get_mut(), into_raw(value));
        if !old.is_null() {
            // SAFETY: `old` came from `Box::into_raw` and exclusive access
            // guarantees no outstanding `&T` borrows it.
            drop(unsafe { Box::from_raw(old) });
        }
        self.reclaim();
    }

    /// Visibility-ordered write.
    pub fn publish(&self, value: Option<T>) {
        let old = self.current.swap(into_raw(value), Ordering::AcqRel);
        if !old.is_null() {
            self.retire(old);
        }
    }

    /// Store `value` only if the cell is still empty.
    ///
    /// Returns the stored value on success, or gives `value` back when
    /// another writer got there first.
    pub fn set_if_unset(&self, value: T) -> Result<&T, T> {
        let new = Box::into_raw(Box::new(value));
        match self.current.compare_exchange(
            ptr::null_mut(),
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            // SAFETY: `new` is now owned by the cell and is only freed through
            // `&mut self` or drop, both of which outlive this borrow.
            Ok(_) => Ok(unsafe { &*new }),
            // SAFETY: the exchange failed so `new` was never shared.
            Err(_) => Err(*unsafe { Box::from_raw(new) }),
        }
    }

    /// Visibility-ordered read.
    pub fn get(&self) -> Option<&T> {
        let current = self.current.load(Ordering::Acquire);
        // SAFETY: non-null pointers in `current` come from `Box::into_raw` and
        // are freed only through `&mut self` or drop.
        unsafe { current.as_ref() }
    }

    /// Read the value, computing and storing it first if the cell is empty.
    ///
    /// `init` may run on several racing threads; only one result is kept.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        let mut value = init();
        loop {
            match self.set_if_unset(value) {
                Ok(stored) => return stored,
                Err(rejected) => {
                    if let Some(existing) = self.get() {
                        return existing;
                    }
                    // Cleared between the failed exchange and the read.
                    value = rejected;
                }
            }
        }
    }

    /// Whether a value is present.
    pub fn is_set(&self) -> bool {
        !self.current.load(Ordering::Acquire).is_null()
    }

    /// Remove and return the current value.
    pub fn take(&mut self) -> Option<T> {
        let old = std::mem::replace(self.current.get_mut(), ptr::null_mut());
        self.reclaim();
        if old.is_null() {
            None
        } else {
            // SAFETY: see `set`.
            Some(*unsafe { Box::from_raw(old) })
        }
    }

    fn retire(&self, value: *mut T) {
        let node = Box::into_raw(Box::new(Retired {
            value,
            next: ptr::null_mut(),
        }));
        let mut head = self.retired.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` is private until the exchange below publishes it.
            unsafe { (*node).next = head };
            match self
                .retired
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    fn reclaim(&mut self) {
        let mut node = std::mem::replace(self.retired.get_mut(), ptr::null_mut());
        while !node.is_null() {
            // SAFETY: exclusive access; every node and every retired value was
            // leaked from a `Box` by `retire` / `into_raw`.
            let retired = unsafe { Box::from_raw(node) };
            drop(unsafe { Box::from_raw(retired.value) });
            node = retired.next;
        }
    }
}

impl<T> Default for SetOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SetOnce<T> {
    fn drop(&mut self) {
        self.set(None);
    }
}

impl<T: fmt::Debug> fmt::Debug for SetOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetOnce").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_empty_then_set() {
        let mut cell = SetOnce::new();
        assert!(cell.get().is_none());
        cell.set(Some(1));
        assert_eq!(cell.get(), Some(&1));
        cell.set(None);
        assert!(!cell.is_set());
    }

    #[test]
    fn test_set_if_unset_keeps_first() {
        let cell = SetOnce::new();
        assert_eq!(cell.set_if_unset("first"), Ok(&"first"));
        assert_eq!(cell.set_if_unset("second"), Err("second"));
        assert_eq!(cell.get(), Some(&"first"));
    }

    #[test]
    fn test_publish_keeps_old_references_alive() {
        let cell = SetOnce::with_value(String::from("old"));
        let old = cell.get().unwrap();
        cell.publish(Some(String::from("new")));
        assert_eq!(old, "old");
        assert_eq!(cell.get().map(String::as_str), Some("new"));
    }

    #[test]
    fn test_take() {
        let mut cell = SetOnce::with_value(vec![1, 2]);
        cell.publish(Some(vec![3]));
        assert_eq!(cell.take(), Some(vec![3]));
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn test_racing_initialisers_agree() {
        let cell = SetOnce::new();
        let calls = AtomicUsize::new(0);
        let seen: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cell = &cell;
                    let calls = &calls;
                    scope.spawn(move || {
                        *cell.get_or_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            i
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(seen.iter().all(|v| *v == seen[0]));
        assert_eq!(cell.get(), Some(&seen[0]));
    }
}
