//! Reusable-instance pools for walkers.
//!
//! Walkers own growable buffers that would otherwise be reallocated on every
//! recursive step. A [`Pool`] keeps cleared instances in a lock-free queue;
//! [`Pool::borrow`] hands one out wrapped in a [`Pooled`] guard that clears
//! the instance and returns it to the queue when dropped. The guard borrows
//! the pool, so a walker cannot outlive its release point, and a recycled
//! instance is always reset before anyone sees it again.
//!
//! Pools are `Sync` and are shared by every thread analysing documents; a
//! borrowed instance is only ever touched by the thread holding the guard.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::ArrayQueue;

/// Default number of idle instances kept per pool.
pub const DEFAULT_CAPACITY: usize = 64;

/// A type that can be cleared back to its freshly-constructed state.
pub trait Poolable: Default + Send {
    /// Drop all traversal state, keeping allocated capacity.
    fn clear(&mut self);
}

pub struct Pool<T: Poolable> {
    idle: ArrayQueue<T>,
    constructed: AtomicUsize,
}

impl<T: Poolable> Pool<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
            constructed: AtomicUsize::new(0),
        }
    }

    /// Take a cleared instance, constructing one if the pool is empty.
    #[must_use]
    pub fn borrow(&self) -> Pooled<'_, T> {
        let item = self.idle.pop().unwrap_or_else(|| {
            self.constructed.fetch_add(1, Ordering::Relaxed);
            T::default()
        });
        Pooled {
            item: Some(item),
            pool: self,
        }
    }

    /// Instances currently waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Instances constructed over the pool's lifetime.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    fn release(&self, mut item: T) {
        item.clear();
        // a full pool simply drops the surplus instance
        let _ = self.idle.push(item);
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped handle to a pooled instance.
pub struct Pooled<'p, T: Poolable> {
    item: Option<T>,
    pool: &'p Pool<T>,
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `item` is only taken in `drop`
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item accessed after release"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item accessed after release"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}
