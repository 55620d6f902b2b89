//! Free-list object pool for per-request state.
//!
//! Values are checked out exclusively and always come back cleared: the pool
//! calls [`Recycle::recycle`] before a value re-enters the free list, so
//! nothing written during one request is visible to the next.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// State that can be wiped for reuse.
pub trait Recycle: Default + Send {
    /// Clear every per-request field.
    fn recycle(&mut self);
}

/// A bounded free list of `T`.
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Recycle> Pool<T> {
    /// Idle values kept when no explicit bound is given.
    pub const DEFAULT_MAX_IDLE: usize = 64;

    /// Create a pool that keeps at most [`Self::DEFAULT_MAX_IDLE`] idle values.
    pub fn new() -> Self {
        Self::with_max_idle(Self::DEFAULT_MAX_IDLE)
    }

    /// Create a pool that keeps at most `max_idle` idle values.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Check out a value that returns itself to the pool when dropped.
    pub fn checkout(&self) -> Pooled<'_, T> {
        Pooled {
            pool: self,
            value: Some(self.take()),
        }
    }

    /// Detach a value from the pool. Pair with [`Pool::give`].
    pub fn take(&self) -> T {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Return a detached value. It is recycled before becoming available.
    pub fn give(&self, mut value: T) {
        value.recycle();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(value);
        }
    }

    /// Number of idle values.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<T: Recycle> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusive checkout from a [`Pool`].
pub struct Pooled<'p, T: Recycle> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` empties the slot.
        self.value.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.give(value);
        }
    }
}
