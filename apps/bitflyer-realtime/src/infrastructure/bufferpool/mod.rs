//! Byte Buffer Pool
//!
//! Recycles encode buffers between outgoing frames. The pool is an explicit
//! handle passed to whoever needs it; clones share one free list, separate
//! pools never share buffers.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

/// Upper bound on idle buffers kept per pool.
const DEFAULT_MAX_IDLE: usize = 16;

/// Shared pool of reusable byte buffers.
#[derive(Debug, Clone)]
pub struct BufferPool {
    idle: Arc<Mutex<Vec<Vec<u8>>>>,
    max_idle: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// Create an empty pool retaining at most `max_idle` released buffers.
    #[must_use]
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            idle: Arc::new(Mutex::new(Vec::new())),
            max_idle,
        }
    }

    /// Take a buffer from the pool, allocating if none is idle.
    ///
    /// The returned buffer is always empty.
    #[must_use]
    pub fn acquire(&self) -> PooledBuffer {
        let buf = self.idle.lock().pop().unwrap_or_default();
        PooledBuffer {
            buf,
            pool: self.clone(),
        }
    }

    /// Return a buffer to the pool. Equivalent to dropping it.
    pub fn release(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    /// Number of idle buffers currently held.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn put_back(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`]. Cleared and returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put_back(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_is_empty_and_writable() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        assert!(buf.is_empty());

        buf.extend_from_slice(b"blahblahblah");
        assert_eq!(buf.as_slice(), b"blahblahblah");
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn released_buffer_is_cleared_and_reused() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"blahblahblah");
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);

        let again = pool.acquire();
        assert!(again.is_empty());
        assert!(again.capacity() >= 12);
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn outstanding_acquisitions_never_alias() {
        let pool = BufferPool::new();
        let mut first = pool.acquire();
        let mut second = pool.acquire();
        first.push(1);
        second.push(2);

        assert_eq!(first.as_slice(), &[1]);
        assert_eq!(second.as_slice(), &[2]);
    }

    #[test]
    fn separate_pools_are_isolated() {
        let a = BufferPool::new();
        let b = BufferPool::new();

        let mut buf = a.acquire();
        buf.extend_from_slice(b"data");
        drop(buf);

        assert_eq!(a.idle_count(), 1);
        assert_eq!(b.idle_count(), 0);
    }

    #[test]
    fn clones_share_the_free_list() {
        let pool = BufferPool::new();
        let clone = pool.clone();
        drop(pool.acquire());
        assert_eq!(clone.idle_count(), 1);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::with_max_idle(1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
    }
}
