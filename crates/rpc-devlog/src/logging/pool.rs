//! Scratch-buffer pool for record construction.
//!
//! Every record is rendered into a [`PooledBuffer`] checked out from the
//! logger's [`BufferPool`]. Dropping the guard clears the buffer and checks it
//! back in, so a buffer is released on every exit path, including early
//! returns and cancelled futures.
//!
//! Buffers that grew past the capacity ceiling are dropped on release rather
//! than kept, so a single oversized message cannot pin a large allocation for
//! the lifetime of the process.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::config::LoggerConfig;
use super::constants::INITIAL_BUFFER_CAPACITY;

/// Bounded pool of reusable text buffers.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    max_capacity: Option<usize>,
    max_idle: usize,
    discarded: AtomicUsize,
}

impl BufferPool {
    /// Creates a pool.
    ///
    /// `max_capacity` is the largest retained capacity a released buffer may
    /// have and still be pooled (`None` for no limit); `max_idle` bounds the
    /// number of idle buffers kept.
    pub fn new(max_capacity: Option<usize>, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_capacity,
            max_idle,
            discarded: AtomicUsize::new(0),
        }
    }

    /// Creates a pool sized by the logger configuration.
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::new(config.max_buffer_capacity, config.max_pooled_buffers)
    }

    /// Checks out an empty buffer, allocating one if none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let buf = recycled.unwrap_or_else(|| String::with_capacity(INITIAL_BUFFER_CAPACITY));
        PooledBuffer { buf, pool: self }
    }

    /// Checks a buffer back in.
    ///
    /// The buffer is cleared, then kept unless it exceeds the capacity ceiling
    /// or the pool is already full.
    pub fn release(&self, mut buf: String) {
        if let Some(max) = self.max_capacity.filter(|max| buf.capacity() > *max) {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                capacity = buf.capacity(),
                max_capacity = max,
                "Discarding oversized log buffer"
            );
            return;
        }

        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Number of idle buffers currently pooled.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of buffers dropped for exceeding the capacity ceiling.
    pub fn discarded_count(&self) -> usize {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Largest capacity among idle buffers.
    pub fn max_idle_capacity(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(String::capacity)
            .max()
            .unwrap_or(0)
    }
}

/// A buffer checked out from a [`BufferPool`]; checked back in on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: String,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_returns_empty_buffer() {
        let pool = BufferPool::new(Some(1024), 4);
        {
            let mut buf = pool.acquire();
            buf.push_str("hello");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= INITIAL_BUFFER_CAPACITY);
    }

    #[test]
    fn test_released_buffer_is_reused() {
        let pool = BufferPool::new(Some(1024), 4);
        drop(pool.acquire());
        assert_eq!(pool.idle_count(), 1);
        let _buf = pool.acquire();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_oversized_buffer_is_discarded() {
        let pool = BufferPool::new(Some(1024), 4);
        {
            let mut buf = pool.acquire();
            buf.push_str(&"x".repeat(4096));
        }
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.discarded_count(), 1);

        let buf = pool.acquire();
        assert!(buf.capacity() <= 1024);
    }

    #[test]
    fn test_no_ceiling_keeps_large_buffers() {
        let pool = BufferPool::new(None, 4);
        {
            let mut buf = pool.acquire();
            buf.push_str(&"x".repeat(100_000));
        }
        assert_eq!(pool.idle_count(), 1);
        assert!(pool.max_idle_capacity() >= 100_000);
    }

    #[test]
    fn test_idle_count_is_bounded() {
        let pool = BufferPool::new(None, 2);
        let buffers: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(buffers);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_concurrent_checkout() {
        let pool = Arc::new(BufferPool::new(Some(4096), 8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.push_str(&i.to_string());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.idle_count() <= 8);
    }
}
