//! A small pool of fixed-size read buffers shared across connections.
//!
//! A servent juggling many simultaneous downloads wants a bounded
//! number of socket-sized buffers rather than one fresh `Vec` per
//! connection; this is the free-list that backs that policy.

use std::sync::Mutex;

pub struct BufferPool {
    buf_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

/// A buffer checked out of a [`BufferPool`]. Cleared and returned to the
/// pool's free list on drop.
pub struct PooledBuf<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl BufferPool {
    pub fn new(buf_size: usize, initial_count: usize) -> Self {
        let free = (0..initial_count).map(|_| vec![0u8; buf_size]).collect();
        BufferPool { buf_size, free: Mutex::new(free) }
    }

    pub fn acquire(&self) -> PooledBuf<'_> {
        let buf = self.free.lock().unwrap().pop().unwrap_or_else(|| vec![0u8; self.buf_size]);
        PooledBuf { pool: self, buf }
    }

    pub fn len_free(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

impl std::ops::Deref for PooledBuf<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl std::ops::DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        buf.resize(self.pool.buf_size, 0);
        self.pool.free.lock().unwrap().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_buffers() {
        let pool = BufferPool::new(16, 1);
        assert_eq!(pool.len_free(), 1);
        {
            let mut buf = pool.acquire();
            assert_eq!(pool.len_free(), 0);
            buf[0] = 0xFF;
        }
        assert_eq!(pool.len_free(), 1);
    }

    #[test]
    fn acquire_grows_pool_when_empty() {
        let pool = BufferPool::new(8, 0);
        let _a = pool.acquire();
        let _b = pool.acquire();
        assert_eq!(pool.len_free(), 0);
    }
}
