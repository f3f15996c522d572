//! Reusable output buffers for rendering.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use crate::properties::source::lock;

/// Thread-safe pool of byte buffers.
///
/// A checked-out buffer is always empty. Buffers return to the pool when their
/// guard drops, unless the pool is full or the buffer grew past the retention
/// limit.
#[derive(Debug)]
pub struct BufferPool {
    pool: Mutex<Vec<Vec<u8>>>,
    max_size: usize,
    capacity: usize,
    max_retained: usize,
}

impl BufferPool {
    pub fn new(max_size: usize, capacity: usize, max_retained: usize) -> Self {
        Self {
            pool: Mutex::new(Vec::with_capacity(max_size)),
            max_size,
            capacity,
            max_retained,
        }
    }

    /// Take an empty buffer, allocating one if the pool is dry.
    pub fn get(&self) -> PooledBuffer<'_> {
        let buffer = lock(&self.pool)
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity));
        PooledBuffer {
            buffer: Some(buffer),
            pool: self,
        }
    }

    fn put_back(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() > self.max_retained {
            return;
        }
        buffer.clear();
        let mut pool = lock(&self.pool);
        if pool.len() < self.max_size {
            pool.push(buffer);
        }
    }

    /// Idle buffers currently held.
    pub fn size(&self) -> usize {
        lock(&self.pool).len()
    }

    pub fn clear(&self) {
        lock(&self.pool).clear();
    }

    /// Pre-allocate up to `count` idle buffers.
    pub fn warm(&self, count: usize) {
        let mut pool = lock(&self.pool);
        let to_add = self.max_size.saturating_sub(pool.len()).min(count);
        for _ in 0..to_add {
            pool.push(Vec::with_capacity(self.capacity));
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buffer: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        // Only `Drop` takes the buffer out.
        self.buffer.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buffer.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.put_back(buffer);
        }
    }
}
