//! Allocation-tracking buffer pool
//!
//! Bookkeeping layer behind every working buffer the server hands out:
//! buffers are zero-initialized on allocation, recorded as `(handle, size)`
//! until released, and summed into a running total the status endpoints
//! report. "Pool" means tracking, not allocation reuse - released memory
//! goes back to the allocator, only the record is kept here.
//!
//! Handles are generation-indexed: releasing a handle bumps its slot's
//! generation, so a handle kept past its release (or past a teardown) is
//! rejected instead of corrupting the accounting.

use crate::error::PoolError;
use bytes::BytesMut;
use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::info;

/// Tracking slots available before the first growth event.
pub const INITIAL_CAPACITY: usize = 100;

/// Handle to a tracked block.
///
/// The slot indexes a generation table; the handle is live only while its
/// generation matches the table entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    slot: u32,
    generation: u32,
}

impl BlockHandle {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One live allocation record
#[derive(Debug, Clone, Copy)]
struct TrackedBlock {
    handle: BlockHandle,
    size: usize,
}

/// Accounting snapshot reported by `/memory-stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total_allocated: usize,
    pub active_blocks: usize,
    pub pool_capacity: usize,
}

#[derive(Default)]
struct PoolInner {
    /// Live blocks in insertion order
    blocks: Vec<TrackedBlock>,
    /// Generation per slot, bumped on every release
    generations: Vec<u32>,
    /// Slots free for reuse
    free_slots: Vec<u32>,
    /// Tracking slots available without growth; 0 until first allocation
    capacity: usize,
    /// Bytes currently tracked
    total_allocated: usize,
}

impl PoolInner {
    /// Lazily initialize, or double the table when the next insertion
    /// would exceed capacity. A failed growth step fails the allocation;
    /// no untracked buffer is ever handed out.
    fn ensure_capacity(&mut self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            self.blocks
                .try_reserve_exact(INITIAL_CAPACITY)
                .map_err(|_| PoolError::Exhausted { capacity: 0 })?;
            self.capacity = INITIAL_CAPACITY;
            info!(slots = INITIAL_CAPACITY, "buffer pool initialized");
        } else if self.blocks.len() == self.capacity {
            let doubled = self.capacity * 2;
            self.blocks
                .try_reserve_exact(doubled - self.blocks.len())
                .map_err(|_| PoolError::Exhausted {
                    capacity: self.capacity,
                })?;
            self.capacity = doubled;
            info!(slots = doubled, "buffer pool expanded");
        }
        Ok(())
    }

    fn insert(&mut self, size: usize) -> BlockHandle {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                self.generations.push(0);
                (self.generations.len() - 1) as u32
            }
        };
        let handle = BlockHandle {
            slot,
            generation: self.generations[slot as usize],
        };
        self.blocks.push(TrackedBlock { handle, size });
        self.total_allocated += size;
        handle
    }

    fn release(&mut self, handle: BlockHandle) -> Result<usize, PoolError> {
        let stale = PoolError::StaleHandle {
            slot: handle.slot,
            generation: handle.generation,
        };
        let slot = handle.slot as usize;
        if slot >= self.generations.len() || self.generations[slot] != handle.generation {
            return Err(stale);
        }
        let pos = self
            .blocks
            .iter()
            .position(|b| b.handle == handle)
            .ok_or(stale)?;
        // Ordered removal keeps the insertion-order invariant
        let block = self.blocks.remove(pos);
        self.total_allocated -= block.size;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_slots.push(handle.slot);
        Ok(block.size)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            total_allocated: self.total_allocated,
            active_blocks: self.blocks.len(),
            pool_capacity: self.capacity,
        }
    }
}

/// Allocation-tracking buffer pool.
///
/// Cloning shares the underlying accounting; the pool is safe to use from
/// concurrent connection tasks.
#[derive(Clone, Default)]
pub struct BufferPool {
    inner: Arc<Mutex<PoolInner>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-initialized buffer of exactly `size` bytes and
    /// record it.
    pub fn allocate(&self, size: usize) -> Result<TrackedBuf, PoolError> {
        let handle = {
            let mut inner = self.inner.lock();
            inner.ensure_capacity()?;
            inner.insert(size)
        };
        Ok(TrackedBuf {
            handle,
            data: BytesMut::zeroed(size),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Release a tracked block by handle and return its recorded size.
    ///
    /// Unknown, stale, and double-released handles are rejected without
    /// touching any counter.
    pub fn release(&self, handle: BlockHandle) -> Result<usize, PoolError> {
        self.inner.lock().release(handle)
    }

    /// Bytes currently tracked.
    pub fn total_allocated(&self) -> usize {
        self.inner.lock().total_allocated
    }

    /// Current accounting snapshot.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    /// Drop every record and return the pool to the uninitialized state.
    ///
    /// Buffers still owned by callers stay usable; their records are gone
    /// and their handles are invalidated, so a later drop retires nothing.
    /// Returns the snapshot from just before the reset.
    pub fn teardown(&self) -> PoolStats {
        let mut inner = self.inner.lock();
        let stats = inner.stats();
        info!(
            blocks = stats.active_blocks,
            bytes = stats.total_allocated,
            "buffer pool torn down"
        );
        let blocks = std::mem::take(&mut inner.blocks);
        for block in blocks {
            let slot = block.handle.slot as usize;
            inner.generations[slot] = inner.generations[slot].wrapping_add(1);
        }
        // The generation table survives teardown so handles from a previous
        // pool lifetime can never validate against a new block.
        inner.free_slots.clear();
        inner.capacity = 0;
        inner.total_allocated = 0;
        stats
    }
}

/// Zero-initialized buffer tracked by the pool.
///
/// Owns its bytes. The accounting record is retired when the buffer drops;
/// an explicit `BufferPool::release` beforehand makes the drop a no-op.
pub struct TrackedBuf {
    handle: BlockHandle,
    data: BytesMut,
    pool: Arc<Mutex<PoolInner>>,
}

impl TrackedBuf {
    pub fn handle(&self) -> BlockHandle {
        self.handle
    }
}

impl Deref for TrackedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for TrackedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for TrackedBuf {
    fn drop(&mut self) {
        // The record may already be gone after an explicit release or a
        // pool teardown.
        let _ = self.pool.lock().release(self.handle);
    }
}
