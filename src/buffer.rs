//! Fixed-capacity packet buffer pool.
//!
//! spec.md §9 calls out the source pool as an anti-pattern: buffers were
//! returned to the pool with a resliced (shrunk) view still attached, so the
//! next borrower silently got less capacity than it expected. This pool
//! enforces the fix at the type level — [`PacketBuffer`] always exposes the
//! full 1518-byte backing storage; callers track their own valid-length
//! prefix via [`PacketBuffer::set_len`]/[`PacketBuffer::as_slice`], and
//! [`Pool::release`] resets the length before the buffer goes back on the
//! free list.

use std::sync::Mutex;

use crate::MAX_PACKET_SIZE;

/// An owned, fixed-capacity packet buffer.
///
/// Always backed by exactly [`MAX_PACKET_SIZE`] bytes. `len` tracks how much
/// of `data` is valid; the rest is uninitialized-but-zeroed slack.
pub struct PacketBuffer {
    data: Box<[u8; MAX_PACKET_SIZE]>,
    len: usize,
}

impl PacketBuffer {
    fn new() -> Self {
        Self {
            data: Box::new([0u8; MAX_PACKET_SIZE]),
            len: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// The full backing storage, for readers that need to fill the buffer
    /// before knowing how many bytes were actually read.
    pub fn full_capacity_mut(&mut self) -> &mut [u8; MAX_PACKET_SIZE] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        MAX_PACKET_SIZE
    }

    /// Sets the valid-length prefix. `n` must not exceed [`MAX_PACKET_SIZE`];
    /// callers that read it via a syscall already know this from the return
    /// value, so this only asserts rather than returning a `Result`.
    pub fn set_len(&mut self, n: usize) {
        assert!(n <= MAX_PACKET_SIZE, "packet buffer overflow: {n}");
        self.len = n;
    }

    /// Fills the buffer from a byte slice no longer than [`MAX_PACKET_SIZE`].
    pub fn copy_from(&mut self, src: &[u8]) {
        assert!(src.len() <= MAX_PACKET_SIZE, "packet buffer overflow: {}", src.len());
        self.data[..src.len()].copy_from_slice(src);
        self.len = src.len();
    }
}

/// A free-list of [`PacketBuffer`]s, avoiding a fresh allocation on every
/// packet. Buffers not currently checked out live at full capacity with
/// `len == 0`; [`Pool::acquire`] hands one out, the caller sets its length,
/// and [`Pool::release`] resets it and returns it to the list.
pub struct Pool {
    free: Mutex<Vec<PacketBuffer>>,
}

impl Pool {
    pub fn new(initial: usize) -> Self {
        let free = (0..initial).map(|_| PacketBuffer::new()).collect();
        Self {
            free: Mutex::new(free),
        }
    }

    /// Returns a buffer from the free list, or a freshly allocated one if
    /// the list is empty.
    pub fn acquire(&self) -> PacketBuffer {
        self.free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(PacketBuffer::new)
    }

    /// Resets the buffer to full capacity and returns it to the free list.
    pub fn release(&self, mut buf: PacketBuffer) {
        buf.len = 0;
        self.free.lock().unwrap_or_else(|e| e.into_inner()).push(buf);
    }

    pub fn len(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_starts_empty_at_full_capacity() {
        let pool = Pool::new(1);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), MAX_PACKET_SIZE);
    }

    #[test]
    fn release_resets_length_even_after_a_resliced_view() {
        let pool = Pool::new(1);
        let mut buf = pool.acquire();
        buf.copy_from(&[1, 2, 3]);
        assert_eq!(buf.len(), 3);

        pool.release(buf);
        let recycled = pool.acquire();
        assert_eq!(recycled.len(), 0);
        assert_eq!(recycled.capacity(), MAX_PACKET_SIZE);
    }

    #[test]
    fn pool_reuses_released_buffers_instead_of_allocating() {
        let pool = Pool::new(1);
        assert_eq!(pool.len(), 1);
        let buf = pool.acquire();
        assert_eq!(pool.len(), 0);
        pool.release(buf);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn acquire_on_empty_pool_allocates_fresh() {
        let pool = Pool::new(0);
        let buf = pool.acquire();
        assert_eq!(buf.capacity(), MAX_PACKET_SIZE);
    }
}
