#![cfg_attr(not(any(test, feature = "std")), no_std)]

// TEAM_461: Shared primitives for pfs crates.
// Locks come from `spin`, collections from `hashbrown`, so every crate in the
// workspace stays usable on a bare-metal target without an OS.

extern crate alloc;

pub use spin::{Lazy, Once};
pub use spin::{Mutex, MutexGuard};
pub use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use hashbrown::{HashMap, HashSet};

/// Fixed-capacity circular buffer with independent read and write cursors.
///
/// `N` must be a power of two so that cursor arithmetic is a mask. One slot is
/// always left empty to tell "full" apart from "empty", so the buffer holds at
/// most `N - 1` items.
pub struct RingBuffer<T: Copy, const N: usize> {
    buffer: [T; N],
    /// Next slot to fill (producer side)
    write: usize,
    /// Next slot to drain (consumer side)
    read: usize,
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    const MASK: usize = {
        assert!(N >= 2 && N.is_power_of_two(), "RingBuffer size must be a power of two");
        N - 1
    };

    #[must_use]
    pub const fn new(fill: T) -> Self {
        let _ = Self::MASK;
        Self {
            buffer: [fill; N],
            write: 0,
            read: 0,
        }
    }

    /// Usable capacity (`N - 1`).
    pub const fn capacity(&self) -> usize {
        Self::MASK
    }

    /// Append an item. Returns false, leaving the buffer untouched, when full.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.buffer[self.write] = item;
        self.write = (self.write + 1) & Self::MASK;
        true
    }

    /// Remove the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.buffer[self.read];
        self.read = (self.read + 1) & Self::MASK;
        Some(item)
    }

    /// Oldest item without consuming it.
    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.buffer[self.read])
        }
    }

    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// True when advancing the write cursor would land on the read cursor.
    pub fn is_full(&self) -> bool {
        ((self.write + 1) & Self::MASK) == self.read
    }

    /// Number of buffered items: `(write - read) mod N`.
    pub fn len(&self) -> usize {
        self.write.wrapping_sub(self.read) & Self::MASK
    }

    /// Discard everything by resetting both cursors.
    pub fn clear(&mut self) {
        self.write = 0;
        self.read = 0;
    }

    pub fn write_cursor(&self) -> usize {
        self.write
    }

    pub fn read_cursor(&self) -> usize {
        self.read
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinlock_basic() {
        let lock = Mutex::new(42);
        {
            let mut guard = lock.lock();
            assert_eq!(*guard, 42);
            *guard = 43;
        }
        assert_eq!(*lock.lock(), 43);
    }

    #[test]
    fn test_spinlock_blocking() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let lock = Arc::new(Mutex::new(()));
        let lock_clone = lock.clone();
        let start = std::time::Instant::now();

        let h = thread::spawn(move || {
            let _g = lock_clone.lock();
            thread::sleep(Duration::from_millis(100));
        });

        thread::sleep(Duration::from_millis(10));
        let _g = lock.lock();
        assert!(start.elapsed() >= Duration::from_millis(100));

        h.join().unwrap();
    }

    #[test]
    fn test_ring_buffer_keeps_one_slot_free() {
        let mut rb = RingBuffer::<u8, 4>::new(0);
        assert!(rb.is_empty());
        assert_eq!(rb.capacity(), 3);

        assert!(rb.push(1));
        assert!(rb.push(2));
        assert!(rb.push(3));
        assert!(rb.is_full());
        assert!(!rb.push(4));
        assert_eq!(rb.len(), 3);

        assert_eq!(rb.pop(), Some(1));
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.pop(), Some(3));
        assert_eq!(rb.pop(), None);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_ring_buffer_wrap_around() {
        let mut rb = RingBuffer::<u8, 2>::new(0);
        assert!(rb.push(1));
        assert!(!rb.push(2));
        assert_eq!(rb.pop(), Some(1));
        assert!(rb.push(3));
        assert_eq!(rb.write_cursor(), 0);
        assert_eq!(rb.peek(), Some(3));
        assert_eq!(rb.pop(), Some(3));
        assert!(rb.is_empty());
    }

    #[test]
    fn test_ring_buffer_clear_resets_cursors() {
        let mut rb = RingBuffer::<u8, 8>::new(0);
        for b in 0..5 {
            rb.push(b);
        }
        rb.pop();
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.len(), 0);
        assert_eq!((rb.read_cursor(), rb.write_cursor()), (0, 0));
    }

    /// Interleave pushes and pops in a fixed pseudo-random pattern and check the
    /// count invariant after every step.
    #[test]
    fn test_ring_buffer_count_invariant_under_interleaving() {
        let mut rb = RingBuffer::<u8, 16>::new(0);
        let mut model = std::collections::VecDeque::new();
        let mut seed: u32 = 0x1234_5678;

        for step in 0..10_000u32 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            if (seed >> 16) % 3 != 0 {
                let byte = step as u8;
                if rb.push(byte) {
                    model.push_back(byte);
                } else {
                    assert_eq!(model.len(), 15);
                }
            } else {
                assert_eq!(rb.pop(), model.pop_front());
            }

            let expected = rb.write_cursor().wrapping_sub(rb.read_cursor()) % 16;
            assert_eq!(rb.len(), expected);
            assert_eq!(rb.len(), model.len());
            assert!(rb.len() <= 15);
            assert!(!(rb.is_full() && rb.is_empty()));
        }
    }

    #[test]
    fn test_hashmap_basic() {
        let mut map = HashMap::new();
        map.insert("/", 0);
        map.insert("/sd", 1);
        assert_eq!(map.get("/sd"), Some(&1));
        assert_eq!(map.get("/flash"), None);
    }
}
