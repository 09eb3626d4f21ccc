//! Bounded line buffer with drop-oldest overflow.
//!
//! Backed by a `HeapRb`. Once full, every insertion overwrites the oldest
//! element, so the buffer always holds the most recent `capacity` items in
//! arrival order. Not synchronized: only the owning sink task touches it.

use std::fmt;

use ringbuf::traits::{Consumer, Observer, RingBuffer as _};
use ringbuf::HeapRb;

/// Fixed-capacity FIFO that evicts its oldest element on overflow
pub struct RingBuffer<T> {
    inner: HeapRb<T>,
    evicted: u64,
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.inner.occupied_len())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted)
            .finish()
    }
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: HeapRb::new(capacity.max(1)),
            evicted: 0,
        }
    }

    /// Append an item, evicting the oldest one when full
    ///
    /// Returns true if an item was evicted.
    #[inline]
    pub fn add(&mut self, item: T) -> bool {
        let evicted = self.inner.push_overwrite(item).is_some();
        if evicted {
            self.evicted += 1;
        }
        evicted
    }

    /// True once capacity is reached, until the next drain
    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Total number of items evicted since creation
    #[inline]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Take every held item in arrival order, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        items.extend(self.inner.pop_iter());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_below_capacity_keeps_order() {
        let mut buf = RingBuffer::new(10);

        for n in 1..=10 {
            let expected: Vec<u8> = (0..n).collect();
            for item in &expected {
                buf.add(*item);
            }
            assert_eq!(buf.drain(), expected, "after adding {n} item(s)");
            assert!(buf.is_empty());
        }
        assert_eq!(buf.evicted(), 0);
    }

    #[test]
    fn test_drain_after_overflow_keeps_last_capacity_items() {
        let mut buf = RingBuffer::new(10);

        for n in 11..=30u8 {
            for item in 0..n {
                buf.add(item);
            }
            let expected: Vec<u8> = (n - 10..n).collect();
            assert_eq!(buf.drain(), expected, "after adding {n} item(s)");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_full_stays_full_until_drained() {
        let mut buf = RingBuffer::new(3);
        assert!(!buf.is_full());

        buf.add("a");
        buf.add("b");
        assert!(!buf.is_full());
        assert!(!buf.add("c"));
        assert!(buf.is_full());

        assert!(buf.add("d"));
        assert!(buf.is_full());
        assert_eq!(buf.evicted(), 1);

        assert_eq!(buf.drain(), vec!["b", "c", "d"]);
        assert!(!buf.is_full());
    }

    #[test]
    fn test_drain_empty_is_empty() {
        let mut buf: RingBuffer<u32> = RingBuffer::new(4);
        assert!(buf.drain().is_empty());
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.add(1);
        buf.add(2);
        assert_eq!(buf.drain(), vec![2]);
    }
}
