use std::collections::VecDeque;

use serde::Serialize;

/// Fixed-capacity FIFO history; pushing onto a full buffer evicts the oldest entry
#[derive(Debug, Clone, Serialize)]
pub struct RingBuffer<T> {
    #[serde(skip)]
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, returning the evicted one if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Change the capacity, evicting oldest entries that no longer fit
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = RingBuffer::new(3);
        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert_eq!(buffer.push(3), None);
        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buffer.latest(), Some(&4));
        assert_eq!(buffer.oldest(), Some(&2));
    }

    #[test]
    fn test_zero_capacity_is_promoted() {
        let mut buffer = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest(), Some(&"b"));
    }

    #[test]
    fn test_shrinking_capacity_drops_oldest() {
        let mut buffer = RingBuffer::new(5);
        for i in 0..5 {
            buffer.push(i);
        }
        buffer.set_capacity(2);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(buffer.len(), buffer.capacity());
    }
}
