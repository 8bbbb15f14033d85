// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use crate::errors::RingBufferError;

/// Fixed-capacity circular history with offset-based lookback.
///
/// New values enter at the head. Once the buffer holds `capacity` values,
/// every push evicts the oldest one. Lookup is relative to the head:
/// offset 0 is the most recent value, offset `occupancy() - 1` the oldest
/// one still retained.
///
/// The same type backs pipeline edges and the temporal windows that some
/// processes keep for themselves (N-frame differencing, smoothing).
///
/// # Examples
/// ```
/// use framegraph::buffer::RingBuffer;
///
/// let mut window = RingBuffer::new(3).unwrap();
/// for frame in 1..=5 {
///     window.push(frame);
/// }
///
/// assert_eq!(window.at(0), Ok(&5));
/// assert_eq!(window.at(2), Ok(&3));
/// assert!(window.at(3).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    // front = head (most recent)
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` values.
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        })
    }

    /// Append `value` at the head, returning the evicted oldest value when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_back()
        } else {
            None
        };
        self.items.push_front(value);
        evicted
    }

    /// Element `offset` positions behind the head.
    pub fn at(&self, offset: usize) -> Result<&T, RingBufferError> {
        self.items.get(offset).ok_or(RingBufferError::OutOfRange {
            offset,
            occupancy: self.items.len(),
        })
    }

    /// Number of values currently retained.
    pub fn occupancy(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Drop every retained value. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate from the most recent value to the oldest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = RingBuffer::<u32>::new(0);
        assert_eq!(result.unwrap_err(), RingBufferError::ZeroCapacity);
    }

    #[test]
    fn test_empty_buffer_has_no_valid_offset() {
        let buffer = RingBuffer::<u32>::new(4).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(
            buffer.at(0),
            Err(RingBufferError::OutOfRange {
                offset: 0,
                occupancy: 0
            })
        );
    }

    #[test]
    fn test_overflow_keeps_last_capacity_values_most_recent_first() {
        for capacity in 1..=6usize {
            for extra in 0..=4usize {
                let mut buffer = RingBuffer::new(capacity).unwrap();
                let total = capacity + extra;
                for value in 0..total {
                    buffer.push(value);
                }

                assert_eq!(buffer.occupancy(), capacity);
                for offset in 0..capacity {
                    assert_eq!(*buffer.at(offset).unwrap(), total - 1 - offset);
                }
                assert!(buffer.at(capacity).is_err());
            }
        }
    }

    #[test]
    fn test_partial_fill_reports_occupancy_not_capacity() {
        let mut buffer = RingBuffer::new(5).unwrap();
        buffer.push("a");
        buffer.push("b");

        assert_eq!(buffer.occupancy(), 2);
        assert_eq!(buffer.capacity(), 5);
        assert!(!buffer.is_full());
        assert_eq!(buffer.at(1), Ok(&"a"));
        assert!(matches!(
            buffer.at(2),
            Err(RingBufferError::OutOfRange { offset: 2, occupancy: 2 })
        ));
    }

    #[test]
    fn test_push_returns_evicted_value() {
        let mut buffer = RingBuffer::new(2).unwrap();
        assert_eq!(buffer.push(10), None);
        assert_eq!(buffer.push(20), None);
        assert_eq!(buffer.push(30), Some(10));
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![30, 20]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = RingBuffer::new(3).unwrap();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);
        buffer.push(7);
        assert_eq!(buffer.at(0), Ok(&7));
    }
}
