// WireSim - SPI Peripheral Simulation Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::VecDeque;

/// Bounded byte FIFO with oldest-eviction on overflow. Occupancy never
/// exceeds the capacity fixed at construction.
#[derive(Debug, serde::Serialize)]
pub struct ReceiveFifo {
    capacity: usize,
    entries: VecDeque<u8>,
}

impl ReceiveFifo {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: u8) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(value);
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut fifo = ReceiveFifo::new(4);
        fifo.push(1);
        fifo.push(2);
        fifo.push(3);
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.pop(), Some(1));
        assert_eq!(fifo.pop(), Some(2));
        assert_eq!(fifo.pop(), Some(3));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut fifo = ReceiveFifo::new(2);
        fifo.push(1);
        fifo.push(2);
        fifo.push(3);
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(), Some(2));
        assert_eq!(fifo.pop(), Some(3));
    }

    #[test]
    fn test_clear_empties_without_touching_capacity() {
        let mut fifo = ReceiveFifo::new(4);
        fifo.push(9);
        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.capacity(), 4);
    }
}
