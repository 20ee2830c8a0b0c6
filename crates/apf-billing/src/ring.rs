//! Fixed-capacity append-only log with drop-oldest eviction.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct BoundedLog<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an entry, evicting the oldest ones past capacity. Never fails.
    pub fn push(&self, entry: T) {
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> BoundedLog<T> {
    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_past_capacity() {
        let log = BoundedLog::new(3);
        for i in 0..10 {
            log.push(i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.recent(10), vec![7, 8, 9]);
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let log = BoundedLog::new(100);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.recent(2), vec![3, 4]);
        assert!(BoundedLog::<u8>::new(1).is_empty());
    }
}
