use std::borrow::Borrow;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded memory of recently processed keys.
///
/// Eviction is strict FIFO: recording a key that is already present neither
/// duplicates it nor refreshes its position.
#[derive(Debug, Clone)]
pub struct DedupCache<K> {
    entries: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq> DedupCache<K> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn seen<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().any(|entry| entry.borrow() == key)
    }

    /// Returns `false` when the key was already present.
    pub fn record(&mut self, key: K) -> bool {
        if self.seen(&key) {
            return false;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K: Eq> Default for DedupCache<K> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
