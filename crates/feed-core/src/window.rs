//! Fixed-size window of the most recent messages.

use std::collections::VecDeque;
use std::collections::vec_deque;
use std::num::NonZeroUsize;

/// Number of messages kept on screen by default.
pub const DEFAULT_WINDOW_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// FIFO that keeps the last `capacity` items, oldest first.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: NonZeroUsize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Appends `item`, returning the evicted oldest item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity.get() {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Current items in display order (oldest first).
    pub fn contents(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Copies the current items in display order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for RollingWindow<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
