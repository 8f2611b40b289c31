//! Two-slot coalescing queue.
//!
//! Keeps the oldest pending entry and the most recent one. Anything enqueued
//! in between is displaced, so memory stays O(1) no matter how often the
//! producer fires while the consumer is busy.

/// FIFO by slot with capacity 2.
///
/// Invariant: `tail` is only occupied while `head` is.
#[derive(Debug)]
pub struct BoundedCoalescingQueue<T> {
    head: Option<T>,
    tail: Option<T>,
}

impl<T> Default for BoundedCoalescingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BoundedCoalescingQueue<T> {
    pub const CAPACITY: usize = 2;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    /// Insert `item`. When both slots are occupied the second slot is
    /// overwritten and its previous occupant is returned.
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        if self.head.is_none() {
            self.head = Some(item);
            None
        } else {
            self.tail.replace(item)
        }
    }

    /// Remove and return the oldest entry. An empty queue yields `None`.
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.head.take();
        self.head = self.tail.take();
        item
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.head.is_some()) + usize::from(self.tail.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}
