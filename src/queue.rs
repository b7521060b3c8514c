// ABOUTME: FIFO event queue shared between the command path and the message pipeline
// ABOUTME: Safe for one concurrent producer and one concurrent consumer without external locking

use std::collections::VecDeque;
use std::sync::Mutex;

/// A FIFO queue safe for one concurrent producer and one concurrent consumer.
///
/// The command engine pushes notifications into one of these while any
/// command is in flight; `next_message` pops from it on whatever task the
/// application runs. The `ping`/`fetch` flags on `next_message` are an I/O
/// optimization, not a correctness requirement — this queue is what makes an
/// external polling loop and direct application calls safe to mix.
#[derive(Debug, Default)]
pub struct EventQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        EventQueue {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event. Arrival order is preserved.
    pub fn push(&self, event: T) {
        self.inner.lock().unwrap().push_back(event);
    }

    /// Remove and return the oldest event, if any.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_arrival_order() {
        let q = EventQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }
}
