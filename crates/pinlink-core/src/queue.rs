use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Thread-safe FIFO with a fixed capacity and drop-oldest admission.
///
/// Fresh event data matters more than complete event data here: when the
/// queue is full, `put` evicts the oldest buffered element to make room for
/// the new one. Evicted elements are dropped right there; they are never
/// handed to a consumer.
pub struct EventQueue<E> {
    elements: Mutex<VecDeque<E>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<E> EventQueue<E> {
    /// Create a queue holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            elements: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Insert an element, evicting the oldest one first when at capacity.
    /// Wakes one blocked consumer.
    pub fn put(&self, elem: E) {
        let mut elements = self.elements.lock();
        if elements.len() == self.capacity {
            let _dropped = elements.pop_front();
            tracing::trace!(capacity = self.capacity, "queue full, evicting oldest element");
        }
        elements.push_back(elem);
        drop(elements);
        self.not_empty.notify_one();
    }

    /// Remove and return the oldest element, blocking until one is present.
    pub fn wait_for_next(&self) -> E {
        let mut elements = self.elements.lock();
        loop {
            if let Some(elem) = elements.pop_front() {
                return elem;
            }
            self.not_empty.wait(&mut elements);
        }
    }

    /// Empty the queue, invoking `disposer` on every remaining element.
    pub fn drain_and_dispose(&self, mut disposer: impl FnMut(E)) {
        let mut elements = self.elements.lock();
        while let Some(elem) = elements.pop_front() {
            disposer(elem);
        }
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    /// True when no elements are buffered.
    pub fn is_empty(&self) -> bool {
        self.elements.lock().is_empty()
    }

    /// The fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
