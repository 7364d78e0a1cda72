//! Payload event queue.
//!
//! Holds payloads that become due at a given simulated time. Rather than
//! decrementing a remaining delay on every entry, each payload is stamped with
//! its absolute due time plus a monotonically increasing sequence number, so
//! payloads due at the same instant drain in the order they were notified.

use crate::common::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Timed<T> {
    at: SimTime,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Timed<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl<T> Eq for Timed<T> {}

impl<T> Ord for Timed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl<T> PartialOrd for Timed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered queue of pending payloads.
pub struct PayloadEventQueue<T> {
    name: &'static str,
    heap: BinaryHeap<Timed<T>>,
    seq: u64,
}

impl<T> PayloadEventQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Schedules `payload` to become due at `now + delay`.
    pub fn notify(&mut self, payload: T, now: SimTime, delay: SimTime) {
        self.heap.push(Timed {
            at: now + delay,
            seq: self.seq,
            payload,
        });
        self.seq += 1;
    }

    /// Due time of the earliest payload.
    pub fn next_due(&self) -> Option<SimTime> {
        self.heap.peek().map(|t| t.at)
    }

    /// Pops the earliest payload if it is due at or before `now`.
    pub fn pop_due(&mut self, now: SimTime) -> Option<T> {
        match self.heap.peek() {
            Some(t) if t.at <= now => self.heap.pop().map(|t| t.payload),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
