use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/*
Sample-Accurate Event Scheduler
===============================

Control-plane requests (note triggers, envelope releases, parameter jumps)
arrive asynchronously, often long before the sample they should land on.
Each scheduling owner keeps one of these queues and polls it from inside
its produce path, so an event takes effect exactly at the sample it was
scheduled for regardless of when or from where it was submitted.

Ordering is a min-priority queue keyed by (timestamp, insertion index).
The insertion index breaks ties: two events scheduled for the same sample
fire in the order they were submitted. Without it a binary heap reorders
equal keys arbitrarily, which makes event application nondeterministic —
unacceptable when the events are "set frequency" then "start envelope".

Payloads are a caller-chosen event type processed by the owning object,
rather than a bare callback with an untyped pointer argument.
*/

struct Entry<E> {
    due: u64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Deferred-event queue ordered by (timestamp, submission order).
pub struct Scheduler<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    next_seq: u64,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queue `event` to fire once the owner's time reaches `due`. O(log n).
    ///
    /// Scheduling in the past is allowed; the event fires on the next run.
    pub fn schedule(&mut self, due: u64, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due, seq, event }));
    }

    /// Pop and apply every event with `due <= now`, in (due, submission)
    /// order. Returns how many fired.
    pub fn run(&mut self, now: u64, mut apply: impl FnMut(E)) -> usize {
        let mut fired = 0;
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.due <= now)
        {
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            apply(entry.event);
            fired += 1;
        }
        fired
    }

    /// Timestamp of the earliest pending event.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop all pending events without firing them.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
