//! Deterministic timers for the capture pipeline.
//!
//! The controller never reads a clock. It emits timer effects, and the host
//! interprets them against this queue: schedule delivers an event after a
//! simulated delay, and `advance` moves time forward and drains whatever
//! came due. Unit tests and the scenario harness step time explicitly, so
//! stall and backoff behavior is reproducible without real timers. Dropping
//! the queue drops every pending callback with it.

use std::time::Duration;

pub type TimerId = u64;

#[derive(Debug)]
struct Entry<E> {
    id: TimerId,
    deadline: Duration,
    /// Insertion order, to break deadline ties deterministically.
    seq: u64,
    event: E,
}

#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_id: TimerId,
    next_seq: u64,
    entries: Vec<Entry<E>>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 1,
            next_seq: 0,
            entries: Vec::new(),
        }
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time elapsed since the queue was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver `event` once `delay` has elapsed from now.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            id,
            deadline: self.now.saturating_add(delay),
            seq,
            event,
        });
        id
    }

    /// Drop a pending timer. Returns false when it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Deadline of the soonest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|entry| entry.deadline).min()
    }

    /// Move time forward by `dt` and return every event that came due, in
    /// deadline order (insertion order on ties).
    pub fn advance(&mut self, dt: Duration) -> Vec<E> {
        self.now = self.now.saturating_add(dt);
        let now = self.now;
        let mut due: Vec<Entry<E>> = Vec::new();
        let mut pending: Vec<Entry<E>> = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.deadline <= now {
                due.push(entry);
            } else {
                pending.push(entry);
            }
        }
        self.entries = pending;
        due.sort_by_key(|entry| (entry.deadline, entry.seq));
        due.into_iter().map(|entry| entry.event).collect()
    }

    /// Jump straight to the next deadline and drain it. Returns an empty
    /// vector when nothing is pending.
    pub fn advance_to_next(&mut self) -> Vec<E> {
        match self.next_deadline() {
            Some(deadline) => {
                let dt = deadline.saturating_sub(self.now);
                self.advance(dt)
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_secs(3), "late");
        timers.schedule(Duration::from_secs(1), "early");
        timers.schedule(Duration::from_secs(2), "middle");

        assert_eq!(timers.advance(Duration::from_secs(5)), vec![
            "early", "middle", "late"
        ]);
        assert!(timers.is_empty());
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_secs(1), "first");
        timers.schedule(Duration::from_secs(1), "second");
        assert_eq!(timers.advance(Duration::from_secs(1)), vec![
            "first", "second"
        ]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(Duration::from_secs(1), "cancelled");
        timers.schedule(Duration::from_secs(2), "kept");

        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.advance(Duration::from_secs(3)), vec!["kept"]);
    }

    #[test]
    fn advance_to_next_jumps_exactly_to_the_deadline() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_secs(7), "due");
        timers.schedule(Duration::from_secs(9), "later");

        assert_eq!(timers.advance_to_next(), vec!["due"]);
        assert_eq!(timers.now(), Duration::from_secs(7));
        assert_eq!(timers.advance_to_next(), vec!["later"]);
        assert_eq!(timers.now(), Duration::from_secs(9));
        assert!(timers.advance_to_next().is_empty());
    }

    #[test]
    fn partial_advance_leaves_the_rest_pending() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_secs(1), "now");
        timers.schedule(Duration::from_secs(10), "later");

        assert_eq!(timers.advance(Duration::from_secs(1)), vec!["now"]);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(10)));
    }
}
