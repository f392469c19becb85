//! # Tick-Driven Timers
//!
//! Deferred and periodic work as plain records advanced by the frame tick.
//!
//! ## Design
//!
//! Nothing here sleeps or spawns. The game loop owns a [`GameClock`],
//! advances it once per frame, and hands `now` to every component. Each
//! component polls its own [`Interval`]s and drains its own [`TimerQueue`].
//!
//! A fired timer only carries data. Whoever drains it must re-check that
//! the thing it refers to still exists and is still in the expected state,
//! because any number of other callbacks ran since it was scheduled.
//! Cancellation is soft: cancelled ids are skipped when they come due.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Largest frame step accepted by [`GameClock::advance`].
///
/// Clamps hitches (debugger pauses, window drags) so timers don't fire in a burst.
pub const MAX_FRAME_STEP: Duration = Duration::from_millis(100);

/// Monotonic game time, advanced explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameClock {
    /// Time since the clock started.
    now: Duration,
    /// Frames advanced.
    frame: u64,
}

impl GameClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
            frame: 0,
        }
    }

    /// Advances by `delta`, clamped to [`MAX_FRAME_STEP`]. Returns the new time.
    pub fn advance(&mut self, delta: Duration) -> Duration {
        self.now += delta.min(MAX_FRAME_STEP);
        self.frame += 1;
        self.now
    }

    /// Current game time.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Frames advanced so far.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

/// A periodic trigger.
///
/// Fires at most once per poll. If several periods were missed, the next
/// fire is rescheduled one period after `now` instead of catching up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    period: Duration,
    next_fire: Duration,
    fired: u64,
}

impl Interval {
    /// Creates an interval whose first fire is one period after `start`.
    #[must_use]
    pub fn new(period: Duration, start: Duration) -> Self {
        Self {
            period,
            next_fire: start + period,
            fired: 0,
        }
    }

    /// Creates an interval that fires on the first poll at or after `start`.
    #[must_use]
    pub const fn immediate(period: Duration, start: Duration) -> Self {
        Self {
            period,
            next_fire: start,
            fired: 0,
        }
    }

    /// Returns true if the interval is due, and schedules the next fire.
    pub fn poll(&mut self, now: Duration) -> bool {
        if now < self.next_fire {
            return false;
        }
        let next = self.next_fire + self.period;
        self.next_fire = if next > now { next } else { now + self.period };
        self.fired += 1;
        true
    }

    /// Changes the period. The pending fire moves so it is at most one new
    /// period away from `now`.
    pub fn set_period(&mut self, period: Duration, now: Duration) {
        self.period = period;
        self.next_fire = self.next_fire.min(now + period);
    }

    /// Current period.
    #[inline]
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Time of the next fire.
    #[inline]
    #[must_use]
    pub const fn next_fire(&self) -> Duration {
        self.next_fire
    }

    /// Number of times this interval fired.
    #[inline]
    #[must_use]
    pub const fn fired(&self) -> u64 {
        self.fired
    }
}

/// Identifier of a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw sequence number.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct Entry<T> {
    fire_at: Duration,
    id: TimerId,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed: BinaryHeap is a max-heap, we want the earliest fire first.
    // Ties fire in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Queue of one-shot deferred payloads.
pub struct TimerQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    cancelled: HashSet<TimerId>,
    next_id: u64,
}

impl<T> TimerQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    /// Schedules `payload` to come due at `fire_at`.
    pub fn schedule_at(&mut self, fire_at: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Entry { fire_at, id, payload });
        id
    }

    /// Schedules `payload` to come due `delay` after `now`.
    pub fn schedule_after(&mut self, now: Duration, delay: Duration, payload: T) -> TimerId {
        self.schedule_at(now + delay, payload)
    }

    /// Marks a timer so it is skipped when it comes due.
    ///
    /// Cancelling an id that already fired or was never issued is harmless.
    pub fn cancel(&mut self, id: TimerId) {
        if id.0 < self.next_id {
            self.cancelled.insert(id);
        }
    }

    /// Pops every payload due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<(TimerId, T)> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|entry| entry.fire_at <= now) {
            let Some(entry) = self.heap.pop() else {
                break;
            };
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            due.push((entry.id, entry.payload));
        }
        due
    }

    /// Fire time of the earliest pending timer, cancelled ones included.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|entry| entry.fire_at)
    }

    /// Timers still queued, cancelled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every pending timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TimerQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.heap.len())
            .field("cancelled", &self.cancelled.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_clock_clamps_hitches() {
        let mut clock = GameClock::new();
        clock.advance(ms(16));
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), ms(116));
        assert_eq!(clock.frame(), 2);
    }

    #[test]
    fn test_interval_fires_once_per_period() {
        let mut interval = Interval::new(ms(100), Duration::ZERO);
        assert!(!interval.poll(ms(50)));
        assert!(interval.poll(ms(100)));
        assert!(!interval.poll(ms(150)));
        assert!(interval.poll(ms(200)));
        assert_eq!(interval.fired(), 2);
    }

    #[test]
    fn test_interval_does_not_catch_up() {
        let mut interval = Interval::new(ms(100), Duration::ZERO);
        assert!(interval.poll(ms(1000)));
        assert!(!interval.poll(ms(1050)));
        assert_eq!(interval.next_fire(), ms(1100));
    }

    #[test]
    fn test_interval_set_period_pulls_next_fire_in() {
        let mut interval = Interval::new(ms(1000), Duration::ZERO);
        interval.set_period(ms(200), ms(100));
        assert_eq!(interval.next_fire(), ms(300));
        assert!(interval.poll(ms(300)));
    }

    #[test]
    fn test_immediate_interval() {
        let mut interval = Interval::immediate(ms(100), ms(40));
        assert!(interval.poll(ms(40)));
        assert!(!interval.poll(ms(100)));
    }

    #[test]
    fn test_timer_queue_orders_by_deadline() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(ms(30), "c");
        queue.schedule_at(ms(10), "a");
        queue.schedule_at(ms(10), "b");
        queue.schedule_at(ms(50), "late");

        let due: Vec<_> = queue.drain_due(ms(30)).into_iter().map(|(_, p)| p).collect();
        assert_eq!(due, vec!["a", "b", "c"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(ms(50)));
    }

    #[test]
    fn test_timer_queue_soft_cancel() {
        let mut queue = TimerQueue::new();
        let keep = queue.schedule_after(ms(0), ms(10), 1);
        let drop = queue.schedule_after(ms(0), ms(10), 2);
        queue.cancel(drop);

        let due = queue.drain_due(ms(10));
        assert_eq!(due, vec![(keep, 1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_unknown_id_is_harmless() {
        let mut queue: TimerQueue<u8> = TimerQueue::new();
        queue.cancel(TimerId(42));
        queue.schedule_at(ms(1), 7);
        assert_eq!(queue.drain_due(ms(1)).len(), 1);
    }
}
