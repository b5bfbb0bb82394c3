//! Periodic Timer List
//!
//! A generic scheduling helper: a set of `(start, period)` timers and the
//! minimum time until any of them next fires, usable as a single wait
//! timeout by any polling loop. Timers are created once at setup, queried
//! repeatedly and never mutated.

use std::time::{Duration, Instant};

/// A fixed-period timer anchored at its creation time.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    start: Instant,
    period: Duration,
}

impl PeriodicTimer {
    pub fn new(period: Duration) -> Self {
        PeriodicTimer {
            start: Instant::now(),
            period,
        }
    }

    #[cfg(test)]
    fn anchored_at(start: Instant, period: Duration) -> Self {
        PeriodicTimer { start, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Remaining time until the next firing, modulo the period.
    ///
    /// Always in `(0, period]`: missed firings are not counted and the
    /// result is never negative. A zero-period timer reports zero.
    pub fn time_to_next_firing(&self) -> Duration {
        let period_us = self.period.as_micros();
        if period_us == 0 {
            return Duration::ZERO;
        }
        let elapsed_us = self.start.elapsed().as_micros();
        let remaining = period_us - (elapsed_us % period_us);
        Duration::from_micros(remaining as u64)
    }
}

/// Opaque handle for removing a timer from a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(usize);

/// A flat list of periodic timers. Add is O(1); remove is O(n) by id.
#[derive(Debug, Default)]
pub struct TimerList {
    timers: Vec<(TimerId, PeriodicTimer)>,
    next_id: usize,
}

impl TimerList {
    pub fn new() -> Self {
        TimerList::default()
    }

    pub fn add(&mut self, timer: PeriodicTimer) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push((id, timer));
        id
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|(tid, _)| *tid != id);
        self.timers.len() != before
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Minimum `time_to_next_firing` across all timers, or `None` when the
    /// list is empty.
    pub fn next_firing(&self) -> Option<Duration> {
        self.timers
            .iter()
            .map(|(_, timer)| timer.time_to_next_firing())
            .min()
    }
}
