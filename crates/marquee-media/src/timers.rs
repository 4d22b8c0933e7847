//! Controller-owned timers.
//!
//! Timers are plain deadlines checked by the event loop; nothing fires on its
//! own. Each kind exists at most once, rescheduling replaces the deadline.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Periodic position report while playing
    Tick,
    /// Periodic download buffering poll
    DownloadPoll,
    /// Deferred end-of-stream notification
    Eos,
    /// Trailing replay of a debounced seek
    SeekFlush,
    /// Deferred Ready to Null teardown
    ReadyTeardown,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Timers {
    timers: BTreeMap<TimerKind, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, kind: TimerKind, now: Instant, delay: Duration) {
        self.schedule_at(kind, now + delay);
    }

    pub fn schedule_at(&mut self, kind: TimerKind, deadline: Instant) {
        self.timers.insert(
            kind,
            Timer {
                deadline,
                period: None,
            },
        );
    }

    pub fn schedule_periodic(&mut self, kind: TimerKind, now: Instant, period: Duration) {
        self.timers.insert(
            kind,
            Timer {
                deadline: now + period,
                period: Some(period),
            },
        );
    }

    /// Returns whether the timer was active
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.timers.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.timers.get(&kind).map(|t| t.deadline)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Remove every timer whose deadline has passed, in deadline order.
    ///
    /// Periodic timers are re-armed one period after `now`, so a stalled loop
    /// does not fire a burst of catch-up ticks.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerKind)> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(kind, timer)| (timer.deadline, *kind))
            .collect();
        due.sort();

        for (_, kind) in &due {
            let rearm = self.timers.get(kind).and_then(|t| t.period);
            match rearm {
                Some(period) => {
                    if let Some(timer) = self.timers.get_mut(kind) {
                        timer.deadline = now + period.max(MIN_PERIOD);
                    }
                }
                None => {
                    self.timers.remove(kind);
                }
            }
        }

        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
