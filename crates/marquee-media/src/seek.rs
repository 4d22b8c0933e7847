//! Seek debouncing and playback direction.
//!
//! A debounce window opens whenever a seek is handed to the pipeline and
//! whenever the pipeline reports that a seek (or preroll) completed. Inside
//! the window inaccurate seeks are parked as a single pending request, later
//! requests overwriting earlier ones. The pending request is replayed as soon
//! as the in-flight seek completes, or by a trailing flush once the window
//! has elapsed with nothing in flight.

use crate::pipeline::{SeekCommand, SeekFlags};
use std::time::{Duration, Instant};
use tracing::debug;

pub const FORWARD_RATE: f64 = 1.0;
pub const REVERSE_RATE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekRequest {
    pub time_ms: u64,
    pub accurate: bool,
    pub issued_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    /// Issue the seek now
    Execute(SeekRequest),
    /// Parked as the pending request; flush no earlier than `flush_at`
    Deferred { flush_at: Instant },
}

#[derive(Debug)]
pub struct SeekCoordinator {
    window: Duration,
    window_opened: Option<Instant>,
    pending: Option<SeekRequest>,
    in_flight: Option<u64>,
    rate: f64,
}

impl SeekCoordinator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_opened: None,
            pending: None,
            in_flight: None,
            rate: FORWARD_RATE,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.window_opened {
            Some(opened) => now <= opened + self.window,
            None => false,
        }
    }

    pub fn request(&mut self, time_ms: u64, accurate: bool, now: Instant) -> SeekDecision {
        let request = SeekRequest {
            time_ms,
            accurate,
            issued_at: now,
        };

        let window_opened = self.window_opened;
        match window_opened {
            Some(opened) if !accurate && self.window_open(now) => {
                if let Some(previous) = self.pending.replace(request) {
                    debug!(
                        "Replacing pending seek to {} ms with {} ms",
                        previous.time_ms, time_ms
                    );
                }
                SeekDecision::Deferred {
                    flush_at: opened + self.window,
                }
            }
            _ => {
                self.pending = None;
                self.window_opened = Some(now);
                SeekDecision::Execute(request)
            }
        }
    }

    /// The pipeline accepted `request`
    pub fn issued(&mut self, request: &SeekRequest) {
        self.in_flight = Some(request.time_ms);
    }

    /// The pipeline finished a seek or preroll; returns the request to replay
    pub fn complete(&mut self, now: Instant) -> Option<SeekRequest> {
        self.window_opened = Some(now);
        let in_flight = self.in_flight.take();
        let pending = self.pending.take()?;

        if in_flight == Some(pending.time_ms) {
            debug!("Dropping pending seek to {} ms, already there", pending.time_ms);
            return None;
        }
        Some(pending)
    }

    /// Trailing flush; `None` while a seek is in flight or the window is open
    pub fn flush_due(&mut self, now: Instant) -> Option<SeekRequest> {
        if self.in_flight.is_some() || self.window_open(now) {
            return None;
        }
        self.pending.take()
    }

    /// When the pending request may be flushed
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.pending?;
        self.window_opened.map(|opened| opened + self.window)
    }

    pub fn pending(&self) -> Option<&SeekRequest> {
        self.pending.as_ref()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_forward(&self) -> bool {
        self.rate > 0.0
    }

    /// Seek that flips direction around `position_ms`, `None` if no change
    pub fn direction_command(&self, forward: bool, position_ms: u64) -> Option<SeekCommand> {
        if self.is_forward() == forward {
            return None;
        }
        let command = if forward {
            SeekCommand {
                rate: FORWARD_RATE,
                start: Some(position_ms),
                stop: None,
                flags: SeekFlags::flush_accurate(),
            }
        } else {
            SeekCommand {
                rate: REVERSE_RATE,
                start: Some(0),
                stop: Some(position_ms),
                flags: SeekFlags::flush_accurate(),
            }
        };
        Some(command)
    }

    pub fn set_direction(&mut self, forward: bool) {
        self.rate = if forward { FORWARD_RATE } else { REVERSE_RATE };
    }

    /// Forward flushing seek for `request`
    pub fn seek_command(request: &SeekRequest) -> SeekCommand {
        SeekCommand {
            rate: FORWARD_RATE,
            start: Some(request.time_ms),
            stop: None,
            flags: if request.accurate {
                SeekFlags::flush_accurate()
            } else {
                SeekFlags::flush_key_unit()
            },
        }
    }

    pub fn reset(&mut self) {
        self.window_opened = None;
        self.pending = None;
        self.in_flight = None;
        self.rate = FORWARD_RATE;
    }
}
