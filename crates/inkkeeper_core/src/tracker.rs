//! crates/inkkeeper_core/src/tracker.rs
//!
//! Counts active reading seconds. The host drives `tick()` once per second while the
//! timer runs; suspension is measured by wall-clock delta instead, so the count
//! survives a scheduler that stops firing while the app is in the background.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElapsedTimeTracker {
    accumulated_seconds: u64,
    is_running: bool,
    suspended_at: Option<DateTime<Utc>>,
}

impl ElapsedTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulated_seconds(&self) -> u64 {
        self.accumulated_seconds
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    pub fn start(&mut self) {
        self.is_running = true;
    }

    /// Stops counting. A pending suspension is dropped: paused time is not reading time.
    pub fn pause(&mut self) {
        self.is_running = false;
        self.suspended_at = None;
    }

    /// One second of foreground time. Ignored while paused or suspended.
    pub fn tick(&mut self) {
        if self.is_running && self.suspended_at.is_none() {
            self.accumulated_seconds += 1;
        }
    }

    pub fn on_suspend(&mut self, now: DateTime<Utc>) {
        if self.is_running && self.suspended_at.is_none() {
            self.suspended_at = Some(now);
        }
    }

    /// Credits the whole seconds spent suspended. Returns the seconds added.
    pub fn on_resume(&mut self, now: DateTime<Utc>) -> u64 {
        let Some(since) = self.suspended_at.take() else {
            return 0;
        };
        if !self.is_running {
            return 0;
        }
        // Clock skew can make the gap negative; that credits nothing.
        let delta = (now - since).num_seconds().max(0) as u64;
        self.accumulated_seconds += delta;
        delta
    }

    /// Throws away everything counted so far and stops the timer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
