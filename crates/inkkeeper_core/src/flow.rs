//! crates/inkkeeper_core/src/flow.rs
//!
//! The state of one reading screen: the running timer, the reflection form, and the
//! in-flight submission. Owns the screen's `ElapsedTimeTracker` exclusively.

use chrono::{DateTime, Utc};

use crate::tracker::ElapsedTimeTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Timer,
    Reflection,
    Submitting,
    Done,
}

/// What the screen should do when the user presses back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// The reflection form closed; the timer is shown again.
    ReturnToTimer,
    /// Unsubmitted time would be lost; ask before leaving.
    ConfirmDiscard,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("the timer can only be controlled before the session is finished")]
    TimerLocked,
    #[error("a session can only be submitted from the reflection step")]
    NotReadyToSubmit,
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("there is no pending discard to confirm")]
    NothingToDiscard,
}

#[derive(Debug, Clone)]
pub struct ReadingFlow {
    tracker: ElapsedTimeTracker,
    stage: FlowStage,
    discard_pending: bool,
}

impl Default for ReadingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingFlow {
    pub fn new() -> Self {
        Self {
            tracker: ElapsedTimeTracker::new(),
            stage: FlowStage::Timer,
            discard_pending: false,
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.tracker.accumulated_seconds()
    }

    pub fn is_running(&self) -> bool {
        self.tracker.is_running()
    }

    pub fn is_submitting(&self) -> bool {
        self.stage == FlowStage::Submitting
    }

    fn ensure_timer(&self) -> Result<(), FlowError> {
        if self.stage == FlowStage::Timer {
            Ok(())
        } else {
            Err(FlowError::TimerLocked)
        }
    }

    pub fn start(&mut self) -> Result<(), FlowError> {
        self.ensure_timer()?;
        self.discard_pending = false;
        self.tracker.start();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), FlowError> {
        self.ensure_timer()?;
        self.tracker.pause();
        Ok(())
    }

    /// Returns the elapsed seconds after the tick.
    pub fn tick(&mut self) -> u64 {
        if self.stage == FlowStage::Timer {
            self.tracker.tick();
        }
        self.tracker.accumulated_seconds()
    }

    pub fn suspend(&mut self, now: DateTime<Utc>) {
        self.tracker.on_suspend(now);
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> u64 {
        self.tracker.on_resume(now)
    }

    /// Stops the timer and opens the reflection step.
    pub fn stop(&mut self) -> Result<(), FlowError> {
        self.ensure_timer()?;
        self.tracker.pause();
        self.discard_pending = false;
        self.stage = FlowStage::Reflection;
        Ok(())
    }

    pub fn back(&mut self) -> BackOutcome {
        match self.stage {
            FlowStage::Reflection => {
                self.stage = FlowStage::Timer;
                BackOutcome::ReturnToTimer
            }
            FlowStage::Timer if self.tracker.accumulated_seconds() > 0 => {
                self.discard_pending = true;
                BackOutcome::ConfirmDiscard
            }
            // An in-flight call is never cancelled; leaving just stops watching it.
            _ => BackOutcome::Leave,
        }
    }

    /// Discards the unsubmitted time after the user confirmed it.
    pub fn confirm_discard(&mut self) -> Result<(), FlowError> {
        if !self.discard_pending {
            return Err(FlowError::NothingToDiscard);
        }
        self.tracker.reset();
        self.discard_pending = false;
        self.stage = FlowStage::Done;
        Ok(())
    }

    /// Locks the flow for submission and returns the seconds to submit.
    pub fn begin_submit(&mut self) -> Result<u64, FlowError> {
        match self.stage {
            FlowStage::Reflection => {
                self.stage = FlowStage::Submitting;
                Ok(self.tracker.accumulated_seconds())
            }
            FlowStage::Submitting => Err(FlowError::AlreadySubmitting),
            _ => Err(FlowError::NotReadyToSubmit),
        }
    }

    /// The submission was rejected; the form is editable again.
    pub fn submit_failed(&mut self) {
        if self.stage == FlowStage::Submitting {
            self.stage = FlowStage::Reflection;
        }
    }

    pub fn submit_succeeded(&mut self) {
        if self.stage == FlowStage::Submitting {
            self.stage = FlowStage::Done;
        }
    }
}
