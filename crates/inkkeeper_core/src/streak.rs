//! crates/inkkeeper_core/src/streak.rs
//!
//! Decides whether a reading streak survives the time since the last session.
//! The evaluator only picks the backend call; the backend applies it.

use chrono::{DateTime, Utc};

/// Hours after the last session before the streak is considered broken.
pub const DEFAULT_STREAK_WINDOW_HOURS: f64 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakAction {
    None,
    ConsumeFreeze,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakDecision {
    pub action: StreakAction,
    pub streak: u32,
}

/// Fractional hours between two instants, at millisecond precision.
pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}

pub fn evaluate_streak(
    last_session_at: Option<DateTime<Utc>>,
    current_streak: u32,
    freezes_available: u32,
    now: DateTime<Utc>,
) -> StreakDecision {
    evaluate_streak_with_window(
        last_session_at,
        current_streak,
        freezes_available,
        now,
        DEFAULT_STREAK_WINDOW_HOURS,
    )
}

/// Same as [`evaluate_streak`] with an explicit window. Exactly `window_hours` is
/// still within the window.
pub fn evaluate_streak_with_window(
    last_session_at: Option<DateTime<Utc>>,
    current_streak: u32,
    freezes_available: u32,
    now: DateTime<Utc>,
    window_hours: f64,
) -> StreakDecision {
    let keep = StreakDecision {
        action: StreakAction::None,
        streak: current_streak,
    };
    let Some(last) = last_session_at else {
        return keep;
    };
    if current_streak == 0 || hours_between(last, now) <= window_hours {
        return keep;
    }
    if freezes_available > 0 {
        StreakDecision {
            action: StreakAction::ConsumeFreeze,
            streak: current_streak,
        }
    } else {
        StreakDecision {
            action: StreakAction::Reset,
            streak: 0,
        }
    }
}
