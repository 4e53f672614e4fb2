//! crates/inkkeeper_core/src/home.rs
//!
//! The home screen refresh. The UI calls `refresh` whenever the screen becomes
//! visible; that is also when streak maintenance runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::companion::{is_faint, project_companion_with, CompanionView, StageTable, DEFAULT_FAINT_AFTER_HOURS};
use crate::domain::{Book, SessionContext};
use crate::ports::{BackendService, PortError, PortResult};
use crate::streak::{evaluate_streak_with_window, StreakAction, DEFAULT_STREAK_WINDOW_HOURS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeRules {
    pub streak_window_hours: f64,
    pub faint_after_hours: f64,
}

impl Default for HomeRules {
    fn default() -> Self {
        Self {
            streak_window_hours: DEFAULT_STREAK_WINDOW_HOURS,
            faint_after_hours: DEFAULT_FAINT_AFTER_HOURS,
        }
    }
}

/// Something the user should be told about their streak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreakNotice {
    FreezeConsumed { freezes_remaining: u32 },
    Broken { previous_streak: u32 },
    /// The freeze call failed; the streak is shown unchanged.
    FreezeFailed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanionSummary {
    pub name: String,
    pub species: String,
    pub xp: u32,
    pub view: CompanionView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomeSnapshot {
    pub ink_drops: u32,
    pub current_streak: u32,
    pub freezes_available: u32,
    pub is_faint: bool,
    pub companion: Option<CompanionSummary>,
    pub active_book: Option<Book>,
    pub notice: Option<StreakNotice>,
}

pub struct HomeService {
    backend: Arc<dyn BackendService>,
    rules: HomeRules,
}

impl HomeService {
    pub fn new(backend: Arc<dyn BackendService>, rules: HomeRules) -> Self {
        Self { backend, rules }
    }

    /// Loads the screen, then runs streak maintenance.
    ///
    /// Every read happens before the streak call, so a failed read never discards a
    /// reset or freeze the backend has already applied. A book or companion that no
    /// longer exists shows as `None`.
    pub async fn refresh(&self, ctx: &SessionContext, now: DateTime<Utc>) -> PortResult<HomeSnapshot> {
        let profile = self.backend.fetch_profile(ctx.user_id).await?;

        let companion = match profile.active_companion_id {
            Some(id) => optional(self.backend.fetch_companion(id).await, "companion", ctx)?,
            None => None,
        };
        let active_book = match profile.active_book_id {
            Some(id) => optional(self.backend.fetch_book(id).await, "book", ctx)?,
            None => None,
        };

        let decision = evaluate_streak_with_window(
            profile.last_session_at,
            profile.current_streak,
            profile.streak_freezes_available,
            now,
            self.rules.streak_window_hours,
        );

        let mut current_streak = profile.current_streak;
        let mut freezes_available = profile.streak_freezes_available;
        let notice = match decision.action {
            StreakAction::None => None,
            StreakAction::ConsumeFreeze => match self.backend.use_streak_freeze(ctx.user_id).await {
                Ok(outcome) if outcome.success => {
                    info!("Streak for user {} saved with a freeze", ctx.user_id);
                    freezes_available = outcome.freezes_remaining;
                    Some(StreakNotice::FreezeConsumed {
                        freezes_remaining: outcome.freezes_remaining,
                    })
                }
                Ok(_) => {
                    warn!("Backend declined the streak freeze for user {}", ctx.user_id);
                    Some(StreakNotice::FreezeFailed {
                        message: "Could not use streak freeze.".to_string(),
                    })
                }
                Err(e) => {
                    error!("use_streak_freeze failed for user {}: {}", ctx.user_id, e);
                    Some(StreakNotice::FreezeFailed { message: e.to_string() })
                }
            },
            // A failed reset changed nothing, so the next refresh tries again.
            StreakAction::Reset => {
                self.backend.reset_broken_streak(ctx.user_id).await?;
                info!(
                    "Streak of {} for user {} reset",
                    profile.current_streak, ctx.user_id
                );
                current_streak = decision.streak;
                Some(StreakNotice::Broken {
                    previous_streak: profile.current_streak,
                })
            }
        };

        let companion = companion.map(|companion| {
            let table = StageTable::for_species(&companion.species);
            let view = project_companion_with(
                companion.xp,
                profile.last_session_at,
                now,
                &table,
                self.rules.faint_after_hours,
            );
            CompanionSummary {
                name: companion.display_name().to_string(),
                species: companion.species.clone(),
                xp: companion.xp,
                view,
            }
        });

        Ok(HomeSnapshot {
            ink_drops: profile.ink_drops,
            current_streak,
            freezes_available,
            is_faint: is_faint(profile.last_session_at, now, self.rules.faint_after_hours),
            companion,
            active_book,
            notice,
        })
    }
}

/// A row the profile points at but the backend no longer has.
fn optional<T>(result: PortResult<T>, what: &str, ctx: &SessionContext) -> PortResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PortError::NotFound(msg)) => {
            warn!("Active {} of user {} is gone: {}", what, ctx.user_id, msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
