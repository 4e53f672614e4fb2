//! crates/inkkeeper_core/src/submission.rs
//!
//! Turns a finished timer session into exactly one `log_session_atomic` call.
//!
//! Validation happens before anything leaves the process. Backend failures are
//! returned unmodified and never retried; the backend's transaction is the only
//! consistency guarantee, so nothing here tries to compensate a failed call.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Book, BookFormat, BookStatus, Reflection, SessionContext};
use crate::ports::{BackendService, LogSessionRequest, PortError};
use crate::rewards::{calculate_reward, reflection_length, Reward, RewardModel};

/// Sessions shorter than this are not submittable.
pub const DEFAULT_MIN_SESSION_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionRules {
    pub min_session_seconds: u32,
    pub reward_model: RewardModel,
}

impl Default for SubmissionRules {
    fn default() -> Self {
        Self {
            min_session_seconds: DEFAULT_MIN_SESSION_SECONDS,
            reward_model: RewardModel::TimeOnly,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Sessions must be at least {minimum} seconds to count (got {actual}).")]
    TooShort { minimum: u32, actual: u32 },
    #[error("End page {end} cannot be before start page {start}.")]
    EndBeforeStart { start: u32, end: u32 },
    #[error("Please enter the page you stopped on.")]
    MissingPages,
    /// No active book or companion; the caller should send the user to the library.
    #[error("{0}")]
    MissingPrerequisite(String),
    #[error("A session is already being saved.")]
    AlreadySubmitting,
    #[error(transparent)]
    Backend(#[from] PortError),
}

impl SubmissionError {
    /// True for errors the user fixes by editing the form.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SubmissionError::TooShort { .. }
                | SubmissionError::EndBeforeStart { .. }
                | SubmissionError::MissingPages
        )
    }
}

/// A completed session as entered on the reflection step.
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub book: Book,
    pub companion_id: Uuid,
    pub duration_seconds: u32,
    /// Defaults to the book's current unit.
    pub start_unit: Option<u32>,
    /// Page the reader stopped on; only meaningful for physical books.
    pub end_unit: Option<u32>,
    pub reflection: String,
    pub prompt: Option<String>,
    pub finished: bool,
}

/// What the user gets told after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub reward: Reward,
    pub units_read: u32,
    pub new_book_unit: u32,
    pub new_book_status: BookStatus,
}

/// Validates the draft and builds the backend call. Pure.
pub fn prepare_submission(
    ctx: &SessionContext,
    draft: &SessionDraft,
    rules: &SubmissionRules,
) -> Result<LogSessionRequest, SubmissionError> {
    if draft.duration_seconds < rules.min_session_seconds {
        return Err(SubmissionError::TooShort {
            minimum: rules.min_session_seconds,
            actual: draft.duration_seconds,
        });
    }

    let start = draft.start_unit.unwrap_or(draft.book.current_unit);
    let (units_read, mut new_unit) = match (draft.book.format, draft.end_unit) {
        (BookFormat::Physical, Some(end)) => {
            if end < start {
                return Err(SubmissionError::EndBeforeStart { start, end });
            }
            (end - start, end)
        }
        (BookFormat::Physical, None) if rules.reward_model == RewardModel::UnitBased => {
            return Err(SubmissionError::MissingPages);
        }
        // Time alone says nothing about pages; the bookmark stays put.
        (BookFormat::Physical, None) => (0, start),
        (BookFormat::Audio, _) => {
            let minutes = draft.duration_seconds / 60;
            (minutes, start.saturating_add(minutes))
        }
    };

    let status = if draft.finished {
        if let Some(total) = draft.book.total_units {
            new_unit = new_unit.max(total);
        }
        BookStatus::Finished
    } else {
        BookStatus::Active
    };

    let reward = calculate_reward(
        rules.reward_model,
        draft.duration_seconds,
        reflection_length(&draft.reflection),
        units_read,
    );

    Ok(LogSessionRequest {
        user_id: ctx.user_id,
        book_id: draft.book.id,
        companion_id: draft.companion_id,
        duration_seconds: draft.duration_seconds,
        units_read,
        reflection: Reflection {
            note: draft.reflection.clone(),
            prompt: draft.prompt.clone(),
        },
        ink_gained: reward.ink_gained,
        xp_gained: reward.xp_gained,
        new_book_unit: new_unit,
        new_book_status: status,
    })
}

/// Reflection-step input when the book and companion come from the profile.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessionInput {
    /// Overrides the profile's active book.
    pub book_id: Option<Uuid>,
    pub duration_seconds: u32,
    pub start_unit: Option<u32>,
    pub end_unit: Option<u32>,
    pub reflection: String,
    pub prompt: Option<String>,
    pub finished: bool,
}

/// Issues session submissions, at most one in flight per user.
pub struct SessionSubmitter {
    backend: Arc<dyn BackendService>,
    rules: SubmissionRules,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Held for the duration of one backend call.
struct InFlightPermit<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    user_id: Uuid,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|p| p.into_inner());
        set.remove(&self.user_id);
    }
}

impl SessionSubmitter {
    pub fn new(backend: Arc<dyn BackendService>, rules: SubmissionRules) -> Self {
        Self {
            backend,
            rules,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn rules(&self) -> &SubmissionRules {
        &self.rules
    }

    pub fn is_submitting(&self, user_id: Uuid) -> bool {
        let set = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        set.contains(&user_id)
    }

    fn acquire(&self, user_id: Uuid) -> Result<InFlightPermit<'_>, SubmissionError> {
        let mut set = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(user_id) {
            return Err(SubmissionError::AlreadySubmitting);
        }
        Ok(InFlightPermit {
            set: &self.in_flight,
            user_id,
        })
    }

    /// Validates and submits a draft with one atomic backend call.
    pub async fn submit(
        &self,
        ctx: &SessionContext,
        draft: SessionDraft,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let request = prepare_submission(ctx, &draft, &self.rules).map_err(|e| {
            warn!("Rejected session for book {}: {}", draft.book.id, e);
            e
        })?;
        let _permit = self.acquire(ctx.user_id)?;

        let receipt = SubmissionReceipt {
            reward: Reward {
                ink_gained: request.ink_gained,
                xp_gained: request.xp_gained,
            },
            units_read: request.units_read,
            new_book_unit: request.new_book_unit,
            new_book_status: request.new_book_status,
        };

        let book_id = request.book_id;
        if let Err(e) = self.backend.log_session_atomic(request).await {
            error!("log_session_atomic failed for user {}: {}", ctx.user_id, e);
            return Err(e.into());
        }

        info!(
            "Session logged for user {} on book {}: +{} ink, +{} xp",
            ctx.user_id, book_id, receipt.reward.ink_gained, receipt.reward.xp_gained
        );
        Ok(receipt)
    }

    /// Resolves the active book and companion from the profile, then submits.
    pub async fn submit_active(
        &self,
        ctx: &SessionContext,
        input: ActiveSessionInput,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let (book, companion_id) = self.resolve_prerequisites(ctx, input.book_id).await?;
        let draft = SessionDraft {
            book,
            companion_id,
            duration_seconds: input.duration_seconds,
            start_unit: input.start_unit,
            end_unit: input.end_unit,
            reflection: input.reflection,
            prompt: input.prompt,
            finished: input.finished,
        };
        self.submit(ctx, draft).await
    }

    /// Loads the book to read and the companion that earns the XP.
    pub async fn resolve_prerequisites(
        &self,
        ctx: &SessionContext,
        book_id: Option<Uuid>,
    ) -> Result<(Book, Uuid), SubmissionError> {
        let profile = self.backend.fetch_profile(ctx.user_id).await?;

        let book_id = book_id.or(profile.active_book_id).ok_or_else(|| {
            SubmissionError::MissingPrerequisite(
                "Please select a book from your library to start reading.".to_string(),
            )
        })?;
        let companion_id = profile.active_companion_id.ok_or_else(|| {
            SubmissionError::MissingPrerequisite(
                "Could not find an active companion.".to_string(),
            )
        })?;

        let book = match self.backend.fetch_book(book_id).await {
            Ok(book) => book,
            Err(PortError::NotFound(_)) => {
                return Err(SubmissionError::MissingPrerequisite(
                    "That book is no longer in your library.".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if book.user_id != ctx.user_id {
            warn!("User {} tried to log a session on book {}", ctx.user_id, book.id);
            return Err(PortError::Unauthorized.into());
        }
        Ok((book, companion_id))
    }
}
