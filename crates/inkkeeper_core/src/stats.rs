//! crates/inkkeeper_core/src/stats.rs
//!
//! Reading totals, the journal, and account removal.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{JournalEntry, SessionContext};
use crate::ports::{BackendService, PortResult, SessionTotals};

/// How many sessions the journal shows.
pub const JOURNAL_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingSummary {
    pub total_minutes: u64,
    pub total_units: u64,
    pub total_sessions: u64,
    pub current_streak: u32,
    pub most_sessions_in_a_day: u32,
    pub best_day: Option<NaiveDate>,
}

impl ReadingSummary {
    /// Whole hours, with the remainder in `minutes_past_hour`.
    pub fn hours(&self) -> u64 {
        self.total_minutes / 60
    }

    pub fn minutes_past_hour(&self) -> u64 {
        self.total_minutes % 60
    }
}

/// Combines backend aggregates with the profile's streak. A best day is only
/// reported when at least one session falls on it.
pub fn summarize(totals: SessionTotals, current_streak: u32) -> ReadingSummary {
    let best_day = totals.best_day.filter(|_| totals.most_sessions_in_a_day > 0);
    ReadingSummary {
        total_minutes: totals.total_minutes,
        total_units: totals.total_units,
        total_sessions: totals.total_sessions,
        current_streak,
        most_sessions_in_a_day: if best_day.is_some() { totals.most_sessions_in_a_day } else { 0 },
        best_day,
    }
}

pub struct StatsService {
    backend: Arc<dyn BackendService>,
}

impl StatsService {
    pub fn new(backend: Arc<dyn BackendService>) -> Self {
        Self { backend }
    }

    /// All-time totals up to and including `today`.
    pub async fn summary(&self, ctx: &SessionContext, today: NaiveDate) -> PortResult<ReadingSummary> {
        self.summary_between(ctx, NaiveDate::default(), today).await
    }

    pub async fn summary_between(
        &self,
        ctx: &SessionContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<ReadingSummary> {
        let profile = self.backend.fetch_profile(ctx.user_id).await?;
        if end < start {
            return Ok(summarize(SessionTotals::default(), profile.current_streak));
        }
        let totals = self.backend.reading_summary(ctx.user_id, start, end).await?;
        Ok(summarize(totals, profile.current_streak))
    }

    pub async fn journal(&self, ctx: &SessionContext) -> PortResult<Vec<JournalEntry>> {
        self.backend.recent_sessions(ctx.user_id, JOURNAL_LIMIT).await
    }

    pub async fn delete_account(&self, ctx: &SessionContext) -> PortResult<()> {
        self.backend.delete_account(ctx.user_id).await?;
        info!("Account {} deleted", ctx.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_day_needs_a_session() {
        let totals = SessionTotals {
            total_minutes: 125,
            total_units: 40,
            total_sessions: 5,
            most_sessions_in_a_day: 3,
            best_day: NaiveDate::from_ymd_opt(2025, 9, 2),
        };
        let s = summarize(totals, 4);
        assert_eq!(s.hours(), 2);
        assert_eq!(s.minutes_past_hour(), 5);
        assert_eq!(s.most_sessions_in_a_day, 3);
        assert_eq!(s.best_day, NaiveDate::from_ymd_opt(2025, 9, 2));

        let empty = SessionTotals {
            best_day: NaiveDate::from_ymd_opt(2025, 9, 2),
            ..SessionTotals::default()
        };
        assert_eq!(summarize(empty, 0), ReadingSummary::default());
    }
}
