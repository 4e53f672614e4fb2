//! crates/inkkeeper_core/src/companion.rs
//!
//! Derives the companion's growth stage from its XP. The stage is never stored;
//! it is recomputed from XP every time it is shown.

use chrono::{DateTime, Utc};

use crate::streak::hours_between;

/// Hours without a session after which the companion is shown as faint.
pub const DEFAULT_FAINT_AFTER_HOURS: f64 = 24.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Exclusive XP upper bound of this stage.
    pub limit: u32,
    pub label: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageTableError {
    #[error("a stage table needs at least one stage")]
    Empty,
    #[error("stage limits must be strictly ascending (stage {0})")]
    NotAscending(usize),
}

/// An ordered list of stages for one species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    stages: Vec<Stage>,
}

impl StageTable {
    pub fn new(stages: Vec<Stage>) -> Result<Self, StageTableError> {
        if stages.is_empty() {
            return Err(StageTableError::Empty);
        }
        if let Some(i) = stages.windows(2).position(|w| w[1].limit <= w[0].limit) {
            return Err(StageTableError::NotAscending(i + 1));
        }
        Ok(Self { stages })
    }

    /// The fox line: Kit, Scout, Guardian, Scholar.
    pub fn fox() -> Self {
        let stage = |limit: u32, label: &str, icon: &str| Stage {
            limit,
            label: label.to_string(),
            icon: icon.to_string(),
        };
        Self {
            stages: vec![
                stage(250, "The Kit", "seed"),
                stage(1000, "The Scout", "paw"),
                stage(2500, "The Guardian", "dog-side"),
                stage(5000, "The Scholar", "school"),
            ],
        }
    }

    /// Stage table for a species. Only the fox line exists so far.
    pub fn for_species(_species: &str) -> Self {
        Self::fox()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanionView {
    pub stage_label: String,
    pub stage_icon: String,
    /// Fraction of the way to the next stage, in `[0, 1]`.
    pub progress_percent: f64,
    /// XP needed to leave the current stage; `None` once maxed.
    pub next_limit: Option<u32>,
    pub is_faint: bool,
}

/// Whether the companion should be shown resting. Display only.
pub fn is_faint(
    last_session_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    faint_after_hours: f64,
) -> bool {
    last_session_at.is_some_and(|last| hours_between(last, now) > faint_after_hours)
}

pub fn project_companion(
    xp_total: u32,
    last_session_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    table: &StageTable,
) -> CompanionView {
    project_companion_with(xp_total, last_session_at, now, table, DEFAULT_FAINT_AFTER_HOURS)
}

pub fn project_companion_with(
    xp_total: u32,
    last_session_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    table: &StageTable,
    faint_after_hours: f64,
) -> CompanionView {
    let faint = is_faint(last_session_at, now, faint_after_hours);
    let stages = table.stages();

    match stages.iter().position(|s| s.limit > xp_total) {
        Some(i) => {
            let current = &stages[i];
            let previous = if i == 0 { 0 } else { stages[i - 1].limit };
            let span = (current.limit - previous) as f64;
            let progress = ((xp_total.saturating_sub(previous)) as f64 / span).clamp(0.0, 1.0);
            CompanionView {
                stage_label: current.label.clone(),
                stage_icon: current.icon.clone(),
                progress_percent: progress,
                next_limit: Some(current.limit),
                is_faint: faint,
            }
        }
        None => {
            // Table is never empty (enforced by StageTable::new).
            let last = &stages[stages.len() - 1];
            CompanionView {
                stage_label: last.label.clone(),
                stage_icon: last.icon.clone(),
                progress_percent: 1.0,
                next_limit: None,
                is_faint: faint,
            }
        }
    }
}
