//! crates/inkkeeper_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How a book's progress is measured: pages for physical copies, minutes for audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookFormat {
    #[default]
    Physical,
    Audio,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Physical => "physical",
            BookFormat::Audio => "audio",
        }
    }

    /// Parses a label, rejecting anything unknown.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "physical" => Some(BookFormat::Physical),
            "audio" => Some(BookFormat::Audio),
            _ => None,
        }
    }

    /// Parses the stored label. Unknown labels fall back to `Physical`.
    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookStatus {
    #[default]
    Active,
    Wishlist,
    Finished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Active => "active",
            BookStatus::Wishlist => "wishlist",
            BookStatus::Finished => "finished",
        }
    }

    /// Parses a label, rejecting anything unknown.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "active" => Some(BookStatus::Active),
            "wishlist" => Some(BookStatus::Wishlist),
            "finished" => Some(BookStatus::Finished),
            _ => None,
        }
    }

    /// Parses the stored label. Unknown labels fall back to `Active`.
    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or_default()
    }
}

/// A book in a user's library.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub format: BookFormat,
    /// Progress marker: last page read, or minutes listened.
    pub current_unit: u32,
    pub total_units: Option<u32>,
    pub status: BookStatus,
    pub shelf_name: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Whole-number completion percentage, or `None` when the length is unknown.
    pub fn progress_percent(&self) -> Option<u32> {
        match self.total_units {
            Some(total) if total > 0 => {
                Some(((self.current_unit as f64 / total as f64) * 100.0).round() as u32)
            }
            _ => None,
        }
    }
}

/// Free-text reflection attached to a session, optionally answering a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reflection {
    pub note: String,
    pub prompt: Option<String>,
}

/// A logged reading session. Immutable once sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSession {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub duration_seconds: u32,
    pub units_read: u32,
    pub reflection: Option<Reflection>,
    pub created_at: DateTime<Utc>,
}

/// A journal row: a session joined with the title of the book it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub session_id: Uuid,
    /// Missing on rows written before the column had a default.
    pub created_at: Option<DateTime<Utc>>,
    pub duration_seconds: u32,
    pub book_title: Option<String>,
    pub cover_url: Option<String>,
    pub reflection: Option<Reflection>,
}

// Represents the reader's profile row - the streak and currency live here.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub ink_drops: u32,
    pub active_book_id: Option<Uuid>,
    pub active_companion_id: Option<Uuid>,
    pub current_streak: u32,
    pub streak_freezes_available: u32,
    pub last_session_at: Option<DateTime<Utc>>,
    pub daily_goal_amount: Option<u32>,
    pub preferred_format: Option<BookFormat>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompanionStatus {
    #[default]
    Active,
    Archived,
}

impl CompanionStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "archived" => CompanionStatus::Archived,
            _ => CompanionStatus::Active,
        }
    }
}

/// The creature that grows with the reader's XP.
#[derive(Debug, Clone, PartialEq)]
pub struct Companion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nickname: Option<String>,
    pub species: String,
    pub xp: u32,
    pub status: CompanionStatus,
}

impl Companion {
    /// Display name: the nickname if one was given, else the species.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.species)
    }
}

/// The authenticated caller, injected into every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
}

impl SessionContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
