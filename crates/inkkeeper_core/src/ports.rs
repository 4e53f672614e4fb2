//! crates/inkkeeper_core/src/ports.rs
//!
//! Defines the service contract (trait) between the core logic and the hosted backend.
//! Every persistent effect, including the atomic session transaction, happens on the
//! far side of this boundary; the core only decides which call to make.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Book, BookFormat, BookStatus, Companion, JournalEntry, Profile, Reflection};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the backend (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend rejected or failed the call. The message is kept verbatim.
    #[error("{0}")]
    Backend(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Call Payloads
//=========================================================================================

/// Arguments of the backend's `log_session_atomic` procedure.
///
/// The backend inserts the session row, advances the book, credits ink and companion
/// XP, and stamps `last_session_at` in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSessionRequest {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub companion_id: Uuid,
    pub duration_seconds: u32,
    pub units_read: u32,
    pub reflection: Reflection,
    pub ink_gained: u32,
    pub xp_gained: u32,
    pub new_book_unit: u32,
    pub new_book_status: BookStatus,
}

/// Result of the backend's `use_streak_freeze` procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub success: bool,
    pub freezes_remaining: u32,
}

/// Session aggregates computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionTotals {
    pub total_minutes: u64,
    /// Pages for physical books, minutes for audio.
    pub total_units: u64,
    pub total_sessions: u64,
    pub most_sessions_in_a_day: u32,
    /// The day with the most sessions, if any session was logged.
    pub best_day: Option<NaiveDate>,
}

/// A book about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub format: BookFormat,
    pub total_units: u32,
    pub status: BookStatus,
}

//=========================================================================================
// Service Port (Trait)
//=========================================================================================

#[async_trait]
pub trait BackendService: Send + Sync {
    // --- Auth ---
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Reads ---
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn fetch_book(&self, book_id: Uuid) -> PortResult<Book>;

    async fn fetch_companion(&self, companion_id: Uuid) -> PortResult<Companion>;

    // --- Session Logging ---
    async fn log_session_atomic(&self, request: LogSessionRequest) -> PortResult<()>;

    // --- Streak Maintenance ---
    async fn use_streak_freeze(&self, user_id: Uuid) -> PortResult<FreezeOutcome>;

    async fn reset_broken_streak(&self, user_id: Uuid) -> PortResult<()>;

    // --- Library ---
    /// All of the user's books, newest first.
    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>>;

    async fn create_book(&self, book: NewBook) -> PortResult<Book>;

    async fn set_active_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<()>;

    async fn assign_shelf(&self, user_id: Uuid, shelf_name: &str, book_ids: &[Uuid])
        -> PortResult<()>;

    // --- History ---
    /// Aggregates over the sessions logged between `start` and `end`, both inclusive.
    async fn reading_summary(&self, user_id: Uuid, start: NaiveDate, end: NaiveDate)
        -> PortResult<SessionTotals>;

    /// The most recent sessions, newest first.
    async fn recent_sessions(&self, user_id: Uuid, limit: u32) -> PortResult<Vec<JournalEntry>>;

    // --- Account ---
    async fn delete_account(&self, user_id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Book Catalog Port (Trait)
//=========================================================================================

/// A search hit from a public book catalog, used to pre-fill a new book.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogBook {
    pub title: String,
    pub authors: Vec<String>,
    pub cover_url: Option<String>,
    pub page_count: Option<u32>,
}

#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn search(&self, query: &str) -> PortResult<Vec<CatalogBook>>;
}
