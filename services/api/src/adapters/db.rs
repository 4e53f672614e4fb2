//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `BackendService` port from the `core` crate. Reads go straight to the
//! tables; every multi-row effect goes through one of the backend's stored
//! procedures so that its transaction stays the single source of consistency.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use inkkeeper_core::domain::{
    Book, BookFormat, BookStatus, Companion, CompanionStatus, JournalEntry, Profile, Reflection,
};
use inkkeeper_core::ports::{
    BackendService, FreezeOutcome, LogSessionRequest, NewBook, PortError, PortResult, SessionTotals,
};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `BackendService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Keeps the database's own message; the user sees it verbatim.
fn backend_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Database(db) => PortError::Backend(db.message().to_string()),
        other => PortError::Backend(other.to_string()),
    }
}

fn lookup_error(e: sqlx::Error, what: &str, id: Uuid) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        other => backend_error(other),
    }
}

fn non_negative(v: Option<i32>) -> u32 {
    v.unwrap_or(0).max(0) as u32
}

fn to_db_int(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// The nine arguments `log_session_atomic` declares; it takes no status.
const LOG_SESSION_SQL: &str = "SELECT log_session_atomic(\
    p_user_id => $1, p_book_id => $2, p_active_companion_id => $3, \
    p_duration_seconds => $4, p_pages_read => $5, p_reflection_data => $6, \
    p_ink_gained => $7, p_xp_gained => $8, p_new_book_unit => $9)";

const SET_BOOK_STATUS_SQL: &str = "UPDATE books SET status = $1 WHERE id = $2 AND user_id = $3";

/// Transaction-local claims, so `auth.uid()` resolves to the bound user.
const ACT_AS_USER_SQL: &str = "SELECT \
    set_config('request.jwt.claims', json_build_object('sub', $1::text, 'role', 'authenticated')::text, true), \
    set_config('request.jwt.claim.sub', $1::text, true)";

const DELETE_ACCOUNT_SQL: &str = "SELECT delete_user_account()";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    ink_drops: Option<i32>,
    active_book_id: Option<Uuid>,
    active_companion_id: Option<Uuid>,
    current_streak: Option<i32>,
    streak_freezes_available: Option<i32>,
    last_session_at: Option<DateTime<Utc>>,
    daily_goal_amount: Option<i32>,
    preferred_format: Option<String>,
    timezone: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.id,
            ink_drops: non_negative(self.ink_drops),
            active_book_id: self.active_book_id,
            active_companion_id: self.active_companion_id,
            current_streak: non_negative(self.current_streak),
            streak_freezes_available: non_negative(self.streak_freezes_available),
            last_session_at: self.last_session_at,
            daily_goal_amount: self.daily_goal_amount.map(|v| v.max(0) as u32),
            preferred_format: self.preferred_format.as_deref().map(BookFormat::from_label),
            timezone: self.timezone,
        }
    }
}

const BOOK_COLUMNS: &str = "id, user_id, title, author, format, current_unit, total_units, \
                            status, shelf_name, cover_url, created_at";

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    author: Option<String>,
    format: Option<String>,
    current_unit: Option<i32>,
    total_units: Option<i32>,
    status: Option<String>,
    shelf_name: Option<String>,
    cover_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            author: self.author,
            format: self.format.as_deref().map(BookFormat::from_label).unwrap_or_default(),
            current_unit: non_negative(self.current_unit),
            total_units: self.total_units.map(|v| v.max(0) as u32),
            status: self.status.as_deref().map(BookStatus::from_label).unwrap_or_default(),
            shelf_name: self.shelf_name,
            cover_url: self.cover_url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CompanionRecord {
    id: Uuid,
    user_id: Uuid,
    nickname: Option<String>,
    species: String,
    xp: Option<i32>,
    status: Option<String>,
}
impl CompanionRecord {
    fn to_domain(self) -> Companion {
        Companion {
            id: self.id,
            user_id: self.user_id,
            nickname: self.nickname,
            species: self.species,
            xp: non_negative(self.xp),
            status: self.status.as_deref().map(CompanionStatus::from_label).unwrap_or_default(),
        }
    }
}

#[derive(FromRow)]
struct JournalRecord {
    id: Uuid,
    created_at: Option<DateTime<Utc>>,
    duration_seconds: Option<i32>,
    reflection_data: Option<serde_json::Value>,
    book_title: Option<String>,
    cover_url: Option<String>,
}
impl JournalRecord {
    fn to_domain(self) -> JournalEntry {
        JournalEntry {
            session_id: self.id,
            created_at: self.created_at,
            duration_seconds: non_negative(self.duration_seconds),
            book_title: self.book_title,
            cover_url: self.cover_url,
            reflection: self.reflection_data.and_then(reflection_from_json),
        }
    }
}

/// One row of `get_reading_summary`. Every column is nullable when nothing was logged.
#[derive(FromRow)]
struct SummaryRecord {
    total_minutes_read: Option<i64>,
    total_pages_read: Option<i64>,
    total_sessions: Option<i64>,
    most_sessions_in_a_day: Option<i64>,
    best_day_date: Option<NaiveDate>,
}
impl SummaryRecord {
    fn to_domain(self) -> SessionTotals {
        let count = |v: Option<i64>| v.unwrap_or(0).max(0) as u64;
        let most_sessions_in_a_day = u32::try_from(count(self.most_sessions_in_a_day)).unwrap_or(u32::MAX);
        SessionTotals {
            total_minutes: count(self.total_minutes_read),
            total_units: count(self.total_pages_read),
            total_sessions: count(self.total_sessions),
            most_sessions_in_a_day,
            best_day: self.best_day_date.filter(|_| most_sessions_in_a_day > 0),
        }
    }
}

#[derive(Deserialize)]
struct ReflectionJson {
    #[serde(default)]
    note: String,
    prompt: Option<String>,
}

fn reflection_from_json(value: serde_json::Value) -> Option<Reflection> {
    let parsed: ReflectionJson = serde_json::from_value(value).ok()?;
    Some(Reflection {
        note: parsed.note,
        prompt: parsed.prompt,
    })
}

fn reflection_to_json(reflection: &Reflection) -> serde_json::Value {
    let mut data = serde_json::json!({ "note": reflection.note });
    if let Some(prompt) = &reflection.prompt {
        data["prompt"] = serde_json::Value::String(prompt.clone());
    }
    data
}

/// The JSON object `use_streak_freeze` returns.
#[derive(Deserialize)]
struct FreezeJson {
    success: bool,
    #[serde(default)]
    freezes_remaining: i32,
}

//=========================================================================================
// `BackendService` Trait Implementation
//=========================================================================================

#[async_trait]
impl BackendService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, ink_drops, active_book_id, active_companion_id, current_streak, \
             streak_freezes_available, last_session_at, daily_goal_amount, preferred_format, timezone \
             FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, "Profile", user_id))?;
        Ok(record.to_domain())
    }

    async fn fetch_book(&self, book_id: Uuid) -> PortResult<Book> {
        let sql = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| lookup_error(e, "Book", book_id))?;
        Ok(record.to_domain())
    }

    async fn fetch_companion(&self, companion_id: Uuid) -> PortResult<Companion> {
        let record = sqlx::query_as::<_, CompanionRecord>(
            "SELECT id, user_id, nickname, species, xp, status FROM companions WHERE id = $1",
        )
        .bind(companion_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, "Companion", companion_id))?;
        Ok(record.to_domain())
    }

    /// `log_session_atomic` takes no status, so the book's status is written in
    /// the same transaction right after it.
    async fn log_session_atomic(&self, request: LogSessionRequest) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        sqlx::query(LOG_SESSION_SQL)
        .bind(request.user_id)
        .bind(request.book_id)
        .bind(request.companion_id)
        .bind(to_db_int(request.duration_seconds))
        .bind(to_db_int(request.units_read))
        .bind(reflection_to_json(&request.reflection))
        .bind(to_db_int(request.ink_gained))
        .bind(to_db_int(request.xp_gained))
        .bind(to_db_int(request.new_book_unit))
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?;

        sqlx::query(SET_BOOK_STATUS_SQL)
            .bind(request.new_book_status.as_str())
            .bind(request.book_id)
            .bind(request.user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        tx.commit().await.map_err(backend_error)?;
        Ok(())
    }

    async fn use_streak_freeze(&self, user_id: Uuid) -> PortResult<FreezeOutcome> {
        let raw = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT use_streak_freeze(p_user_id => $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_error)?;
        let parsed: FreezeJson = serde_json::from_value(raw)
            .map_err(|e| PortError::Backend(format!("Unexpected use_streak_freeze result: {}", e)))?;
        Ok(FreezeOutcome {
            success: parsed.success,
            freezes_remaining: parsed.freezes_remaining.max(0) as u32,
        })
    }

    async fn reset_broken_streak(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("SELECT reset_broken_streak(p_user_id => $1)")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let sql = format!(
            "SELECT {} FROM books WHERE user_id = $1 ORDER BY created_at DESC",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let sql = format!(
            "INSERT INTO books (user_id, title, author, cover_url, total_units, format, status, current_unit) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0) RETURNING {}",
            BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.cover_url)
            .bind(to_db_int(book.total_units))
            .bind(book.format.as_str())
            .bind(book.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(record.to_domain())
    }

    async fn set_active_book(&self, user_id: Uuid, book_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE profiles SET active_book_id = $1 WHERE id = $2")
            .bind(book_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", user_id)));
        }
        Ok(())
    }

    async fn assign_shelf(
        &self,
        user_id: Uuid,
        shelf_name: &str,
        book_ids: &[Uuid],
    ) -> PortResult<()> {
        sqlx::query("UPDATE books SET shelf_name = $1 WHERE user_id = $2 AND id = ANY($3)")
            .bind(shelf_name)
            .bind(user_id)
            .bind(book_ids)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn reading_summary(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<SessionTotals> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "SELECT total_minutes_read::BIGINT AS total_minutes_read, \
                    total_pages_read::BIGINT AS total_pages_read, \
                    total_sessions::BIGINT AS total_sessions, \
                    most_sessions_in_a_day::BIGINT AS most_sessions_in_a_day, \
                    best_day_date::DATE AS best_day_date \
             FROM get_reading_summary(p_user_id => $1, p_start_date => $2, p_end_date => $3)",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(record.map(SummaryRecord::to_domain).unwrap_or_default())
    }

    async fn recent_sessions(&self, user_id: Uuid, limit: u32) -> PortResult<Vec<JournalEntry>> {
        let records = sqlx::query_as::<_, JournalRecord>(
            "SELECT s.id, s.created_at, s.duration_seconds, s.reflection_data, \
                    b.title AS book_title, b.cover_url \
             FROM sessions s LEFT JOIN books b ON b.id = s.book_id \
             WHERE s.user_id = $1 ORDER BY s.created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    /// `delete_user_account` takes no arguments and deletes the caller, so the
    /// caller's claims are set for the transaction first.
    async fn delete_account(&self, user_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        sqlx::query(ACT_AS_USER_SQL)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?;
        sqlx::query(DELETE_ACCOUNT_SQL)
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        tx.commit().await.map_err(backend_error)?;
        Ok(())
    }
}
