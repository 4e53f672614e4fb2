//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{library_status, port_status, submission_status, HandlerError};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use inkkeeper_core::domain::{Book, BookFormat, BookStatus, JournalEntry, SessionContext};
use inkkeeper_core::home::{HomeSnapshot, StreakNotice};
use inkkeeper_core::library::{BookDraft, LibraryError};
use inkkeeper_core::ports::CatalogBook;
use inkkeeper_core::submission::ActiveSessionInput;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        home_handler,
        submit_session_handler,
        stats_handler,
        journal_handler,
        library_handler,
        add_book_handler,
        search_books_handler,
        swap_active_handler,
        assign_shelf_handler,
        delete_account_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            HomeResponse, CompanionResponse, StreakNoticeResponse, BookResponse,
            SubmitSessionRequest, SessionRecordedResponse, StatsResponse, JournalEntryResponse,
            LibraryResponse, AddBookRequest, AddBookResponse, SwapActiveRequest,
            SwapActiveResponse, AssignShelfRequest, SearchHitResponse
        )
    ),
    tags(
        (name = "Inkkeeper API", description = "Reading sessions, streaks, companions and the library.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    id: Uuid,
    title: String,
    author: Option<String>,
    format: String,
    current_unit: u32,
    total_units: Option<u32>,
    progress_percent: Option<u32>,
    status: String,
    shelf_name: Option<String>,
    cover_url: Option<String>,
}

impl From<&Book> for BookResponse {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            format: book.format.as_str().to_string(),
            current_unit: book.current_unit,
            total_units: book.total_units,
            progress_percent: book.progress_percent(),
            status: book.status.as_str().to_string(),
            shelf_name: book.shelf_name.clone(),
            cover_url: book.cover_url.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CompanionResponse {
    name: String,
    species: String,
    xp: u32,
    stage_label: String,
    stage_icon: String,
    progress_percent: f64,
    next_limit: Option<u32>,
    is_faint: bool,
}

/// A streak event the app should show as an alert.
#[derive(Serialize, ToSchema)]
pub struct StreakNoticeResponse {
    kind: String,
    message: String,
    freezes_remaining: Option<u32>,
}

impl From<&StreakNotice> for StreakNoticeResponse {
    fn from(notice: &StreakNotice) -> Self {
        match notice {
            StreakNotice::FreezeConsumed { freezes_remaining } => Self {
                kind: "freeze_consumed".to_string(),
                message: "A Streak Freeze was consumed to maintain your current streak.".to_string(),
                freezes_remaining: Some(*freezes_remaining),
            },
            StreakNotice::Broken { previous_streak } => Self {
                kind: "streak_broken".to_string(),
                message: format!("Your {}-day streak has ended.", previous_streak),
                freezes_remaining: None,
            },
            StreakNotice::FreezeFailed { message } => Self {
                kind: "freeze_failed".to_string(),
                message: format!("Could not use streak freeze: {}", message),
                freezes_remaining: None,
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HomeResponse {
    ink_drops: u32,
    current_streak: u32,
    freezes_available: u32,
    is_faint: bool,
    companion: Option<CompanionResponse>,
    active_book: Option<BookResponse>,
    notice: Option<StreakNoticeResponse>,
}

impl From<HomeSnapshot> for HomeResponse {
    fn from(snap: HomeSnapshot) -> Self {
        Self {
            ink_drops: snap.ink_drops,
            current_streak: snap.current_streak,
            freezes_available: snap.freezes_available,
            is_faint: snap.is_faint,
            companion: snap.companion.map(|c| CompanionResponse {
                name: c.name,
                species: c.species,
                xp: c.xp,
                stage_label: c.view.stage_label,
                stage_icon: c.view.stage_icon,
                progress_percent: c.view.progress_percent,
                next_limit: c.view.next_limit,
                is_faint: c.view.is_faint,
            }),
            active_book: snap.active_book.as_ref().map(BookResponse::from),
            notice: snap.notice.as_ref().map(StreakNoticeResponse::from),
        }
    }
}

/// A finished session submitted without the live timer.
#[derive(Deserialize, ToSchema)]
pub struct SubmitSessionRequest {
    /// Defaults to the profile's active book.
    #[serde(default)]
    book_id: Option<Uuid>,
    duration_seconds: u32,
    #[serde(default)]
    start_unit: Option<u32>,
    #[serde(default)]
    end_unit: Option<u32>,
    #[serde(default)]
    reflection: String,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    finished: bool,
}

#[derive(Serialize, ToSchema)]
pub struct SessionRecordedResponse {
    ink_gained: u32,
    xp_gained: u32,
    units_read: u32,
    new_book_unit: u32,
    new_book_status: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    total_minutes: u64,
    /// `total_minutes` split for display.
    hours: u64,
    minutes: u64,
    total_units: u64,
    total_sessions: u64,
    streak: u32,
    most_sessions_in_a_day: u32,
    best_day: Option<NaiveDate>,
}

/// An optional date range; both ends inclusive. Without `from`, everything up to `to` counts.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    from: Option<NaiveDate>,
    /// Defaults to today (UTC).
    to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct JournalEntryResponse {
    id: Uuid,
    created_at: Option<DateTime<Utc>>,
    duration_seconds: u32,
    book_title: Option<String>,
    cover_url: Option<String>,
    note: Option<String>,
    prompt: Option<String>,
}

impl From<JournalEntry> for JournalEntryResponse {
    fn from(entry: JournalEntry) -> Self {
        let (note, prompt) = match entry.reflection {
            Some(r) => (Some(r.note), r.prompt),
            None => (None, None),
        };
        Self {
            id: entry.session_id,
            created_at: entry.created_at,
            duration_seconds: entry.duration_seconds,
            book_title: entry.book_title,
            cover_url: entry.cover_url,
            note,
            prompt,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LibraryResponse {
    active_book_id: Option<Uuid>,
    /// Every book, the active one first.
    books: Vec<BookResponse>,
    active: Vec<BookResponse>,
    wishlist: Vec<BookResponse>,
    finished: Vec<BookResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddBookRequest {
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    cover_url: Option<String>,
    /// `physical` or `audio`.
    #[serde(default)]
    format: Option<String>,
    /// Pages or minutes.
    total_units: u32,
    /// `active` or `wishlist`; chosen automatically when omitted.
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    allow_duplicate: bool,
}

impl AddBookRequest {
    /// Unknown format or status labels are rejected rather than guessed.
    fn into_draft(self) -> Result<BookDraft, LibraryError> {
        let format = match self.format.as_deref() {
            None => BookFormat::default(),
            Some(label) => {
                BookFormat::parse(label).ok_or_else(|| LibraryError::UnknownFormat(label.to_string()))?
            }
        };
        let status = match self.status.as_deref() {
            None => None,
            Some(label) => Some(
                BookStatus::parse(label).ok_or_else(|| LibraryError::UnknownStatus(label.to_string()))?,
            ),
        };
        Ok(BookDraft {
            title: self.title,
            author: self.author,
            cover_url: self.cover_url,
            format,
            total_units: self.total_units,
            status,
            allow_duplicate: self.allow_duplicate,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct AddBookResponse {
    book: BookResponse,
    became_active: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SwapActiveRequest {
    book_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct SwapActiveResponse {
    changed: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignShelfRequest {
    shelf_name: String,
    book_ids: Vec<Uuid>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Title or author to look for.
    q: String,
}

/// A catalog match, already shaped as the add-book form's fields.
#[derive(Serialize, ToSchema)]
pub struct SearchHitResponse {
    title: String,
    author: Option<String>,
    cover_url: Option<String>,
    total_units: u32,
    /// Whether the catalog knew the page count; `total_units` is a default otherwise.
    page_count_known: bool,
}

impl From<&CatalogBook> for SearchHitResponse {
    fn from(hit: &CatalogBook) -> Self {
        let draft = hit.to_draft();
        Self {
            title: draft.title,
            author: draft.author,
            cover_url: draft.cover_url,
            total_units: draft.total_units,
            page_count_known: hit.page_count.is_some(),
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Refresh the home screen. Runs streak maintenance as a side effect.
#[utoipa::path(
    get,
    path = "/home",
    responses(
        (status = 200, description = "Home snapshot", body = HomeResponse),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Backend error")
    )
)]
pub async fn home_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<HomeResponse>, HandlerError> {
    let snapshot = app_state.home.refresh(&ctx, Utc::now()).await.map_err(|e| {
        error!("Home refresh failed for user {}: {:?}", ctx.user_id, e);
        port_status(&e)
    })?;
    Ok(Json(snapshot.into()))
}

/// Submit a finished reading session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = SubmitSessionRequest,
    responses(
        (status = 201, description = "Session recorded", body = SessionRecordedResponse),
        (status = 409, description = "No active book/companion, or a save is already in progress"),
        (status = 422, description = "Session failed validation"),
        (status = 502, description = "Backend error, message passed through")
    )
)]
pub async fn submit_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<SubmitSessionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let input = ActiveSessionInput {
        book_id: req.book_id,
        duration_seconds: req.duration_seconds,
        start_unit: req.start_unit,
        end_unit: req.end_unit,
        reflection: req.reflection,
        prompt: req.prompt,
        finished: req.finished,
    };
    let receipt = app_state
        .submitter
        .submit_active(&ctx, input)
        .await
        .map_err(|e| submission_status(&e))?;

    let response = SessionRecordedResponse {
        ink_gained: receipt.reward.ink_gained,
        xp_gained: receipt.reward.xp_gained,
        units_read: receipt.units_read,
        new_book_unit: receipt.new_book_unit,
        new_book_status: receipt.new_book_status.as_str().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/stats",
    params(StatsQuery),
    responses((status = 200, description = "Reading totals", body = StatsResponse))
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Query(range): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, HandlerError> {
    let to = range.to.unwrap_or_else(|| Utc::now().date_naive());
    let result = match range.from {
        Some(from) => app_state.stats.summary_between(&ctx, from, to).await,
        None => app_state.stats.summary(&ctx, to).await,
    };
    let summary = result.map_err(|e| {
        error!("Stats fetch failed: {:?}", e);
        port_status(&e)
    })?;
    Ok(Json(StatsResponse {
        total_minutes: summary.total_minutes,
        hours: summary.hours(),
        minutes: summary.minutes_past_hour(),
        total_units: summary.total_units,
        total_sessions: summary.total_sessions,
        streak: summary.current_streak,
        most_sessions_in_a_day: summary.most_sessions_in_a_day,
        best_day: summary.best_day,
    }))
}

#[utoipa::path(
    get,
    path = "/journal",
    responses((status = 200, description = "Recent sessions, newest first", body = [JournalEntryResponse]))
)]
pub async fn journal_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<Vec<JournalEntryResponse>>, HandlerError> {
    let entries = app_state.stats.journal(&ctx).await.map_err(|e| {
        error!("Journal fetch failed: {:?}", e);
        port_status(&e)
    })?;
    Ok(Json(entries.into_iter().map(JournalEntryResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/library",
    responses((status = 200, description = "The user's books", body = LibraryResponse))
)]
pub async fn library_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<LibraryResponse>, HandlerError> {
    let view = app_state.library.list(&ctx).await.map_err(|e| library_status(&e))?;
    let group = |status: BookStatus| -> Vec<BookResponse> {
        view.with_status(status).map(BookResponse::from).collect()
    };
    Ok(Json(LibraryResponse {
        active_book_id: view.active_book_id,
        active: group(BookStatus::Active),
        wishlist: group(BookStatus::Wishlist),
        finished: group(BookStatus::Finished),
        books: view.books.iter().map(BookResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/library/books",
    request_body = AddBookRequest,
    responses(
        (status = 201, description = "Book added", body = AddBookResponse),
        (status = 409, description = "Title already in the library"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn add_book_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<AddBookRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let draft = req.into_draft().map_err(|e| library_status(&e))?;
    let added = app_state
        .library
        .add_book(&ctx, draft)
        .await
        .map_err(|e| library_status(&e))?;
    let response = AddBookResponse {
        book: BookResponse::from(&added.book),
        became_active: added.became_active,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Look a title up in the public book catalog to prefill the add-book form.
#[utoipa::path(
    get,
    path = "/library/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Catalog matches", body = [SearchHitResponse]),
        (status = 422, description = "Empty query"),
        (status = 502, description = "Catalog unavailable")
    )
)]
pub async fn search_books_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHitResponse>>, HandlerError> {
    let hits = app_state.search.search(&query.q).await.map_err(|e| {
        error!("Book search failed: {:?}", e);
        library_status(&e)
    })?;
    Ok(Json(hits.iter().map(SearchHitResponse::from).collect()))
}

/// Make another book the active read.
#[utoipa::path(
    post,
    path = "/library/active",
    request_body = SwapActiveRequest,
    responses((status = 200, description = "Active book set", body = SwapActiveResponse))
)]
pub async fn swap_active_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<SwapActiveRequest>,
) -> Result<Json<SwapActiveResponse>, HandlerError> {
    let changed = app_state
        .library
        .swap_active(&ctx, req.book_id)
        .await
        .map_err(|e| library_status(&e))?;
    Ok(Json(SwapActiveResponse { changed }))
}

/// Move books onto a named shelf.
#[utoipa::path(
    post,
    path = "/library/shelves",
    request_body = AssignShelfRequest,
    responses(
        (status = 204, description = "Shelf updated"),
        (status = 422, description = "Missing name or books")
    )
)]
pub async fn assign_shelf_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(req): Json<AssignShelfRequest>,
) -> Result<StatusCode, HandlerError> {
    app_state
        .library
        .assign_shelf(&ctx, &req.shelf_name, &req.book_ids)
        .await
        .map_err(|e| library_status(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/account",
    responses((status = 204, description = "Account deleted"))
)]
pub async fn delete_account_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<StatusCode, HandlerError> {
    app_state.stats.delete_account(&ctx).await.map_err(|e| {
        error!("Account deletion failed for {}: {:?}", ctx.user_id, e);
        port_status(&e)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkkeeper_core::domain::Reflection;

    #[test]
    fn streak_notices_carry_user_facing_text() {
        let notice = StreakNoticeResponse::from(&StreakNotice::Broken { previous_streak: 12 });
        assert_eq!(notice.kind, "streak_broken");
        assert_eq!(notice.message, "Your 12-day streak has ended.");

        let notice = StreakNoticeResponse::from(&StreakNotice::FreezeConsumed { freezes_remaining: 1 });
        assert_eq!(notice.freezes_remaining, Some(1));
    }

    #[test]
    fn journal_entries_flatten_the_reflection() {
        let entry = JournalEntry {
            session_id: Uuid::new_v4(),
            created_at: None,
            duration_seconds: 900,
            book_title: Some("Persuasion".to_string()),
            cover_url: None,
            reflection: Some(Reflection {
                note: "Anne finally speaks up.".to_string(),
                prompt: Some("What surprised you?".to_string()),
            }),
        };
        let json = serde_json::to_value(JournalEntryResponse::from(entry)).unwrap();
        assert_eq!(json["note"], "Anne finally speaks up.");
        assert_eq!(json["prompt"], "What surprised you?");
        assert_eq!(json["duration_seconds"], 900);
        assert!(json["created_at"].is_null());
    }

    fn add_request(format: Option<&str>, status: Option<&str>) -> AddBookRequest {
        AddBookRequest {
            title: "Middlemarch".to_string(),
            author: None,
            cover_url: None,
            format: format.map(str::to_string),
            total_units: 880,
            status: status.map(str::to_string),
            allow_duplicate: false,
        }
    }

    #[test]
    fn misspelled_status_is_rejected() {
        let err = add_request(None, Some("finsihed")).into_draft().unwrap_err();
        assert!(matches!(err, LibraryError::UnknownStatus(ref s) if s == "finsihed"));
        assert_eq!(library_status(&err).0, StatusCode::UNPROCESSABLE_ENTITY);

        let err = add_request(Some("scroll"), None).into_draft().unwrap_err();
        assert!(matches!(err, LibraryError::UnknownFormat(_)));
    }

    #[test]
    fn known_labels_and_omitted_fields_build_a_draft() {
        let draft = add_request(Some("Audio"), Some("wishlist")).into_draft().unwrap();
        assert_eq!(draft.format, BookFormat::Audio);
        assert_eq!(draft.status, Some(BookStatus::Wishlist));

        let draft = add_request(None, None).into_draft().unwrap();
        assert_eq!(draft.format, BookFormat::Physical);
        assert_eq!(draft.status, None);
    }

    #[test]
    fn search_hits_use_the_prefill_defaults() {
        let hit = CatalogBook {
            title: "Circe".to_string(),
            authors: vec!["Madeline Miller".to_string()],
            cover_url: None,
            page_count: None,
        };
        let response = SearchHitResponse::from(&hit);
        assert_eq!(response.total_units, 300);
        assert!(!response.page_count_known);
        assert_eq!(response.author.as_deref(), Some("Madeline Miller"));
    }

    #[test]
    fn openapi_lists_the_session_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/sessions"));
        assert!(doc.paths.paths.contains_key("/library/search"));
        assert!(doc.paths.paths.contains_key("/auth/logout"));
    }
}
