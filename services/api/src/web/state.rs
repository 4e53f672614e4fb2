//! services/api/src/web/state.rs
//!
//! Defines the application's shared and connection-specific states.

use crate::config::Config;
use inkkeeper_core::domain::{Book, SessionContext};
use inkkeeper_core::flow::ReadingFlow;
use inkkeeper_core::home::HomeService;
use inkkeeper_core::library::{BookSearch, LibraryService};
use inkkeeper_core::ports::{BackendService, BookCatalog};
use inkkeeper_core::stats::StatsService;
use inkkeeper_core::submission::{SessionSubmitter, SubmissionError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn BackendService>,
    pub config: Arc<Config>,
    pub submitter: Arc<SessionSubmitter>,
    pub home: Arc<HomeService>,
    pub library: Arc<LibraryService>,
    pub search: Arc<BookSearch>,
    pub stats: Arc<StatsService>,
}

impl AppState {
    /// Wires the core services to one backend and one book catalog.
    pub fn new(
        backend: Arc<dyn BackendService>,
        catalog: Arc<dyn BookCatalog>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            submitter: Arc::new(SessionSubmitter::new(backend.clone(), config.submission_rules())),
            home: Arc::new(HomeService::new(backend.clone(), config.home_rules())),
            library: Arc::new(LibraryService::new(backend.clone())),
            search: Arc::new(BookSearch::new(catalog)),
            stats: Arc::new(StatsService::new(backend.clone())),
            backend,
            config,
        }
    }
}

//=========================================================================================
// TimerSessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single live reading session. The connection owns the timer.
pub struct TimerSessionState {
    pub ctx: SessionContext,
    pub book: Book,
    pub companion_id: Uuid,
    pub flow: ReadingFlow,
    /// A token to stop the current ticking task.
    pub cancellation_token: CancellationToken,
}

impl TimerSessionState {
    /// Resolves the book and companion for the session from the profile.
    pub async fn new(
        app_state: Arc<AppState>,
        ctx: SessionContext,
        book_id: Option<Uuid>,
    ) -> Result<Self, SubmissionError> {
        let (book, companion_id) = app_state
            .submitter
            .resolve_prerequisites(&ctx, book_id)
            .await?;

        Ok(Self {
            ctx,
            book,
            companion_id,
            flow: ReadingFlow::new(),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Stops the ticking task, if any, and arms a fresh token for the next one.
    pub fn stop_ticking(&mut self) {
        self.cancellation_token.cancel();
        self.cancellation_token = CancellationToken::new();
    }
}
