//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, google_books::GoogleBooksAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::logout_handler,
        middleware::require_auth,
        rest::{
            add_book_handler, assign_shelf_handler, delete_account_handler, health_handler,
            home_handler, journal_handler, library_handler, search_books_handler, stats_handler,
            submit_session_handler, swap_active_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(
        "Configuration loaded (reward model: {:?}, minimum session: {}s). Starting server...",
        config.reward_model, config.min_session_seconds
    );

    // --- 2. Connect to the Database ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));

    // --- 3. Build the Shared AppState ---
    let catalog = Arc::new(GoogleBooksAdapter::new(config.book_search_url.clone()));
    let app_state = Arc::new(AppState::new(db_adapter, catalog, config.clone()));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/home", get(home_handler))
        .route("/sessions", post(submit_session_handler))
        .route("/stats", get(stats_handler))
        .route("/journal", get(journal_handler))
        .route("/library", get(library_handler))
        .route("/library/books", post(add_book_handler))
        .route("/library/search", get(search_books_handler))
        .route("/library/active", post(swap_active_handler))
        .route("/library/shelves", post(assign_shelf_handler))
        .route("/account", delete(delete_account_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
