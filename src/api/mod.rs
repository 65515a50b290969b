//! REST API for the Bookseerr daemon.
//!
//! Provides HTTP endpoints for:
//! - Login sessions
//! - Readarr search and adding books
//! - The request workflow
//! - Local books and user administration
//! - Library sync
//! - Live notifications via WebSocket

pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::Auth;
use crate::notify::Notifier;
use crate::readarr::ReadarrClient;
use crate::store::LibraryStore;
use crate::sync::Reconciler;

pub use error::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
pub use extract::{AdminUser, CurrentUser};

/// Shared state for API handlers.
pub struct ApiState {
    pub store: Arc<LibraryStore>,

    pub readarr: ReadarrClient,

    pub auth: Auth,

    /// Bus the WebSocket sessions listen on.
    pub notifier: Notifier,

    pub reconciler: Reconciler,

    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(store: Arc<LibraryStore>, readarr: ReadarrClient, auth: Auth) -> Self {
        let notifier = Notifier::default();
        let reconciler = Reconciler::new(store.clone(), readarr.clone(), notifier.clone());

        Self {
            store,
            readarr,
            auth,
            notifier,
            reconciler,
            started_at: Utc::now(),
        }
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    // The UI may be served from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(handlers::status::health))
        // Sessions
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        // Readarr
        .route("/api/search", get(handlers::search::search))
        .route("/api/get-book-details", get(handlers::search::book_details))
        .route("/api/add-book-to-readarr", post(handlers::search::add_book))
        .route("/api/sync/readarr", post(handlers::sync::sync_readarr))
        // Requests
        .route(
            "/api/requests",
            get(handlers::requests::list_requests).post(handlers::requests::create_request),
        )
        .route(
            "/api/requests/:id",
            get(handlers::requests::get_request)
                .put(handlers::requests::update_request)
                .delete(handlers::requests::delete_request),
        )
        // Books
        .route(
            "/api/books",
            get(handlers::books::list_books).post(handlers::books::create_book),
        )
        .route(
            "/api/books/:id",
            axum::routing::put(handlers::books::update_book).delete(handlers::books::delete_book),
        )
        // Users
        .route(
            "/api/admin/users",
            get(handlers::users::list_users).post(handlers::users::update_user),
        )
        // WebSocket
        .route("/api/ws", get(handlers::websocket::handler))
        // Middleware
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                // Successful responses are not logged
                .on_request(())
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        if !status.is_success() {
                            tracing::warn!(
                                status = %status,
                                latency_ms = latency.as_millis(),
                                "request failed"
                            );
                        }
                    },
                ),
        )
        .with_state(state)
}

/// Start the API server and run until Ctrl-C.
pub async fn serve(state: Arc<ApiState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!("Bookseerr API listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
