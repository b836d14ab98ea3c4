//! Route definitions for the ASC web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Startup bootstrap outcome
        .route("/startup", get(handlers::startup_report))
        // Account
        .route("/account/login", post(handlers::login))
        .route("/account/logout", post(handlers::logout))
        .route("/account/me", get(handlers::current_user))
        // Navigation menu for the session user
        .route("/navigation", get(handlers::get_navigation))
}

/// Create server-rendered page routes
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/ServiceRequests/Dashboard/Dashboard",
            get(handlers::dashboard),
        )
}
