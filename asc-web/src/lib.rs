//! ASC Web
//!
//! Automobile service center web application: cookie sessions with typed
//! values, identity seeding and a cached navigation menu, built by a
//! fault-tolerant startup bootstrap.

pub mod bootstrap;
pub mod handlers;
pub mod identity;
pub mod navigation;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod templates;

// Re-export main types
pub use server::{AscServer, AscServerBuilder};
pub use state::AppState;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::page_routes())
        .nest("/api", routes::api_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable development mode
    pub dev_mode: bool,
    /// Identity database URL; in-memory directories are used when unset
    pub database_url: Option<String>,
    /// Application settings file
    pub config_path: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
            database_url: None,
            config_path: None,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("ASC_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("ASC_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(8080),
            dev_mode: std::env::var("ASC_DEV_MODE")
                .ok()
                .and_then(|dev| dev.parse().ok())
                .unwrap_or(false),
            database_url: std::env::var("DATABASE_URL").ok(),
            config_path: std::env::var("ASC_CONFIG").ok(),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] asc_utilities::SessionError),

    #[error("Identity error: {0}")]
    Identity(#[from] identity::IdentityError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] navigation::NavigationError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            WebError::NotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            WebError::Navigation(navigation::NavigationError::NotBuilt(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "navigation_unavailable")
            }
            WebError::Identity(identity::IdentityError::MissingCredentials) => {
                (StatusCode::BAD_REQUEST, "missing_credentials")
            }
            WebError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
            WebError::Identity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "identity_error"),
            WebError::Navigation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "navigation_error"),
            WebError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "template_error"),
            WebError::Server(_) | WebError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": error_code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
