//! Startup report handler

use crate::{bootstrap::StartupReport, AppState, WebError, WebResult};
use axum::{extract::State, response::Json};

/// Report of the startup bootstrap; 503 until it has run
pub async fn startup_report(State(state): State<AppState>) -> WebResult<Json<StartupReport>> {
    state
        .startup_report()
        .await
        .map(Json)
        .ok_or_else(|| WebError::NotReady("startup bootstrap has not run".to_string()))
}
