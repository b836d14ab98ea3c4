//! Account handlers: login, logout and the current user
//!
//! The signed-in user lives in the session under [`LOGGED_USER_KEY`].

use crate::{
    identity::IdentityError,
    session::{rotate_session, ClientSession, CurrentUser, LOGGED_USER_KEY},
    AppState, WebError, WebResult,
};
use asc_utilities::SessionExt;
use axum::{extract::State, response::Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Verify credentials and store the user in a freshly issued session
pub async fn login(
    State(state): State<AppState>,
    ClientSession(session): ClientSession,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> WebResult<(CookieJar, Json<CurrentUser>)> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(IdentityError::MissingCredentials.into());
    }

    info!("Login attempt: {}", request.email);

    let account = state
        .users
        .find_by_email(&request.email)
        .await?
        .filter(|account| account.is_active && account.verify_password(&request.password));

    let Some(account) = account else {
        warn!("Login failed: {}", request.email);
        return Err(WebError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };

    let (jar, session) = rotate_session(&state, jar, &session)?;
    let user = CurrentUser::from(&account);
    session.set_session(LOGGED_USER_KEY, &user)?;

    info!("User logged in: {}", user.email);
    Ok((jar, Json(user)))
}

/// Clear the session and drop the session cookie
pub async fn logout(
    State(state): State<AppState>,
    ClientSession(session): ClientSession,
    jar: CookieJar,
) -> WebResult<(CookieJar, Json<Value>)> {
    session.clear()?;

    let expired = Cookie::build((state.settings.session.cookie_name.clone(), "")).path("/");
    let jar = jar.remove(expired);
    Ok((jar, Json(json!({ "message": "Logged out successfully" }))))
}

/// The signed-in user, or 401
pub async fn current_user(
    ClientSession(session): ClientSession,
) -> WebResult<Json<CurrentUser>> {
    session
        .get_session::<CurrentUser>(LOGGED_USER_KEY)?
        .map(Json)
        .ok_or_else(|| WebError::Unauthorized("No user is signed in".to_string()))
}
