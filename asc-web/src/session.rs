//! Cookie-backed sessions
//!
//! The middleware resolves the client's session from the session cookie and
//! hands a [`Session`] to handlers through request extensions. A cookie is
//! only issued once a new session actually holds data.

use crate::AppState;
use asc_utilities::{Session, SessionId, SessionResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Session key holding the signed-in user
pub const LOGGED_USER_KEY: &str = "loggedUser";

/// Signed-in user kept in the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<&crate::identity::UserAccount> for CurrentUser {
    fn from(account: &crate::identity::UserAccount) -> Self {
        Self {
            id: account.id.clone(),
            name: account.user_name.clone(),
            email: account.email.clone(),
            roles: account.roles.iter().cloned().collect(),
        }
    }
}

/// Resolve the session for each request and issue the cookie when needed
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> (CookieJar, Response) {
    let cookie_name = state.settings.session.cookie_name.clone();

    let live = jar
        .get(&cookie_name)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok())
        .filter(|id| match state.sessions.touch(id) {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Failed to refresh session {}: {}", id, e);
                false
            }
        });

    let is_new = live.is_none();
    let id = live.unwrap_or_default();
    let session = Session::new(id, state.sessions.clone());
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    // Empty sessions are not persisted, so there is nothing to point at
    if is_new && session.exists().unwrap_or(false) {
        debug!("Issuing session cookie for {}", id);
        return (jar.add(session_cookie(cookie_name, id)), response);
    }

    (jar, response)
}

/// Drop `current` and move the client onto a fresh session id.
///
/// Used at sign-in so an id the client held beforehand never carries an
/// authenticated user.
pub fn rotate_session(
    state: &AppState,
    jar: CookieJar,
    current: &Session,
) -> SessionResult<(CookieJar, Session)> {
    current.clear()?;

    let session = Session::new(SessionId::new(), state.sessions.clone());
    debug!("Rotated session {} to {}", current.id(), session.id());

    let cookie = session_cookie(state.settings.session.cookie_name.clone(), *session.id());
    Ok((jar.add(cookie), session))
}

pub fn session_cookie(name: String, id: SessionId) -> Cookie<'static> {
    Cookie::build((name, id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Extractor for the request's session
///
/// Rejects with 500 when [`session_middleware`] is not installed.
#[derive(Debug, Clone)]
pub struct ClientSession(pub Session);

impl<S> FromRequestParts<S> for ClientSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(ClientSession)
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session middleware is not installed",
            ))
    }
}
