//! Server-rendered pages

use crate::{
    navigation::{NavigationCacheOperations, NavigationMenu},
    session::{ClientSession, CurrentUser, LOGGED_USER_KEY},
    templates::{DashboardTemplate, IndexTemplate},
    AppState, WebResult,
};
use askama::Template;
use asc_utilities::SessionExt;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::warn;

/// Landing page
pub async fn index(
    State(state): State<AppState>,
    ClientSession(session): ClientSession,
) -> WebResult<Html<String>> {
    let user = session.get_session::<CurrentUser>(LOGGED_USER_KEY)?;
    let page = IndexTemplate::new(&state.settings.app.application_title, user.map(|u| u.name));
    Ok(Html(page.render()?))
}

/// Service request dashboard; anonymous visitors are sent to the landing page
pub async fn dashboard(
    State(state): State<AppState>,
    ClientSession(session): ClientSession,
) -> WebResult<Response> {
    let Some(user) = session.get_session::<CurrentUser>(LOGGED_USER_KEY)? else {
        return Ok(Redirect::to("/").into_response());
    };

    let menu = match state.navigation.get_navigation_cache().await {
        Ok(menu) => menu.visible_for(&user.roles),
        Err(e) => {
            warn!("Rendering dashboard without navigation: {}", e);
            NavigationMenu::default()
        }
    };

    let page = DashboardTemplate::new(&state.settings.app.application_title, user, menu);
    Ok(Html(page.render()?).into_response())
}
