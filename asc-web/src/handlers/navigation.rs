//! Navigation menu handler

use crate::{
    navigation::{NavigationCacheOperations, NavigationMenu},
    session::{ClientSession, CurrentUser, LOGGED_USER_KEY},
    AppState, WebResult,
};
use asc_utilities::SessionExt;
use axum::{extract::State, response::Json};

/// Menu visible to the signed-in user; anonymous callers get public items
pub async fn get_navigation(
    State(state): State<AppState>,
    ClientSession(session): ClientSession,
) -> WebResult<Json<NavigationMenu>> {
    let roles = session
        .get_session::<CurrentUser>(LOGGED_USER_KEY)?
        .map(|user| user.roles)
        .unwrap_or_default();

    let menu = state.navigation.get_navigation_cache().await?;
    Ok(Json(menu.visible_for(&roles)))
}
