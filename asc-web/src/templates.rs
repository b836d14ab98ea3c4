//! Template system for server-side rendering
//!
//! This module provides templates for server-side rendering using Askama.

use crate::navigation::NavigationMenu;
use crate::session::CurrentUser;
use askama::Template;

/// Landing page template
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub user_name: Option<String>,
    pub version: String,
}

/// Dashboard template listing the user's navigation menu
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub title: String,
    pub user: CurrentUser,
    pub menu: NavigationMenu,
}

impl IndexTemplate {
    pub fn new(application_title: &str, user_name: Option<String>) -> Self {
        Self {
            title: application_title.to_string(),
            user_name,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl DashboardTemplate {
    pub fn new(application_title: &str, user: CurrentUser, menu: NavigationMenu) -> Self {
        Self {
            title: format!("Dashboard - {}", application_title),
            user,
            menu,
        }
    }
}
