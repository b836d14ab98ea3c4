//! Application bootstrap steps

use super::{BootstrapSequencer, BootstrapStep};
use crate::identity::{IdentitySeed, RoleDirectory, UserDirectory};
use crate::navigation::NavigationCacheOperations;
use crate::AppState;
use asc_core::{cache_error, identity_error, ApplicationSettings, AscResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Ensures the configured roles and default accounts exist
pub struct IdentitySeedStep {
    users: Arc<dyn UserDirectory>,
    roles: Arc<dyn RoleDirectory>,
    settings: ApplicationSettings,
}

impl IdentitySeedStep {
    pub const NAME: &'static str = "identity_seed";

    pub fn new(
        users: Arc<dyn UserDirectory>,
        roles: Arc<dyn RoleDirectory>,
        settings: ApplicationSettings,
    ) -> Self {
        Self {
            users,
            roles,
            settings,
        }
    }
}

#[async_trait]
impl BootstrapStep for IdentitySeedStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> AscResult<()> {
        IdentitySeed::new()
            .seed(self.users.as_ref(), self.roles.as_ref(), &self.settings)
            .await
            .map(|_| ())
            .map_err(|e| identity_error!(format!("Identity seed failed: {}", e), "bootstrap", e))
    }
}

/// Builds the navigation menu cache
pub struct NavigationCacheStep {
    navigation: Arc<dyn NavigationCacheOperations>,
}

impl NavigationCacheStep {
    pub const NAME: &'static str = "navigation_cache";

    pub fn new(navigation: Arc<dyn NavigationCacheOperations>) -> Self {
        Self { navigation }
    }
}

#[async_trait]
impl BootstrapStep for NavigationCacheStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> AscResult<()> {
        self.navigation
            .create_navigation_cache()
            .await
            .map_err(|e| {
                cache_error!(
                    format!("Navigation cache build failed: {}", e),
                    "bootstrap",
                    e
                )
            })
    }
}

/// Identity seed followed by the navigation cache build
pub fn application_sequencer(state: &AppState) -> BootstrapSequencer {
    BootstrapSequencer::new()
        .with_step_timeout(
            state
                .settings
                .bootstrap
                .step_timeout_secs
                .map(Duration::from_secs),
        )
        .add_step(IdentitySeedStep::new(
            Arc::clone(&state.users),
            Arc::clone(&state.roles),
            state.settings.app.clone(),
        ))
        .add_step(NavigationCacheStep::new(state.navigation.clone()))
}
