//! Shared application state

use crate::{
    bootstrap::{application_sequencer, StartupReport},
    identity::{MemoryIdentityStore, RoleDirectory, UserDirectory},
    navigation::NavigationCache,
    WebConfig, WebResult,
};
use asc_core::AscConfig;
use asc_utilities::{Expiration, MemoryCache, MemorySessionStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

#[cfg(feature = "sqlite")]
use crate::identity::SqliteIdentityStore;
#[cfg(feature = "sqlite")]
use tracing::warn;

/// Capacity of the process-wide application cache
const APP_CACHE_CAPACITY: usize = 1024;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: WebConfig,
    /// Application settings
    pub settings: Arc<AscConfig>,
    pub users: Arc<dyn UserDirectory>,
    pub roles: Arc<dyn RoleDirectory>,
    /// Process-wide byte cache; holds the navigation menu
    pub cache: MemoryCache<String, Vec<u8>>,
    pub navigation: Arc<NavigationCache>,
    pub sessions: Arc<dyn SessionStore>,
    /// Outcome of the startup bootstrap, once it has run
    pub startup_report: Arc<RwLock<Option<StartupReport>>>,
}

impl AppState {
    /// Create application state, picking the identity backend from the
    /// configured database URL
    pub async fn new(config: WebConfig, settings: AscConfig) -> WebResult<Self> {
        #[cfg(feature = "sqlite")]
        let (users, roles): (Arc<dyn UserDirectory>, Arc<dyn RoleDirectory>) =
            match &config.database_url {
                Some(url) => match SqliteIdentityStore::connect(url).await {
                    Ok(store) => {
                        info!("Identity store initialized: {}", url);
                        let store = Arc::new(store);
                        (store.clone(), store)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to open identity database, falling back to memory: {}",
                            e
                        );
                        memory_directories()
                    }
                },
                None => memory_directories(),
            };

        #[cfg(not(feature = "sqlite"))]
        let (users, roles) = memory_directories();

        Ok(Self::with_directories(config, settings, users, roles))
    }

    /// Create application state over the given directories
    pub fn with_directories(
        config: WebConfig,
        settings: AscConfig,
        users: Arc<dyn UserDirectory>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        let cache = MemoryCache::new(APP_CACHE_CAPACITY, Expiration::Never);
        let navigation = Arc::new(NavigationCache::new(cache.clone(), &settings.navigation));
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(
            Duration::from_secs(settings.session.idle_timeout_secs),
        ));

        info!("Application state initialized");
        Self {
            config,
            settings: Arc::new(settings),
            users,
            roles,
            cache,
            navigation,
            sessions,
            startup_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Run the startup bootstrap and keep its report
    pub async fn run_bootstrap(&self) -> StartupReport {
        let report = application_sequencer(self).run().await;
        *self.startup_report.write().await = Some(report.clone());
        report
    }

    pub async fn startup_report(&self) -> Option<StartupReport> {
        self.startup_report.read().await.clone()
    }

    /// Drop expired sessions
    pub fn purge_sessions(&self) -> usize {
        match self.sessions.purge_expired() {
            Ok(purged) => purged,
            Err(e) => {
                tracing::warn!("Session purge failed: {}", e);
                0
            }
        }
    }
}

fn memory_directories() -> (Arc<dyn UserDirectory>, Arc<dyn RoleDirectory>) {
    let store = Arc::new(MemoryIdentityStore::new());
    (store.clone(), store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::StepState;

    #[tokio::test]
    async fn test_memory_state_bootstraps() {
        let state = AppState::new(WebConfig::default(), AscConfig::default())
            .await
            .unwrap();
        assert!(state.startup_report().await.is_none());

        let report = state.run_bootstrap().await;
        assert!(report.all_succeeded());
        assert_eq!(
            report.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["identity_seed", "navigation_cache"]
        );

        let stored = state.startup_report().await.unwrap();
        assert_eq!(stored.steps.len(), 2);
        assert!(state.cache.contains_key(&"NavigationCache".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_missing_navigation_source_is_recorded() {
        let mut settings = AscConfig::default();
        settings.navigation.source_path = Some("/nonexistent/Navigation.json".to_string());

        let state = AppState::new(WebConfig::default(), settings).await.unwrap();
        let report = state.run_bootstrap().await;

        assert_eq!(report.step("identity_seed").unwrap().state, StepState::Succeeded);
        assert_eq!(report.step("navigation_cache").unwrap().state, StepState::Failed);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_state_seeds_database() {
        let config = WebConfig {
            database_url: Some("sqlite::memory:".to_string()),
            ..WebConfig::default()
        };
        let state = AppState::new(config, AscConfig::default()).await.unwrap();

        assert!(state.run_bootstrap().await.all_succeeded());
        assert_eq!(state.users.count().await.unwrap(), 1);
        assert_eq!(state.roles.roles().await.unwrap().len(), 3);
    }
}
