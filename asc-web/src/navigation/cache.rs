//! Navigation cache built once at startup

use super::{NavigationError, NavigationMenu, NavigationResult};
use asc_core::NavigationSettings;
use asc_utilities::{MemoryCache, SessionExt};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Build and read the cached navigation menu
#[async_trait]
pub trait NavigationCacheOperations: Send + Sync {
    /// Load the menu and store it in the application cache
    async fn create_navigation_cache(&self) -> NavigationResult<()>;

    /// Read the menu back; fails with [`NavigationError::NotBuilt`] until
    /// [`create_navigation_cache`](Self::create_navigation_cache) succeeded
    async fn get_navigation_cache(&self) -> NavigationResult<NavigationMenu>;
}

/// Navigation menu kept as JSON in the shared application cache
#[derive(Debug, Clone)]
pub struct NavigationCache {
    cache: MemoryCache<String, Vec<u8>>,
    cache_key: String,
    source: Option<PathBuf>,
}

impl NavigationCache {
    pub fn new(cache: MemoryCache<String, Vec<u8>>, settings: &NavigationSettings) -> Self {
        Self {
            cache,
            cache_key: settings.cache_key.clone(),
            source: settings.source_path.as_ref().map(PathBuf::from),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Read the menu from the configured file, or the built-in menu
    pub async fn load_menu(&self) -> NavigationResult<NavigationMenu> {
        match &self.source {
            Some(path) => {
                debug!("Loading navigation menu from {}", path.display());
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| NavigationError::Io {
                        path: path.clone(),
                        source,
                    })?;
                NavigationMenu::from_json(&json)
            }
            None => NavigationMenu::builtin(),
        }
    }
}

#[async_trait]
impl NavigationCacheOperations for NavigationCache {
    async fn create_navigation_cache(&self) -> NavigationResult<()> {
        let menu = self.load_menu().await?;
        self.cache.set_session(&self.cache_key, &menu)?;

        info!(
            key = %self.cache_key,
            items = menu.menu_items.len(),
            "Navigation cache created"
        );
        Ok(())
    }

    async fn get_navigation_cache(&self) -> NavigationResult<NavigationMenu> {
        self.cache
            .get_session::<NavigationMenu>(&self.cache_key)?
            .ok_or_else(|| NavigationError::NotBuilt(self.cache_key.clone()))
    }
}
