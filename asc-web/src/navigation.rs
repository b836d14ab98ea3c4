//! Navigation menu and its startup-built cache

pub mod cache;
pub mod menu;

pub use cache::{NavigationCache, NavigationCacheOperations};
pub use menu::{NavigationMenu, NavigationMenuItem};

use asc_utilities::SessionError;
use std::path::PathBuf;

pub type NavigationResult<T> = Result<T, NavigationError>;

/// Navigation loading and cache errors
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Failed to read navigation source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse navigation menu: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid navigation menu: {0}")]
    InvalidMenu(String),

    #[error("Navigation cache error: {0}")]
    Session(#[from] SessionError),

    #[error("Navigation cache '{0}' has not been built")]
    NotBuilt(String),
}
