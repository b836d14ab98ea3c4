//! ASC Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use asc_core::AscConfig;
use axum::serve;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Main ASC web server
pub struct AscServer {
    config: WebConfig,
    state: AppState,
}

impl AscServer {
    /// Create a new server
    pub async fn new(config: WebConfig, settings: AscConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone(), settings).await?;

        Ok(Self { config, state })
    }

    /// Run the startup bootstrap, then serve until shutdown
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting ASC Web Server");
        info!("Server address: http://{}", address);
        info!("Development mode: {}", self.config.dev_mode);

        let report = self.state.run_bootstrap().await;
        for step in report.failed_steps() {
            warn!(
                step = %step.name,
                error = step.error.as_deref().unwrap_or("unknown"),
                "Startup step failed; continuing"
            );
        }

        // Create the application
        let app = create_app(self.state.clone());

        // Create TCP listener
        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        // Sweep expired sessions
        let purge_state = self.state.clone();
        let purge_every =
            Duration::from_secs(self.state.settings.session.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(purge_every);
            loop {
                interval.tick().await;
                let purged = purge_state.purge_sessions();
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        });

        // Start the server
        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for AscServer
pub struct AscServerBuilder {
    config: WebConfig,
    settings: AscConfig,
}

impl AscServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
            settings: AscConfig::default(),
        }
    }

    /// Start from an existing web configuration
    pub fn config(mut self, config: WebConfig) -> Self {
        self.config = config;
        self
    }

    /// Application settings
    pub fn settings(mut self, settings: AscConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = Some(database_url.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<AscServer> {
        AscServer::new(self.config, self.settings).await
    }
}

impl Default for AscServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_creation() {
        let server = AscServer::new(WebConfig::default(), AscConfig::default()).await;
        assert!(server.is_ok());
    }

    #[test]
    fn test_server_builder() {
        let builder = AscServerBuilder::new()
            .host("localhost")
            .port(3000)
            .dev_mode(true);

        assert_eq!(builder.config.host, "localhost");
        assert_eq!(builder.config.port, 3000);
        assert!(builder.config.dev_mode);
    }

    #[tokio::test]
    async fn test_builder_settings_reach_state() {
        let mut settings = AscConfig::default();
        settings.session.cookie_name = "custom.session".to_string();

        let server = AscServerBuilder::new()
            .settings(settings)
            .build()
            .await
            .unwrap();
        assert_eq!(
            server.state().settings.session.cookie_name,
            "custom.session"
        );
    }
}
