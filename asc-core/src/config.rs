//! Application configuration
//!
//! Settings are read from an optional TOML file and overlaid with `ASC_`
//! prefixed environment variables (`ASC_APP__ADMIN_EMAIL`, ...).

use crate::error::{AscError, AscResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default password shipped for the seeded admin account
pub const DEFAULT_ADMIN_PASSWORD: &str = "Admin@123";

/// Seed data and application-wide settings (the `[app]` section)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApplicationSettings {
    pub application_title: String,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
    /// Role the admin account is placed in
    pub admin_role: String,
    pub engineer_name: Option<String>,
    pub engineer_email: Option<String>,
    pub engineer_password: Option<String>,
    pub engineer_role: String,
    /// Comma separated list of roles that must exist
    pub roles: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            application_title: "Automobile Service Center".to_string(),
            admin_name: "Admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            admin_role: "Admin".to_string(),
            engineer_name: None,
            engineer_email: None,
            engineer_password: None,
            engineer_role: "Engineer".to_string(),
            roles: "Admin,User,Engineer".to_string(),
        }
    }
}

impl ApplicationSettings {
    /// Role names in declaration order, trimmed, empties and duplicates removed
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.roles.split(',').map(str::trim) {
            if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                continue;
            }
            names.push(name.to_string());
        }
        names
    }

    /// Engineer seed account, when all of its fields are configured
    pub fn engineer_account(&self) -> Option<(&str, &str, &str)> {
        match (
            self.engineer_name.as_deref(),
            self.engineer_email.as_deref(),
            self.engineer_password.as_deref(),
        ) {
            (Some(name), Some(email), Some(password)) => Some((name, email, password)),
            _ => None,
        }
    }

    fn has_role(&self, role: &str) -> bool {
        self.role_names().iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// HTTP session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Sliding inactivity timeout
    pub idle_timeout_secs: u64,
    /// How often expired sessions are swept
    pub purge_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "asc.session".to_string(),
            idle_timeout_secs: 20 * 60,
            purge_interval_secs: 60,
        }
    }
}

/// Startup bootstrap settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootstrapSettings {
    /// Per-step timeout; unset waits for each step indefinitely
    pub step_timeout_secs: Option<u64>,
}

/// Navigation menu settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationSettings {
    /// JSON menu definition; the built-in menu is used when unset
    pub source_path: Option<String>,
    pub cache_key: String,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            source_path: None,
            cache_key: "NavigationCache".to_string(),
        }
    }
}

/// Top level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AscConfig {
    pub app: ApplicationSettings,
    pub logging: LoggingConfig,
    pub session: SessionSettings,
    pub bootstrap: BootstrapSettings,
    pub navigation: NavigationSettings,
}

impl AscConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AscResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AscError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| AscError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Load configuration from an optional TOML file overlaid with
    /// `ASC_`-prefixed environment variables. Nested keys use `__`.
    pub fn load(path: Option<&Path>) -> AscResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ASC")
                .prefix_separator("_")
                .separator("__"),
        );

        let layered = builder.build().map_err(|e| AscError::Config {
            message: format!("Failed to load configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("build"),
        })?;

        layered.try_deserialize().map_err(|e| AscError::Config {
            message: format!("Invalid configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("deserialize")
                .with_suggestion("Check value types in config file and ASC_* variables"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AscResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AscError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| AscError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AscResult<()> {
        let app = &self.app;

        if !app.admin_email.contains('@') {
            return Err(crate::validation_error!(
                "Admin email must be a valid address",
                "app.admin_email",
                "config"
            ));
        }

        if app.admin_password.is_empty() {
            return Err(crate::validation_error!(
                "Admin password must not be empty",
                "app.admin_password",
                "config"
            ));
        }

        if app.role_names().is_empty() {
            return Err(crate::validation_error!(
                "At least one role must be configured",
                "app.roles",
                "config"
            ));
        }

        if !app.has_role(&app.admin_role) {
            return Err(crate::validation_error!(
                format!("Admin role '{}' is not listed in app.roles", app.admin_role),
                "app.admin_role",
                "config"
            ));
        }

        if app.engineer_account().is_some() && !app.has_role(&app.engineer_role) {
            return Err(crate::validation_error!(
                format!(
                    "Engineer role '{}' is not listed in app.roles",
                    app.engineer_role
                ),
                "app.engineer_role",
                "config"
            ));
        }

        if self.session.idle_timeout_secs == 0 {
            return Err(crate::validation_error!(
                "Session idle timeout must be greater than 0",
                "session.idle_timeout_secs",
                "config"
            ));
        }

        if self.bootstrap.step_timeout_secs == Some(0) {
            return Err(crate::validation_error!(
                "Bootstrap step timeout must be greater than 0 when set",
                "bootstrap.step_timeout_secs",
                "config"
            ));
        }

        Ok(())
    }

    /// Non-fatal configuration problems worth logging at startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.app.admin_password == DEFAULT_ADMIN_PASSWORD {
            warnings.push("Admin account uses the default password".to_string());
        }

        let engineer_fields = [
            self.app.engineer_name.is_some(),
            self.app.engineer_email.is_some(),
            self.app.engineer_password.is_some(),
        ];
        if engineer_fields.iter().any(|f| *f) && self.app.engineer_account().is_none() {
            warnings.push(
                "Engineer account is partially configured and will not be seeded".to_string(),
            );
        }

        warnings
    }
}
