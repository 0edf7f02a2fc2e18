use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use url::Url;

/// Minimum length of the session secret, required by the cookie key derivation
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid server configuration: {0}")]
    Server(String),
    #[error("Invalid logging configuration: {0}")]
    Logging(String),
    #[error("Invalid Sentry configuration: {0}")]
    Sentry(String),
    #[error("Invalid backend configuration: {0}")]
    Backend(String),
    #[error("Invalid session configuration: {0}")]
    Session(String),
    #[error("Invalid listing configuration: {0}")]
    Listing(String),
    #[error("Invalid report configuration: {0}")]
    Report(String),
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sentry: SentryConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub environment: String,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.server.validate()?;
        self.logging.validate()?;
        self.sentry.validate()?;
        self.backend.validate()?;
        self.session.validate(self.is_production())?;
        self.listing.validate()?;
        self.report.validate()?;
        Ok(())
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "dev"
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production" || self.environment == "prod"
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    #[serde(default = "default_graceful_shutdown_timeout")]
    pub graceful_shutdown_timeout_seconds: u64,
    /// Upper bound for multipart bodies (avatar uploads)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.host.is_empty() {
            return Err(ConfigValidationError::Server("Host cannot be empty".to_string()));
        }

        if self.host != "localhost" && IpAddr::from_str(&self.host).is_err() {
            return Err(ConfigValidationError::Server(format!(
                "Host must be 'localhost' or an IP address, got '{}'",
                self.host
            )));
        }

        if self.port == 0 {
            return Err(ConfigValidationError::Server("Port cannot be 0".to_string()));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigValidationError::Server("Timeout must be greater than 0".to_string()));
        }

        if self.graceful_shutdown_timeout_seconds == 0 {
            return Err(ConfigValidationError::Server(
                "Graceful shutdown timeout must be greater than 0".to_string(),
            ));
        }

        if self.body_limit_bytes == 0 {
            return Err(ConfigValidationError::Server("Body limit must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Get the socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        let ip = if self.host == "localhost" {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::from_str(&self.host)
                .map_err(|_| ConfigValidationError::Server(format!("Invalid IP address: {}", self.host)))?
        };

        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_graceful_shutdown_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    5 * 1024 * 1024
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub include_location: bool,
    #[serde(default = "default_log_target")]
    pub target: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigValidationError::Logging(format!(
                "Invalid log level '{}'. Valid levels: {}",
                self.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigValidationError::Logging(format!(
                "Invalid log format '{}'. Valid formats: {}",
                self.format,
                valid_formats.join(", ")
            )));
        }

        let valid_targets = ["stdout", "stderr", "file"];
        if !valid_targets.contains(&self.target.to_lowercase().as_str()) {
            return Err(ConfigValidationError::Logging(format!(
                "Invalid log target '{}'. Valid targets: {}",
                self.target,
                valid_targets.join(", ")
            )));
        }

        if self.target.to_lowercase() == "file" && self.file_path.is_none() {
            return Err(ConfigValidationError::Logging(
                "File path must be provided when target is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_log_target() -> String {
    "stdout".to_string()
}

/// Sentry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,
    pub environment: String,
    pub traces_sample_rate: f32,
    #[serde(default = "default_release")]
    pub release: Option<String>,
    #[serde(default = "default_max_breadcrumbs")]
    pub max_breadcrumbs: usize,
    #[serde(default)]
    pub debug: bool,
}

impl SentryConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        // An empty DSN disables Sentry
        if !self.dsn.is_empty() && !self.dsn.starts_with("https://") && !self.dsn.starts_with("http://") {
            return Err(ConfigValidationError::Sentry(
                "DSN must be a valid URL starting with http:// or https://".to_string(),
            ));
        }

        if self.environment.is_empty() {
            return Err(ConfigValidationError::Sentry("Environment cannot be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.traces_sample_rate) {
            return Err(ConfigValidationError::Sentry(
                "Traces sample rate must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_breadcrumbs == 0 {
            return Err(ConfigValidationError::Sentry("Max breadcrumbs must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Check if Sentry is enabled (has a DSN)
    pub fn is_enabled(&self) -> bool {
        !self.dsn.is_empty()
    }
}

fn default_release() -> Option<String> {
    Some(env!("CARGO_PKG_VERSION").to_string())
}

fn default_max_breadcrumbs() -> usize {
    100
}

/// Which implementation of the backend client to wire up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store, for local development and tests
    Memory,
    /// Firebase REST APIs (Firestore, Identity Toolkit, Storage)
    Firebase,
}

/// Cloud backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub storage_bucket: String,
    /// OAuth access token for privileged calls (account deletion)
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_users_collection")]
    pub users_collection: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_firestore_endpoint")]
    pub firestore_endpoint: String,
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,
    /// Administrator account created at startup when missing
    #[serde(default)]
    pub seed_admin: Option<SeedAccount>,
}

/// Account provisioned at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.users_collection.is_empty() {
            return Err(ConfigValidationError::Backend("Users collection cannot be empty".to_string()));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigValidationError::Backend("Timeout must be greater than 0".to_string()));
        }

        if self.kind == BackendKind::Firebase {
            if self.project_id.is_empty() {
                return Err(ConfigValidationError::Backend("Project id is required for firebase".to_string()));
            }
            if self.api_key.is_empty() {
                return Err(ConfigValidationError::Backend("API key is required for firebase".to_string()));
            }
            if self.storage_bucket.is_empty() {
                return Err(ConfigValidationError::Backend(
                    "Storage bucket is required for firebase".to_string(),
                ));
            }
            for endpoint in [&self.firestore_endpoint, &self.identity_endpoint, &self.storage_endpoint] {
                Url::parse(endpoint).map_err(|e| {
                    ConfigValidationError::Backend(format!("Invalid endpoint '{}': {}", endpoint, e))
                })?;
            }
        }

        if let Some(seed) = &self.seed_admin {
            if seed.email.is_empty() || seed.password.len() < 6 {
                return Err(ConfigValidationError::Backend(
                    "Seed admin needs an email and a password of at least 6 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn default_users_collection() -> String {
    "users".to_string()
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_firestore_endpoint() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_identity_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_storage_endpoint() -> String {
    "https://firebasestorage.googleapis.com".to_string()
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Master secret for the encrypted session cookie. Empty means a random
    /// key per process (sessions do not survive restarts).
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_session_max_age")]
    pub max_age_seconds: i64,
}

impl SessionConfig {
    pub fn validate(&self, production: bool) -> Result<(), ConfigValidationError> {
        if self.cookie_name.is_empty() {
            return Err(ConfigValidationError::Session("Cookie name cannot be empty".to_string()));
        }

        if self.secret.is_empty() {
            if production {
                return Err(ConfigValidationError::Session(
                    "A session secret is required in production".to_string(),
                ));
            }
        } else if self.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigValidationError::Session(format!(
                "Session secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }

        if self.max_age_seconds <= 0 {
            return Err(ConfigValidationError::Session("Max age must be greater than 0".to_string()));
        }

        Ok(())
    }
}

fn default_cookie_name() -> String {
    "user_admin_session".to_string()
}

fn default_session_max_age() -> i64 {
    60 * 60 * 8
}

/// Admin listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl ListingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_page_size == 0 {
            return Err(ConfigValidationError::Listing("Default page size must be greater than 0".to_string()));
        }

        if self.max_page_size < self.default_page_size {
            return Err(ConfigValidationError::Listing(
                "Max page size cannot be smaller than the default page size".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_page_size() -> usize {
    5
}

fn default_max_page_size() -> usize {
    100
}

/// Letterhead of the PDF users report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub logo_path: Option<String>,
    pub institution: String,
    pub code: String,
    pub version: String,
    pub validity: String,
    pub form_name: String,
    pub form_title: String,
    pub title: String,
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.title.is_empty() {
            return Err(ConfigValidationError::Report("Report title cannot be empty".to_string()));
        }

        if let Some(path) = &self.logo_path {
            if path.is_empty() {
                return Err(ConfigValidationError::Report("Logo path cannot be empty if provided".to_string()));
            }
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            graceful_shutdown_timeout_seconds: default_graceful_shutdown_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            include_location: false,
            target: default_log_target(),
            file_path: None,
        }
    }
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: "".to_string(),
            environment: "development".to_string(),
            traces_sample_rate: 0.1,
            release: default_release(),
            max_breadcrumbs: default_max_breadcrumbs(),
            debug: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            project_id: String::new(),
            api_key: String::new(),
            storage_bucket: String::new(),
            access_token: None,
            users_collection: default_users_collection(),
            timeout_seconds: default_backend_timeout(),
            firestore_endpoint: default_firestore_endpoint(),
            identity_endpoint: default_identity_endpoint(),
            storage_endpoint: default_storage_endpoint(),
            seed_admin: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: default_cookie_name(),
            secure: false,
            max_age_seconds: default_session_max_age(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            logo_path: None,
            institution: "Institución Educativa".to_string(),
            code: "Código: FO-GU-01".to_string(),
            version: "Versión: 01".to_string(),
            validity: "Vigencia: 2024-01-01".to_string(),
            form_name: "Formato".to_string(),
            form_title: "Listado de usuarios registrados".to_string(),
            title: "Reporte de Usuarios".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sentry: SentryConfig::default(),
            backend: BackendConfig::default(),
            session: SessionConfig::default(),
            listing: ListingConfig::default(),
            report: ReportConfig::default(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_socket_addr_for_localhost() {
        let server = ServerConfig {
            host: "localhost".to_string(),
            port: 3000,
            ..ServerConfig::default()
        };

        let addr = server.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_firebase_requires_credentials() {
        let backend = BackendConfig {
            kind: BackendKind::Firebase,
            ..BackendConfig::default()
        };

        assert!(matches!(backend.validate(), Err(ConfigValidationError::Backend(_))));

        let backend = BackendConfig {
            kind: BackendKind::Firebase,
            project_id: "demo".to_string(),
            api_key: "key".to_string(),
            storage_bucket: "demo.appspot.com".to_string(),
            ..BackendConfig::default()
        };
        assert!(backend.validate().is_ok());
    }

    #[test]
    fn test_short_session_secret_rejected() {
        let session = SessionConfig {
            secret: "too-short".to_string(),
            ..SessionConfig::default()
        };

        assert!(session.validate(false).is_err());
    }

    #[test]
    fn test_production_requires_session_secret() {
        let session = SessionConfig::default();

        assert!(session.validate(false).is_ok());
        assert!(session.validate(true).is_err());
    }

    #[test]
    fn test_listing_max_must_cover_default() {
        let listing = ListingConfig {
            default_page_size: 10,
            max_page_size: 5,
        };

        assert!(listing.validate().is_err());
    }
}
