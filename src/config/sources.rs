use crate::config::settings::{AppConfig, ConfigValidationError};
use config::{Config, ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::Path;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Validation error: {0}")]
    Validation(#[from] ConfigValidationError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AppConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (`APP__SECTION__KEY`, highest priority)
    /// 2. `config/local.yaml`
    /// 3. `config/{ENVIRONMENT}.yaml`
    /// 4. `config/default.yaml`
    /// 5. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigLoadError> {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            .add_source(File::from_str(&Self::default_config_template(), FileFormat::Yaml));

        for name in ["default", environment.as_str(), "local"] {
            let base = format!("config/{}", name);
            if Path::new(&format!("{}.yaml", base)).exists() || Path::new(&format!("{}.yml", base)).exists() {
                builder = builder.add_source(File::with_name(&base).format(FileFormat::Yaml).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;
        app_config.environment = environment;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Load configuration from a specific file, layered over the built-in defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(File::from_str(&Self::default_config_template(), FileFormat::Yaml))
            .add_source(File::from(path.as_ref()))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Write the documented configuration template to a file
    pub fn write_template<P: AsRef<Path>>(path: P) -> Result<(), ConfigLoadError> {
        std::fs::write(path, Self::default_config_template())?;
        Ok(())
    }

    /// Get the default configuration template as a YAML string
    pub fn default_config_template() -> String {
        r#"# User admin panel configuration
# Copy this file to config/default.yaml (or config/{environment}.yaml) and adjust.

environment: "development"

server:
  # Host to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
  host: "0.0.0.0"
  port: 8080
  # Request timeout in seconds
  timeout_seconds: 30
  graceful_shutdown_timeout_seconds: 30
  # Maximum request body size (avatar uploads), in bytes
  body_limit_bytes: 5242880

logging:
  # trace, debug, info, warn, error
  level: "info"
  # json, pretty, compact
  format: "json"
  include_location: false
  # stdout, stderr, file
  target: "stdout"
  # file_path: "/var/log/user-admin.log"

sentry:
  # Leave empty to disable Sentry
  dsn: ""
  environment: "development"
  traces_sample_rate: 0.1
  max_breadcrumbs: 100
  debug: false

backend:
  # memory (in-process, for development) or firebase
  kind: "memory"
  project_id: ""
  api_key: ""
  storage_bucket: ""
  # OAuth token used for privileged identity calls (account deletion)
  # access_token: ""
  users_collection: "users"
  # Timeout applied to every backend call, in seconds
  timeout_seconds: 10
  firestore_endpoint: "https://firestore.googleapis.com"
  identity_endpoint: "https://identitytoolkit.googleapis.com"
  storage_endpoint: "https://firebasestorage.googleapis.com"
  # Administrator provisioned at startup if no account uses this email
  # seed_admin:
  #   name: "Administrador"
  #   email: "admin@example.com"
  #   password: "change-me"

session:
  # At least 64 bytes. Empty generates a random key per process (not allowed in production).
  secret: ""
  cookie_name: "user_admin_session"
  # Mark the cookie Secure (requires HTTPS)
  secure: false
  max_age_seconds: 28800

listing:
  default_page_size: 5
  max_page_size: 100

report:
  # PNG logo drawn in the letterhead
  # logo_path: "assets/logo.png"
  institution: "Institución Educativa"
  code: "Código: FO-GU-01"
  version: "Versión: 01"
  validity: "Vigencia: 2024-01-01"
  form_name: "Formato"
  form_title: "Listado de usuarios registrados"
  title: "Reporte de Usuarios"
"#
        .to_string()
    }

    /// Get configuration as a YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get configuration as a pretty-printed JSON string
    pub fn to_json(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Print configuration summary (without sensitive values)
    pub fn print_summary(&self) {
        println!("Configuration Summary:");
        println!("  Environment: {}", self.environment);
        println!("  Server: {}:{}", self.server.host, self.server.port);
        println!("  Backend: {:?} (project: {})", self.backend.kind, self.backend.project_id);
        println!("  Log Level: {}", self.logging.level);
        println!("  Sentry: {}", if self.sentry.is_enabled() { "enabled" } else { "disabled" });
        println!("  Page size: {}", self.listing.default_page_size);
    }
}
