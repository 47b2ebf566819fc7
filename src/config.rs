use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_API_URL: &str = "https://hotel-repair-backend.onrender.com/api";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_ADMIN_PAGE_SIZE: u32 = 10;
const DEFAULT_REPORT_PAGE_SIZE: u32 = 20;
const SESSION_DIR_ENV: &str = "HOTEL_REPAIR_HOME";

/// Client configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Base URL of the repair backend, including the `/api` prefix
    #[validate(custom = "validate_api_url")]
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[validate(custom = "validate_log_level")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Where the admin session is persisted. Falls back to
    /// `$HOTEL_REPAIR_HOME/session.json`, then `~/.hotel-repair/session.json`.
    #[serde(default)]
    pub session_file: Option<String>,

    /// Rows per page on the admin request list
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_admin_page_size")]
    pub admin_page_size: u32,

    /// Rows per page on the monthly report table
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_report_page_size")]
    pub report_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            session_file: None,
            admin_page_size: DEFAULT_ADMIN_PAGE_SIZE,
            report_page_size: DEFAULT_REPORT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// JSON logs when asked for, and always in production.
    pub fn json_logs(&self) -> bool {
        self.log_json || self.is_production()
    }

    /// Resolved location of the session file, if one can be determined.
    pub fn session_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.session_file.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = env::var(SESSION_DIR_ENV) {
            let mut path = PathBuf::from(dir);
            path.push("session.json");
            return Some(path);
        }

        env::var("HOME").ok().map(|home| {
            let mut path = PathBuf::from(home);
            path.push(".hotel-repair");
            path.push("session.json");
            path
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_admin_page_size() -> u32 {
    DEFAULT_ADMIN_PAGE_SIZE
}

fn default_report_page_size() -> u32 {
    DEFAULT_REPORT_PAGE_SIZE
}

fn validate_api_url(raw: &str) -> Result<(), ValidationError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => {
            let mut err = ValidationError::new("api_url");
            err.message = Some("Must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter.
///
/// `RUST_LOG` wins when set. Calling this twice is harmless.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("hotel_repair_client={level},hotel_repair={level}");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // CLI output goes to stdout; logs stay on stderr
    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same as [`load_config`] with an explicit config directory and profile.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    let profile_file = |name: &str| {
        File::from(config_dir.join(name))
            .format(config::FileFormat::Toml)
            .required(false)
    };

    let config = Config::builder()
        .set_default("api_url", DEFAULT_API_URL)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("admin_page_size", i64::from(DEFAULT_ADMIN_PAGE_SIZE))?
        .set_default("report_page_size", i64::from(DEFAULT_REPORT_PAGE_SIZE))?
        .add_source(profile_file("default.toml"))
        .add_source(profile_file(&format!("{run_env}.toml")))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(api_url = %app_config.api_url, "Configuration loaded successfully");
    Ok(app_config)
}
