use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEV_ENV: &str = "development";

/// Bundled secret for local development only. Deployment validation rejects
/// it in any other environment.
const DEV_JWT_SECRET: &str =
    "sufra_local_development_jwt_secret_for_tests_only_rotate_me_before_any_deploy";

/// Runtime configuration, deserialized from layered sources and validated
/// before the server starts.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// postgres:// for deployments, sqlite:// for local work and tests.
    #[validate(custom = "checks::database_url")]
    pub database_url: String,

    /// HS256 signing key. 64 characters minimum.
    #[validate(length(min = 64), custom = "checks::jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime in seconds, between five minutes and a day.
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Deployment profile name, e.g. development or production.
    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "checks::log_level")]
    pub log_level: String,

    /// Emit log lines as JSON instead of the human format.
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending schema migrations during startup.
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated origin list for non-development CORS.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Opt-in to permissive CORS outside development.
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default)]
    pub cors_allow_credentials: bool,

    #[serde(default = "defaults::db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "defaults::db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// VAT rate applied when pricing menu items, as a fraction (0.15 = 15%).
    #[serde(default = "defaults::tax_rate")]
    #[validate(custom = "checks::tax_rate")]
    pub default_tax_rate: f64,

    /// Bound of the mpsc channel feeding the notification hub.
    #[serde(default = "defaults::event_channel_capacity")]
    #[validate(custom = "checks::event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Per-subscriber buffer in the hub; overflow drops the event.
    #[serde(default = "defaults::notification_buffer")]
    pub notification_buffer: usize,

    #[serde(default = "defaults::auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "defaults::auth_audience")]
    pub auth_audience: String,

    /// Page size when a list request does not ask for one.
    #[serde(default = "defaults::api_page_size")]
    pub api_default_page_size: u32,

    /// Hard ceiling on requested page sizes.
    #[serde(default = "defaults::api_max_page_size")]
    pub api_max_page_size: u32,
}

impl AppConfig {
    /// Builds a config from the required fields, filling the rest with the
    /// same defaults deserialization would use. Callers still need to run
    /// the validators if the values came from outside.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: defaults::db_max_connections(),
            db_min_connections: defaults::db_min_connections(),
            db_connect_timeout_secs: defaults::db_connect_timeout_secs(),
            db_idle_timeout_secs: defaults::db_idle_timeout_secs(),
            db_acquire_timeout_secs: defaults::db_acquire_timeout_secs(),
            default_tax_rate: defaults::tax_rate(),
            event_channel_capacity: defaults::event_channel_capacity(),
            notification_buffer: defaults::notification_buffer(),
            auth_issuer: defaults::auth_issuer(),
            auth_audience: defaults::auth_audience(),
            api_default_page_size: defaults::api_page_size(),
            api_max_page_size: defaults::api_max_page_size(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEV_ENV)
    }

    fn cors_origins_configured(&self) -> bool {
        match &self.cors_allowed_origins {
            Some(raw) => raw.split(',').any(|origin| !origin.trim().is_empty()),
            None => false,
        }
    }

    /// Permissive CORS is the development default; elsewhere it needs the
    /// explicit opt-in flag.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Cross-field rules the derive cannot express. Checked after the
    /// field validators during `load_config`.
    pub fn validate_deployment_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.cors_origins_configured() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Non-development deployments need APP__CORS_ALLOWED_ORIGINS, or APP__CORS_ALLOW_ANY_ORIGIN=true to opt out".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The development JWT secret is not allowed here. Point APP__JWT_SECRET at a securely generated value.".into(),
            );
            errors.add("jwt_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

impl Default for AppConfig {
    /// Local-development shape: in-memory SQLite plus the bundled dev
    /// secret.
    fn default() -> Self {
        Self::new(
            "sqlite::memory:".to_string(),
            DEV_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            defaults::port(),
            DEV_ENV.to_string(),
        )
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration rejected: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

mod defaults {
    pub fn log_level() -> String {
        "info".to_string()
    }

    pub fn port() -> u16 {
        8080
    }

    pub fn db_max_connections() -> u32 {
        16
    }

    pub fn db_min_connections() -> u32 {
        2
    }

    pub fn db_connect_timeout_secs() -> u64 {
        30
    }

    pub fn db_idle_timeout_secs() -> u64 {
        600
    }

    pub fn db_acquire_timeout_secs() -> u64 {
        8
    }

    // KSA standard VAT rate
    pub fn tax_rate() -> f64 {
        0.15
    }

    pub fn event_channel_capacity() -> usize {
        1024
    }

    pub fn notification_buffer() -> usize {
        64
    }

    pub fn auth_issuer() -> String {
        "sufra-api".to_string()
    }

    pub fn auth_audience() -> String {
        "sufra-app".to_string()
    }

    pub fn api_page_size() -> u32 {
        20
    }

    pub fn api_max_page_size() -> u32 {
        100
    }
}

mod checks {
    use validator::ValidationError;

    fn reject(code: &'static str, msg: &'static str) -> ValidationError {
        let mut err = ValidationError::new(code);
        err.message = Some(msg.into());
        err
    }

    pub fn database_url(url: &str) -> Result<(), ValidationError> {
        let trimmed = url.trim();
        let known = ["postgres://", "postgresql://", "sqlite://", "sqlite:"];
        if known.iter().any(|scheme| trimmed.starts_with(scheme)) {
            Ok(())
        } else {
            Err(reject(
                "database_url",
                "database_url must start with postgres:// or sqlite://",
            ))
        }
    }

    pub fn log_level(level: &str) -> Result<(), ValidationError> {
        match level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(reject(
                "log_level",
                "log_level must be one of trace, debug, info, warn, error",
            )),
        }
    }

    pub fn jwt_secret(secret: &str) -> Result<(), ValidationError> {
        let trimmed = secret.trim();

        if trimmed.len() < 64 {
            return Err(reject(
                "jwt_secret",
                "the JWT secret needs at least 64 characters",
            ));
        }

        // Placeholder values that ship in examples and templates.
        const PLACEHOLDERS: [&str; 4] = [
            "CHANGE_THIS_SECRET_IN_PRODUCTION",
            "INSECURE_DEFAULT_DO_NOT_USE_IN_PRODUCTION",
            "your-secret-key",
            "default-secret-key",
        ];
        if PLACEHOLDERS
            .iter()
            .any(|&known| trimmed.eq_ignore_ascii_case(known))
        {
            return Err(reject(
                "jwt_secret",
                "the JWT secret is a known placeholder; generate a real one",
            ));
        }

        if let Some(first) = trimmed.chars().next() {
            if trimmed.chars().all(|c| c == first) {
                return Err(reject(
                    "jwt_secret",
                    "a single repeated character is not a usable JWT secret",
                ));
            }
        }

        let lowered = trimmed.to_ascii_lowercase();
        if ["changeme", "password", "default", "12345", "abcdef"]
            .iter()
            .any(|fragment| lowered.contains(fragment))
        {
            return Err(reject(
                "jwt_secret",
                "the JWT secret contains a guessable fragment; use random output",
            ));
        }

        let distinct: std::collections::HashSet<char> = trimmed.chars().collect();
        if distinct.len() < 10 {
            return Err(reject(
                "jwt_secret",
                "the JWT secret needs at least 10 distinct characters",
            ));
        }

        Ok(())
    }

    pub fn tax_rate(rate: f64) -> Result<(), ValidationError> {
        if rate.is_finite() && (0.0..=1.0).contains(&rate) {
            Ok(())
        } else {
            Err(reject(
                "default_tax_rate",
                "default_tax_rate must be a finite fraction between 0.0 and 1.0",
            ))
        }
    }

    pub fn event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
        if capacity == 0 {
            return Err(reject(
                "event_channel_capacity",
                "event_channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins when set;
/// otherwise the configured level applies to this crate plus tower-http.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = format!("sufra_api={},tower_http=debug", level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads and validates configuration.
///
/// Sources, later layers overriding earlier ones:
/// 1. built-in defaults
/// 2. `config/default.toml`
/// 3. `config/{profile}.toml`, profile from RUN_ENV or APP_ENV
/// 4. `config/docker.toml` when the DOCKER env var is present
/// 5. `APP__*` environment variables (`__` as the nesting separator)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let profile = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEV_ENV.to_string());
    info!(profile = %profile, "loading configuration");

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "no '{}' directory; using built-in defaults plus environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret deliberately has no default. Everything else is safe to
    // fall back on.
    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://sufra.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", defaults::port())?
        .set_default("environment", DEV_ENV)?
        .set_default("log_level", defaults::log_level())?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, profile)).required(false));

    if env::var("DOCKER").is_ok() {
        info!("docker profile layered in");
        builder =
            builder.add_source(File::with_name(&format!("{}/docker", CONFIG_DIR)).required(false));
    }

    let merged = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // A missing secret would otherwise surface as an opaque deserialize
    // error, so check it up front.
    if merged.get_string("jwt_secret").is_err() {
        error!("jwt_secret is not configured; set APP__JWT_SECRET to a random string of 64+ characters");
        error!("one way to generate one: openssl rand -base64 64");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required; set the APP__JWT_SECRET environment variable".into(),
        )));
    }

    let app_config: AppConfig = merged.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("configuration failed field validation: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_deployment_constraints().map_err(|e| {
        error!("configuration failed deployment validation: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("configuration loaded");
    Ok(app_config)
}

#[cfg(test)]
mod deployment_constraint_tests {
    use super::*;

    fn production_config() -> AppConfig {
        AppConfig::new(
            "sqlite://sufra.db?mode=memory".into(),
            "super_secure_jwt_secret_that_is_long_enough_for_hs256_use_1234567890".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn production_without_origins_is_rejected() {
        let cfg = production_config();
        assert!(cfg.validate_deployment_constraints().is_err());
    }

    #[test]
    fn any_origin_flag_overrides_the_origin_requirement() {
        let mut cfg = production_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_deployment_constraints().is_ok());
    }

    #[test]
    fn configured_origins_satisfy_production() {
        let mut cfg = production_config();
        cfg.cors_allowed_origins = Some("https://example.com".into());
        assert!(cfg.validate_deployment_constraints().is_ok());
    }

    #[test]
    fn a_list_of_blank_origins_counts_as_unconfigured() {
        let mut cfg = production_config();
        cfg.cors_allowed_origins = Some(" , ,".into());
        assert!(cfg.validate_deployment_constraints().is_err());
    }

    #[test]
    fn development_is_permissive_by_default() {
        let mut cfg = production_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_deployment_constraints().is_ok());
    }

    #[test]
    fn dev_secret_is_rejected_outside_development() {
        let mut cfg = production_config();
        cfg.cors_allow_any_origin = true;
        cfg.jwt_secret = DEV_JWT_SECRET.into();
        assert!(cfg.validate_deployment_constraints().is_err());
    }
}
