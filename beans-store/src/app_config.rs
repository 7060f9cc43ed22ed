use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub locale: LocaleConfig,
    pub gateway: GatewayConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 5 }

fn default_true() -> bool { true }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocaleConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String { "Asia/Jakarta".to_string() }

impl LocaleConfig {
    pub fn tz(&self) -> Result<Tz, config::ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| config::ConfigError::Message(format!("locale.timezone: {}", e)))
    }
}

/// Payment provider (Snap-style hosted checkout)
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default)]
    pub server_key: String,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: usize,
    #[serde(default = "default_breaker_reset_secs")]
    pub breaker_reset_secs: u64,
}

fn default_gateway_timeout_ms() -> u64 { 10_000 }
fn default_breaker_threshold() -> usize { 5 }
fn default_breaker_reset_secs() -> u64 { 30 }

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_reset(&self) -> Duration {
        Duration::from_secs(self.breaker_reset_secs)
    }
}

/// Transactional mail relay
#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub relay_url: String,
    #[serde(default)]
    pub api_key: String,
    pub sender: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_mail_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_subject() -> String { "WAYSBEANS ORDER NOTIFICATION".to_string() }
fn default_mail_timeout_ms() -> u64 { 5_000 }

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub verify_signature: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Secrets, e.g. BEANS__GATEWAY__SERVER_KEY
            .add_source(config::Environment::with_prefix("BEANS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
