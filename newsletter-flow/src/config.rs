use serde::Deserialize;
use std::{fs, time::Duration};

use market_client::domain::User;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct EntsoeConfig {
    #[serde(default = "default_entsoe_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API security token.
    pub api_key_env: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_entsoe_base_url() -> String {
    "https://web-api.tp.entsoe.eu/api".to_string()
}

fn default_time_zone() -> String {
    "Europe/Brussels".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub hourly_only: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            hourly_only: true,
        }
    }
}

fn default_category() -> String {
    "Wind Offshore".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySection {
    #[serde(default)]
    pub fetch: RetryConfig,
    #[serde(default)]
    pub transform: RetryConfig,
    #[serde(default)]
    pub notify: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: Option<u16>,
    pub username_env: String,
    pub password_env: String,
    /// Sender mailbox, e.g. `ENTSO-E Newsletter <newsletter@example.com>`.
    pub from: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Static,
    Csv,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    pub kind: RegistryKind,
    #[serde(default)]
    pub users: Vec<User>,
    pub csv_path: Option<String>,
    pub postgres_uri: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub http_bind_addr: String,
    pub channel_capacity: usize,
    pub auth_bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub max_concurrent_runs: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub entsoe: EntsoeConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub retry: RetrySection,
    pub email: EmailConfig,
    pub users: UsersConfig,
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub runner: RunnerConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("NEWSLETTER_CONFIG").unwrap_or_else(|_| "newsletter-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

/// Reads a secret from the environment variable named in the config.
pub fn secret_from_env(var: &str) -> anyhow::Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("missing environment variable {var}"))
}
