//! Layered configuration.
//!
//! Precedence, highest first: `CHATRELAY_*` environment variables (with
//! `__` as the nested delimiter), the `~/.chatrelay.env` env file,
//! `config.local.yaml`, `config.yaml`, code defaults. Loaded once at
//! startup and passed around as an immutable value; restart is the only
//! reconfiguration path.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_PREFIX: &str = "CHATRELAY";
pub const HOME_ENV_FILE: &str = ".chatrelay.env";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub title: TitleSettings,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wall-clock limit for one SSE stream, in seconds.
    #[serde(default = "default_stream_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub cors: CorsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    #[default]
    Off,
    ApiKey,
    Jwt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
    #[serde(default)]
    pub jwt: JwtSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_model")]
    pub default_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSettings {
    #[serde(default = "default_title_max_length")]
    pub max_length: usize,
    #[serde(default = "default_title_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_title_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Probe upstream connectivity from the full health endpoint.
    #[serde(default = "default_true")]
    pub upstream_check_enabled: bool,
    #[serde(default = "default_health_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_health_timeout")]
    pub timeout_seconds: u64,
}

/// One entry of the model catalogue served by `GET /models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_window: Option<u32>,
    #[serde(default = "default_true")]
    pub supports_tools: bool,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_stream_timeout() -> u64 {
    300
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}
fn default_jwt_algorithm() -> String {
    "HS256".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_upstream_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> LogFormat {
    LogFormat::Text
}
fn default_title_max_length() -> usize {
    50
}
fn default_title_timeout_ms() -> u64 {
    10_000
}
fn default_title_model() -> String {
    "gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}
fn default_health_interval() -> u64 {
    30
}
fn default_health_timeout() -> u64 {
    5
}

fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "openai/gpt-4o".into(),
            name: "GPT-4o".into(),
            provider: "openai".into(),
            description: Some("Most capable general-purpose model".into()),
            context_window: Some(128_000),
            supports_tools: true,
        },
        ModelEntry {
            id: "openai/gpt-4o-mini".into(),
            name: "GPT-4o Mini".into(),
            provider: "openai".into(),
            description: Some("Fast and cost-effective".into()),
            context_window: Some(128_000),
            supports_tools: true,
        },
    ]
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_stream_timeout(),
            cors: CorsSettings::default(),
        }
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_seconds: default_upstream_timeout(),
            max_retries: default_max_retries(),
            default_model: default_model(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            max_length: default_title_max_length(),
            timeout_ms: default_title_timeout_ms(),
            model: default_title_model(),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            upstream_check_enabled: true,
            check_interval_seconds: default_health_interval(),
            timeout_seconds: default_health_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from the layered sources. `config_dir` points at the
    /// directory holding `config.yaml` / `config.local.yaml`; `None` skips
    /// the file layer entirely.
    pub fn load(config_dir: Option<&Path>) -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let env_file = home.join(HOME_ENV_FILE);
            if env_file.exists() {
                // Already-set process env wins, preserving precedence.
                let _ = dotenvy::from_path(&env_file);
            }
        }

        let mut builder = config::Config::builder();
        if let Some(dir) = config_dir {
            builder = builder
                .add_source(config::File::from(dir.join("config.yaml")).required(false))
                .add_source(config::File::from(dir.join("config.local.yaml")).required(false));
        }
        let loaded = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut settings: Settings = loaded
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Conventional fallback for the upstream credential.
        if settings.upstream.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                settings.upstream.api_key = key;
            }
        }
        if settings.models.is_empty() {
            settings.models = default_models();
        }

        Ok(settings)
    }

    /// Enforce settings that have no usable default.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.api_key.is_empty() {
            return Err(Error::Config(
                "upstream API key is required (upstream.api_key or OPENAI_API_KEY)".into(),
            ));
        }
        match self.auth.mode {
            AuthMode::Jwt if self.auth.jwt.secret.is_none() => Err(Error::Config(
                "auth.jwt.secret is required when auth mode is 'jwt'".into(),
            )),
            AuthMode::ApiKey if self.auth.api_keys.is_empty() => Err(Error::Config(
                "at least one auth.api_keys entry is required when auth mode is 'api-key'".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_millis(self.title.timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health.timeout_seconds)
    }
}
