//! Configuration model.
//!
//! Every option is read once at startup; invalid values abort with a
//! one-line message naming the misconfigured option.

use serde::{Deserialize, Serialize};

/// Deployment mode. Production tightens auth requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Development,
    Production,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Development
    }
}

impl Mode {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            name: "dcm".to_string(),
            user: "dcm".to_string(),
            password: String::new(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3847,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub retry_interval_secs: u64,
    pub retry_timeout_secs: u64,
    pub retry_max_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3849,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            retry_interval_secs: 2,
            retry_timeout_secs: 5,
            retry_max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing key. Required in production mode.
    pub secret: Option<String>,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub default_ttl_seconds: i64,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub interval_ms: u64,
    /// Sessions, contexts and subtasks older than this are stale.
    pub stale_threshold_hours: f64,
    /// Idle tolerance before a stale candidate is acted on.
    pub inactive_minutes: i64,
    pub snapshot_max_age_hours: i64,
    pub read_message_max_age_hours: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            stale_threshold_hours: 0.5,
            inactive_minutes: 10,
            snapshot_max_age_hours: 24,
            read_message_max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Auth token endpoint: requests per 15-minute window per source IP.
    pub auth_tokens_per_15min: u32,
    /// Write endpoints: requests per minute per source IP.
    pub writes_per_min: u32,
    /// Whether write-endpoint limiting is applied at all.
    pub limit_writes: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_tokens_per_15min: 10,
            writes_per_min: 60,
            limit_writes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub messages: MessageConfig,
    pub cleanup: CleanupConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Default auth token TTL when unset: one hour.
    pub fn token_ttl_secs(&self) -> u64 {
        if self.auth.token_ttl_secs == 0 {
            3600
        } else {
            self.auth.token_ttl_secs
        }
    }
}
