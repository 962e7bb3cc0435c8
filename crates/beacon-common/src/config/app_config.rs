//! Application configuration structs
//!
//! Loads configuration from environment variables. The fan-out variant is a
//! startup decision: it selects which adapter and presence store get built
//! and injected, and is never consulted again at runtime.

use beacon_core::ProcessId;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub fanout: FanoutMode,
    pub redis: Option<RedisConfig>,
    pub presence: PresenceConfig,
    pub relay: RelayConfig,
    /// Identity of this gateway process in a cluster.
    pub process_id: ProcessId,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Gateway listener configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Outgoing frame buffer per connection.
    pub send_buffer: usize,
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How room events reach sockets on other gateway processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanoutMode {
    /// Single process; all room state is in-memory.
    #[default]
    Local,
    /// Multiple processes sharing a Redis pub/sub backbone.
    Clustered,
}

/// Redis configuration (required in clustered mode)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Presence tracker configuration
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Seconds before an unrefreshed online record expires.
    pub ttl_seconds: u64,
}

/// Action relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Glob patterns of action names never reachable over the transport.
    pub denylist: Vec<String>,
}

// Default value functions
fn default_app_name() -> String {
    "beacon".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_send_buffer() -> usize {
    128
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_presence_ttl() -> u64 {
    86_400 // 1 day
}

fn default_denylist() -> Vec<String> {
    vec!["gateway.*".to_string()]
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or
    /// inconsistent (clustered fan-out without a Redis URL).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let fanout = match env::var("FANOUT_MODE").ok().as_deref() {
            None | Some("local") => FanoutMode::Local,
            Some("clustered") => FanoutMode::Clustered,
            Some(other) => {
                return Err(ConfigError::InvalidValue("FANOUT_MODE", other.to_string()))
            }
        };

        let redis = match env::var("REDIS_URL") {
            Ok(url) => Some(RedisConfig {
                url,
                max_connections: env::var("REDIS_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_redis_max_connections),
            }),
            Err(_) if fanout == FanoutMode::Clustered => {
                return Err(ConfigError::MissingVar("REDIS_URL"));
            }
            Err(_) => None,
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: env::var("GATEWAY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
                send_buffer: env::var("GATEWAY_SEND_BUFFER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_send_buffer),
            },
            fanout,
            redis,
            presence: PresenceConfig {
                ttl_seconds: env::var("PRESENCE_TTL_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_presence_ttl),
            },
            relay: RelayConfig {
                denylist: env::var("ACTION_DENYLIST")
                    .ok()
                    .map(|s| s.split(',').map(str::trim).map(String::from).collect())
                    .unwrap_or_else(default_denylist),
            },
            process_id: env::var("PROCESS_ID")
                .ok()
                .map_or_else(ProcessId::generate, ProcessId::new),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_gateway_address() {
        let config = GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 9200,
            send_buffer: 128,
        };
        assert_eq!(config.address(), "0.0.0.0:9200");
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_app_name(), "beacon");
        assert_eq!(default_host(), "127.0.0.1");
        assert_eq!(default_presence_ttl(), 86_400);
        assert_eq!(default_denylist(), vec!["gateway.*".to_string()]);
    }
}
