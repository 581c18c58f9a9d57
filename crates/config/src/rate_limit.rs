//! Rate limiting configuration structures.

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::Deserialize;
use std::time::Duration;

/// Rate limiting configuration for the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// The quota applied per request signature.
    #[serde(default)]
    pub quota: QuotaConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: StorageConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Quota for a single request signature: how many hits fit in one window.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Maximum number of requests allowed within the window.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Time window during which hits accumulate before the counter expires.
    #[serde(default = "default_window", deserialize_with = "deserialize_duration")]
    pub window: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window: default_window(),
        }
    }
}

fn default_max_attempts() -> u32 {
    60
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (default).
    Memory,
    /// Redis storage with configuration.
    Redis(Box<RedisConfig>),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Redis connection URL (redis:// or rediss:// for TLS).
    pub url: String,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: RedisPoolConfig,
    /// TLS configuration.
    pub tls: Option<RedisTlsConfig>,
    /// Key prefix for all rate limit keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Response timeout for Redis commands.
    #[serde(
        default = "default_response_timeout",
        deserialize_with = "deserialize_option_duration"
    )]
    pub response_timeout: Option<Duration>,
    /// Connection timeout.
    #[serde(
        default = "default_connection_timeout",
        deserialize_with = "deserialize_option_duration"
    )]
    pub connection_timeout: Option<Duration>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool: RedisPoolConfig::default(),
            tls: None,
            key_prefix: default_key_prefix(),
            response_timeout: default_response_timeout(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

fn default_key_prefix() -> String {
    "rate_limit:".to_string()
}

fn default_response_timeout() -> Option<Duration> {
    Some(Duration::from_secs(1))
}

fn default_connection_timeout() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

/// Redis connection pool configuration (deadpool).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisPoolConfig {
    /// Maximum number of connections.
    pub max_size: Option<usize>,
    /// Timeout for creating connections.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_create: Option<Duration>,
    /// Timeout for waiting for a connection.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_wait: Option<Duration>,
    /// Timeout before recycling idle connections.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_recycle: Option<Duration>,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            max_size: Some(16),
            timeout_create: Some(Duration::from_secs(5)),
            timeout_wait: Some(Duration::from_secs(5)),
            timeout_recycle: Some(Duration::from_secs(300)),
        }
    }
}

/// Redis TLS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// Enable TLS (automatically enabled for rediss:// URLs).
    pub enabled: bool,
    /// Allow insecure connections (skip certificate validation).
    pub insecure: Option<bool>,
    /// Path to CA certificate file.
    pub ca_cert_path: Option<String>,
    /// Path to client certificate file (for mutual TLS).
    pub client_cert_path: Option<String>,
    /// Path to client key file (for mutual TLS).
    pub client_key_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quota() {
        let config = QuotaConfig::default();
        insta::assert_debug_snapshot!(config, @r###"
        QuotaConfig {
            max_attempts: 60,
            window: 60s,
        }
        "###);
    }

    #[test]
    fn default_storage_config() {
        let config = StorageConfig::default();
        insta::assert_debug_snapshot!(config, @r###"
        Memory
        "###);
    }

    #[test]
    fn deserialize_quota_with_window_string() {
        let toml = r#"
            max_attempts = 2
            window = "1m"
        "#;
        let config: QuotaConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r###"
        QuotaConfig {
            max_attempts: 2,
            window: 60s,
        }
        "###);
    }

    #[test]
    fn deserialize_memory_storage() {
        let toml = r#"
            type = "memory"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r###"
        Memory
        "###);
    }

    #[test]
    fn deserialize_redis_storage_minimal() {
        let toml = r#"
            type = "redis"
            url = "redis://localhost:6379/0"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        Redis(
            RedisConfig {
                url: "redis://localhost:6379/0",
                pool: RedisPoolConfig {
                    max_size: Some(
                        16,
                    ),
                    timeout_create: Some(
                        5s,
                    ),
                    timeout_wait: Some(
                        5s,
                    ),
                    timeout_recycle: Some(
                        300s,
                    ),
                },
                tls: None,
                key_prefix: "rate_limit:",
                response_timeout: Some(
                    1s,
                ),
                connection_timeout: Some(
                    5s,
                ),
            },
        )
        "#);
    }

    #[test]
    fn deserialize_redis_storage_full() {
        let toml = r#"
            type = "redis"
            url = "rediss://localhost:6380/0"
            key_prefix = "my_app:"
            response_timeout = "2s"
            connection_timeout = "10s"

            [pool]
            max_size = 32
            timeout_create = "10s"
            timeout_wait = "2s"
            timeout_recycle = "600s"

            [tls]
            enabled = true
            insecure = false
            ca_cert_path = "/path/to/ca.crt"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        Redis(
            RedisConfig {
                url: "rediss://localhost:6380/0",
                pool: RedisPoolConfig {
                    max_size: Some(
                        32,
                    ),
                    timeout_create: Some(
                        10s,
                    ),
                    timeout_wait: Some(
                        2s,
                    ),
                    timeout_recycle: Some(
                        600s,
                    ),
                },
                tls: Some(
                    RedisTlsConfig {
                        enabled: true,
                        insecure: Some(
                            false,
                        ),
                        ca_cert_path: Some(
                            "/path/to/ca.crt",
                        ),
                        client_cert_path: None,
                        client_key_path: None,
                    },
                ),
                key_prefix: "my_app:",
                response_timeout: Some(
                    2s,
                ),
                connection_timeout: Some(
                    10s,
                ),
            },
        )
        "#);
    }

    #[test]
    fn rate_limit_config_with_storage() {
        let toml = r#"
            enabled = true

            [storage]
            type = "redis"
            url = "redis://localhost:6379"

            [quota]
            max_attempts = 100
            window = "60s"
        "#;
        let config: RateLimitConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        RateLimitConfig {
            enabled: true,
            storage: Redis(
                RedisConfig {
                    url: "redis://localhost:6379",
                    pool: RedisPoolConfig {
                        max_size: Some(
                            16,
                        ),
                        timeout_create: Some(
                            5s,
                        ),
                        timeout_wait: Some(
                            5s,
                        ),
                        timeout_recycle: Some(
                            300s,
                        ),
                    },
                    tls: None,
                    key_prefix: "rate_limit:",
                    response_timeout: Some(
                        1s,
                    ),
                    connection_timeout: Some(
                        5s,
                    ),
                },
            ),
            quota: QuotaConfig {
                max_attempts: 100,
                window: 60s,
            },
        }
        "#);
    }

    #[test]
    fn rate_limit_config_defaults_when_empty() {
        let config: RateLimitConfig = toml::from_str("").unwrap();
        insta::assert_debug_snapshot!(config, @r###"
        RateLimitConfig {
            enabled: true,
            storage: Memory,
            quota: QuotaConfig {
                max_attempts: 60,
                window: 60s,
            },
        }
        "###);
    }
}
