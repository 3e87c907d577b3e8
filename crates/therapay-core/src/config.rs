//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub platform: PlatformConfig,
    pub billing: BillingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// TTL for cached identity lookups in seconds
    #[serde(default = "default_identity_ttl")]
    pub identity_ttl_secs: u64,
}

fn default_identity_ttl() -> u64 {
    300
}

/// Communication platform configuration
///
/// Covers webhook authenticity and the outbound call-control API.
#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// Shared secret for webhook HMAC verification
    pub webhook_secret: String,

    /// Whether unsigned/invalid webhooks are rejected
    ///
    /// Must be true in production. Disabling it logs a warning on startup.
    #[serde(default = "default_enforce_signatures")]
    pub enforce_signatures: bool,

    /// Base URL of the platform call-control API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// API key for outbound platform requests
    #[serde(default)]
    pub api_key: String,

    /// Timeout for best-effort remote teardown requests, in seconds
    #[serde(default = "default_teardown_timeout")]
    pub teardown_timeout_secs: u64,
}

fn default_enforce_signatures() -> bool {
    true
}

fn default_api_base_url() -> String {
    "https://video.example.com/api".to_string()
}

fn default_teardown_timeout() -> u64 {
    5
}

/// Billing-specific configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Platform fee retained from the therapist credit, in percent
    ///
    /// 0 means pass-through: the therapist is credited the full client debit.
    #[serde(default)]
    pub platform_fee_percent: f64,

    /// Minimum withdrawal amount
    #[serde(default = "default_min_withdrawal")]
    pub min_withdrawal_amount: f64,

    /// Time-to-live for staged call invites in seconds
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_secs: u64,
}

fn default_min_withdrawal() -> f64 {
    1.00
}

fn default_invite_ttl() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("redis.identity_ttl_secs", 300)?
            .set_default("platform.enforce_signatures", true)?
            .set_default("platform.teardown_timeout_secs", 5)?
            .set_default("billing.platform_fee_percent", 0.0)?
            .set_default("billing.min_withdrawal_amount", 1.00)?
            .set_default("billing.invite_ttl_secs", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with THERAPAY_ prefix
            .add_source(
                Environment::with_prefix("THERAPAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("THERAPAY").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            platform_fee_percent: 0.0,
            min_withdrawal_amount: 1.00,
            invite_ttl_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_billing_config() {
        let config = BillingConfig::default();
        assert_eq!(config.platform_fee_percent, 0.0);
        assert_eq!(config.invite_ttl_secs, 30);
    }
}
