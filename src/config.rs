//! Configuration loaded from environment variables with defaults.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Postgres settings; without them the shop runs on the in-memory store
    pub database: Option<DatabaseConfig>,
    /// NATS server for domain events
    pub nats_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            server: ServerConfig {
                host: non_empty("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: non_empty("PORT").and_then(|s| s.parse().ok()).unwrap_or(8083),
            },
            database: non_empty("DATABASE_URL").map(|url| DatabaseConfig {
                url,
                max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            }),
            nats_url: non_empty("NATS_URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.server.address(), "0.0.0.0:8083");
        assert!(config.database.is_none());
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("NATS_URL", "nats://localhost:4222"),
        ]);
        assert_eq!(config.server.address(), "127.0.0.1:9000");
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/shop");
        assert_eq!(database.max_connections, 4);
        assert_eq!(config.nats_url.as_deref(), Some("nats://localhost:4222"));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = config(&[("PORT", "not-a-port"), ("DATABASE_URL", "postgres://x"), ("DATABASE_MAX_CONNECTIONS", "")]);
        assert_eq!(config.server.port, 8083);
        assert_eq!(config.database.unwrap().max_connections, 10);
    }
}
