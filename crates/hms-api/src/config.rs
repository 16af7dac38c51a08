//! Runtime configuration read from the environment.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DB_PATH: &str = "hms.sqlite3";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000,http://localhost:3001";
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Database path that selects an in-memory database.
pub const IN_MEMORY_DB: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub addr: SocketAddr,
    pub db_path: String,
    pub jwt_secret: String,
    pub cors_origins: Vec<HeaderValue>,
    /// Buffered events per subscriber before the slowest ones start missing events
    pub event_capacity: usize,
    /// Take the client address from `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_proxy: bool,
}

impl ApiConfig {
    /// Read `HMS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_raw = lookup("HMS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr = addr_raw.parse().map_err(|e| ConfigError::Invalid {
            name: "HMS_ADDR",
            reason: format!("{addr_raw:?}: {e}"),
        })?;

        let jwt_secret = lookup("HMS_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("HMS_JWT_SECRET"))?;

        let cors_raw = lookup("HMS_CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.into());
        let cors_origins = cors_raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
                    name: "HMS_CORS_ORIGIN",
                    reason: format!("{origin:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let event_capacity = match lookup("HMS_EVENT_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "HMS_EVENT_CAPACITY",
                    reason: format!("{raw:?} is not a positive integer"),
                })?,
            None => DEFAULT_EVENT_CAPACITY,
        };

        let trust_proxy = match lookup("HMS_TRUST_PROXY").as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "HMS_TRUST_PROXY",
                    reason: format!("{other:?} is not true or false"),
                })
            }
        };

        Ok(Self {
            addr,
            db_path: lookup("HMS_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()),
            jwt_secret,
            cors_origins,
            event_capacity,
            trust_proxy,
        })
    }

    /// Configuration for tests and local tooling: in-memory database, given secret.
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: IN_MEMORY_DB.into(),
            jwt_secret: jwt_secret.into(),
            cors_origins: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            trust_proxy: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[("HMS_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.addr.port(), 5000);
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_secret_required() {
        let result = ApiConfig::from_lookup(lookup(&[("HMS_JWT_SECRET", "  ")]));
        assert!(matches!(result, Err(ConfigError::Missing("HMS_JWT_SECRET"))));
    }

    #[test]
    fn test_invalid_values() {
        let bad_addr = ApiConfig::from_lookup(lookup(&[
            ("HMS_JWT_SECRET", "s3cret"),
            ("HMS_ADDR", "localhost"),
        ]));
        assert!(matches!(bad_addr, Err(ConfigError::Invalid { name: "HMS_ADDR", .. })));

        let bad_capacity = ApiConfig::from_lookup(lookup(&[
            ("HMS_JWT_SECRET", "s3cret"),
            ("HMS_EVENT_CAPACITY", "0"),
        ]));
        assert!(bad_capacity.is_err());

        let bad_proxy = ApiConfig::from_lookup(lookup(&[
            ("HMS_JWT_SECRET", "s3cret"),
            ("HMS_TRUST_PROXY", "maybe"),
        ]));
        assert!(matches!(bad_proxy, Err(ConfigError::Invalid { name: "HMS_TRUST_PROXY", .. })));
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("HMS_JWT_SECRET", "s3cret"),
            ("HMS_ADDR", "127.0.0.1:8080"),
            ("HMS_DB_PATH", IN_MEMORY_DB),
            ("HMS_CORS_ORIGIN", "https://hms.example.org"),
            ("HMS_EVENT_CAPACITY", "16"),
            ("HMS_TRUST_PROXY", "true"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.db_path, IN_MEMORY_DB);
        assert_eq!(config.cors_origins, vec![HeaderValue::from_static("https://hms.example.org")]);
        assert_eq!(config.event_capacity, 16);
        assert!(config.trust_proxy);
    }
}
