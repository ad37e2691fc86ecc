// src/config.rs

use std::{env, net::SocketAddr, time::Duration};

use dotenvy::dotenv;

use crate::error::ConfigError;

/// Reference autosave period.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// The countdown ticks once per second.
pub const TIMER_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub autosave_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub rust_log: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let backend_url = env::var("BACKEND_URL").map_err(|_| ConfigError::Missing("BACKEND_URL"))?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://exam_session.db?mode=rwc".to_string());

        let bind_addr: SocketAddr = parse_var("BIND_ADDR", "0.0.0.0:3000".parse().ok())?;
        let autosave_interval_secs =
            parse_var("AUTOSAVE_INTERVAL_SECS", Some(DEFAULT_AUTOSAVE_INTERVAL_SECS))?;
        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", Some(10))?;

        if autosave_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AUTOSAVE_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        Ok(Self {
            backend_url,
            database_url,
            bind_addr,
            autosave_interval_secs,
            request_timeout_secs,
            rust_log,
            log_dir,
        })
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reads and parses `key`, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(key: &'static str, default: Option<T>) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { key, value })
        }
        Err(_) => default.ok_or(ConfigError::Missing(key)),
    }
}
