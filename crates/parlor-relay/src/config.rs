//! Relay configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Runtime settings for the relay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address to listen on (default `"0.0.0.0:8080"`).
    pub bind_addr: String,
    /// Directory served for every path that is not a relay endpoint.
    pub static_dir: PathBuf,
    /// Upper bound on a single write to one participant.
    pub write_timeout: Duration,
    /// Upper bound on waiting for the next frame from one participant.
    pub read_idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            static_dir: PathBuf::from("static"),
            write_timeout: Duration::from_secs(5),
            read_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by `PARLOR_ADDR`, `PARLOR_STATIC_DIR`,
    /// `PARLOR_WRITE_TIMEOUT_SECS` and `PARLOR_IDLE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("PARLOR_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("PARLOR_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("PARLOR_WRITE_TIMEOUT_SECS") {
            config.write_timeout = parse_secs("PARLOR_WRITE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("PARLOR_IDLE_TIMEOUT_SECS") {
            config.read_idle_timeout = parse_secs("PARLOR_IDLE_TIMEOUT_SECS", &raw)?;
        }
        Ok(config)
    }
}

fn parse_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidSeconds {
        var,
        value: raw.to_string(),
    })?;
    if secs == 0 {
        return Err(ConfigError::ZeroDuration { var });
    }
    Ok(Duration::from_secs(secs))
}
