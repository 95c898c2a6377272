//! Configuration management for fpcollect

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Collector configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DevTools endpoint of the browser to fingerprint
    pub cdp_endpoint: String,

    /// Page the probes run in
    pub target_url: String,

    /// How long the fault battery waits for out-of-band faults, in milliseconds
    pub fault_settle_delay_ms: u64,

    /// Timeout for ordinary CDP commands in seconds
    pub command_timeout_secs: u64,

    /// Timeout for navigation commands in seconds
    pub navigation_timeout_secs: u64,

    /// How long to poll for `document.readyState == "complete"` in milliseconds
    pub load_wait_ms: u64,

    /// Pretty-print the emitted record
    pub pretty: bool,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp_endpoint: "ws://localhost:9222".to_string(),
            target_url: "about:blank".to_string(),
            fault_settle_delay_ms: 250,
            command_timeout_secs: 30,
            navigation_timeout_secs: 60,
            load_wait_ms: 5000,
            pretty: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))
    }

    /// File (or defaults) first, then environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `FPCOLLECT_*` variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = env::var("FPCOLLECT_CDP_ENDPOINT") {
            self.cdp_endpoint = endpoint;
        }

        if let Ok(url) = env::var("FPCOLLECT_TARGET_URL") {
            self.target_url = url;
        }

        if let Ok(delay) = env::var("FPCOLLECT_SETTLE_DELAY_MS") {
            self.fault_settle_delay_ms = delay
                .parse()
                .map_err(|_| Error::configuration("Invalid FPCOLLECT_SETTLE_DELAY_MS"))?;
        }

        if let Ok(timeout) = env::var("FPCOLLECT_COMMAND_TIMEOUT") {
            self.command_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid FPCOLLECT_COMMAND_TIMEOUT"))?;
        }

        if let Ok(timeout) = env::var("FPCOLLECT_NAVIGATION_TIMEOUT") {
            self.navigation_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid FPCOLLECT_NAVIGATION_TIMEOUT"))?;
        }

        if let Ok(wait) = env::var("FPCOLLECT_LOAD_WAIT_MS") {
            self.load_wait_ms = wait
                .parse()
                .map_err(|_| Error::configuration("Invalid FPCOLLECT_LOAD_WAIT_MS"))?;
        }

        if let Ok(pretty) = env::var("FPCOLLECT_PRETTY") {
            self.pretty = pretty
                .parse()
                .map_err(|_| Error::configuration("Invalid FPCOLLECT_PRETTY"))?;
        }

        if let Ok(log_level) = env::var("FPCOLLECT_LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Settle delay as a [`Duration`]
    pub fn fault_settle_delay(&self) -> Duration {
        Duration::from_millis(self.fault_settle_delay_ms)
    }

    /// Transport timeouts derived from this configuration
    pub fn cdp_timeouts(&self) -> crate::cdp::CdpTimeouts {
        crate::cdp::CdpTimeouts {
            default_timeout_secs: self.command_timeout_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            execution_timeout_secs: self.command_timeout_secs,
        }
    }
}
