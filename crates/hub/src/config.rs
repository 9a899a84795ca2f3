// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub configuration file (TOML).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::dispatcher::DispatchConfig;
use crate::router::RouterConfig;
use crate::session::SessionConfig;

/// Default port agents connect to
pub const DEFAULT_LISTEN: &str = "0.0.0.0:25566";

/// Seven minutes between periodic broadcasts
pub const DEFAULT_BROADCAST_INTERVAL_SECS: u64 = 420;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub hub: HubConfig,
    pub broadcasts: BroadcastConfig,
}

/// `[hub]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    pub listen: String,
    pub send_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub outbound_queue: usize,
    pub enqueue_wait_ms: u64,
    pub inbound_queue: usize,
    pub relay_workers: usize,
    pub relay_backlog: usize,
    pub forward_chat: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            send_timeout_ms: 5_000,
            ack_timeout_ms: 10_000,
            handshake_timeout_ms: 5_000,
            shutdown_grace_ms: 2_000,
            outbound_queue: 64,
            enqueue_wait_ms: 250,
            inbound_queue: 1024,
            relay_workers: 4,
            relay_backlog: 256,
            forward_chat: true,
        }
    }
}

/// `[broadcasts]` section. Any missing or empty field disables broadcasting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcastConfig {
    /// Server id the broadcasts are attributed to
    pub id: Option<String>,
    pub prefix: Option<String>,
    pub messages: Option<Vec<String>>,
    pub interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            id: None,
            prefix: None,
            messages: None,
            interval_secs: DEFAULT_BROADCAST_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the resolved config path and apply environment overrides.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut config = match crate::env::config_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        if let Some(listen) = crate::env::listen_override() {
            config.hub.listen = listen;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let hub = &self.hub;
        if hub.listen.trim().is_empty() {
            return Err(ConfigError::Invalid("hub.listen is empty".to_string()));
        }
        for (name, value) in [
            ("hub.outbound_queue", hub.outbound_queue),
            ("hub.inbound_queue", hub.inbound_queue),
            ("hub.relay_workers", hub.relay_workers),
            ("hub.relay_backlog", hub.relay_backlog),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if self.broadcasts.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "broadcasts.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            outbound_queue: self.hub.outbound_queue,
            enqueue_wait: Duration::from_millis(self.hub.enqueue_wait_ms),
            shutdown_grace: self.shutdown_grace(),
        }
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            send_timeout: Duration::from_millis(self.hub.send_timeout_ms),
            ack_timeout: Duration::from_millis(self.hub.ack_timeout_ms),
        }
    }

    pub fn router(&self) -> RouterConfig {
        RouterConfig {
            relay_workers: self.hub.relay_workers,
            relay_backlog: self.hub.relay_backlog,
            forward_chat: self.hub.forward_chat,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.hub.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.hub.shutdown_grace_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
