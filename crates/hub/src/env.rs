// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the hub crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve the config file:
/// POLYCHAT_CONFIG > XDG_CONFIG_HOME/polychat/hub.toml > ~/.config/polychat/hub.toml
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("POLYCHAT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("polychat/hub.toml"));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/polychat/hub.toml"))
}

/// Resolve state directory: POLYCHAT_STATE_DIR > XDG_STATE_HOME/polychat > ~/.local/state/polychat
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("POLYCHAT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("polychat"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/polychat"))
}

/// Listen address override
pub fn listen_override() -> Option<String> {
    std::env::var("POLYCHAT_LISTEN")
        .ok()
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
