//! Utility functions for tendies

use crate::exceptions::{Result, TendiesError};
use log::debug;
use std::env;
use std::path::PathBuf;

/// Check if an environment variable is set to a truthy value
/// Accepts: "1", "true", "on", "yes", "t" (case insensitive)
pub fn is_env_true(key: &str) -> bool {
    match env::var(key) {
        Ok(val) => {
            let val_lower = val.to_lowercase();
            matches!(val_lower.as_str(), "1" | "true" | "on" | "yes" | "t")
        }
        Err(_) => false,
    }
}

/// Read a non-empty environment variable
pub fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get the private documents root
/// Uses the XDG data directory unless `TENDIES_HOME` overrides it
pub fn get_documents_dir() -> PathBuf {
    if let Some(home) = env_non_empty("TENDIES_HOME") {
        return PathBuf::from(home);
    }

    if let Some(xdg_data) = env_non_empty("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join("tendies");
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".local/share/tendies");
    }

    // Fallback to temp directory
    env::temp_dir().join("tendies")
}

/// Get the directory preferences are kept in
/// Lives outside the documents root so clearing the cache keeps settings
pub fn get_config_dir() -> PathBuf {
    if let Some(dir) = env_non_empty("TENDIES_CONFIG") {
        return PathBuf::from(dir);
    }

    if let Some(xdg_config) = env_non_empty("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config).join("tendies");
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".config/tendies");
    }

    env::temp_dir().join("tendies-config")
}

/// Find an external tool on `PATH`
pub fn resolve_tool(name: &str) -> Result<PathBuf> {
    match which::which(name) {
        Ok(path) => {
            debug!("🔧 Found {name} at {path:?}");
            Ok(path)
        }
        Err(e) => Err(TendiesError::Capability(format!(
            "required tool '{name}' not found: {e}"
        ))),
    }
}
