//! Session configuration
//!
//! Everything environment-shaped is passed in here explicitly: endpoint
//! resolution, reconnection policy, language preference, synthesis service
//! location. Components never reach for ambient globals.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::lang::{LangPreference, PERSIAN_TAG};
use crate::transport::ReconnectPolicy;

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_CONFIG_DIR: &str = "voxlink";

/// Errors raised by settings persistence
#[derive(Debug)]
pub enum ConfigError {
    NoConfigDir,
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine config directory"),
            ConfigError::Io(e) => write!(f, "Settings I/O failed: {}", e),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize settings: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Endpoint resolution policy
///
/// Reproduces the hosting-context rules exactly, since they determine
/// reachability: secure transport iff the hosting context is secure, and the
/// development address instead of the serving host while in development.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPolicy {
    /// Whether the hosting context itself was loaded securely
    pub secure_context: bool,
    /// Whether we are running against a local development server
    pub dev_mode: bool,
    /// Host used in development, e.g. `localhost:8000`
    pub dev_host: String,
    /// Host that served the application, used outside development
    pub app_host: String,
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self {
            secure_context: false,
            dev_mode: true,
            dev_host: "localhost:8000".to_string(),
            app_host: "localhost:8000".to_string(),
        }
    }
}

impl EndpointPolicy {
    fn host(&self) -> &str {
        if self.dev_mode {
            &self.dev_host
        } else {
            &self.app_host
        }
    }

    /// The streaming channel endpoint
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure_context { "wss" } else { "ws" };
        format!("{}://{}/ws", scheme, self.host())
    }

    /// Base URL of the synthesis service on the same host
    pub fn synthesis_base(&self) -> String {
        let scheme = if self.secure_context { "https" } else { "http" };
        format!("{}://{}", scheme, self.host())
    }
}

/// Complete session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub endpoint: EndpointPolicy,
    pub reconnect: ReconnectPolicy,
    /// Language preference: `auto` or a fixed tag
    pub language: LangPreference,
    /// Tag handed to the capture engine when the preference is `auto`
    pub capture_lang: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            language: LangPreference::Auto,
            capture_lang: PERSIAN_TAG.to_string(),
        }
    }
}

/// Default on-disk location of the settings document
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join(APP_CONFIG_DIR).join(SETTINGS_FILE_NAME))
}

/// Load settings from `path`, falling back to defaults on any problem
pub fn load_settings(path: &Path) -> SessionConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<SessionConfig>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                SessionConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionConfig::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            SessionConfig::default()
        }
    }
}

/// Persist settings to `path`
pub fn save_settings(path: &Path, config: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Io(format!("create {:?}: {}", parent, e)))?;
    }

    let contents =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;

    // Write atomically: write to a temp file in the same directory, then
    // rename. This prevents a partial settings.json if we crash mid-write.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| ConfigError::Io(format!("write {:?}: {}", tmp_path, e)))?;

    // On Unix, rename atomically replaces the destination. On Windows, rename
    // fails if the destination exists, so remove it first (ignoring NotFound).
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(ConfigError::Io(format!("remove {:?}: {}", path, e)));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| ConfigError::Io(format!("rename {:?} to {:?}: {}", tmp_path, path, e)))?;
    Ok(())
}
