//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/catsync/catsync.toml`
//! 3. Local config: `<dir>/.catsync.toml`
//! 4. Environment variables: `CATSYNC_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Unified configuration for catsync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the category REST API
    pub api_url: String,
    /// Tenant sent as `X-Tenant` header
    pub tenant: Option<String>,
    /// Bearer token (supports `$VAR` / `${VAR}`)
    pub auth_token: Option<String>,
    /// Locale used to pick category labels for display
    pub locale: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            tenant: None,
            auth_token: None,
            locale: "en".to_string(),
        }
    }
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub api_url: Option<String>,
    pub tenant: Option<String>,
    pub auth_token: Option<String>,
    pub locale: Option<String>,
}

/// Get the XDG config directory for catsync.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "catsync").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("catsync.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".catsync.toml")
}

/// Expand environment variables and `~` in a config value.
pub fn expand_env_vars(value: &str) -> String {
    shellexpand::full(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where specified, otherwise keep base.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            api_url: overlay
                .api_url
                .clone()
                .unwrap_or_else(|| self.api_url.clone()),
            tenant: overlay.tenant.clone().or_else(|| self.tenant.clone()),
            auth_token: overlay
                .auth_token
                .clone()
                .or_else(|| self.auth_token.clone()),
            locale: overlay.locale.clone().unwrap_or_else(|| self.locale.clone()),
        }
    }

    /// Expand shell variables in URL and token.
    fn expand_values(&mut self) {
        self.api_url = expand_env_vars(&self.api_url);
        self.auth_token = self.auth_token.as_deref().map(expand_env_vars);
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.catsync.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_values();

        Ok(current)
    }

    /// Apply CATSYNC_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("CATSYNC").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("api_url") {
            settings.api_url = val;
        }
        if let Ok(val) = config.get_string("tenant") {
            settings.tenant = Some(val);
        }
        if let Ok(val) = config.get_string("auth_token") {
            settings.auth_token = Some(val);
        }
        if let Ok(val) = config.get_string("locale") {
            settings.locale = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# catsync configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/catsync/catsync.toml
#   Local:  <dir>/.catsync.toml
#   Env:    CATSYNC_* environment variables

# Base URL of the category API
# api_url = "http://localhost:8080/api"

# Tenant sent with every request as X-Tenant
# tenant = "acme"

# Bearer token, environment variables are expanded
# auth_token = "${CATSYNC_TOKEN}"

# Locale for category labels
# locale = "en"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
