//! Configuration management for refgraph.
//!
//! Settings live in a TOML file. The location is chosen in this order:
//!
//! 1. an explicit path (`--config`)
//! 2. the `REFGRAPH_CONFIG_PATH` environment variable
//! 3. `~/.refgraph/config.toml` (`%LOCALAPPDATA%\refgraph\config.toml` on Windows)
//!
//! A missing file yields the defaults.
//!
//! # File Format
//!
//! ```toml
//! [resolver]
//! fetch_timeout_secs = 30   # 0 disables the timeout
//! max_depth = 64
//!
//! [tracking]
//! track_schema = true
//! track_resources = true
//! track_external = true
//! default_required = true
//! known_resources = ["database", "app"]   # optional registry
//!
//! [validation]
//! strict = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{CONFIG_PATH_ENV, DEFAULT_FETCH_TIMEOUT, MAX_TRAVERSAL_DEPTH};
use crate::core::RefgraphError;
use crate::dependency::TrackingOptions;
use crate::resolver::ResolverOptions;

/// `[resolver]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    /// Seconds to wait for a live object; `0` waits indefinitely
    pub fetch_timeout_secs: u64,
    /// Maximum configuration nesting walked during resolution
    pub max_depth: usize,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_depth: MAX_TRAVERSAL_DEPTH,
        }
    }
}

/// `[tracking]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    pub track_schema: bool,
    pub track_resources: bool,
    pub track_external: bool,
    pub default_required: bool,
    /// Registry of resource ids; when absent the id-shape heuristic applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_resources: Option<Vec<String>>,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            track_schema: true,
            track_resources: true,
            track_external: true,
            default_required: true,
            known_resources: None,
        }
    }
}

/// `[validation]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Treat warnings as errors
    pub strict: bool,
}

/// User configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefgraphConfig {
    pub resolver: ResolverSection,
    pub tracking: TrackingSection,
    pub validation: ValidationSection,
}

impl RefgraphConfig {
    /// Load from `explicit`, the environment override, or the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(path) => PathBuf::from(path),
                None => match Self::default_path() {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::debug!("No default configuration location: {}", e);
                        return Ok(Self::default());
                    }
                },
            },
        };

        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid configuration.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let config = toml::from_str(&content).map_err(|e| RefgraphError::ConfigParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write as pretty TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write configuration to {}", path.display()))
    }

    /// Platform default location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("refgraph")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".refgraph")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        let fetch_timeout = match self.resolver.fetch_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ResolverOptions {
            fetch_timeout,
            max_depth: self.resolver.max_depth,
        }
    }

    pub fn tracking_options(&self) -> TrackingOptions {
        TrackingOptions {
            track_schema: self.tracking.track_schema,
            track_resources: self.tracking.track_resources,
            track_external: self.tracking.track_external,
            default_required: self.tracking.default_required,
            known_resources: self
                .tracking
                .known_resources
                .as_ref()
                .map(|ids| ids.iter().cloned().collect::<HashSet<_>>()),
            ..TrackingOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RefgraphConfig::default();
        assert_eq!(config.resolver.fetch_timeout_secs, 30);
        assert_eq!(config.resolver_options().fetch_timeout, Some(Duration::from_secs(30)));
        assert!(config.tracking_options().known_resources.is_none());
        assert!(!config.validation.strict);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[resolver]\nfetch_timeout_secs = 0\n\n[tracking]\nknown_resources = [\"Db\"]\n",
        )
        .unwrap();

        let config = RefgraphConfig::load_from(&path).await.unwrap();
        assert_eq!(config.resolver_options().fetch_timeout, None);
        assert_eq!(config.resolver.max_depth, MAX_TRAVERSAL_DEPTH);
        let options = config.tracking_options();
        assert!(options.known_resources.unwrap().contains("Db"));
        assert!(options.track_schema);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");
        let mut config = RefgraphConfig::default();
        config.validation.strict = true;
        config.save_to(&path).await.unwrap();
        assert_eq!(RefgraphConfig::load_from(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[resolver\n").unwrap();
        let err = RefgraphConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RefgraphError>(),
            Some(RefgraphError::ConfigParse { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("env.toml");
        std::fs::write(&path, "[validation]\nstrict = true\n").unwrap();

        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var(CONFIG_PATH_ENV, &path) };
        let config = RefgraphConfig::load(None).await;
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };

        assert!(config.unwrap().validation.strict);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = RefgraphConfig::load(Some(&temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, RefgraphConfig::default());
    }
}
