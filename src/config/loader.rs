//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/stride-analytics/)
    Project = 1,
    /// User-level config (~/.stride-analytics/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: STRIDE_ANALYTICS_USER_DIR or ~/.stride-analytics
        let user_dir = std::env::var("STRIDE_ANALYTICS_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".stride-analytics")));

        // Project dir: STRIDE_ANALYTICS_PROJECT_DIR or $CWD/stride-analytics
        let project_dir = std::env::var("STRIDE_ANALYTICS_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("stride-analytics")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn config_file(dir: Option<&Path>) -> Option<PathBuf> {
        dir.map(|d| d.join("config.yaml")).filter(|f| f.exists())
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Highest-priority file that contributed, if any
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        // An explicit config file replaces the file tiers
        if let Ok(explicit_path) = std::env::var("STRIDE_ANALYTICS_CONFIG_PATH") {
            let path = PathBuf::from(&explicit_path);
            let mut config = Config::load(&path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            Self::apply_env_overrides(&mut config);
            return Ok(Self {
                paths,
                config,
                config_path: Some(path),
            });
        }

        let mut configs: Vec<Value> = Vec::new();
        let mut config_path = None;

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        // Tier 2 and 3: project, then user
        let tiers = [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ];
        for (tier, dir) in tiers {
            let Some(file) = ConfigPaths::config_file(dir) else {
                continue;
            };
            match read_yaml(&file) {
                Ok(value) => {
                    debug!(tier = %tier, path = %file.display(), "Loaded config tier");
                    configs.push(value);
                    config_path = Some(file);
                }
                Err(e) => warn!(tier = %tier, path = %file.display(), "Skipping unreadable config: {}", e),
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    fn apply_env_overrides(config: &mut Config) {
        if let Ok(db_path) = std::env::var("STRIDE_ANALYTICS_DB_PATH") {
            config.source.db_path = PathBuf::from(db_path);
        }

        if let Ok(org) = std::env::var("STRIDE_ANALYTICS_ORG_ID") {
            config.source.organization_id = Some(org).filter(|o| !o.is_empty());
        }

        if let Ok(port) = std::env::var("STRIDE_ANALYTICS_PORT") {
            match port.parse() {
                Ok(port) => config.dashboard.port = port,
                Err(_) => warn!("Ignoring STRIDE_ANALYTICS_PORT={}: not a port number", port),
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Option<Value> = serde_yaml::from_str(&content)?;
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths_discover() {
        let paths = ConfigPaths::discover();
        assert!(paths.project_dir.is_some());
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let config = loader.config();

        assert_eq!(config.reports.stale_days, 3);
        assert_eq!(config.refresh.schema_ttl_seconds, 3600);
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn test_project_config_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("stride-analytics");
        std::fs::create_dir_all(&project_dir).unwrap();

        let config_content = r#"
reports:
  stale_days: 5
"#;
        std::fs::write(project_dir.join("config.yaml"), config_content).unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(temp.path().join("user")));

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let config = loader.config();

        assert_eq!(config.reports.stale_days, 5);
        assert_eq!(config.reports.top_items, 10);
        assert!(loader.config_path().is_some());
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("stride-analytics");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        let project_config = r#"
reports:
  stale_days: 5
  top_items: 20
"#;
        std::fs::write(project_dir.join("config.yaml"), project_config).unwrap();

        let user_config = r#"
reports:
  stale_days: 9
"#;
        std::fs::write(user_dir.join("config.yaml"), user_config).unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir));

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        let config = loader.config();

        assert_eq!(config.reports.stale_days, 9);
        assert_eq!(config.reports.top_items, 20);
    }

    #[test]
    fn test_empty_config_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("stride-analytics");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "# nothing here\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config().dashboard.port, super::super::types::DEFAULT_DASHBOARD_PORT);
    }
}
