//! Configuration types and structures.

use crate::error::{AnalyticsError, Result};
use crate::hierarchy::HomeFolderRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default port for the web dashboard.
pub const DEFAULT_DASHBOARD_PORT: u16 = 31995;

/// Where report data is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite reporting replica.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Scope organization-owned tables to this organization.
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            organization_id: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("stride-analytics/replica.db")
}

/// When cached data is reloaded from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Reload each dataset once its ttl has elapsed.
    #[default]
    Interval,
    /// Load once; reload only on an explicit refresh.
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub mode: RefreshMode,

    /// Work items and time entries (default: 300).
    #[serde(default = "default_activity_ttl")]
    pub activity_ttl_seconds: u64,

    /// Users, types, priorities, boards, lanes and folders (default: 600).
    #[serde(default = "default_reference_ttl")]
    pub reference_ttl_seconds: u64,

    /// Schema report (default: 3600).
    #[serde(default = "default_schema_ttl")]
    pub schema_ttl_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::default(),
            activity_ttl_seconds: default_activity_ttl(),
            reference_ttl_seconds: default_reference_ttl(),
            schema_ttl_seconds: default_schema_ttl(),
        }
    }
}

impl RefreshConfig {
    pub fn activity_ttl(&self) -> Duration {
        Duration::from_secs(self.activity_ttl_seconds)
    }

    pub fn reference_ttl(&self) -> Duration {
        Duration::from_secs(self.reference_ttl_seconds)
    }

    pub fn schema_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_ttl_seconds)
    }
}

fn default_activity_ttl() -> u64 {
    300
}

fn default_reference_ttl() -> u64 {
    600
}

fn default_schema_ttl() -> u64 {
    3600
}

/// Web dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Address to bind (default: 127.0.0.1).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the web dashboard (default: 31995).
    #[serde(default = "default_dashboard_port")]
    pub port: u16,

    /// Initial retry delay in milliseconds when the port is busy (default: 15000).
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Jitter range in milliseconds for retry delay (default: 5000).
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Maximum retry interval in milliseconds (default: 240000).
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Exponential backoff multiplier (default: 2.0).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_dashboard_port(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            retry_max_ms: default_retry_max_ms(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_dashboard_port() -> u16 {
    DEFAULT_DASHBOARD_PORT
}

fn default_retry_initial_ms() -> u64 {
    15_000
}

fn default_retry_jitter_ms() -> u64 {
    5_000
}

fn default_retry_max_ms() -> u64 {
    240_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

/// Report tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Items untouched for this many days are stale (default: 3).
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,

    /// Lanes whose name matches are finished work and never stale.
    #[serde(default = "default_terminal_lane_pattern")]
    pub terminal_lane_pattern: String,

    /// Fallback window length when the default date range is empty (default: 14).
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,

    /// Rows in "top items" tables (default: 10).
    #[serde(default = "default_top_items")]
    pub top_items: usize,

    /// Rows in per-assignee charts (default: 15).
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// Sample rows per table in the schema report (default: 3).
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            stale_days: default_stale_days(),
            terminal_lane_pattern: default_terminal_lane_pattern(),
            default_window_days: default_window_days(),
            top_items: default_top_items(),
            leaderboard_size: default_leaderboard_size(),
            sample_rows: default_sample_rows(),
        }
    }
}

impl ReportsConfig {
    pub fn terminal_lanes(&self) -> Result<regex_lite::Regex> {
        regex_lite::Regex::new(&self.terminal_lane_pattern).map_err(|e| {
            AnalyticsError::InvalidConfig(format!(
                "reports.terminal_lane_pattern '{}': {}",
                self.terminal_lane_pattern, e
            ))
        })
    }
}

fn default_stale_days() -> i64 {
    3
}

fn default_terminal_lane_pattern() -> String {
    "(?i)done|icebox".to_string()
}

fn default_window_days() -> i64 {
    14
}

fn default_top_items() -> usize {
    10
}

fn default_leaderboard_size() -> usize {
    15
}

fn default_sample_rows() -> usize {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default)]
    pub home_folder_rule: HomeFolderRule,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub hierarchy: HierarchyConfig,
}

impl Config {
    /// Load configuration from a single file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }

    /// Reject settings that would fail later at request time.
    pub fn validate(&self) -> Result<()> {
        self.reports.terminal_lanes()?;

        if self.refresh.mode == RefreshMode::Interval {
            let ttls = [
                ("activity_ttl_seconds", self.refresh.activity_ttl_seconds),
                ("reference_ttl_seconds", self.refresh.reference_ttl_seconds),
                ("schema_ttl_seconds", self.refresh.schema_ttl_seconds),
            ];
            if let Some((name, _)) = ttls.iter().find(|(_, ttl)| *ttl == 0) {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "refresh.{} must be positive in interval mode",
                    name
                )));
            }
        }

        if self.reports.stale_days < 0 {
            return Err(AnalyticsError::InvalidConfig(
                "reports.stale_days must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
