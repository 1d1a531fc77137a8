//! Tiered configuration.
//!
//! Configuration is merged field by field from:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/stride-analytics/config.yaml`
//! 3. **User** - `~/.stride-analytics/config.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `STRIDE_ANALYTICS_CONFIG_PATH` - Explicit config file (replaces tiers 2 and 3)
//! - `STRIDE_ANALYTICS_DB_PATH` - Reporting database path
//! - `STRIDE_ANALYTICS_ORG_ID` - Organization scope
//! - `STRIDE_ANALYTICS_PORT` - Dashboard port
//! - `STRIDE_ANALYTICS_USER_DIR` - User config dir (default: `~/.stride-analytics`)
//! - `STRIDE_ANALYTICS_PROJECT_DIR` - Project config dir (default: `./stride-analytics`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
