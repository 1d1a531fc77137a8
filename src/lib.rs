//! Stride analytics library
//!
//! Folder hierarchy indexing and the reports behind the dashboard, exported
//! for testing and integration.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod format;
pub mod hierarchy;
pub mod logging;
pub mod report;
pub mod snapshot;
pub mod types;
