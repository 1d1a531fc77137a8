//! Export subcommand
//!
//! Writes the same CSV and JSON files the dashboard offers as downloads.

use crate::report::FilterParams;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Report to export: table, budget, stale or schema
    #[arg(short, long, default_value = "table")]
    pub report: String,

    /// First day of the date range (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Last day of the date range (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Comma-separated board labels
    #[arg(long, value_name = "LIST")]
    pub boards: Option<String>,

    /// Comma-separated assignee usernames
    #[arg(long, value_name = "LIST")]
    pub assignees: Option<String>,

    /// all, completed or in_progress
    #[arg(long)]
    pub completion: Option<String>,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,

    /// Automatically compress if output exceeds this size
    ///
    /// Accepts human-readable sizes: 100KB, 1MB, etc.
    #[arg(long, value_name = "SIZE")]
    pub compress_threshold: Option<String>,
}

impl ExportArgs {
    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            from: self.from.clone(),
            to: self.to.clone(),
            boards: self.boards.clone(),
            assignees: self.assignees.clone(),
            completion: self.completion.clone(),
            ..Default::default()
        }
    }

    pub fn compress_threshold_bytes(&self) -> Option<u64> {
        self.compress_threshold.as_deref().and_then(parse_size)
    }

    /// Compress when asked to, when writing a `.gz` file, or when the
    /// output is larger than the threshold.
    pub fn should_compress(&self, output_size: Option<u64>) -> bool {
        if self.gzip {
            return true;
        }

        if let Some(ref path) = self.output
            && path.extension().is_some_and(|ext| ext == "gz")
        {
            return true;
        }

        if let (Some(threshold), Some(size)) = (self.compress_threshold_bytes(), output_size) {
            return size > threshold;
        }

        false
    }
}

/// Parse "512", "100KB", "2MB" or "1GB" into bytes.
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (digits, scale) = if let Some(num) = s.strip_suffix("GB") {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix("MB") {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix("KB") {
        (num, 1024)
    } else if let Some(num) = s.strip_suffix('B') {
        (num, 1)
    } else {
        (s.as_str(), 1)
    };
    digits.trim().parse::<u64>().ok().map(|n| n * scale)
}
