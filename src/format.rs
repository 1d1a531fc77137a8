//! Display formatting for durations, variances, dates and JSON fields.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Placeholder for empty values.
pub const EMPTY: &str = "—";

/// Compact duration: "0h", "45m", "2.5h".
pub fn format_seconds(seconds: i64) -> String {
    if seconds == 0 {
        return "0h".to_string();
    }
    let hours = seconds as f64 / 3600.0;
    if hours.abs() < 1.0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{:.1}h", hours)
    }
}

/// Hours and minutes: "2h 5m", "-1h 30m".
pub fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    format!("{}{}h {}m", sign, total / 3600, (total % 3600) / 60)
}

/// Hours with one decimal, for charts.
pub fn hours(seconds: i64) -> f64 {
    seconds as f64 / 3600.0
}

/// Percentage by which `actual` overshoots `estimated`. Zero without an estimate.
pub fn variance_percent(actual: i64, estimated: i64) -> f64 {
    if estimated == 0 {
        return 0.0;
    }
    (actual - estimated) as f64 / estimated as f64 * 100.0
}

/// Signed percentage: "+12.5%", "-3.0%".
pub fn format_variance(percent: f64) -> String {
    format!("{:+.1}%", percent)
}

pub fn format_datetime(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Flatten a JSON text column for table display.
///
/// Objects become "key: value | key: value", arrays "a, b". Text that is
/// not JSON is shown as-is.
pub fn format_json_field(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return EMPTY.to_string();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let text = json_text(&value);
            if text.is_empty() { EMPTY.to_string() } else { text }
        }
        Err(_) => raw.to_string(),
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, json_text(v)))
            .collect::<Vec<_>>()
            .join(" | "),
        Value::Array(values) => values.iter().map(json_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
