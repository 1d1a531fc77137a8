//! Core record types read from the reporting replica.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A folder in the value-stream hierarchy.
///
/// `id` is the folder number, the key work items use in `parent_number`
/// and `root_folder_number`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub item_count: i64,
    pub date_added: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,

    // Extended schema only
    pub hierarchy: Option<String>,
    pub hierarchy_path: Option<String>,
}

impl Folder {
    pub fn new(id: impl Into<String>, title: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_id: parent_id.map(str::to_string),
            ..Default::default()
        }
    }
}

/// A unit of work on a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub number: String,
    pub title: String,
    pub assignee: Option<String>,
    pub author: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub date_added: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    pub archived: bool,

    pub work_type_id: Option<String>,
    pub lane_id: Option<String>,
    pub board_id: Option<String>,
    pub priority_id: Option<String>,

    // Estimates are hours
    pub optimistic_estimate: Option<f64>,
    pub likely_estimate: Option<f64>,
    pub pessimistic_estimate: Option<f64>,
    pub point_effort: Option<f64>,

    /// Folder number or the number of another work item.
    pub parent_number: Option<String>,
    pub root_folder_number: Option<String>,

    // Extended schema only (raw JSON text)
    pub custom_fields: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, number: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn time_spent(&self) -> i64 {
        self.time_spent_seconds.unwrap_or(0)
    }

    /// Likely estimate converted to seconds.
    pub fn estimated_seconds(&self) -> i64 {
        (self.likely_estimate.unwrap_or(0.0) * 3600.0).round() as i64
    }
}

/// A tracked span of time against a work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub author: Option<String>,
    pub item_number: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub length_seconds: i64,
    pub completed: bool,
    pub manual: bool,
    pub date_added: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl User {
    /// "First Last" when known, otherwise the username.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// A named, colored lookup row (work types, priorities and lanes share this shape).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

pub type WorkType = Label;
pub type Priority = Label;
pub type Lane = Label;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub label: String,
}
