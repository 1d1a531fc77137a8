//! Cached, immutable views of the data source.
//!
//! Each dataset lives in its own [`Cached`] slot with an explicit
//! [`RefreshPolicy`]. Readers get an `Arc` to a complete snapshot and never
//! hold a lock while computing reports.

use crate::config::{RefreshConfig, RefreshMode};
use crate::db::{DataSource, SchemaReport};
use crate::error::Result;
use crate::types::{Board, Folder, Label, TimeEntry, User, WorkItem};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// When a cached value is considered out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Reload once the value is older than the ttl.
    Interval(Duration),
    /// Keep the value until [`Cached::invalidate`] is called.
    Manual,
}

impl RefreshPolicy {
    pub fn is_fresh(&self, loaded_at: Instant, now: Instant) -> bool {
        match self {
            RefreshPolicy::Interval(ttl) => now.saturating_duration_since(loaded_at) < *ttl,
            RefreshPolicy::Manual => true,
        }
    }
}

struct Entry<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

/// A single lazily loaded value.
pub struct Cached<T> {
    slot: ArcSwapOption<Entry<T>>,
    policy: RefreshPolicy,
}

impl<T> Cached<T> {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            policy,
        }
    }

    /// Return the cached value, loading it if missing or expired.
    ///
    /// Concurrent callers may load twice; the last store wins.
    pub fn get_or_load<F>(&self, now: Instant, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(entry) = self.slot.load_full()
            && self.policy.is_fresh(entry.loaded_at, now)
        {
            return Ok(Arc::clone(&entry.value));
        }

        let value = Arc::new(load()?);
        self.slot.store(Some(Arc::new(Entry {
            value: Arc::clone(&value),
            loaded_at: now,
        })));
        Ok(value)
    }

    pub fn invalidate(&self) {
        self.slot.store(None);
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.load().is_some()
    }
}

/// Work items and time entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityData {
    pub work_items: Vec<WorkItem>,
    pub time_entries: Vec<TimeEntry>,
    pub loaded_at: DateTime<Utc>,
}

/// Lookup tables and folders.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub users: Vec<User>,
    pub work_types: Vec<Label>,
    pub priorities: Vec<Label>,
    pub boards: Vec<Board>,
    pub lanes: Vec<Label>,
    pub folders: Vec<Folder>,
    pub loaded_at: DateTime<Utc>,
}

/// An immutable view used for one request.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub activity: Arc<ActivityData>,
    pub reference: Arc<ReferenceData>,
}

impl Snapshot {
    pub fn new(activity: ActivityData, reference: ReferenceData) -> Self {
        Self {
            activity: Arc::new(activity),
            reference: Arc::new(reference),
        }
    }

    pub fn work_items(&self) -> &[WorkItem] {
        &self.activity.work_items
    }

    pub fn time_entries(&self) -> &[TimeEntry] {
        &self.activity.time_entries
    }

    pub fn folders(&self) -> &[Folder] {
        &self.reference.folders
    }

    pub fn lookups(&self) -> Lookups<'_> {
        Lookups::new(&self.reference)
    }
}

/// Id to display-name maps over the reference data.
#[derive(Debug, Clone, Default)]
pub struct Lookups<'a> {
    work_types: HashMap<&'a str, &'a str>,
    priorities: HashMap<&'a str, &'a str>,
    boards: HashMap<&'a str, &'a str>,
    lanes: HashMap<&'a str, &'a str>,
    folders: HashMap<&'a str, &'a str>,
}

impl<'a> Lookups<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        fn labels(rows: &[Label]) -> HashMap<&str, &str> {
            rows.iter().map(|l| (l.id.as_str(), l.name.as_str())).collect()
        }
        Self {
            work_types: labels(&reference.work_types),
            priorities: labels(&reference.priorities),
            boards: reference
                .boards
                .iter()
                .map(|b| (b.id.as_str(), b.label.as_str()))
                .collect(),
            lanes: labels(&reference.lanes),
            folders: reference
                .folders
                .iter()
                .map(|f| (f.id.as_str(), f.title.as_str()))
                .collect(),
        }
    }

    fn resolve(map: &HashMap<&'a str, &'a str>, id: Option<&str>) -> Option<&'a str> {
        id.and_then(|id| map.get(id).copied())
    }

    pub fn work_type(&self, item: &WorkItem) -> Option<&'a str> {
        Self::resolve(&self.work_types, item.work_type_id.as_deref())
    }

    pub fn priority(&self, item: &WorkItem) -> Option<&'a str> {
        Self::resolve(&self.priorities, item.priority_id.as_deref())
    }

    pub fn board(&self, item: &WorkItem) -> Option<&'a str> {
        Self::resolve(&self.boards, item.board_id.as_deref())
    }

    pub fn lane(&self, item: &WorkItem) -> Option<&'a str> {
        Self::resolve(&self.lanes, item.lane_id.as_deref())
    }

    /// Title of the item's root folder.
    pub fn root_folder(&self, item: &WorkItem) -> Option<&'a str> {
        Self::resolve(&self.folders, item.root_folder_number.as_deref())
    }
}

/// The data source behind three independently refreshed caches.
pub struct SnapshotStore {
    source: Arc<dyn DataSource>,
    activity: Cached<ActivityData>,
    reference: Cached<ReferenceData>,
    schema: Cached<SchemaReport>,
    sample_rows: usize,
}

impl SnapshotStore {
    pub fn new(source: Arc<dyn DataSource>, refresh: &RefreshConfig, sample_rows: usize) -> Self {
        let policy = |ttl| match refresh.mode {
            RefreshMode::Interval => RefreshPolicy::Interval(ttl),
            RefreshMode::Manual => RefreshPolicy::Manual,
        };
        Self {
            source,
            activity: Cached::new(policy(refresh.activity_ttl())),
            reference: Cached::new(policy(refresh.reference_ttl())),
            schema: Cached::new(policy(refresh.schema_ttl())),
            sample_rows,
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> Result<Snapshot> {
        let activity = self.activity.get_or_load(now, || self.load_activity())?;
        let reference = self.reference.get_or_load(now, || self.load_reference())?;
        Ok(Snapshot {
            activity,
            reference,
        })
    }

    pub fn schema_report(&self) -> Result<Arc<SchemaReport>> {
        self.schema
            .get_or_load(Instant::now(), || self.source.schema_report(self.sample_rows))
    }

    /// Drop every cached dataset; the next request reloads.
    pub fn refresh(&self) {
        self.activity.invalidate();
        self.reference.invalidate();
        self.schema.invalidate();
        info!("Snapshot caches invalidated");
    }

    fn load_activity(&self) -> Result<ActivityData> {
        let data = ActivityData {
            work_items: self.source.work_items()?,
            time_entries: self.source.time_entries()?,
            loaded_at: Utc::now(),
        };
        info!(
            work_items = data.work_items.len(),
            time_entries = data.time_entries.len(),
            "Loaded activity data"
        );
        Ok(data)
    }

    fn load_reference(&self) -> Result<ReferenceData> {
        let data = ReferenceData {
            users: self.source.users()?,
            work_types: self.source.work_types()?,
            priorities: self.source.priorities()?,
            boards: self.source.boards()?,
            lanes: self.source.lanes()?,
            folders: self.source.folders()?,
            loaded_at: Utc::now(),
        };
        info!(
            boards = data.boards.len(),
            folders = data.folders.len(),
            users = data.users.len(),
            "Loaded reference data"
        );
        Ok(data)
    }
}
