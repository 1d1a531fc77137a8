//! Web dashboard HTTP server module.
//!
//! Serves the read-only report pages, CSV/JSON downloads and a small JSON
//! API over a [`SnapshotStore`](crate::snapshot::SnapshotStore).

mod html;
mod pages;
mod server;
pub mod templates;

pub use server::{DashboardHandle, DashboardServer, DashboardStatus, start_server, start_server_with_retry};
