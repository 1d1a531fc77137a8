//! HTTP server implementation for the web dashboard.
//!
//! This module provides the axum-based HTTP server that serves the report
//! pages, CSV/JSON downloads and a small JSON API.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use regex_lite::Regex;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::html;
use super::pages;
use super::templates::{self, Page};
use crate::config::Config;
use crate::error::{AnalyticsError, ErrorBody, ErrorCode, Result};
use crate::report::export::{ReportKind, render_report};
use crate::report::metrics::key_metrics;
use crate::report::value_stream::value_streams;
use crate::report::{FilterOptions, FilterParams, ReportContext};
use crate::snapshot::SnapshotStore;

/// Dashboard server state shared across handlers.
#[derive(Clone)]
pub struct DashboardServer {
    store: Arc<SnapshotStore>,
    config: Arc<Config>,
    terminal_lanes: Arc<Regex>,
}

impl DashboardServer {
    /// Fails when the configured terminal lane pattern does not compile.
    pub fn new(store: Arc<SnapshotStore>, config: Arc<Config>) -> Result<Self> {
        let terminal_lanes = Arc::new(config.reports.terminal_lanes()?);
        Ok(Self {
            store,
            config,
            terminal_lanes,
        })
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Board and folder search parameters, read alongside the filter.
#[derive(Debug, Default, Deserialize)]
struct BoardQuery {
    board: Option<String>,
    search: Option<String>,
}

impl BoardQuery {
    fn board(&self) -> Option<&str> {
        self.board.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

fn error_status(error: &AnalyticsError) -> StatusCode {
    match error.code() {
        ErrorCode::BoardNotFound => StatusCode::NOT_FOUND,
        _ if error.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_page(page: Page, error: &AnalyticsError) -> Response {
    let status = error_status(error);
    if status.is_server_error() {
        warn!(page = page.path(), "Report failed: {}", error);
    }
    let body = templates::render_page(
        page.title(),
        &templates::nav(page, ""),
        "",
        &html::error_message(&error.to_string()),
    );
    (status, Html(body)).into_response()
}

fn json_error(error: &AnalyticsError) -> Response {
    (error_status(error), Json(ErrorBody::from(error))).into_response()
}

/// Where a report page lives and how it is labelled.
struct PageSpec<'a> {
    page: Page,
    title: &'a str,
    action: &'a str,
    hidden: &'a [(&'a str, &'a str)],
}

impl<'a> PageSpec<'a> {
    fn of(page: Page) -> Self {
        Self {
            page,
            title: page.title(),
            action: page.path(),
            hidden: &[],
        }
    }
}

/// Resolve the filter against a fresh snapshot, render the body and wrap
/// it in the base template with the filter form.
fn report_page<F>(state: &DashboardServer, view: PageSpec<'_>, params: &FilterParams, body: F) -> Response
where
    F: FnOnce(&ReportContext<'_>, &str) -> Result<String>,
{
    let rendered = (|| -> Result<String> {
        let snapshot = state.store.snapshot()?;
        let filter = params.resolve_for(
            &snapshot,
            Utc::now().date_naive(),
            state.config.reports.default_window_days,
        )?;
        let ctx = ReportContext::new(&snapshot, &filter);
        let query = FilterParams::from_filter(&filter).to_query();
        let content = body(&ctx, &query)?;
        let filters = html::filter_form(
            view.action,
            &filter,
            &FilterOptions::from_snapshot(&snapshot),
            view.hidden,
        );
        Ok(templates::render_page(
            view.title,
            &templates::nav(view.page, &query),
            &filters,
            &content,
        ))
    })();

    match rendered {
        Ok(body) => Html(body).into_response(),
        Err(e) => error_page(view.page, &e),
    }
}

async fn overview_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    report_page(&state, PageSpec::of(Page::Overview), &params, |ctx, _| {
        Ok(pages::overview_page(ctx))
    })
}

async fn time_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    let top_items = state.config.reports.top_items;
    report_page(&state, PageSpec::of(Page::Time), &params, |ctx, _| {
        Ok(pages::time_page(ctx, top_items))
    })
}

async fn team_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    let leaderboard = state.config.reports.leaderboard_size;
    report_page(&state, PageSpec::of(Page::Team), &params, |ctx, _| {
        Ok(pages::team_page(ctx, leaderboard))
    })
}

async fn budget_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    report_page(&state, PageSpec::of(Page::Budget), &params, |ctx, query| {
        Ok(pages::budget_page(ctx, query))
    })
}

async fn board_page(
    State(state): State<DashboardServer>,
    Query(params): Query<FilterParams>,
    Query(board): Query<BoardQuery>,
) -> Response {
    let top_items = state.config.reports.top_items;
    let Some(label) = board.board() else {
        let view = PageSpec {
            title: "Budget by Board",
            action: "/budget/board",
            ..PageSpec::of(Page::Budget)
        };
        return report_page(&state, view, &params, |ctx, query| {
            Ok(pages::board_picker_page(ctx, query))
        });
    };

    let title = format!("Budget: {}", label);
    let hidden = [("board", label)];
    let view = PageSpec {
        title: &title,
        action: "/budget/board",
        hidden: &hidden,
        ..PageSpec::of(Page::Budget)
    };
    report_page(&state, view, &params, |ctx, _| pages::board_page(ctx, label, top_items))
}

async fn value_streams_page(
    State(state): State<DashboardServer>,
    Query(params): Query<FilterParams>,
    Query(board): Query<BoardQuery>,
) -> Response {
    let rule = state.config.hierarchy.home_folder_rule;
    let label = board.board();
    let hidden: Vec<(&str, &str)> = label.map(|b| ("board", b)).into_iter().collect();
    let view = PageSpec {
        hidden: &hidden,
        ..PageSpec::of(Page::ValueStreams)
    };
    report_page(&state, view, &params, |ctx, query| {
        pages::value_streams_page(ctx, label, board.search.as_deref(), rule, query)
    })
}

async fn stale_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    let stale_days = state.config.reports.stale_days;
    let terminal_lanes = Arc::clone(&state.terminal_lanes);
    report_page(&state, PageSpec::of(Page::Stale), &params, |ctx, query| {
        Ok(pages::stale_page(ctx, stale_days, &terminal_lanes, Utc::now(), query))
    })
}

async fn table_page(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    let shape = state.store.source().capabilities().work_items;
    report_page(&state, PageSpec::of(Page::Table), &params, |ctx, query| {
        Ok(pages::table_page(ctx, shape, query))
    })
}

async fn schema_page(State(state): State<DashboardServer>) -> Response {
    match state.store.schema_report() {
        Ok(report) => Html(templates::render_page(
            Page::Schema.title(),
            &templates::nav(Page::Schema, ""),
            "",
            &pages::schema_page(&report),
        ))
        .into_response(),
        Err(e) => error_page(Page::Schema, &e),
    }
}

fn download(state: &DashboardServer, kind: ReportKind, params: &FilterParams) -> Response {
    match render_report(&state.store, kind, params, &state.config.reports, Utc::now()) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, kind.content_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", kind.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => json_error(&e),
    }
}

async fn export_table(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    download(&state, ReportKind::Table, &params)
}

async fn export_budget(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    download(&state, ReportKind::Budget, &params)
}

async fn export_stale(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    download(&state, ReportKind::Stale, &params)
}

async fn export_schema(State(state): State<DashboardServer>) -> Response {
    download(&state, ReportKind::Schema, &FilterParams::default())
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Key metrics for the filter as JSON.
async fn api_metrics(State(state): State<DashboardServer>, Query(params): Query<FilterParams>) -> Response {
    let result = (|| -> Result<Response> {
        let snapshot = state.store.snapshot()?;
        let filter = params.resolve_for(
            &snapshot,
            Utc::now().date_naive(),
            state.config.reports.default_window_days,
        )?;
        let ctx = ReportContext::new(&snapshot, &filter);
        Ok(Json(serde_json::json!({
            "filter": filter,
            "metrics": key_metrics(&ctx),
        }))
        .into_response())
    })();
    result.unwrap_or_else(|e| json_error(&e))
}

/// Value-stream tree of one board as JSON.
async fn api_hierarchy(
    State(state): State<DashboardServer>,
    Query(params): Query<FilterParams>,
    Query(board): Query<BoardQuery>,
) -> Response {
    let result = (|| -> Result<Response> {
        let label = board
            .board()
            .ok_or_else(|| AnalyticsError::invalid_filter("board", "a board label is required"))?;
        let snapshot = state.store.snapshot()?;
        let filter = params.resolve_for(
            &snapshot,
            Utc::now().date_naive(),
            state.config.reports.default_window_days,
        )?;
        let ctx = ReportContext::new(&snapshot, &filter);
        ctx.require_board(label)?;
        let streams = value_streams(&ctx, label, state.config.hierarchy.home_folder_rule);
        Ok(Json(streams).into_response())
    })();
    result.unwrap_or_else(|e| json_error(&e))
}

/// Drop cached data so the next request reloads from the source.
async fn api_refresh(State(state): State<DashboardServer>) -> impl IntoResponse {
    state.store.refresh();
    Json(serde_json::json!({ "status": "refreshed" }))
}

/// Build the router with all routes.
fn build_router(state: DashboardServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Page routes
        .route("/", get(overview_page))
        .route("/time", get(time_page))
        .route("/team", get(team_page))
        .route("/budget", get(budget_page))
        .route("/budget/board", get(board_page))
        .route("/value-streams", get(value_streams_page))
        .route("/stale", get(stale_page))
        .route("/table", get(table_page))
        .route("/schema", get(schema_page))
        // Downloads
        .route("/export/table.csv", get(export_table))
        .route("/export/budget.csv", get(export_budget))
        .route("/export/stale.csv", get(export_stale))
        .route("/export/schema.json", get(export_schema))
        // API routes
        .route("/api/health", get(health))
        .route("/api/metrics", get(api_metrics))
        .route("/api/hierarchy", get(api_hierarchy))
        .route("/api/refresh", post(api_refresh))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status of the dashboard server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardStatus {
    /// Dashboard is running and serving requests.
    Running,
    /// Dashboard failed to start, retrying in background.
    Retrying,
    /// Dashboard has been shut down.
    Stopped,
}

/// Handle for managing the dashboard server lifecycle.
pub struct DashboardHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    status_rx: watch::Receiver<DashboardStatus>,
}

impl DashboardHandle {
    pub fn status(&self) -> DashboardStatus {
        *self.status_rx.borrow()
    }

    /// Trigger shutdown of the dashboard server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind to the configured address and serve in the background.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(state: DashboardServer) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let bind = state.config.dashboard.bind.clone();
    let port = state.config.dashboard.port;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port)).await?;
    let bound_addr = listener.local_addr()?;

    info!("Dashboard server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dashboard server shutting down");
            })
            .await
        {
            tracing::error!("Dashboard server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

/// Compute jittered delay for retry.
/// Uses system time nanoseconds for simple jitter without requiring rand crate.
fn compute_jittered_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let jitter_range = (jitter_ms * 2) as i64;
    let jitter = if jitter_range > 0 {
        (nanos as i64 % jitter_range) - (jitter_ms as i64)
    } else {
        0
    };

    let delay_ms = (base_ms as i64 + jitter).max(1000) as u64;
    Duration::from_millis(delay_ms)
}

/// Start the HTTP server, retrying in the background with exponential
/// backoff while the port is unavailable.
pub fn start_server_with_retry(state: DashboardServer) -> DashboardHandle {
    let settings = state.config.dashboard.clone();

    let (status_tx, status_rx) = watch::channel(DashboardStatus::Retrying);
    let (handle_shutdown_tx, mut handle_shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut current_delay_ms = settings.retry_initial_ms;

        loop {
            match handle_shutdown_rx.try_recv() {
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                    info!("Dashboard retry loop shutting down");
                    let _ = status_tx.send(DashboardStatus::Stopped);
                    break;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            match start_server(state.clone()).await {
                Ok((server_shutdown_tx, bound_addr)) => {
                    info!("Dashboard available at http://{}", bound_addr);
                    let _ = status_tx.send(DashboardStatus::Running);

                    let _ = handle_shutdown_rx.await;
                    info!("Dashboard handle shutdown received");
                    let _ = server_shutdown_tx.send(());
                    let _ = status_tx.send(DashboardStatus::Stopped);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Failed to start dashboard on {}:{}: {}. Retrying in {:.1}s...",
                        settings.bind,
                        settings.port,
                        e,
                        current_delay_ms as f64 / 1000.0
                    );
                    let _ = status_tx.send(DashboardStatus::Retrying);

                    let delay = compute_jittered_delay(current_delay_ms, settings.retry_jitter_ms);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = &mut handle_shutdown_rx => {
                            let _ = status_tx.send(DashboardStatus::Stopped);
                            break;
                        }
                    }

                    current_delay_ms =
                        ((current_delay_ms as f64 * settings.retry_multiplier) as u64).min(settings.retry_max_ms);
                }
            }
        }
    });

    DashboardHandle {
        shutdown_tx: Some(handle_shutdown_tx),
        status_rx,
    }
}
