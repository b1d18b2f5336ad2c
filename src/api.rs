use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::split_queries;
use crate::feed::providers::dart::viewer_url;
use crate::feed::types::{Feed, FeedItem, FeedQuery, Scope};
use crate::shutdown::Shutdown;
use crate::stream::dedup::is_stale;
use crate::stream::frame::{sse_response, WireItem};
use crate::stream::{clamp_interval, StreamSession, DEFAULT_INTERVAL_SECS};

pub const DEFAULT_WINDOW_MINUTES: u32 = 60;
pub const MAX_WINDOW_MINUTES: u32 = 7 * 24 * 60;
pub const DEFAULT_DISPLAY: u32 = 30;
pub const DEFAULT_PAGE_COUNT: u32 = 100;
pub const DEFAULT_DART_LIMIT: usize = 10;
pub const MAX_DART_LIMIT: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub news: Arc<dyn Feed>,
    pub dart: Arc<dyn Feed>,
    pub default_queries: Arc<Vec<String>>,
    pub shutdown: Shutdown,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/live/news", get(news_snapshot))
        .route("/api/live/stream", get(news_stream))
        .route("/api/live/dart", get(dart_snapshot))
        .route("/api/live/dart/stream", get(dart_stream))
        .route("/go/dart/{rcp_no}", get(go_dart))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// `auto` means `all` when the caller supplied `q`, else `cb`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsMode {
    #[default]
    Auto,
    Cb,
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub q: Option<String>,
    pub display: Option<u32>,
    pub minutes: Option<u32>,
    #[serde(default)]
    pub mode: NewsMode,
    pub interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DartParams {
    pub minutes: Option<u32>,
    pub page_count: Option<u32>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub scope: Scope,
    pub interval: Option<u64>,
}

fn window_minutes(raw: Option<u32>) -> u32 {
    raw.unwrap_or(DEFAULT_WINDOW_MINUTES).clamp(1, MAX_WINDOW_MINUTES)
}

impl NewsParams {
    pub fn to_query(&self, default_queries: &[String]) -> FeedQuery {
        let custom = self.q.as_deref().map(split_queries).unwrap_or_default();
        let scope = match self.mode {
            NewsMode::Auto if !custom.is_empty() => Scope::All,
            NewsMode::Auto | NewsMode::Cb => Scope::Cb,
            NewsMode::All => Scope::All,
        };
        let queries = if custom.is_empty() {
            default_queries.to_vec()
        } else {
            custom
        };
        FeedQuery {
            window_minutes: window_minutes(self.minutes),
            scope,
            queries,
            display: self.display.unwrap_or(DEFAULT_DISPLAY).clamp(1, 100),
            ..FeedQuery::default()
        }
    }
}

impl DartParams {
    pub fn to_query(&self) -> FeedQuery {
        FeedQuery {
            window_minutes: window_minutes(self.minutes),
            scope: self.scope,
            page_count: self.page_count.unwrap_or(DEFAULT_PAGE_COUNT).clamp(1, 100),
            ..FeedQuery::default()
        }
    }
}

/// One fresh, un-deduplicated window. No session state is involved.
async fn snapshot(feed: &dyn Feed, query: &FeedQuery) -> Vec<FeedItem> {
    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(i64::from(query.window_minutes));
    let mut items = feed.fetch(query).await;
    items.retain(|it| !is_stale(it, cutoff));
    items
}

fn json_items(items: &[FeedItem]) -> Response {
    let wire: Vec<WireItem<'_>> = items.iter().map(WireItem::from).collect();
    Json(wire).into_response()
}

async fn news_snapshot(State(state): State<AppState>, Query(p): Query<NewsParams>) -> Response {
    let query = p.to_query(&state.default_queries);
    let items = snapshot(state.news.as_ref(), &query).await;
    json_items(&items)
}

async fn dart_snapshot(State(state): State<AppState>, Query(p): Query<DartParams>) -> Response {
    let query = p.to_query();
    let limit = p.limit.unwrap_or(DEFAULT_DART_LIMIT).clamp(1, MAX_DART_LIMIT);
    let mut items = snapshot(state.dart.as_ref(), &query).await;
    items.truncate(limit);
    json_items(&items)
}

async fn news_stream(State(state): State<AppState>, Query(p): Query<NewsParams>) -> Response {
    let query = p.to_query(&state.default_queries);
    let interval = clamp_interval(p.interval.unwrap_or(DEFAULT_INTERVAL_SECS));
    let rx = StreamSession::spawn(state.news.clone(), query, interval, state.shutdown.subscribe());
    sse_response(rx)
}

async fn dart_stream(State(state): State<AppState>, Query(p): Query<DartParams>) -> Response {
    let query = p.to_query();
    let interval = clamp_interval(p.interval.unwrap_or(DEFAULT_INTERVAL_SECS));
    let rx = StreamSession::spawn(state.dart.clone(), query, interval, state.shutdown.subscribe());
    sse_response(rx)
}

/// Redirect to the disclosure viewer so the dashboard never links out directly.
async fn go_dart(Path(rcp_no): Path<String>) -> Response {
    if rcp_no.is_empty() || !rcp_no.bytes().all(|b| b.is_ascii_digit()) {
        return (StatusCode::BAD_REQUEST, "rcp_no must be digits").into_response();
    }
    Redirect::temporary(&viewer_url(&rcp_no)).into_response()
}
