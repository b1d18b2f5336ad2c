// tests/common/mod.rs
// Fakes shared by the integration tests. Not every test uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use cb_live_feed::feed::providers::{dart, naver};
use cb_live_feed::feed::types::RawRecord;
use cb_live_feed::{Category, Feed, FeedItem, FeedQuery, FeedSource, SourceKind};

pub const DART_FIXTURE: &str = include_str!("../fixtures/dart_list.json");
pub const NAVER_FIXTURE: &str = include_str!("../fixtures/naver_news.json");

/// A ready-made item `minutes_ago` old (`None` = no timestamp).
pub fn item(url: &str, minutes_ago: Option<i64>) -> FeedItem {
    FeedItem {
        source: SourceKind::News,
        occurred_at: minutes_ago.map(|m| Utc::now() - Duration::minutes(m)),
        category: Category::Other,
        headline: format!("headline {url}"),
        summary: String::new(),
        organization: None,
        ticker: None,
        receipt_no: None,
        url: url.to_string(),
        raw: serde_json::Value::Null,
    }
}

/// `Feed` that plays back scripted batches, then keeps returning `tail`.
pub struct ScriptedFeed {
    kind: SourceKind,
    batches: Mutex<VecDeque<Vec<FeedItem>>>,
    tail: Vec<FeedItem>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn repeating(kind: SourceKind, items: Vec<FeedItem>) -> Self {
        Self::sequence(kind, Vec::new(), items)
    }

    pub fn sequence(kind: SourceKind, batches: Vec<Vec<FeedItem>>, tail: Vec<FeedItem>) -> Self {
        Self {
            kind,
            batches: Mutex::new(batches.into()),
            tail,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Feed for ScriptedFeed {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _query: &FeedQuery) -> Vec<FeedItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.batches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.tail.clone())
    }
}

/// Upstream behaviour for `FakeSource`.
pub enum Upstream {
    Fixture(&'static str),
    Fail,
    Hang,
}

/// `FeedSource` backed by a fixture body, a failure, or a call that never returns.
pub struct FakeSource {
    pub kind: SourceKind,
    pub upstream: Upstream,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(kind: SourceKind, upstream: Upstream) -> Self {
        Self {
            kind,
            upstream,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Call counter that stays readable after the source moves into an adapter.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl FeedSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_records(&self, _query: &FeedQuery) -> Result<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.upstream {
            Upstream::Fixture(body) => match self.kind {
                SourceKind::Disclosure => dart::parse_list_page(body).map(|p| p.records),
                SourceKind::News => naver::parse_search(body),
            },
            Upstream::Fail => Err(anyhow!("upstream returned 502")),
            Upstream::Hang => std::future::pending().await,
        }
    }
}
