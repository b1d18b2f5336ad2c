// src/feed/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::TimeEncoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "dart")]
    Disclosure,
    #[serde(rename = "naver_news")]
    News,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Disclosure => "dart",
            SourceKind::News => "naver_news",
        }
    }

    pub fn time_encoding(self) -> TimeEncoding {
        match self {
            SourceKind::Disclosure => TimeEncoding::CompactKst,
            SourceKind::News => TimeEncoding::Rfc2822,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Refix,
    Conversion,
    Redemption,
    Issue,
    Other,
}

/// One normalized disclosure or news record, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub source: SourceKind,
    pub occurred_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub headline: String,
    pub summary: String,
    pub organization: Option<String>,
    pub ticker: Option<String>,
    /// Disclosure receipt number; `None` for news.
    pub receipt_no: Option<String>,
    /// Never empty: records without a usable link are dropped upstream of here.
    pub url: String,
    pub raw: serde_json::Value,
}

/// Result-scope selector shared by both feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Keep only convertible-bond related items.
    #[default]
    Cb,
    All,
}

/// Parameters of one adapter call. Each source reads the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub window_minutes: u32,
    pub scope: Scope,
    /// News search terms.
    pub queries: Vec<String>,
    /// News results per query.
    pub display: u32,
    /// Disclosure items per page.
    pub page_count: u32,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            scope: Scope::Cb,
            queries: Vec::new(),
            display: 30,
            page_count: 100,
        }
    }
}

/// An upstream record before shaping. Text fields may still carry markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub headline: String,
    pub summary: String,
    pub organization: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub receipt_no: Option<String>,
    pub payload: serde_json::Value,
}

/// Source-specific fetch + parse. Implementations may page or fan out over
/// queries, but must stay bounded.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    fn kind(&self) -> SourceKind;
    async fn fetch_records(&self, query: &FeedQuery) -> Result<Vec<RawRecord>>;
}

/// What a stream session or snapshot handler polls. Never fails: a failed
/// upstream call is an empty batch.
#[async_trait::async_trait]
pub trait Feed: Send + Sync {
    fn kind(&self) -> SourceKind;
    async fn fetch(&self, query: &FeedQuery) -> Vec<FeedItem>;
}
