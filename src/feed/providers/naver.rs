// src/feed/providers/naver.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{fetch_body, str_field};
use crate::feed::types::{FeedQuery, FeedSource, RawRecord, SourceKind};

pub const NAVER_NEWS_URL: &str = "https://openapi.naver.com/v1/search/news.json";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// Parse a news search body into records. Title/description keep their
/// `<b>` highlighting; the adapter strips it.
pub fn parse_search(body: &str) -> Result<Vec<RawRecord>> {
    let resp: SearchResponse = serde_json::from_str(body).context("parsing naver news json")?;
    Ok(resp
        .items
        .into_iter()
        .map(|it| RawRecord {
            headline: str_field(&it, "title").unwrap_or_default(),
            summary: str_field(&it, "description").unwrap_or_default(),
            organization: None,
            link: str_field(&it, "link"),
            published: str_field(&it, "pubDate"),
            receipt_no: None,
            payload: it,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct NaverCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// News search source. One request per query.
pub struct NaverSource {
    credentials: Option<NaverCredentials>,
    base_url: String,
    client: reqwest::Client,
}

impl NaverSource {
    pub fn new(credentials: Option<NaverCredentials>, client: reqwest::Client) -> Self {
        Self {
            credentials,
            base_url: NAVER_NEWS_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn search(&self, creds: &NaverCredentials, q: &str, display: u32) -> Result<Vec<RawRecord>> {
        let display = display.clamp(1, 100).to_string();
        let req = self
            .client
            .get(&self.base_url)
            .header("X-Naver-Client-Id", &creds.client_id)
            .header("X-Naver-Client-Secret", &creds.client_secret)
            .query(&[
                ("query", q),
                ("display", display.as_str()),
                ("sort", "date"),
                ("start", "1"),
            ]);
        let body = fetch_body(req).await?;
        parse_search(&body)
    }
}

#[async_trait]
impl FeedSource for NaverSource {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn fetch_records(&self, query: &FeedQuery) -> Result<Vec<RawRecord>> {
        let Some(creds) = self.credentials.as_ref() else {
            tracing::debug!(target: "feed", "Naver credentials not configured; skipping");
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        let mut failures = 0usize;
        for q in &query.queries {
            match self.search(creds, q, query.display).await {
                Ok(mut records) => out.append(&mut records),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "feed", error = ?e, query = %q, "naver query failed");
                }
            }
        }

        // Partial results are fine; only a total wipe-out counts as a failed fetch.
        if failures > 0 && failures == query.queries.len() {
            return Err(anyhow!("all {failures} naver queries failed"));
        }
        Ok(out)
    }
}
