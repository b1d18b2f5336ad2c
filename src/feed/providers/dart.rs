// src/feed/providers/dart.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{fetch_body, str_field};
use crate::feed::types::{FeedQuery, FeedSource, RawRecord, SourceKind};
use crate::timestamp::kst;

pub const DART_LIST_URL: &str = "https://opendart.fss.or.kr/api/list.json";
pub const DART_VIEWER_URL: &str = "https://dart.fss.or.kr/dsaf001/main.do";
/// Upper bound on pages per fetch.
pub const MAX_PAGES: u32 = 3;

const STATUS_OK: &str = "000";
const STATUS_NO_DATA: &str = "013";

#[derive(Debug, Deserialize)]
struct ListResponse {
    status: Option<String>,
    message: Option<String>,
    total_page: Option<u32>,
    #[serde(default)]
    list: Vec<serde_json::Value>,
}

/// One parsed page of the disclosure listing.
#[derive(Debug, Default)]
pub struct DartPage {
    pub records: Vec<RawRecord>,
    pub total_page: Option<u32>,
}

/// Viewer link for a receipt number.
pub fn viewer_url(rcp_no: &str) -> String {
    format!("{DART_VIEWER_URL}?rcpNo={rcp_no}")
}

/// Parse a `list.json` body. "No data" is an empty page, other non-OK
/// statuses are errors.
pub fn parse_list_page(body: &str) -> Result<DartPage> {
    let resp: ListResponse = serde_json::from_str(body).context("parsing dart list.json")?;
    match resp.status.as_deref() {
        None | Some(STATUS_OK) => {}
        Some(STATUS_NO_DATA) => return Ok(DartPage::default()),
        Some(other) => {
            return Err(anyhow!(
                "dart status {other}: {}",
                resp.message.as_deref().unwrap_or("")
            ))
        }
    }

    let records = resp
        .list
        .into_iter()
        .map(|it| {
            let receipt_no = str_field(&it, "rcept_no").or_else(|| str_field(&it, "rcp_no"));
            RawRecord {
                headline: str_field(&it, "report_nm").unwrap_or_default(),
                summary: String::new(),
                organization: str_field(&it, "corp_name"),
                link: receipt_no.as_deref().map(viewer_url),
                published: str_field(&it, "rcept_dt"),
                receipt_no,
                payload: it,
            }
        })
        .collect();

    Ok(DartPage {
        records,
        total_page: resp.total_page,
    })
}

/// Disclosure listing source (OpenDART `list.json`).
pub struct DartSource {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl DartSource {
    pub fn new(api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: DART_LIST_URL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch_page(&self, key: &str, query: &FeedQuery, page_no: u32) -> Result<DartPage> {
        let now = Utc::now().with_timezone(&kst());
        let start = now - chrono::Duration::minutes(i64::from(query.window_minutes));
        let bgn_de = start.format("%Y%m%d").to_string();
        let end_de = now.format("%Y%m%d").to_string();
        let page_count = query.page_count.clamp(1, 100).to_string();
        let page_no = page_no.to_string();

        let req = self.client.get(&self.base_url).query(&[
            ("crtfc_key", key),
            ("bgn_de", bgn_de.as_str()),
            ("end_de", end_de.as_str()),
            ("page_no", page_no.as_str()),
            ("page_count", page_count.as_str()),
        ]);
        let body = fetch_body(req).await?;
        parse_list_page(&body)
    }
}

#[async_trait]
impl FeedSource for DartSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Disclosure
    }

    async fn fetch_records(&self, query: &FeedQuery) -> Result<Vec<RawRecord>> {
        let Some(key) = self.api_key.as_deref() else {
            tracing::debug!(target: "feed", "DART_API_KEY not configured; skipping");
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for page_no in 1..=MAX_PAGES {
            let page = match self.fetch_page(key, query, page_no).await {
                Ok(p) => p,
                Err(e) if page_no == 1 => return Err(e).context("dart page 1"),
                Err(e) => {
                    // Keep what earlier pages returned.
                    tracing::warn!(target: "feed", error = ?e, page_no, "dart page failed");
                    break;
                }
            };
            if page.records.is_empty() {
                break;
            }
            out.extend(page.records);
            if page.total_page.is_some_and(|total| page_no >= total) {
                break;
            }
        }
        Ok(out)
    }
}
