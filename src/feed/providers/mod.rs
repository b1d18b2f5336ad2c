// src/feed/providers/mod.rs
pub mod dart;
pub mod naver;

use std::time::Duration;

use anyhow::{Context, Result};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);

/// HTTP client with the per-call bounds every upstream call uses.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cb-live-feed/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building upstream http client")
}

/// Send, require 2xx, return the body.
pub(crate) async fn fetch_body(req: reqwest::RequestBuilder) -> Result<String> {
    req.send()
        .await
        .context("upstream request")?
        .error_for_status()
        .context("upstream status")?
        .text()
        .await
        .context("upstream body")
}

/// String field of a JSON object, `None` when absent, null, or blank.
pub(crate) fn str_field(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
