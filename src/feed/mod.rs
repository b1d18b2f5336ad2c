// src/feed/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::classify::{classify, is_cb_related};
use crate::listing::ListingCache;
use crate::timestamp;
use types::{Feed, FeedItem, FeedQuery, FeedSource, RawRecord, Scope, SourceKind};

/// Default bound on one whole `fetch` (all pages / queries, plus shaping).
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(15);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("live_fetch_total", "Adapter fetch calls.");
        describe_counter!(
            "live_fetch_errors_total",
            "Adapter fetches that failed or timed out (served as empty batches)."
        );
        describe_counter!(
            "live_records_dropped_total",
            "Upstream records dropped for lacking a usable link."
        );
        describe_histogram!("live_fetch_ms", "Adapter fetch time in milliseconds.");
    });
}

/// Display text: decode entities, strip tags, collapse whitespace.
///
/// Tags are stripped before decoding so escaped markup (`&lt;b&gt;`) survives
/// as literal text.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(s, "");

    let decoded = html_escape::decode_html_entities(&stripped);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Text the classifier and the scope filter look at.
fn match_text(headline: &str, summary: &str) -> String {
    if summary.is_empty() {
        headline.to_string()
    } else {
        format!("{headline}\n{summary}")
    }
}

/// Newest first; items without a timestamp go last.
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
}

/// Shared normalize/classify/resolve pipeline over a source-specific fetcher.
pub struct FeedAdapter<S> {
    source: S,
    listings: Arc<ListingCache>,
    deadline: Duration,
}

impl<S: FeedSource> FeedAdapter<S> {
    pub fn new(source: S, listings: Arc<ListingCache>) -> Self {
        Self {
            source,
            listings,
            deadline: DEFAULT_FETCH_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Shape one record. `None` when it has no link or falls outside `scope`.
    pub async fn shape(&self, rec: RawRecord, scope: Scope) -> Option<FeedItem> {
        let kind = self.source.kind();
        let url = match rec.link.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => {
                counter!("live_records_dropped_total", "source" => kind.as_str()).increment(1);
                tracing::debug!(target: "feed", source = kind.as_str(), "record without link dropped");
                return None;
            }
        };

        let headline = normalize_text(&rec.headline);
        let summary = normalize_text(&rec.summary);
        let text = match_text(&headline, &summary);
        if scope == Scope::Cb && !is_cb_related(&text) {
            return None;
        }

        let organization = rec
            .organization
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty());
        let ticker = match (kind, organization.as_deref()) {
            (SourceKind::Disclosure, Some(name)) => self.listings.lookup(name).await,
            _ => None,
        };

        Some(FeedItem {
            source: kind,
            occurred_at: timestamp::normalize(rec.published.as_deref(), kind.time_encoding()),
            category: classify(&text),
            headline,
            summary,
            organization,
            ticker,
            receipt_no: rec.receipt_no,
            url,
            raw: rec.payload,
        })
    }
}

#[async_trait::async_trait]
impl<S: FeedSource> Feed for FeedAdapter<S> {
    fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    async fn fetch(&self, query: &FeedQuery) -> Vec<FeedItem> {
        ensure_metrics_described();
        let source = self.source.kind().as_str();
        let t0 = std::time::Instant::now();
        counter!("live_fetch_total", "source" => source).increment(1);

        // The deadline covers shaping too: ticker lookups may wait on a listing reload.
        let work = async {
            let records = self.source.fetch_records(query).await?;
            let mut out = Vec::with_capacity(records.len());
            for rec in records {
                if let Some(item) = self.shape(rec, query.scope).await {
                    out.push(item);
                }
            }
            anyhow::Ok(out)
        };

        let mut out = match tokio::time::timeout(self.deadline, work).await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                tracing::warn!(target: "feed", error = ?e, source, "provider error");
                counter!("live_fetch_errors_total", "source" => source).increment(1);
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(target: "feed", source, deadline_ms = self.deadline.as_millis() as u64, "provider timed out");
                counter!("live_fetch_errors_total", "source" => source).increment(1);
                return Vec::new();
            }
        };
        sort_newest_first(&mut out);

        histogram!("live_fetch_ms", "source" => source).record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(target: "feed", source, items = out.len(), "fetch complete");
        out
    }
}
