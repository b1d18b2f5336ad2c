//! # Listing cache
//! Organization name → ticker code, refreshed wholesale from a reference store.
//!
//! - One cache per process, shared by every adapter through an `Arc`.
//! - A refresh builds a complete new table and swaps it in under a short write
//!   lock, so readers see either the old or the new table, never a mix.
//! - A failed or timed-out refresh keeps the previous table and does not
//!   restart the TTL; the next lookup retries.
//! - While one caller refreshes, others keep reading the previous table
//!   instead of queueing behind the reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde::Deserialize;
use tokio::time::Instant;

/// Entries older than this are reloaded before answering.
pub const LISTING_TTL: Duration = Duration::from_secs(600);
/// Bound on one `load_all` call.
pub const LISTING_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Listing {
    pub name: String,
    pub code: String,
}

impl Listing {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Bulk read of every (name, code) pair.
#[async_trait::async_trait]
pub trait ListingStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Listing>>;
}

/// In-memory store. Used when no listings file is configured, and in tests.
#[derive(Debug, Default)]
pub struct StaticListingStore {
    rows: RwLock<Vec<Listing>>,
}

impl StaticListingStore {
    pub fn new(rows: Vec<Listing>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn replace(&self, rows: Vec<Listing>) {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = rows;
    }
}

#[async_trait::async_trait]
impl ListingStore for StaticListingStore {
    async fn load_all(&self) -> Result<Vec<Listing>> {
        Ok(self.rows.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Re-reads a TOML or JSON listings file on every refresh.
#[derive(Debug, Clone)]
pub struct FileListingStore {
    path: PathBuf,
}

impl FileListingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ListingStore for FileListingStore {
    async fn load_all(&self) -> Result<Vec<Listing>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading listings from {}", self.path.display()))?;
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_listings(&content, &ext)
            .with_context(|| format!("parsing listings in {}", self.path.display()))
    }
}

/// Parse a listings document. TOML (`[[listing]]`) or a JSON array of
/// `{name, code}`; `hint_ext` picks which to try first.
pub fn parse_listings(s: &str, hint_ext: &str) -> Result<Vec<Listing>> {
    #[derive(Deserialize)]
    struct TomlListings {
        #[serde(default)]
        listing: Vec<Listing>,
    }

    let from_toml = || toml::from_str::<TomlListings>(s).map(|t| t.listing).ok();
    let from_json = || serde_json::from_str::<Vec<Listing>>(s).ok();

    let parsed = if hint_ext == "json" {
        from_json().or_else(from_toml)
    } else {
        from_toml().or_else(from_json)
    };
    parsed
        .map(clean)
        .ok_or_else(|| anyhow!("unsupported listings format"))
}

fn clean(rows: Vec<Listing>) -> Vec<Listing> {
    rows.into_iter()
        .map(|l| Listing::new(l.name.trim(), l.code.trim()))
        .filter(|l| !l.name.is_empty() && !l.code.is_empty())
        .collect()
}

#[derive(Debug)]
struct Snapshot {
    table: Arc<HashMap<String, String>>,
    loaded_at: Instant,
    invalidated: bool,
}

impl Snapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.loaded_at.elapsed() <= ttl
    }
}

pub struct ListingCache {
    store: Arc<dyn ListingStore>,
    ttl: Duration,
    load_timeout: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh: tokio::sync::Mutex<()>,
}

impl ListingCache {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self::with_ttl(store, LISTING_TTL)
    }

    pub fn with_ttl(store: Arc<dyn ListingStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            load_timeout: LISTING_LOAD_TIMEOUT,
            current: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Exact-name lookup, reloading the table first if it is missing or stale.
    pub async fn lookup(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let snap = self.table().await?;
        snap.table.get(name).cloned()
    }

    /// Drop freshness so the next lookup reloads. The old table stays readable.
    pub fn invalidate(&self) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.take() {
            *guard = Some(Arc::new(Snapshot {
                table: old.table.clone(),
                loaded_at: old.loaded_at,
                invalidated: true,
            }));
        }
    }

    /// Number of entries in the table currently served.
    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.table.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn table(&self) -> Option<Arc<Snapshot>> {
        let snap = self.snapshot();
        if snap.as_ref().is_some_and(|s| s.is_fresh(self.ttl)) {
            return snap;
        }

        // Collapse concurrent refreshes. With a previous table to serve, don't
        // wait on someone else's reload; without one, wait and re-check.
        let _guard = match (self.refresh.try_lock(), snap.is_some()) {
            (Ok(guard), _) => guard,
            (Err(_), true) => return snap,
            (Err(_), false) => self.refresh.lock().await,
        };
        let snap = self.snapshot();
        if snap.as_ref().is_some_and(|s| s.is_fresh(self.ttl)) {
            return snap;
        }

        counter!("listing_refresh_total").increment(1);
        let loaded = tokio::time::timeout(self.load_timeout, self.store.load_all())
            .await
            .unwrap_or_else(|_| Err(anyhow!("listing load timed out after {:?}", self.load_timeout)));
        match loaded {
            Ok(rows) => {
                let fresh = Arc::new(Snapshot {
                    table: Arc::new(rows.into_iter().map(|l| (l.name, l.code)).collect()),
                    loaded_at: Instant::now(),
                    invalidated: false,
                });
                tracing::info!(target: "listing", entries = fresh.table.len(), "listing table reloaded");
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh.clone());
                Some(fresh)
            }
            Err(e) => {
                counter!("listing_refresh_errors_total").increment(1);
                tracing::warn!(target: "listing", error = ?e, stale = snap.is_some(), "listing reload failed; keeping previous table");
                snap
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_formats_parse() {
        let toml = r#"
[[listing]]
name = " ABC Corp "
code = "000001"

[[listing]]
name = ""
code = "999999"
"#;
        assert_eq!(
            parse_listings(toml, "toml").unwrap(),
            vec![Listing::new("ABC Corp", "000001")]
        );

        let json = r#"[{"name":"XYZ","code":"000002"}]"#;
        assert_eq!(
            parse_listings(json, "json").unwrap(),
            vec![Listing::new("XYZ", "000002")]
        );
        // Wrong hint still falls back to the other format.
        assert_eq!(parse_listings(json, "toml").unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_listings("[[[", "toml").is_err());
    }

    #[tokio::test]
    async fn blank_name_never_hits_the_store() {
        let cache = ListingCache::new(Arc::new(StaticListingStore::default()));
        assert_eq!(cache.lookup("   ").await, None);
        assert!(cache.is_empty());
    }
}
