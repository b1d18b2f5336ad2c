// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod feed;
pub mod listing;
pub mod metrics;
pub mod shutdown;
pub mod stream;
pub mod timestamp;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

pub use crate::api::{router, AppState};
pub use crate::feed::types::{Category, Feed, FeedItem, FeedQuery, FeedSource, Scope, SourceKind};

use crate::config::Settings;
use crate::feed::providers::{dart::DartSource, http_client, naver::NaverSource};
use crate::feed::FeedAdapter;
use crate::listing::{FileListingStore, ListingCache, ListingStore, StaticListingStore};
use crate::shutdown::Shutdown;

/// Wire the real upstream adapters and the shared listing cache.
pub fn build_state(settings: &Settings, shutdown: Shutdown) -> Result<AppState> {
    let store: Arc<dyn ListingStore> = if settings.listings_path.exists() {
        info!(path = %settings.listings_path.display(), "using listings file");
        Arc::new(FileListingStore::new(&settings.listings_path))
    } else {
        warn!(
            path = %settings.listings_path.display(),
            "listings file not found; tickers will not resolve"
        );
        Arc::new(StaticListingStore::default())
    };
    let listings = Arc::new(ListingCache::new(store));

    let client = http_client()?;
    let dart = FeedAdapter::new(
        DartSource::new(settings.dart_api_key.clone(), client.clone()),
        listings.clone(),
    )
    .with_deadline(settings.fetch_deadline);
    let news = FeedAdapter::new(NaverSource::new(settings.naver.clone(), client), listings)
        .with_deadline(settings.fetch_deadline);

    if settings.dart_api_key.is_none() {
        warn!("DART_API_KEY not set; disclosure feed will stay empty");
    }
    if settings.naver.is_none() {
        warn!("Naver credentials not set; news feed will stay empty");
    }

    Ok(AppState {
        news: Arc::new(news),
        dart: Arc::new(dart),
        default_queries: Arc::new(settings.news_queries.clone()),
        shutdown,
    })
}
