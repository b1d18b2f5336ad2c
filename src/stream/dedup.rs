//! Per-session dedup set and the look-back window test.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::feed::types::FeedItem;
use crate::timestamp::canonical;

/// Outcome of offering one item to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Fresh,
    Duplicate,
    Stale,
}

/// `url|canonical-time`; the time part is empty when the item has none.
pub fn dedup_key(item: &FeedItem) -> String {
    let ts = item.occurred_at.as_ref().map(canonical).unwrap_or_default();
    format!("{}|{}", item.url, ts)
}

/// Older than `cutoff`. A missing timestamp is never stale.
pub fn is_stale(item: &FeedItem, cutoff: DateTime<Utc>) -> bool {
    item.occurred_at.is_some_and(|t| t < cutoff)
}

/// Keys seen by one session. Grows for the life of the connection and is
/// dropped with it.
#[derive(Debug, Default)]
pub struct SessionDedup {
    seen: HashSet<String>,
}

impl SessionDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `item` if it is neither seen nor stale. Stale items are not
    /// recorded, so a later poll may still admit the same key.
    pub fn admit(&mut self, item: &FeedItem, cutoff: DateTime<Utc>) -> Admission {
        let key = dedup_key(item);
        if self.seen.contains(&key) {
            return Admission::Duplicate;
        }
        if is_stale(item, cutoff) {
            return Admission::Stale;
        }
        self.seen.insert(key);
        Admission::Fresh
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
