//! # Session Stream Controller
//! One task per open stream: poll the feed, filter through the session's
//! dedup set and look-back window, emit what is new, keep the connection warm,
//! sleep, repeat.
//!
//! ```text
//! CONNECTING ─► POLLING ─► EMITTING ─┐
//!                  ▲   ◄─────────────┘
//!                  │         │ (nothing sent, quiet > 15s)
//!               SLEEPING ◄── IDLE-HEARTBEAT
//!                  │
//!   disconnect / shutdown at any await ─► CLOSED
//! ```
//!
//! Cancellation is checked at every suspension point (fetch, emit, sleep) by
//! racing the operation against client disconnect and the shutdown signal, so
//! an in-flight fetch is abandoned rather than awaited.

pub mod dedup;
pub mod frame;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::feed::types::{Feed, FeedQuery};
use crate::shutdown::ShutdownListener;
use dedup::{Admission, SessionDedup};
use frame::{Frame, CONNECTED, HEARTBEAT};

pub const DEFAULT_INTERVAL_SECS: u64 = 8;
pub const MIN_INTERVAL_SECS: u64 = 2;
pub const MAX_INTERVAL_SECS: u64 = 60;
/// Quiet period after which an empty poll sends a keepalive.
pub const HEARTBEAT_AFTER: Duration = Duration::from_secs(15);
/// Frames buffered between the session task and the response body.
pub const CHANNEL_CAPACITY: usize = 64;

/// Clamp a client-requested poll interval into the allowed range.
pub fn clamp_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS))
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!("live_sessions_active", "Open live stream sessions.");
        describe_counter!("live_items_emitted_total", "Items pushed to stream clients.");
        describe_counter!("live_heartbeats_total", "Keepalive frames sent.");
    });
}

/// Why a session reached CLOSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ClientGone,
    Shutdown,
}

/// Counters for one finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub polls: u64,
    pub emitted: u64,
    pub heartbeats: u64,
}

pub struct StreamSession {
    feed: Arc<dyn Feed>,
    query: FeedQuery,
    interval: Duration,
    heartbeat_after: Duration,
    tx: mpsc::Sender<Frame>,
    shutdown: ShutdownListener,
    dedup: SessionDedup,
    stats: SessionStats,
}

/// Decrements the active-sessions gauge however the task ends.
struct ActiveGuard;

impl ActiveGuard {
    fn new() -> Self {
        gauge!("live_sessions_active").increment(1.0);
        Self
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        gauge!("live_sessions_active").decrement(1.0);
    }
}

impl StreamSession {
    pub fn new(
        feed: Arc<dyn Feed>,
        query: FeedQuery,
        interval: Duration,
        tx: mpsc::Sender<Frame>,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            feed,
            query,
            interval,
            heartbeat_after: HEARTBEAT_AFTER,
            tx,
            shutdown,
            dedup: SessionDedup::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn with_heartbeat_after(mut self, quiet: Duration) -> Self {
        self.heartbeat_after = quiet;
        self
    }

    /// Spawn the session on the runtime and return the receiving end.
    pub fn spawn(
        feed: Arc<dyn Feed>,
        query: FeedQuery,
        interval: Duration,
        shutdown: ShutdownListener,
    ) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session = Self::new(feed, query, interval, tx, shutdown);
        tokio::spawn(session.run());
        rx
    }

    /// Resolves when the client goes away or shutdown fires.
    async fn cancelled(tx: &mpsc::Sender<Frame>, shutdown: &mut ShutdownListener) -> SessionEnd {
        tokio::select! {
            _ = tx.closed() => SessionEnd::ClientGone,
            _ = shutdown.wait() => SessionEnd::Shutdown,
        }
    }

    fn check_cancelled(&self) -> Option<SessionEnd> {
        if self.tx.is_closed() {
            Some(SessionEnd::ClientGone)
        } else if self.shutdown.is_triggered() {
            Some(SessionEnd::Shutdown)
        } else {
            None
        }
    }

    async fn emit(&mut self, frame: Frame) -> Result<(), SessionEnd> {
        tokio::select! {
            biased;
            end = Self::cancelled(&self.tx, &mut self.shutdown) => Err(end),
            sent = self.tx.send(frame) => sent.map_err(|_| SessionEnd::ClientGone),
        }
    }

    /// Drive the session to CLOSED. All session state is dropped on return.
    pub async fn run(mut self) -> (SessionEnd, SessionStats) {
        ensure_metrics_described();
        let _active = ActiveGuard::new();
        let source = self.feed.kind().as_str();
        tracing::info!(
            target: "stream",
            source,
            interval_s = self.interval.as_secs(),
            window_min = self.query.window_minutes,
            "session opened"
        );

        let end = self.drive(source).await;

        tracing::info!(
            target: "stream",
            source,
            reason = ?end,
            polls = self.stats.polls,
            emitted = self.stats.emitted,
            seen = self.dedup.len(),
            "session closed"
        );
        (end, self.stats)
    }

    async fn drive(&mut self, source: &'static str) -> SessionEnd {
        // CONNECTING: let the client's open handshake complete immediately.
        if let Err(end) = self.emit(Frame::Comment(CONNECTED)).await {
            return end;
        }
        let mut last_activity = Instant::now();

        loop {
            if let Some(end) = self.check_cancelled() {
                return end;
            }

            // POLLING
            let batch = tokio::select! {
                biased;
                end = Self::cancelled(&self.tx, &mut self.shutdown) => return end,
                batch = self.feed.fetch(&self.query) => batch,
            };
            self.stats.polls += 1;

            let cutoff =
                chrono::Utc::now() - chrono::Duration::minutes(i64::from(self.query.window_minutes));
            let mut sent = 0u64;
            for item in batch {
                if self.dedup.admit(&item, cutoff) != Admission::Fresh {
                    continue;
                }
                // EMITTING
                if let Err(end) = self.emit(Frame::Item(Box::new(item))).await {
                    return end;
                }
                sent += 1;
            }

            if sent > 0 {
                self.stats.emitted += sent;
                counter!("live_items_emitted_total", "source" => source).increment(sent);
                last_activity = Instant::now();
            } else if last_activity.elapsed() > self.heartbeat_after {
                // IDLE-HEARTBEAT
                if let Err(end) = self.emit(Frame::Comment(HEARTBEAT)).await {
                    return end;
                }
                self.stats.heartbeats += 1;
                counter!("live_heartbeats_total").increment(1);
                last_activity = Instant::now();
            }

            // SLEEPING
            tokio::select! {
                biased;
                end = Self::cancelled(&self.tx, &mut self.shutdown) => return end,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
