// tests/stream_session.rs
// Session loop under paused time: dedup, heartbeat, cancellation.
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use cb_live_feed::feed::FeedAdapter;
use cb_live_feed::listing::{ListingCache, StaticListingStore};
use cb_live_feed::shutdown::Shutdown;
use cb_live_feed::stream::frame::{Frame, CONNECTED};
use cb_live_feed::stream::{SessionEnd, SessionStats, StreamSession};
use cb_live_feed::{Feed, FeedQuery, SourceKind};
use common::{item, FakeSource, ScriptedFeed, Upstream};

const INTERVAL: Duration = Duration::from_secs(8);

type Session = tokio::task::JoinHandle<(SessionEnd, SessionStats)>;

fn open(feed: Arc<dyn Feed>, interval: Duration, shutdown: &Shutdown) -> (Session, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(64);
    let session = StreamSession::new(feed, FeedQuery::default(), interval, tx, shutdown.subscribe());
    (tokio::spawn(session.run()), rx)
}

async fn next(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("frame within two minutes")
        .expect("session still open")
}

fn url_of(frame: &Frame) -> &str {
    &frame.item().expect("item frame").url
}

#[tokio::test(start_paused = true)]
async fn connected_comes_first() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(SourceKind::News, Vec::new()));
    let (_h, mut rx) = open(feed, INTERVAL, &shutdown);
    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
}

#[tokio::test(start_paused = true)]
async fn each_item_is_emitted_once_and_stale_never() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(
        SourceKind::News,
        vec![
            item("https://a", Some(5)),
            item("https://undated", None),
            item("https://old", Some(120)),
        ],
    ));
    let (_h, mut rx) = open(feed.clone(), INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    assert_eq!(url_of(&next(&mut rx).await), "https://a");
    assert_eq!(url_of(&next(&mut rx).await), "https://undated");

    // Polls 2 and 3 return the same batch; the next thing out is a keepalive.
    let frame = next(&mut rx).await;
    assert!(frame.is_heartbeat(), "unexpected {frame:?}");
    assert_eq!(feed.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn item_first_seen_on_a_later_poll_is_emitted() {
    let shutdown = Shutdown::new();
    let a = item("https://a", Some(1));
    let late = item("https://late", Some(30));
    let feed = Arc::new(ScriptedFeed::sequence(
        SourceKind::News,
        vec![vec![a.clone()]],
        vec![a, late],
    ));
    let (_h, mut rx) = open(feed.clone(), INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    assert_eq!(url_of(&next(&mut rx).await), "https://a");
    assert_eq!(url_of(&next(&mut rx).await), "https://late");
    assert_eq!(feed.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_url_with_new_time_is_a_new_item() {
    let shutdown = Shutdown::new();
    let first = item("https://same", Some(10));
    let edited = item("https://same", Some(2));
    let feed = Arc::new(ScriptedFeed::sequence(
        SourceKind::News,
        vec![vec![first]],
        vec![edited],
    ));
    let (_h, mut rx) = open(feed, INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    let a = next(&mut rx).await;
    let b = next(&mut rx).await;
    assert_eq!(url_of(&a), url_of(&b));
    assert_ne!(a.item().unwrap().occurred_at, b.item().unwrap().occurred_at);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_after_quiet_polls() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(SourceKind::News, Vec::new()));
    let (_h, mut rx) = open(feed.clone(), INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    let t0 = tokio::time::Instant::now();

    // Polls at 0s and 8s are within the quiet period; the one at 16s is not.
    assert!(next(&mut rx).await.is_heartbeat());
    assert_eq!(feed.calls(), 3);
    assert!(t0.elapsed() >= Duration::from_secs(16));

    // The heartbeat resets the quiet clock: next one at 32s.
    assert!(next(&mut rx).await.is_heartbeat());
    assert_eq!(feed.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_sleeping_ends_the_session() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(
        SourceKind::News,
        vec![item("https://a", Some(1))],
    ));
    let (handle, mut rx) = open(feed.clone(), INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    assert_eq!(url_of(&next(&mut rx).await), "https://a");
    let t0 = tokio::time::Instant::now();
    drop(rx);

    let (end, stats) = handle.await.unwrap();
    assert!(t0.elapsed() <= INTERVAL, "closed after {:?}", t0.elapsed());
    assert_eq!(end, SessionEnd::ClientGone);
    assert_eq!(stats.polls, 1);
    assert_eq!(stats.emitted, 1);
    assert_eq!(feed.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_sleeping_ends_the_session() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(SourceKind::News, Vec::new()));
    let (handle, mut rx) = open(feed, INTERVAL, &shutdown);

    assert_eq!(next(&mut rx).await, Frame::Comment(CONNECTED));
    tokio::time::sleep(Duration::from_secs(3)).await;
    shutdown.trigger();

    let (end, stats) = handle.await.unwrap();
    assert_eq!(end, SessionEnd::Shutdown);
    assert_eq!(stats.polls, 1);
    // Channel closes once the session drops its sender.
    assert_eq!(rx.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn hung_upstream_does_not_stall_polling_and_shutdown_abandons_fetch() {
    let shutdown = Shutdown::new();
    let source = FakeSource::new(SourceKind::Disclosure, Upstream::Hang);
    let calls = source.counter();
    let listings = Arc::new(ListingCache::new(Arc::new(StaticListingStore::default())));
    let feed = Arc::new(FeedAdapter::new(source, listings).with_deadline(Duration::from_secs(5)));

    // Fetch 1 runs 0s..5s and times out, sleep 2s, fetch 2 starts at 7s.
    let (handle, _rx) = open(feed, Duration::from_secs(2), &shutdown);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!handle.is_finished());

    shutdown.trigger();
    let (end, stats) = handle.await.unwrap();
    assert_eq!(end, SessionEnd::Shutdown);
    assert_eq!(stats.polls, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn spawned_session_streams_through_the_returned_receiver() {
    let shutdown = Shutdown::new();
    let feed = Arc::new(ScriptedFeed::repeating(
        SourceKind::Disclosure,
        vec![item("https://a", Some(1))],
    ));
    let mut rx = StreamSession::spawn(feed, FeedQuery::default(), INTERVAL, shutdown.subscribe());

    assert_eq!(rx.recv().await, Some(Frame::Comment(CONNECTED)));
    assert_eq!(url_of(&rx.recv().await.unwrap()), "https://a");
    shutdown.trigger();
    assert_eq!(rx.recv().await, None);
}
