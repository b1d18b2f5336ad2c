//! Frames a session emits and their server-sent-event encoding.

use std::convert::Infallible;

use axum::{
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::feed::types::{Category, FeedItem};
use crate::timestamp::canonical;

pub const CONNECTED: &str = "connected";
pub const HEARTBEAT: &str = "hb";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `:<text>` comment line, ignored by EventSource clients.
    Comment(&'static str),
    Item(Box<FeedItem>),
}

impl Frame {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Frame::Comment(HEARTBEAT))
    }

    pub fn item(&self) -> Option<&FeedItem> {
        match self {
            Frame::Item(it) => Some(it),
            Frame::Comment(_) => None,
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            Frame::Comment(text) => Event::default().comment(text),
            Frame::Item(item) => Event::default()
                .json_data(WireItem::from(item.as_ref()))
                .unwrap_or_else(|e| {
                    tracing::warn!(target: "stream", error = ?e, url = %item.url, "item encode failed");
                    Event::default().comment("encode-error")
                }),
        }
    }
}

/// JSON shape the dashboard consumes, for both streams and snapshots.
#[derive(Debug, Serialize)]
pub struct WireItem<'a> {
    pub source: &'static str,
    pub time: Option<String>,
    pub time_ts: Option<i64>,
    #[serde(rename = "type")]
    pub category: Category,
    pub headline: &'a str,
    pub summary: &'a str,
    pub corp: Option<&'a str>,
    pub stock_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcp_no: Option<&'a str>,
    pub url: &'a str,
    pub raw: &'a serde_json::Value,
}

impl<'a> From<&'a FeedItem> for WireItem<'a> {
    fn from(it: &'a FeedItem) -> Self {
        Self {
            source: it.source.as_str(),
            time: it.occurred_at.as_ref().map(canonical),
            time_ts: it.occurred_at.map(|t| t.timestamp_millis()),
            category: it.category,
            headline: &it.headline,
            summary: &it.summary,
            corp: it.organization.as_deref(),
            stock_code: it.ticker.as_deref(),
            rcp_no: it.receipt_no.as_deref(),
            url: &it.url,
            raw: &it.raw,
        }
    }
}

fn event_stream(rx: mpsc::Receiver<Frame>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let frame = rx.recv().await?;
        Some((Ok(frame.into_event()), rx))
    })
}

/// Wrap a session's receiving end as an SSE response. Dropping the response
/// body drops `rx`, which the session observes as a disconnect.
pub fn sse_response(rx: mpsc::Receiver<Frame>) -> Response {
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(event_stream(rx)),
    )
        .into_response()
}
