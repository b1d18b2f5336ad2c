// src/config.rs
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::feed::providers::naver::NaverCredentials;
use crate::feed::DEFAULT_FETCH_DEADLINE;

pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_DART_API_KEY: &str = "DART_API_KEY";
pub const ENV_NAVER_CLIENT_ID: &str = "NAVER_CLIENT_ID";
pub const ENV_NAVER_CLIENT_SECRET: &str = "NAVER_CLIENT_SECRET";
pub const ENV_NAVER_NEWS_QUERIES: &str = "NAVER_NEWS_QUERIES";
pub const ENV_LISTINGS_PATH: &str = "LISTINGS_PATH";
pub const ENV_FETCH_DEADLINE_SECS: &str = "FETCH_DEADLINE_SECS";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_NEWS_QUERIES: &str = "전환사채,리픽싱";
pub const DEFAULT_LISTINGS_PATH: &str = "config/listings.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub dart_api_key: Option<String>,
    pub naver: Option<NaverCredentials>,
    /// Default news queries when a request carries no `q`.
    pub news_queries: Vec<String>,
    pub listings_path: PathBuf,
    pub fetch_deadline: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            dart_api_key: None,
            naver: None,
            news_queries: split_queries(DEFAULT_NEWS_QUERIES),
            listings_path: PathBuf::from(DEFAULT_LISTINGS_PATH),
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
        }
    }
}

impl Settings {
    /// Read settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a local `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = non_empty(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("{ENV_BIND_ADDR}={bind_raw} is not a socket address"))?;

        let naver = match (non_empty(ENV_NAVER_CLIENT_ID), non_empty(ENV_NAVER_CLIENT_SECRET)) {
            (Some(client_id), Some(client_secret)) => Some(NaverCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let news_queries = split_queries(
            &non_empty(ENV_NAVER_NEWS_QUERIES).unwrap_or_else(|| DEFAULT_NEWS_QUERIES.to_string()),
        );

        let fetch_deadline = match non_empty(ENV_FETCH_DEADLINE_SECS) {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("{ENV_FETCH_DEADLINE_SECS}={raw} is not a number"))?
                    .max(1),
            ),
            None => DEFAULT_FETCH_DEADLINE,
        };

        Ok(Self {
            bind_addr,
            dart_api_key: non_empty(ENV_DART_API_KEY),
            naver,
            news_queries,
            listings_path: non_empty(ENV_LISTINGS_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LISTINGS_PATH)),
            fetch_deadline,
        })
    }
}

/// Split a comma list, trimming and dropping blanks. Order is kept.
pub fn split_queries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
