//! CB live feed binary entrypoint.
//! Boots the Axum server: live SSE streams + snapshots for disclosures and news.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cb_live_feed::config::Settings;
use cb_live_feed::metrics::Metrics;
use cb_live_feed::shutdown::{self, Shutdown};

/// `RUST_LOG` filter (default: our crate at info), compact output unless
/// `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cb_live_feed=info,tower_http=warn,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env()?;
    let metrics = Metrics::init()?;
    let shutdown = Shutdown::new();

    let state = cb_live_feed::build_state(&settings, shutdown.clone())?;
    let app = cb_live_feed::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::signal().await;
            // Close open streams first, otherwise graceful shutdown waits on them.
            shutdown.trigger();
        })
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}
