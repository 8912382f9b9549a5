//! Symptom triage service: binary entrypoint.
//! Boots the Axum HTTP server with the dialogue map and practitioner resolver
//! described by `config/triage.toml`.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use symptom_triage::api;
use symptom_triage::metrics::Metrics;

/// `RUST_LOG` filter (default `symptom_triage=info,warn`); JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("symptom_triage=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    // Shuttle may already have installed a subscriber; keep theirs in that case.
    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut app = api::app().await?;

    match Metrics::init() {
        Ok(metrics) => app = app.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(app.into())
}
