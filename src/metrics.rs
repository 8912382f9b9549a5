use anyhow::anyhow;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!("triage_replies_total", "Assistant replies by policy branch");
        describe_counter!(
            "triage_resolver_lookups_total",
            "Practitioner lookups by resolver"
        );
        describe_counter!(
            "triage_resolver_errors_total",
            "Failed practitioner lookups by resolver"
        );
        describe_histogram!(
            "triage_resolver_latency_ms",
            Unit::Milliseconds,
            "Practitioner lookup latency"
        );

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
