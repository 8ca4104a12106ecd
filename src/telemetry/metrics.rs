//! Prometheus metrics

use metrics::Label;
use std::net::SocketAddr;
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Fetch attempts by source and outcome
    Fetch,
    /// Quotes accepted into the snapshot store
    QuotesAccepted,
    /// Records dropped by a normalizer
    ValidationDropped,
    /// Movements by impact class
    Movements,
    /// Arbitrage opportunities reported by a scan
    ArbitrageFound,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Source fetch round trip
    Fetch,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Running (source, game) timers
    ActiveTimers,
    /// Games being tracked
    TrackedGames,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::Fetch => "odds_fetch_total",
        CounterMetric::QuotesAccepted => "odds_quotes_accepted_total",
        CounterMetric::ValidationDropped => "odds_validation_dropped_total",
        CounterMetric::Movements => "odds_movements_total",
        CounterMetric::ArbitrageFound => "odds_arbitrage_found_total",
    }
}

fn to_labels(labels: &[(&'static str, &str)]) -> Vec<Label> {
    labels
        .iter()
        .map(|(k, v)| Label::new(*k, v.to_string()))
        .collect()
}

/// Add `value` to a counter
pub fn increment(metric: CounterMetric, labels: &[(&'static str, &str)], value: u64) {
    metrics::counter!(counter_name(metric), to_labels(labels)).increment(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, source: &str, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::Fetch => "odds_fetch_latency_ms",
    };
    metrics::histogram!(metric_name, to_labels(&[("source", source)]))
        .record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ActiveTimers => "odds_active_timers",
        GaugeMetric::TrackedGames => "odds_tracked_games",
    };
    metrics::gauge!(metric_name).set(value);
}

/// Install the Prometheus recorder and its HTTP scrape endpoint
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(port, "Prometheus metrics endpoint started");
    Ok(())
}
