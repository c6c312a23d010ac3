use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and describe the broker's metrics
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!("broker_requests_total", "Provider requests by outcome");
    describe_counter!("broker_tokens_total", "Tokens consumed by provider and model");
    describe_histogram!(
        "broker_request_duration_seconds",
        "Provider request duration in seconds"
    );
    describe_gauge!("broker_cost_usd_total", "Recorded spend in USD");
    describe_counter!("broker_cache_events_total", "Response cache hits and misses");
    describe_counter!(
        "broker_budget_alerts_total",
        "Cost records that pushed spend over the alert threshold"
    );
    describe_counter!(
        "broker_provider_failovers_total",
        "Retries on an alternate provider after a failure"
    );
    describe_counter!(
        "broker_rate_limited_total",
        "Requests rejected by the per-user rate limit"
    );
    describe_gauge!("broker_info", "Broker version information");

    gauge!("broker_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record the outcome of one provider attempt ("success" or an error kind)
pub fn record_request(provider: &str, status: &str) {
    counter!(
        "broker_requests_total",
        "provider" => provider.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

pub fn record_tokens(provider: &str, model: &str, token_type: &str, count: u64) {
    counter!(
        "broker_tokens_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "type" => token_type.to_string(),
    )
    .increment(count);
}

pub fn record_duration(provider: &str, duration: Duration) {
    histogram!(
        "broker_request_duration_seconds",
        "provider" => provider.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Counters only take integers, so fractional spend accumulates on a gauge
pub fn record_cost(service_type: &str, model: &str, cost_usd: f64) {
    if cost_usd <= 0.0 {
        return;
    }
    gauge!(
        "broker_cost_usd_total",
        "service" => service_type.to_string(),
        "model" => model.to_string(),
    )
    .increment(cost_usd);
}

pub fn record_cache_event(event: &str) {
    counter!("broker_cache_events_total", "event" => event.to_string()).increment(1);
}

pub fn record_budget_alert() {
    counter!("broker_budget_alerts_total").increment(1);
}

pub fn record_failover(from_provider: &str) {
    counter!(
        "broker_provider_failovers_total",
        "from" => from_provider.to_string(),
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("broker_rate_limited_total").increment(1);
}
