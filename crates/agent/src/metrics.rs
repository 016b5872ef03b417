use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::{alerts::AlertState, Result};

lazy_static! {
    pub static ref ALERT_RESULTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("alert_agent_results_total", "Alert results collected, by state."),
        &["state"]
    )
    .expect("metric definition is valid");
    pub static ref ALERT_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("alert_agent_failures_total", "Alert checks that raised an error, by alert type."),
        &["kind"]
    )
    .expect("metric definition is valid");
    pub static ref ALERT_SKIPPED_TOTAL: IntCounter = IntCounter::new(
        "alert_agent_skipped_total",
        "Script alerts that asked to be skipped."
    )
    .expect("metric definition is valid");
    pub static ref ALERT_CHECK_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("alert_agent_check_seconds", "Time spent evaluating one alert, by alert type."),
        &["kind"]
    )
    .expect("metric definition is valid");
    pub static ref SCHEDULED_JOBS: IntGauge = IntGauge::new(
        "alert_agent_scheduled_jobs",
        "Alert jobs currently held by the scheduler."
    )
    .expect("metric definition is valid");
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        registry.register(Box::new(ALERT_RESULTS_TOTAL.clone())).expect("metric registers once");
        registry.register(Box::new(ALERT_FAILURES_TOTAL.clone())).expect("metric registers once");
        registry.register(Box::new(ALERT_SKIPPED_TOTAL.clone())).expect("metric registers once");
        registry.register(Box::new(ALERT_CHECK_SECONDS.clone())).expect("metric registers once");
        registry.register(Box::new(SCHEDULED_JOBS.clone())).expect("metric registers once");
        registry
    };
}

pub fn record_result(state: AlertState) {
    ALERT_RESULTS_TOTAL.with_label_values(&[state.as_str()]).inc();
}

pub fn record_failure(kind: &str) {
    ALERT_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_skipped() {
    ALERT_SKIPPED_TOTAL.inc();
}

pub fn observe_check(kind: &str, seconds: f64) {
    ALERT_CHECK_SECONDS.with_label_values(&[kind]).observe(seconds);
}

pub fn set_scheduled_jobs(count: usize) {
    SCHEDULED_JOBS.set(count as i64);
}

/// Text exposition of every agent metric.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}
