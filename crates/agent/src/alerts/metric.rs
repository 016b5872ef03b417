use serde_json::Value;
use tracing::debug;

use super::definition::{MetricSource, Reporting};
use super::expression::{self, numeric};
use super::uri::{effective_host, port_from_uri, resolve_uri_spec, url_host};
use super::{AlertState, CheckContext, Evaluation};
use crate::template::FormatArg;
use crate::{Error, Result};

const DEFAULT_TEXT: &str = "{0}";

/// Threshold check over JMX values read from a component's HTTP endpoint.
#[derive(Debug, Clone)]
pub struct MetricAlert {
    source: MetricSource,
}

impl MetricAlert {
    pub fn new(source: MetricSource) -> Self {
        Self { source }
    }

    pub fn reporting(&self) -> &Reporting {
        &self.source.reporting
    }

    pub fn default_reporting_text(_state: AlertState) -> &'static str {
        DEFAULT_TEXT
    }

    pub(crate) async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Evaluation> {
        let jmx = self.source.jmx.as_ref().ok_or_else(|| {
            Error::Definition("Could not determine result. Specific metric collector is not defined.".to_string())
        })?;

        let alert_uri = resolve_uri_spec(&self.source.uri, ctx.configurations)?;
        let host = effective_host(&alert_uri.uri, ctx.host_name);
        let port = port_from_uri(&alert_uri.uri)
            .or(self.source.uri.default_port())
            .unwrap_or(if alert_uri.is_ssl_enabled { 443 } else { 80 });
        let scheme = if alert_uri.is_ssl_enabled { "https" } else { "http" };
        let base_url = format!("{}://{}:{}", scheme, url_host(&host), port);

        debug!(url = %base_url, properties = ?jmx.property_list, "loading metrics");
        let values = ctx
            .tools
            .jmx
            .load(&base_url, &jmx.property_list, ctx.timeouts.web())
            .await?;

        let derived = match &jmx.value {
            Some(formula) => Some(expression::evaluate(formula, &values)?),
            None => None,
        };

        let check_value = match derived {
            Some(value) => value,
            None => first_numeric(&values)?,
        };

        let state = classify(
            check_value,
            self.source.reporting.threshold(AlertState::Ok),
            self.source.reporting.threshold(AlertState::Warning),
            self.source.reporting.threshold(AlertState::Critical),
        );

        let mut args: Vec<FormatArg> = values.iter().map(FormatArg::from).collect();
        args.push(FormatArg::from(derived));

        Ok(Evaluation::new(state, args))
    }
}

fn first_numeric(values: &[Value]) -> Result<f64> {
    let first = values
        .first()
        .ok_or_else(|| Error::Transport("no metric values were returned".to_string()))?;
    numeric(first).ok_or_else(|| Error::Transport(format!("metric value {} is not numeric", first)))
}

/// Map a value onto a state.
///
/// Thresholds grow towards critical unless critical is below warning, in which
/// case lower values are worse. Critical is checked before warning. A value
/// outside the `ok` band is UNKNOWN; without thresholds every value is OK.
pub fn classify(value: f64, ok: Option<f64>, warning: Option<f64>, critical: Option<f64>) -> AlertState {
    if warning.is_none() && critical.is_none() {
        return AlertState::Ok;
    }

    let descending = matches!((warning, critical), (Some(w), Some(c)) if c < w);
    let reached = |threshold: f64| {
        if descending {
            value <= threshold
        } else {
            value >= threshold
        }
    };

    if critical.is_some_and(reached) {
        AlertState::Critical
    } else if warning.is_some_and(reached) {
        AlertState::Warning
    } else if ok.is_some_and(|ok| !reached(ok)) {
        AlertState::Unknown
    } else {
        AlertState::Ok
    }
}
