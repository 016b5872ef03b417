use std::collections::HashMap;
use tracing::debug;

use super::definition::{PortSource, Reporting};
use super::uri::{effective_host, port_from_uri, select_candidate};
use super::{positive_duration, AlertState, CheckContext, Evaluation};
use crate::template::{resolve_placeholders, FormatArg};
use crate::{Error, Result};

const OK_TEXT: &str = "TCP OK - {0:.4f} response on port {1}";
const CRITICAL_TEXT: &str = "Connection failed: {0} to {1}:{2}";

/// TCP reachability check with response time thresholds in seconds.
#[derive(Debug, Clone)]
pub struct PortAlert {
    source: PortSource,
}

impl PortAlert {
    pub fn new(source: PortSource) -> Self {
        Self { source }
    }

    pub fn reporting(&self) -> &Reporting {
        &self.source.reporting
    }

    pub fn default_reporting_text(state: AlertState) -> &'static str {
        match state {
            AlertState::Ok | AlertState::Warning => OK_TEXT,
            AlertState::Critical | AlertState::Unknown => CRITICAL_TEXT,
        }
    }

    /// Host and port to probe.
    pub fn target(&self, configurations: &HashMap<String, String>, host_name: &str) -> Result<(String, u16)> {
        let uri = match &self.source.uri {
            Some(uri) => resolve_placeholders(uri, configurations).ok_or_else(|| {
                Error::UnresolvedUri(format!(
                    "Unable to resolve {} from the current configurations",
                    uri
                ))
            })?,
            None => host_name.to_string(),
        };

        let candidate = select_candidate(&uri, host_name);
        let host = effective_host(candidate, host_name);
        let port = port_from_uri(candidate)
            .or(self.source.default_port)
            .ok_or_else(|| {
                Error::Definition(format!(
                    "no port in '{}' and no default_port is defined",
                    candidate
                ))
            })?;

        Ok((host, port))
    }

    pub(crate) async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Evaluation> {
        let (host, port) = self.target(ctx.configurations, ctx.host_name)?;

        let warning = self.source.reporting.threshold(AlertState::Warning);
        let critical = self.source.reporting.threshold(AlertState::Critical);
        let timeout = critical
            .map(positive_duration)
            .transpose()?
            .flatten()
            .unwrap_or_else(|| ctx.timeouts.connect());

        debug!(host = %host, port, timeout = ?timeout, "probing port");

        let elapsed = match ctx.tools.connector.connect(&host, port, timeout).await {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(e) => {
                return Ok(Evaluation::new(
                    AlertState::Critical,
                    vec![e.to_string().into(), host.into(), port.into()],
                ));
            }
        };

        if critical.is_some_and(|c| elapsed >= c) {
            return Ok(Evaluation::new(
                AlertState::Critical,
                vec!["Socket Timeout".into(), host.into(), port.into()],
            ));
        }

        let state = if warning.is_some_and(|w| elapsed >= w) {
            AlertState::Warning
        } else {
            AlertState::Ok
        };
        Ok(Evaluation::new(state, vec![FormatArg::Number(elapsed), port.into()]))
    }
}
