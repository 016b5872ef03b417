use tracing::debug;

use super::definition::{Reporting, WebSource};
use super::uri::{effective_host, port_from_uri, resolve_uri_spec, split_authority, url_host, AlertUri};
use super::{positive_duration, AlertState, CheckContext, Evaluation};
use crate::template::FormatArg;
use crate::Result;

const OK_TEXT: &str = "HTTP {0} response in {2:.4f} seconds";
const CRITICAL_TEXT: &str = "Connection failed to {1}";

/// HTTP GET check: 200 is OK, any other response WARNING, no response CRITICAL.
#[derive(Debug, Clone)]
pub struct WebAlert {
    source: WebSource,
}

impl WebAlert {
    pub fn new(source: WebSource) -> Self {
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

    /// URL to request. A resolved value carrying its own scheme is used as is.
    pub fn build_url(&self, alert_uri: &AlertUri, host_name: &str) -> String {
        let lowered = alert_uri.uri.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return alert_uri.uri.clone();
        }

        let scheme = if alert_uri.is_ssl_enabled { "https" } else { "http" };
        let host = effective_host(&alert_uri.uri, host_name);
        let port = port_from_uri(&alert_uri.uri)
            .or(self.source.uri.default_port())
            .unwrap_or(if alert_uri.is_ssl_enabled { 443 } else { 80 });
        let (_, path) = split_authority(&alert_uri.uri);

        format!("{}://{}:{}{}", scheme, url_host(&host), port, path)
    }

    pub(crate) async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Evaluation> {
        let alert_uri = resolve_uri_spec(&self.source.uri, ctx.configurations)?;
        let url = self.build_url(&alert_uri, ctx.host_name);
        let timeout = self
            .source
            .uri
            .connection_timeout()
            .map(positive_duration)
            .transpose()?
            .flatten()
            .unwrap_or_else(|| ctx.timeouts.web());

        let response = ctx.tools.web.get(&url, timeout).await;
        debug!(url = %url, status = response.status_code, error = ?response.error, "web check finished");

        let state = match response.status_code {
            0 => AlertState::Critical,
            200 => AlertState::Ok,
            _ => AlertState::Warning,
        };

        Ok(Evaluation::new(
            state,
            vec![
                response.status_code.into(),
                url.into(),
                FormatArg::Number(response.elapsed.as_secs_f64()),
            ],
        ))
    }
}
