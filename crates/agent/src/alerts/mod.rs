//! Alert model and evaluation
//!
//! An [`Alert`] pairs a parsed definition with the cluster configuration it
//! reads and the shared [`AlertContext`]. Each collection run evaluates the
//! check, renders the reporting text for the resulting state and stores the
//! result in the [`AlertCollector`].

pub mod collector;
pub mod definition;
pub mod expression;
pub mod metric;
pub mod port;
pub mod script;
pub mod uri;
pub mod web;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::TimeoutConfig;
use crate::context::AlertContext;
use crate::template::{format_reporting_text, FormatArg};
use crate::tools::Toolbox;
use crate::{metrics, Error, Result};

pub use collector::AlertCollector;
pub use definition::{AlertDefinition, AlertSource, Reporting};
pub use metric::MetricAlert;
pub use port::PortAlert;
pub use script::ScriptAlert;
pub use web::WebAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Ok => "OK",
            AlertState::Warning => "WARNING",
            AlertState::Critical => "CRITICAL",
            AlertState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(AlertState::Ok),
            "WARNING" => Ok(AlertState::Warning),
            "CRITICAL" => Ok(AlertState::Critical),
            "UNKNOWN" => Ok(AlertState::Unknown),
            other => Err(Error::Definition(format!("'{}' is not an alert state", other))),
        }
    }
}

/// One evaluated alert, as reported to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResult {
    pub uuid: String,
    pub name: String,
    pub label: String,
    pub service: String,
    pub component: String,
    #[serde(rename = "clusterName")]
    pub cluster: String,
    #[serde(rename = "hostName")]
    pub host: String,
    pub state: AlertState,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub enabled: bool,
}

/// Flat `type/key -> value` view of one cluster's configurations.
///
/// Clones share the same map, so a configuration update is seen by every alert
/// of the cluster on its next run.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationMap {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl ConfigurationMap {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().await.clone()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }

    pub async fn replace(&self, values: HashMap<String, String>) {
        *self.values.write().await = values;
    }

    /// Overwrite keys that are already known. Returns whether anything changed.
    pub async fn update_known(&self, values: &HashMap<String, String>) -> bool {
        let mut current = self.values.write().await;
        let mut changed = false;
        for (key, value) in values {
            if let Some(existing) = current.get_mut(key) {
                if existing != value {
                    *existing = value.clone();
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Flatten `{type: {key: value}}` configurations into `type/key` entries.
pub fn flatten_configurations(configurations: &BTreeMap<String, Map<String, Value>>) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    for (config_type, properties) in configurations {
        for (key, value) in properties {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            flat.insert(format!("{}/{}", config_type, key), value);
        }
    }
    flat
}

/// Seconds from a definition as a timeout. Zero, negative and non-finite
/// values are treated as unset; values a `Duration` cannot hold are rejected.
pub(crate) fn positive_duration(seconds: f64) -> Result<Option<Duration>> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| Error::Definition(format!("timeout of {} seconds is out of range", seconds)))
}

/// State and positional arguments produced by one check.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: AlertState,
    pub args: Vec<FormatArg>,
}

impl Evaluation {
    pub fn new(state: AlertState, args: Vec<FormatArg>) -> Self {
        Self { state, args }
    }
}

/// Inputs for one evaluation run.
pub struct CheckContext<'a> {
    pub configurations: &'a HashMap<String, String>,
    pub host_name: &'a str,
    pub tools: &'a Toolbox,
    pub timeouts: &'a TimeoutConfig,
}

#[derive(Debug, Clone)]
pub enum AlertKind {
    Port(PortAlert),
    Script(ScriptAlert),
    Metric(MetricAlert),
    Web(WebAlert),
}

impl AlertKind {
    pub fn from_source(source: &AlertSource) -> Self {
        match source {
            AlertSource::Port(s) => AlertKind::Port(PortAlert::new(s.clone())),
            AlertSource::Script(s) => AlertKind::Script(ScriptAlert::new(s.clone())),
            AlertSource::Metric(s) => AlertKind::Metric(MetricAlert::new(s.clone())),
            AlertSource::Web(s) => AlertKind::Web(WebAlert::new(s.clone())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Port(_) => "PORT",
            AlertKind::Script(_) => "SCRIPT",
            AlertKind::Metric(_) => "METRIC",
            AlertKind::Web(_) => "WEB",
        }
    }

    pub fn reporting(&self) -> &Reporting {
        match self {
            AlertKind::Port(a) => a.reporting(),
            AlertKind::Script(a) => a.reporting(),
            AlertKind::Metric(a) => a.reporting(),
            AlertKind::Web(a) => a.reporting(),
        }
    }

    pub fn default_reporting_text(&self, state: AlertState) -> &'static str {
        match self {
            AlertKind::Port(_) => PortAlert::default_reporting_text(state),
            AlertKind::Script(_) => ScriptAlert::default_reporting_text(state),
            AlertKind::Metric(_) => MetricAlert::default_reporting_text(state),
            AlertKind::Web(_) => WebAlert::default_reporting_text(state),
        }
    }

    /// `Ok(None)` means the check asked to be skipped this run.
    async fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<Evaluation>> {
        match self {
            AlertKind::Port(a) => a.evaluate(ctx).await.map(Some),
            AlertKind::Script(a) => a.evaluate(ctx).await,
            AlertKind::Metric(a) => a.evaluate(ctx).await.map(Some),
            AlertKind::Web(a) => a.evaluate(ctx).await.map(Some),
        }
    }
}

/// A schedulable check bound to one cluster.
#[derive(Clone)]
pub struct Alert {
    definition: AlertDefinition,
    kind: AlertKind,
    cluster_name: String,
    host_name: Option<String>,
    configurations: ConfigurationMap,
    context: AlertContext,
}

impl fmt::Debug for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alert")
            .field("uuid", &self.definition.uuid)
            .field("name", &self.definition.name)
            .field("kind", &self.kind.as_str())
            .field("cluster_name", &self.cluster_name)
            .finish()
    }
}

impl Alert {
    pub fn new(definition: AlertDefinition, configurations: ConfigurationMap, context: AlertContext) -> Self {
        let kind = AlertKind::from_source(&definition.source);
        Self {
            definition,
            kind,
            cluster_name: String::new(),
            host_name: None,
            configurations,
            context,
        }
    }

    pub fn from_value(value: &Value, configurations: ConfigurationMap, context: AlertContext) -> Result<Self> {
        let definition = AlertDefinition::from_value(value)?;
        Ok(Self::new(definition, configurations, context))
    }

    /// Bind the alert to a cluster and, optionally, a fixed host name.
    pub fn with_cluster(mut self, cluster_name: impl Into<String>, host_name: Option<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self.host_name = host_name.filter(|h| !h.is_empty());
        self
    }

    pub fn definition(&self) -> &AlertDefinition {
        &self.definition
    }

    pub fn kind(&self) -> &AlertKind {
        &self.kind
    }

    pub fn uuid(&self) -> &str {
        &self.definition.uuid
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    /// Minutes between runs.
    pub fn interval(&self) -> u32 {
        self.definition.interval.max(1)
    }

    pub fn host_name(&self) -> String {
        self.host_name
            .clone()
            .unwrap_or_else(|| self.context.host.hostname())
    }

    /// Template used to report `state`: the definition's text when present,
    /// otherwise the default for this kind of alert.
    pub fn reporting_text(&self, state: AlertState) -> &str {
        match self.kind.reporting().text(state) {
            Some(text) => text,
            None if state == AlertState::Unknown => "{0}",
            None => self.kind.default_reporting_text(state),
        }
    }

    /// Evaluate the check once and store the result in the collector.
    pub async fn collect(&self) {
        let configurations = self.configurations.snapshot().await;
        let host_name = self.host_name();
        let ctx = CheckContext {
            configurations: &configurations,
            host_name: &host_name,
            tools: &self.context.tools,
            timeouts: &self.context.timeouts,
        };

        let started = Instant::now();
        let outcome = self.kind.evaluate(&ctx).await;
        metrics::observe_check(self.kind.as_str(), started.elapsed().as_secs_f64());

        let (state, text) = match outcome {
            Ok(Some(evaluation)) => self.render(evaluation),
            Ok(None) => {
                debug!(alert = %self.name(), uuid = %self.uuid(), "alert skipped this run");
                metrics::record_skipped();
                return;
            }
            Err(e) => {
                warn!(alert = %self.name(), uuid = %self.uuid(), error = %e, "unable to run alert");
                metrics::record_failure(self.kind.as_str());
                (AlertState::Unknown, self.unknown_text(&e.to_string()))
            }
        };

        debug!(alert = %self.name(), state = %state, text = %text, "alert collected");
        metrics::record_result(state);

        let result = AlertResult {
            uuid: self.definition.uuid.clone(),
            name: self.definition.name.clone(),
            label: self.definition.label.clone(),
            service: self.definition.service.clone(),
            component: self.definition.component.clone(),
            cluster: self.cluster_name.clone(),
            host: host_name,
            state,
            text,
            timestamp: Utc::now(),
            enabled: self.definition.enabled,
        };
        self.context.collector.put(result).await;
    }

    fn render(&self, evaluation: Evaluation) -> (AlertState, String) {
        match format_reporting_text(self.reporting_text(evaluation.state), &evaluation.args) {
            Ok(text) => (evaluation.state, text),
            Err(e) => {
                warn!(alert = %self.name(), error = %e, "reporting text could not be rendered");
                (
                    AlertState::Unknown,
                    self.unknown_text(&format!("There is a problem with the alert definition: {}", e)),
                )
            }
        }
    }

    fn unknown_text(&self, message: &str) -> String {
        format_reporting_text(self.reporting_text(AlertState::Unknown), &[FormatArg::from(message)])
            .unwrap_or_else(|_| message.to_string())
    }
}
