use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::AlertState;
use crate::{Error, Result};

fn default_enabled() -> bool {
    true
}

/// Declarative description of one monitoring check, as pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub name: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Minutes between evaluations.
    pub interval: u32,
    #[serde(default)]
    pub scope: AlertScope,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub uuid: String,
    pub source: AlertSource,
}

impl AlertDefinition {
    pub fn from_value(value: &Value) -> Result<Self> {
        let definition: AlertDefinition = serde_json::from_value(value.clone())
            .map_err(|e| Error::Definition(format!("{} ({})", e, describe(value))))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Definition("alert definition has no name".to_string()));
        }
        if self.uuid.trim().is_empty() {
            return Err(Error::Definition(format!("alert definition {} has no uuid", self.name)));
        }
        if self.interval == 0 {
            return Err(Error::Definition(format!(
                "alert definition {} has an interval of 0; intervals must be at least 1",
                self.name
            )));
        }
        if let AlertSource::Script(source) = &self.source {
            if source.path.trim().is_empty() {
                return Err(Error::Definition(format!("script alert {} has no path", self.name)));
            }
        }
        Ok(())
    }
}

/// Best-effort identification of a (possibly malformed) definition for logs.
fn describe(value: &Value) -> String {
    let field = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or("?").to_string();
    format!("name={}, uuid={}", field("name"), field("uuid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertScope {
    #[default]
    Host,
    Service,
    Any,
}

impl From<String> for AlertScope {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "service" => AlertScope::Service,
            "any" => AlertScope::Any,
            _ => AlertScope::Host,
        }
    }
}

impl From<AlertScope> for String {
    fn from(scope: AlertScope) -> Self {
        match scope {
            AlertScope::Host => "HOST",
            AlertScope::Service => "SERVICE",
            AlertScope::Any => "ANY",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum AlertSource {
    Port(PortSource),
    Script(ScriptSource),
    Metric(MetricSource),
    Web(WebSource),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub default_port: Option<u16>,
    #[serde(default)]
    pub reporting: Reporting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub path: String,
    #[serde(default)]
    pub stacks_directory: Option<PathBuf>,
    #[serde(default)]
    pub common_services_directory: Option<PathBuf>,
    #[serde(default)]
    pub host_scripts_directory: Option<PathBuf>,
    #[serde(default)]
    pub parameters: Vec<ScriptParameter>,
    /// Seconds the script may run before it is terminated.
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub reporting: Reporting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptParameter {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSource {
    pub uri: UriSpec,
    #[serde(default)]
    pub jmx: Option<JmxSpec>,
    #[serde(default)]
    pub reporting: Reporting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JmxSpec {
    pub property_list: Vec<String>,
    /// Arithmetic over the extracted values, e.g. `{0} * 100 + 123`.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: UriSpec,
    #[serde(default)]
    pub reporting: Reporting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UriSpec {
    Plain(String),
    Structured(UriStructure),
}

impl UriSpec {
    pub fn default_port(&self) -> Option<u16> {
        match self {
            UriSpec::Plain(_) => None,
            UriSpec::Structured(s) => s.default_port,
        }
    }

    pub fn connection_timeout(&self) -> Option<f64> {
        match self {
            UriSpec::Plain(_) => None,
            UriSpec::Structured(s) => s.connection_timeout,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UriStructure {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
    #[serde(default)]
    pub https_property: Option<String>,
    #[serde(default)]
    pub https_property_value: Option<String>,
    #[serde(default)]
    pub default_port: Option<u16>,
    #[serde(default)]
    pub connection_timeout: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reporting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<ReportingSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<ReportingSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<ReportingSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown: Option<ReportingSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportingSlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Reporting {
    fn slot(&self, state: AlertState) -> Option<&ReportingSlot> {
        match state {
            AlertState::Ok => self.ok.as_ref(),
            AlertState::Warning => self.warning.as_ref(),
            AlertState::Critical => self.critical.as_ref(),
            AlertState::Unknown => self.unknown.as_ref(),
        }
    }

    /// Explicit text for `state`; an empty string counts as explicit.
    pub fn text(&self, state: AlertState) -> Option<&str> {
        self.slot(state).and_then(|slot| slot.text.as_deref())
    }

    pub fn threshold(&self, state: AlertState) -> Option<f64> {
        self.slot(state).and_then(|slot| slot.value)
    }
}
