use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

// One cluster's entry in the definitions document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefinitions {
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(rename = "hostName", default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub configurations: BTreeMap<String, Map<String, JsonValue>>,
    // Kept raw so one malformed definition does not reject the whole cluster
    #[serde(rename = "alertDefinitions", default)]
    pub alert_definitions: Vec<JsonValue>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ClusterDefinitions {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            host_name: None,
            hash: None,
            configurations: BTreeMap::new(),
            alert_definitions: Vec::new(),
            extra: Map::new(),
        }
    }
}

// Request to evaluate one definition right away
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCommand {
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(rename = "hostName", default)]
    pub host_name: Option<String>,
    #[serde(rename = "alertDefinition")]
    pub alert_definition: JsonValue,
}

// Pushed configuration values for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationCommand {
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(default)]
    pub configurations: BTreeMap<String, Map<String, JsonValue>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "clusterName": "c1",
            "hostName": "c6401.ambari.apache.org",
            "hash": "12341234",
            "configurations": { "foo-site": { "bar": "rendered-bar" } },
            "alertDefinitions": [{ "name": "broken" }],
            "serviceVersion": "2.2"
        });

        let parsed: ClusterDefinitions = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.cluster_name, "c1");
        assert_eq!(parsed.alert_definitions.len(), 1);
        assert_eq!(parsed.extra.get("serviceVersion"), Some(&json!("2.2")));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_execution_command_wire_names() {
        let command: ExecutionCommand = serde_json::from_value(json!({
            "clusterName": "c1",
            "hostName": "c6401.ambari.apache.org",
            "alertDefinition": { "name": "x" }
        }))
        .unwrap();
        assert_eq!(command.host_name.as_deref(), Some("c6401.ambari.apache.org"));
        assert_eq!(command.alert_definition["name"], "x");
    }
}
