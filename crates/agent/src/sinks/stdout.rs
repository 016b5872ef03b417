use async_trait::async_trait;
use serde_json::json;

use super::ResultSink;
use crate::alerts::AlertResult;
use crate::config::{HeartbeatConfig, SinkFormat};
use crate::Result;

#[derive(Debug)]
pub struct StdoutSink {
    name: String,
    format: SinkFormat,
    pretty: bool, // For JSON output
}

impl StdoutSink {
    pub fn new(name: impl Into<String>, format: SinkFormat, pretty: bool) -> Self {
        Self {
            name: name.into(),
            format,
            pretty,
        }
    }

    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self::new("stdout", config.format, config.pretty)
    }

    /// The heartbeat body for `results`.
    pub fn render(&self, results: &[AlertResult]) -> Result<String> {
        match self.format {
            SinkFormat::Json => {
                let body = json!({ "alerts": results });
                if self.pretty {
                    Ok(serde_json::to_string_pretty(&body)?)
                } else {
                    Ok(serde_json::to_string(&body)?)
                }
            }
            SinkFormat::Text => Ok(results
                .iter()
                .map(|r| {
                    format!(
                        "[{}] {}/{}/{} {} on {}: {}",
                        r.state, r.cluster, r.service, r.component, r.name, r.host, r.text
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

#[async_trait]
impl ResultSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, results: &[AlertResult]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        println!("{}", self.render(results)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertState;
    use chrono::Utc;
    use serde_json::Value;

    fn result() -> AlertResult {
        AlertResult {
            uuid: "c1f73191".to_string(),
            name: "namenode_process".to_string(),
            label: "NameNode process".to_string(),
            service: "HDFS".to_string(),
            component: "NAMENODE".to_string(),
            cluster: "c1".to_string(),
            host: "c6401.ambari.apache.org".to_string(),
            state: AlertState::Critical,
            text: "Connection failed: refused to c6401:8020".to_string(),
            timestamp: Utc::now(),
            enabled: true,
        }
    }

    #[test]
    fn test_json_body_wraps_alerts() {
        let sink = StdoutSink::new("test_sink", SinkFormat::Json, false);
        let rendered = sink.render(&[result()]).unwrap();
        let body: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(body["alerts"][0]["state"], "CRITICAL");
        assert_eq!(body["alerts"][0]["clusterName"], "c1");
        assert!(!rendered.contains('\n'));

        let pretty = StdoutSink::new("test_sink", SinkFormat::Json, true);
        assert!(pretty.render(&[result()]).unwrap().contains('\n'));
    }

    #[test]
    fn test_text_line_per_result() {
        let sink = StdoutSink::new("test_sink", SinkFormat::Text, false);
        let rendered = sink.render(&[result(), result()]).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "[CRITICAL] c1/HDFS/NAMENODE namenode_process on c6401.ambari.apache.org: Connection failed: refused to c6401:8020"
        );
    }

    #[tokio::test]
    async fn test_send_accepts_empty_batches() {
        let sink = StdoutSink::from_config(&HeartbeatConfig::default());
        assert_eq!(sink.name(), "stdout");
        assert!(sink.send(&[]).await.is_ok());
        assert!(sink.send(&[result()]).await.is_ok());
    }
}
