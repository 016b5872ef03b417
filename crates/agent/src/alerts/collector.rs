use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::AlertResult;

/// Latest result per alert uuid, waiting to be reported.
#[derive(Debug, Default)]
pub struct AlertCollector {
    results: RwLock<BTreeMap<String, AlertResult>>,
}

impl AlertCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result`, replacing any earlier result for the same uuid.
    pub async fn put(&self, result: AlertResult) {
        self.results.write().await.insert(result.uuid.clone(), result);
    }

    /// Current results ordered by uuid. Nothing is removed.
    pub async fn alerts(&self) -> Vec<AlertResult> {
        self.results.read().await.values().cloned().collect()
    }

    /// Take every pending result, leaving the collector empty.
    pub async fn drain(&self) -> Vec<AlertResult> {
        let mut results = self.results.write().await;
        std::mem::take(&mut *results).into_values().collect()
    }

    pub async fn remove_by_uuid(&self, uuid: &str) -> Option<AlertResult> {
        self.results.write().await.remove(uuid)
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertState;
    use chrono::Utc;

    fn result(uuid: &str, state: AlertState, text: &str) -> AlertResult {
        AlertResult {
            uuid: uuid.to_string(),
            name: format!("alert-{}", uuid),
            label: String::new(),
            service: "HDFS".to_string(),
            component: "NAMENODE".to_string(),
            cluster: "c1".to_string(),
            host: "c6401.ambari.apache.org".to_string(),
            state,
            text: text.to_string(),
            timestamp: Utc::now(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_put_replaces_by_uuid() {
        let collector = AlertCollector::new();
        collector.put(result("b", AlertState::Ok, "first")).await;
        collector.put(result("a", AlertState::Ok, "other")).await;
        collector.put(result("b", AlertState::Critical, "second")).await;

        let alerts = collector.alerts().await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].uuid, "a");
        assert_eq!(alerts[1].state, AlertState::Critical);
        assert_eq!(alerts[1].text, "second");
    }

    #[tokio::test]
    async fn test_alerts_is_not_destructive_but_drain_is() {
        let collector = AlertCollector::new();
        collector.put(result("a", AlertState::Ok, "ok")).await;

        assert_eq!(collector.alerts().await.len(), 1);
        assert_eq!(collector.len().await, 1);

        let drained = collector.drain().await;
        assert_eq!(drained.len(), 1);
        assert!(collector.is_empty().await);
        assert!(collector.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_uuid() {
        let collector = AlertCollector::new();
        collector.put(result("a", AlertState::Ok, "ok")).await;

        assert!(collector.remove_by_uuid("missing").await.is_none());
        assert_eq!(collector.len().await, 1);

        let removed = collector.remove_by_uuid("a").await.unwrap();
        assert_eq!(removed.uuid, "a");
        assert!(collector.is_empty().await);
    }
}
