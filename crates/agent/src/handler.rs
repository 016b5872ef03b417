//! Scheduling of alert definitions
//!
//! The handler owns the job scheduler, the per-cluster configuration maps and
//! the shared collector. Definitions come from the [`Store`]; every enabled
//! definition becomes one interval job named by its uuid.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::alerts::definition::{AlertDefinition, AlertSource};
use crate::alerts::{flatten_configurations, Alert, AlertCollector, ConfigurationMap};
use crate::config::{AlertsConfig, Config};
use crate::context::{AlertContext, HostContext};
use crate::scheduler::{JobInfo, JobScheduler};
use crate::store::{ClusterDefinitions, ConfigurationCommand, ExecutionCommand, Store};
use crate::tools::Toolbox;
use crate::Result;

pub struct AlertSchedulerHandler {
    settings: AlertsConfig,
    store: Arc<dyn Store>,
    scheduler: JobScheduler,
    context: AlertContext,
    clusters: RwLock<HashMap<String, ConfigurationMap>>,
    scheduled: RwLock<HashMap<String, Alert>>,
    // held for every read-modify-write of the definitions document
    document_lock: Mutex<()>,
}

impl AlertSchedulerHandler {
    pub fn new(settings: &Config, store: Arc<dyn Store>, tools: Toolbox, host: Arc<HostContext>) -> Self {
        let context = AlertContext::new(
            Arc::new(AlertCollector::new()),
            tools,
            host,
            settings.timeouts.clone(),
        );

        Self {
            settings: settings.alerts.clone(),
            store,
            scheduler: JobScheduler::new(),
            context,
            clusters: RwLock::new(HashMap::new()),
            scheduled: RwLock::new(HashMap::new()),
            document_lock: Mutex::new(()),
        }
    }

    pub fn collector(&self) -> Arc<AlertCollector> {
        self.context.collector.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// Load definitions, schedule them and start ticking. A running scheduler
    /// is shut down and rebuilt.
    pub async fn start(&self) {
        if self.scheduler.is_running().await {
            info!("alert scheduler already running; restarting");
            self.stop().await;
        }

        for alert in self.load_alerts().await {
            self.schedule_definition(alert).await;
        }

        self.scheduler.start().await;
        let jobs = self.get_job_count().await;
        info!(jobs, "alert scheduler started");
    }

    pub async fn stop(&self) {
        self.scheduler.shutdown().await;
        self.scheduled.write().await.clear();
    }

    /// Add (or replace) the job for `alert`. Disabled alerts are not scheduled.
    pub async fn schedule_definition(&self, alert: Alert) {
        if !alert.is_enabled() {
            info!(alert = %alert.name(), uuid = %alert.uuid(), "alert is disabled and will not be scheduled");
            return;
        }

        let interval = self.interval_for(&alert);
        let uuid = alert.uuid().to_string();
        debug!(alert = %alert.name(), uuid = %uuid, interval = ?interval, "scheduling alert");

        let job = alert.clone();
        self.scheduler
            .add_interval_job(uuid.clone(), interval, move || {
                let alert = job.clone();
                async move { alert.collect().await }
            })
            .await;
        self.scheduled.write().await.insert(uuid, alert);
    }

    /// Bring the jobs in line with the stored definitions.
    ///
    /// Jobs for definitions that are gone or disabled are removed along with
    /// their pending results; new definitions are scheduled and changed ones
    /// replaced. Unchanged jobs keep running undisturbed.
    pub async fn reschedule(&self) {
        let mut wanted: HashMap<String, Alert> = HashMap::new();
        for alert in self.load_alerts().await {
            if alert.is_enabled() {
                wanted.insert(alert.uuid().to_string(), alert);
            }
        }

        let current = self.scheduled.read().await.clone();

        let mut removed = 0;
        for uuid in current.keys() {
            if !wanted.contains_key(uuid) {
                self.scheduler.unschedule_job(uuid).await;
                self.scheduled.write().await.remove(uuid);
                self.context.collector.remove_by_uuid(uuid).await;
                removed += 1;
            }
        }

        let mut added = 0;
        let mut replaced = 0;
        for (uuid, alert) in wanted {
            match current.get(&uuid) {
                None => {
                    self.schedule_definition(alert).await;
                    added += 1;
                }
                Some(existing)
                    if existing.definition() != alert.definition()
                        || existing.cluster_name() != alert.cluster_name() =>
                {
                    self.schedule_definition(alert).await;
                    replaced += 1;
                }
                Some(_) => {}
            }
        }

        let jobs = self.get_job_count().await;
        info!(added, removed, replaced, jobs, "rescheduled alerts");
    }

    /// Drop every job and schedule all stored definitions again.
    pub async fn reschedule_all(&self) {
        for name in self.scheduler.job_names().await {
            self.scheduler.unschedule_job(&name).await;
        }
        self.scheduled.write().await.clear();

        for alert in self.load_alerts().await {
            self.schedule_definition(alert).await;
        }
        let jobs = self.get_job_count().await;
        info!(jobs, "rescheduled all alerts");
    }

    /// Evaluate definitions right away. Entries that cannot be parsed are
    /// skipped. Returns how many alerts ran.
    pub async fn execute_alert(&self, commands: Vec<Value>) -> usize {
        let mut executed = 0;

        for raw in commands {
            let command: ExecutionCommand = match serde_json::from_value(raw) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "skipping malformed alert execution command");
                    continue;
                }
            };

            let configurations = self
                .clusters
                .read()
                .await
                .get(&command.cluster_name)
                .cloned()
                .unwrap_or_default();

            let alert = match self.build_alert(
                &command.alert_definition,
                configurations,
                &command.cluster_name,
                command.host_name.clone(),
            ) {
                Ok(alert) => alert,
                Err(e) => {
                    warn!(cluster = %command.cluster_name, error = %e, "unable to execute alert");
                    continue;
                }
            };

            info!(alert = %alert.name(), uuid = %alert.uuid(), "executing alert on demand");
            alert.collect().await;
            executed += 1;
        }

        executed
    }

    /// Evaluate every enabled stored definition once, without scheduling.
    pub async fn collect_all(&self) -> usize {
        let alerts: Vec<Alert> = self
            .load_alerts()
            .await
            .into_iter()
            .filter(|alert| alert.is_enabled())
            .collect();

        for alert in &alerts {
            alert.collect().await;
        }
        alerts.len()
    }

    /// Persist a new definitions document and optionally apply it.
    pub async fn update_definitions(&self, document: Vec<ClusterDefinitions>, reschedule: bool) -> Result<()> {
        {
            let _document = self.document_lock.lock().await;
            self.store.save(&document).await?;
        }
        if reschedule {
            self.reschedule().await;
        }
        Ok(())
    }

    /// Apply pushed configuration values to known clusters and known keys.
    ///
    /// Changed values are written to the document first and only then applied
    /// to the live maps, so a failed write leaves nothing half-applied and the
    /// same push can be retried. Returns whether anything changed.
    pub async fn update_configurations(&self, commands: Vec<ConfigurationCommand>) -> Result<bool> {
        let _document = self.document_lock.lock().await;
        let clusters = self.clusters.read().await.clone();
        let mut pending: Vec<(&ConfigurationCommand, ConfigurationMap, HashMap<String, String>)> = Vec::new();

        for command in &commands {
            let Some(map) = clusters.get(&command.cluster_name) else {
                debug!(cluster = %command.cluster_name, "ignoring configurations for unknown cluster");
                continue;
            };

            let current = map.snapshot().await;
            let changed: HashMap<String, String> = flatten_configurations(&command.configurations)
                .into_iter()
                .filter(|(key, value)| current.get(key).is_some_and(|existing| existing != value))
                .collect();

            if !changed.is_empty() {
                info!(cluster = %command.cluster_name, keys = changed.len(), "configurations changed");
                pending.push((command, map.clone(), changed));
            }
        }

        if pending.is_empty() {
            return Ok(false);
        }

        let mut document = self.store.load().await?;
        for (command, _, changed) in &pending {
            let Some(entry) = document
                .iter_mut()
                .find(|cluster| cluster.cluster_name == command.cluster_name)
            else {
                continue;
            };

            for (config_type, properties) in &command.configurations {
                for (key, value) in properties {
                    if changed.contains_key(&format!("{}/{}", config_type, key)) {
                        entry
                            .configurations
                            .entry(config_type.clone())
                            .or_default()
                            .insert(key.clone(), value.clone());
                    }
                }
            }
        }

        self.store.save(&document).await?;

        for (_, map, changed) in &pending {
            map.update_known(changed).await;
        }
        self.reschedule_all().await;
        Ok(true)
    }

    pub async fn get_job_count(&self) -> usize {
        self.scheduler.job_count().await
    }

    pub async fn jobs(&self) -> Vec<JobInfo> {
        self.scheduler.get_jobs().await
    }

    pub async fn configurations(&self, cluster_name: &str) -> Option<ConfigurationMap> {
        self.clusters.read().await.get(cluster_name).cloned()
    }

    fn interval_for(&self, alert: &Alert) -> Duration {
        let interval = u64::from(alert.interval());
        if self.settings.interval_in_minutes {
            Duration::from_secs(interval * 60)
        } else {
            Duration::from_secs(interval)
        }
    }

    /// Read the definitions document into alerts. Never fails: an unreadable
    /// document yields no alerts and a bad definition is skipped.
    async fn load_alerts(&self) -> Vec<Alert> {
        let document = match self.store.load().await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "unable to load alert definitions; no alerts will be scheduled");
                return Vec::new();
            }
        };

        let mut clusters = self.clusters.write().await;
        let mut refreshed = HashMap::new();
        let mut alerts = Vec::new();

        for cluster in document {
            let flat = flatten_configurations(&cluster.configurations);
            let map = match clusters.remove(&cluster.cluster_name) {
                Some(map) => {
                    map.replace(flat).await;
                    map
                }
                None => ConfigurationMap::new(flat),
            };

            for raw in &cluster.alert_definitions {
                match self.build_alert(raw, map.clone(), &cluster.cluster_name, cluster.host_name.clone()) {
                    Ok(alert) => alerts.push(alert),
                    Err(e) => warn!(cluster = %cluster.cluster_name, error = %e, "skipping alert definition"),
                }
            }

            refreshed.insert(cluster.cluster_name, map);
        }

        *clusters = refreshed;
        alerts
    }

    fn build_alert(
        &self,
        raw: &Value,
        configurations: ConfigurationMap,
        cluster_name: &str,
        host_name: Option<String>,
    ) -> Result<Alert> {
        let mut definition = AlertDefinition::from_value(raw)?;

        if let AlertSource::Script(source) = &mut definition.source {
            source
                .stacks_directory
                .get_or_insert_with(|| self.settings.stacks_dir.clone());
            source
                .common_services_directory
                .get_or_insert_with(|| self.settings.common_services_dir.clone());
            source
                .host_scripts_directory
                .get_or_insert_with(|| self.settings.host_scripts_dir.clone());
        }

        Ok(Alert::new(definition, configurations, self.context.clone()).with_cluster(cluster_name, host_name))
    }
}
