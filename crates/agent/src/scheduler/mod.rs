//! Named interval jobs on the tokio runtime
//!
//! Each job runs on its own task. A run is awaited before the next tick is
//! taken and missed ticks are skipped, so a job never overlaps itself.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::metrics;

pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Job {
    interval: Duration,
    callable: JobFn,
    handle: Option<JoinHandle<()>>,
}

impl Job {
    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub interval_secs: u64,
}

#[derive(Default)]
struct State {
    running: bool,
    jobs: BTreeMap<String, Job>,
}

#[derive(Default)]
pub struct JobScheduler {
    state: RwLock<State>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callable` to run every `interval`, replacing any job with the
    /// same name. The first run happens one interval after the job starts.
    pub async fn add_interval_job<F, Fut>(&self, name: impl Into<String>, interval: Duration, callable: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let callable: JobFn = Arc::new(move || callable().boxed());
        let interval = interval.max(Duration::from_millis(1));

        let mut state = self.state.write().await;
        if let Some(mut previous) = state.jobs.remove(&name) {
            debug!(job = %name, "replacing job");
            previous.stop();
        }

        let handle = state
            .running
            .then(|| spawn_job(name.clone(), interval, callable.clone()));
        state.jobs.insert(
            name,
            Job {
                interval,
                callable,
                handle,
            },
        );
        metrics::set_scheduled_jobs(state.jobs.len());
    }

    /// Remove a job. Returns false when no job had that name.
    pub async fn unschedule_job(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = match state.jobs.remove(name) {
            Some(mut job) => {
                job.stop();
                true
            }
            None => false,
        };
        metrics::set_scheduled_jobs(state.jobs.len());
        removed
    }

    pub async fn get_jobs(&self) -> Vec<JobInfo> {
        self.state
            .read()
            .await
            .jobs
            .iter()
            .map(|(name, job)| JobInfo {
                name: name.clone(),
                interval_secs: job.interval.as_secs(),
            })
            .collect()
    }

    pub async fn job_names(&self) -> Vec<String> {
        self.state.read().await.jobs.keys().cloned().collect()
    }

    pub async fn job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    /// Start ticking every registered job. Does nothing when already running.
    pub async fn start(&self) {
        let mut state = self.state.write().await;
        if state.running {
            return;
        }
        state.running = true;
        for (name, job) in state.jobs.iter_mut() {
            job.handle = Some(spawn_job(name.clone(), job.interval, job.callable.clone()));
        }
        info!(jobs = state.jobs.len(), "scheduler started");
    }

    /// Stop every job and forget them.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        for job in state.jobs.values_mut() {
            job.stop();
        }
        state.jobs.clear();
        state.running = false;
        metrics::set_scheduled_jobs(0);
        info!("scheduler stopped");
    }
}

fn spawn_job(name: String, interval: Duration, callable: JobFn) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            debug!(job = %name, "running job");
            if AssertUnwindSafe(callable()).catch_unwind().await.is_err() {
                error!(job = %name, "job panicked; it will run again on the next interval");
            }
        }
    })
}
