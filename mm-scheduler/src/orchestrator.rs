use crate::job::Job;
use crate::store::{JobStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("job processor failed: {0}")]
    Failed(String),
}

/// A named async unit of work a [`JobOrchestrator`] dispatches claimed jobs to.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &Job) -> Result<(), ProcessError>;
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no processor registered for job name {0:?}")]
    UnknownProcessor(String),
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Polls a [`JobStore`] for due jobs, claims them, and dispatches to the
/// matching [`JobProcessor`] by job name. Grounded on `src/engine/commander.rs`'s
/// terminate-on-signal shape, generalized from a single `Commander` struct to
/// a polling dispatch loop.
pub struct JobOrchestrator<S: JobStore> {
    store: Arc<S>,
    processors: HashMap<String, Arc<dyn JobProcessor>>,
    poll_interval: Duration,
    lock_lifetime_ms: i64,
}

impl<S: JobStore> JobOrchestrator<S> {
    /// `lock_lifetime` defaults to 10 hours.
    pub fn new(store: Arc<S>, poll_interval: Duration) -> Self {
        Self {
            store,
            processors: HashMap::new(),
            poll_interval,
            lock_lifetime_ms: 10 * 3_600_000,
        }
    }

    pub fn with_lock_lifetime(mut self, lock_lifetime: Duration) -> Self {
        self.lock_lifetime_ms = lock_lifetime.as_millis() as i64;
        self
    }

    pub fn register(&mut self, name: impl Into<String>, processor: Arc<dyn JobProcessor>) {
        self.processors.insert(name.into(), processor);
    }

    /// Creates a repeating job unless a job with the same name and
    /// deep-equal data already exists.
    pub async fn create_repeating_job(
        &self,
        name: &str,
        data: serde_json::Value,
        repeat_interval: Duration,
        first_run_at: i64,
    ) -> Result<(), SchedulerError> {
        if self.store.find_by_name_and_data(name, &data).await?.is_some() {
            return Ok(());
        }
        let job = Job::repeating(name, data, first_run_at, repeat_interval.as_millis() as i64);
        self.store.insert(job).await?;
        Ok(())
    }

    /// Runs one poll cycle: claim every due job and dispatch it to its
    /// processor. Returns the number of jobs dispatched.
    pub async fn poll_once(&self) -> Result<usize, SchedulerError> {
        let now = now_ms();
        let due = self.store.find_due(now, self.lock_lifetime_ms).await?;
        let mut dispatched = 0;
        for job in due {
            if !self.store.claim(&job.id, now, self.lock_lifetime_ms).await? {
                continue;
            }
            self.dispatch(job, now).await;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    async fn dispatch(&self, job: Job, ran_at: i64) {
        let Some(processor) = self.processors.get(&job.name).cloned() else {
            warn!(job = %job.name, "no processor registered, leaving job locked for operator inspection");
            return;
        };

        let result = processor.process(&job).await;
        let finished_at = now_ms();
        if let Err(err) = &result {
            error!(job = %job.name, id = %job.id, error = %err, "job processor failed");
        }

        let next_run_at = job.repeat_interval.map(|interval| ran_at + interval);
        if let Err(err) = self.store.finish(&job.id, ran_at, finished_at, next_run_at).await {
            error!(job = %job.name, id = %job.id, error = %err, "failed to record job completion");
        }
    }

    /// Polls forever at `poll_interval` until SIGTERM/SIGINT or ctrl-c is
    /// received, then returns.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "job orchestrator started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(n) => info!(dispatched = n, "poll cycle dispatched jobs"),
                        Err(err) => error!(error = %err, "poll cycle failed"),
                    }
                }
                _ = shutdown_signal() => {
                    info!("shutdown signal received, orchestrator stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryJobStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor(Arc<AtomicUsize>);

    #[async_trait]
    impl JobProcessor for CountingProcessor {
        async fn process(&self, _job: &Job) -> Result<(), ProcessError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn poll_once_dispatches_due_jobs_and_reschedules_repeating_ones() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut orchestrator = JobOrchestrator::new(store.clone(), Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));
        orchestrator.register("sync_exchange", Arc::new(CountingProcessor(runs.clone())));

        store.insert(Job::repeating("sync_exchange", json!(null), 0, 60_000)).await.unwrap();

        let dispatched = orchestrator.poll_once().await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_processor_leaves_job_locked_instead_of_panicking() {
        let store = Arc::new(InMemoryJobStore::new());
        let orchestrator = JobOrchestrator::new(store.clone(), Duration::from_secs(1));
        store.insert(Job::new("unhandled", json!(null), 0)).await.unwrap();

        let dispatched = orchestrator.poll_once().await.unwrap();
        assert_eq!(dispatched, 1);
    }

    #[tokio::test]
    async fn create_repeating_job_is_idempotent_by_name_and_data() {
        let store = Arc::new(InMemoryJobStore::new());
        let orchestrator = JobOrchestrator::new(store.clone(), Duration::from_secs(1));

        orchestrator
            .create_repeating_job("sync_exchange", json!({"market": "BTC/USDT"}), Duration::from_secs(60), 0)
            .await
            .unwrap();
        orchestrator
            .create_repeating_job("sync_exchange", json!({"market": "BTC/USDT"}), Duration::from_secs(60), 0)
            .await
            .unwrap();

        let due = store.find_due(0, 10 * 3_600_000).await.unwrap();
        assert_eq!(due.len(), 1);
    }
}
