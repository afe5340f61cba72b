use crate::job::Job;
use crate::store::{JobStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory [`JobStore`] for tests and single-process deployments.
/// **Do not use across restarts - nothing here survives a process exit.**
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.lock().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn find_due(&self, now: i64, lock_lifetime: i64) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut due: Vec<Job> = jobs.values().filter(|job| job.is_due(now, lock_lifetime)).cloned().collect();
        due.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.next_run_at.cmp(&b.next_run_at)));
        Ok(due)
    }

    async fn claim(&self, id: &str, now: i64, lock_lifetime: i64) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(id) {
            None => Err(StoreError::NotFound(id.to_string())),
            Some(job) => {
                if !job.is_due(now, lock_lifetime) {
                    return Ok(false);
                }
                job.locked_at = Some(now);
                Ok(true)
            }
        }
    }

    async fn find_by_name_and_data(&self, name: &str, data: &serde_json::Value) -> Result<Option<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.values().find(|job| job.name == name && &job.data == data).cloned())
    }

    async fn finish(&self, id: &str, ran_at: i64, finished_at: i64, next_run_at: Option<i64>) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        match next_run_at {
            None => {
                jobs.remove(id);
                Ok(())
            }
            Some(next) => match jobs.get_mut(id) {
                None => Err(StoreError::NotFound(id.to_string())),
                Some(job) => {
                    job.last_run_at = Some(ran_at);
                    job.last_finished_at = Some(finished_at);
                    job.next_run_at = next;
                    job.locked_at = None;
                    Ok(())
                }
            },
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn claim_is_exclusive() {
        let store = InMemoryJobStore::new();
        let job = Job::new("sync_exchange", json!({"market": "BTC/USDT"}), 0);
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        assert!(store.claim(&id, 100, 10_000).await.unwrap());
        assert!(!store.claim(&id, 200, 10_000).await.unwrap());
    }

    #[tokio::test]
    async fn find_by_name_and_data_matches_deep_equal() {
        let store = InMemoryJobStore::new();
        store
            .insert(Job::new("sync_exchange", json!({"market": "BTC/USDT"}), 0))
            .await
            .unwrap();

        let found = store
            .find_by_name_and_data("sync_exchange", &json!({"market": "BTC/USDT"}))
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = store
            .find_by_name_and_data("sync_exchange", &json!({"market": "ETH/USDT"}))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn finish_without_next_run_deletes_job() {
        let store = InMemoryJobStore::new();
        let job = Job::new("one_shot", json!(null), 0);
        let id = job.id.clone();
        store.insert(job).await.unwrap();
        store.finish(&id, 0, 1, None).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
