use crate::job::Job;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence port for scheduled jobs.
///
/// Implementations must make [`JobStore::claim`] atomic: two orchestrators
/// racing on the same due job must not both succeed.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<(), StoreError>;

    async fn find_due(&self, now: i64, lock_lifetime: i64) -> Result<Vec<Job>, StoreError>;

    /// Atomically sets `locked_at = now` iff the job is still due and its
    /// existing lock (if any) is stale. Returns `true` iff the caller won
    /// the claim.
    async fn claim(&self, id: &str, now: i64, lock_lifetime: i64) -> Result<bool, StoreError>;

    async fn find_by_name_and_data(&self, name: &str, data: &serde_json::Value) -> Result<Option<Job>, StoreError>;

    /// Records a completed run. `next_run_at` is `None` to delete a one-shot
    /// job, `Some` to reschedule a repeating one.
    async fn finish(&self, id: &str, ran_at: i64, finished_at: i64, next_run_at: Option<i64>) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;
}
