//! Persistent job scheduling: poll, claim, lock and dispatch named async
//! jobs, with idempotent repeating-job creation and graceful shutdown.

mod in_memory;
mod job;
mod orchestrator;
mod store;

pub use in_memory::InMemoryJobStore;
pub use job::{generate_job_id, Job};
pub use orchestrator::{JobOrchestrator, JobProcessor, ProcessError, SchedulerError};
pub use store::{JobStore, StoreError};
