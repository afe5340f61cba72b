use rand::Rng;
use serde_json::Value;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A 16-char lowercase-alphanumeric job id.
pub fn generate_job_id() -> String {
    let mut rng = rand::rng();
    (0..16)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// A persistent unit of scheduled work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub data: Value,
    pub next_run_at: i64,
    /// Milliseconds between runs, `None` for a one-shot job.
    pub repeat_interval: Option<i64>,
    pub locked_at: Option<i64>,
    pub last_run_at: Option<i64>,
    pub last_finished_at: Option<i64>,
    pub priority: i32,
}

impl Job {
    pub fn new(name: impl Into<String>, data: Value, next_run_at: i64) -> Self {
        Self {
            id: generate_job_id(),
            name: name.into(),
            data,
            next_run_at,
            repeat_interval: None,
            locked_at: None,
            last_run_at: None,
            last_finished_at: None,
            priority: 0,
        }
    }

    pub fn repeating(name: impl Into<String>, data: Value, next_run_at: i64, repeat_interval: i64) -> Self {
        let mut job = Self::new(name, data, next_run_at);
        job.repeat_interval = Some(repeat_interval);
        job
    }

    /// A lock is stale once older than `lock_lifetime` ms, and therefore
    /// reclaimable by another poll cycle.
    pub fn lock_is_stale(&self, now: i64, lock_lifetime: i64) -> bool {
        match self.locked_at {
            None => true,
            Some(locked_at) => now - locked_at >= lock_lifetime,
        }
    }

    pub fn is_due(&self, now: i64, lock_lifetime: i64) -> bool {
        self.next_run_at <= now && self.lock_is_stale(now, lock_lifetime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_is_not_stale() {
        let mut job = Job::new("sync", Value::Null, 0);
        job.locked_at = Some(1_000);
        assert!(!job.lock_is_stale(1_500, 10_000));
        assert!(job.lock_is_stale(20_000, 10_000));
    }

    #[test]
    fn unlocked_job_is_always_reclaimable() {
        let job = Job::new("sync", Value::Null, 0);
        assert!(job.lock_is_stale(0, 10_000));
    }
}
