//! Live registry of running jobs, keyed by worker pid
//!
//! The registry is the only state shared across concurrently supervised jobs.
//! Each entry has a single writer (the supervisor that inserted it) and any
//! number of readers (status surfaces). Entries exist exactly for the span of
//! the job's Running state: inserted right after spawn, removed the moment a
//! terminal state is reached, on every path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::{Profile, TilingJob};

/// Snapshot of one running job, inspectable while the worker lives.
#[derive(Debug, Clone, Serialize)]
pub struct JobEntry {
    pub job_id: String,
    pub input: PathBuf,
    pub profile: Profile,
    pub alpha: String,
    pub timeout: Duration,
    pub argv: Vec<String>,
    /// Latest estimated percentage, updated in place on each tick.
    pub progress: f64,
    pub started_at: DateTime<Utc>,
}

impl JobEntry {
    pub fn for_job(job: &TilingJob, argv: Vec<String>) -> Self {
        Self {
            job_id: job.job_id.clone(),
            input: job.input.clone(),
            profile: job.profile,
            alpha: job.alpha.clone(),
            timeout: job.timeout,
            argv,
            progress: 0.0,
            started_at: Utc::now(),
        }
    }
}

/// Cheaply clonable handle to the shared pid → [`JobEntry`] map.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<u32, JobEntry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pid: u32, entry: JobEntry) {
        self.jobs.write().unwrap().insert(pid, entry);
    }

    /// In-place progress update; a no-op once the entry is gone.
    pub fn update_progress(&self, pid: u32, percent: f64) {
        if let Some(entry) = self.jobs.write().unwrap().get_mut(&pid) {
            entry.progress = percent;
        }
    }

    pub fn remove(&self, pid: u32) -> Option<JobEntry> {
        self.jobs.write().unwrap().remove(&pid)
    }

    /// Cloned snapshot of one entry, `None` unless the job is Running.
    pub fn get(&self, pid: u32) -> Option<JobEntry> {
        self.jobs.read().unwrap().get(&pid).cloned()
    }

    /// Cloned snapshots of every running job.
    pub fn jobs(&self) -> Vec<(u32, JobEntry)> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .map(|(pid, entry)| (*pid, entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().unwrap().is_empty()
    }
}
