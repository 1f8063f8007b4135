//! In-memory job records, updated from progress events.
//!
//! Jobs live for the process lifetime only; there is no persistence tier.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broadcast::progress::{ProgressEvent, Stage};
use crate::mappings::{SourceKind, TargetFormat};

/// One conversion request's lifecycle, from submission to terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier. Never reused; a new conversion always gets a
    /// new one.
    pub job_id: String,
    /// Identifier of the source blob.
    pub file_id: String,
    /// Logical name of the source file.
    pub file_name: String,
    /// Inferred kind of the source container.
    pub source_kind: SourceKind,
    /// Requested output format.
    pub target: TargetFormat,
    /// Current stage.
    pub stage: Stage,
    /// Current progress percentage, 0-100.
    pub progress: u8,
    /// Identifier of the stored output blob (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        job_id: &str,
        file_id: &str,
        file_name: &str,
        source_kind: SourceKind,
        target: TargetFormat,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            file_id: file_id.to_string(),
            file_name: file_name.to_string(),
            source_kind,
            target,
            stage: Stage::Queued,
            progress: 0,
            download_id: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Folds a progress event into the record. Events arriving after a
    /// terminal stage are ignored; terminal state is final.
    pub fn apply(&mut self, event: &ProgressEvent) {
        if self.stage.is_terminal() {
            return;
        }
        self.stage = event.stage;
        if let Some(progress) = event.progress {
            self.progress = progress;
        }
        if event.download_id.is_some() {
            self.download_id = event.download_id.clone();
        }
        if event.error.is_some() {
            self.error = event.error.clone();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Registry of jobs keyed by id.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn insert(&self, job: Job) {
        self.write_jobs().insert(job.job_id.clone(), job);
    }

    /// Updates the stored record for `job_id` with a progress event.
    pub fn update(&self, job_id: &str, event: &ProgressEvent) {
        if let Some(job) = self.write_jobs().get_mut(job_id) {
            job.apply(event);
        }
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.read_jobs().get(job_id).cloned()
    }

    /// Returns all jobs sorted by submission time, newest first.
    pub fn all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read_jobs().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// (running, done, failed) counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut running = 0;
        let mut done = 0;
        let mut failed = 0;
        for job in self.read_jobs().values() {
            match job.stage {
                Stage::Done => done += 1,
                Stage::Failed => failed += 1,
                _ => running += 1,
            }
        }
        (running, done, failed)
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
