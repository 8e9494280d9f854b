//! Job registry
//!
//! The registry owns the table of job records and is the single entry
//! point for submit/status/output/list/stop/cleanup. The table lock
//! only guards structural changes; record content is mutated solely by
//! that job's own collector and supervisor tasks, so readers take
//! snapshots without contending with other jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collector::spawn_stream_reader;
use crate::job::{
    FailureKind, JobFailure, JobId, JobParameters, JobRecord, JobSummary, OutputLine, StreamKind,
};
use crate::launcher::JobLauncher;
use crate::supervisor;

/// Parameters the launched program cannot run without
const REQUIRED_PARAMETERS: &[&str] = &["username", "password", "course_list"];

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job not running: {0}")]
    NotRunning(JobId),
}

pub struct JobRegistry {
    records: RwLock<HashMap<JobId, Arc<RwLock<JobRecord>>>>,
    /// Stop signals for jobs that have not finished; removed when the
    /// job's pipeline task exits.
    stops: RwLock<HashMap<JobId, Arc<Notify>>>,
    launcher: Arc<dyn JobLauncher>,
    job_timeout: Option<Duration>,
}

impl JobRegistry {
    pub fn new(launcher: Arc<dyn JobLauncher>, job_timeout: Option<Duration>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            stops: RwLock::new(HashMap::new()),
            launcher,
            job_timeout,
        }
    }

    /// Submit a new job
    ///
    /// Validates parameters, creates a PENDING record and schedules
    /// the launch/collect/supervise pipeline, returning immediately.
    /// The handle resolves when the job reaches a terminal state.
    pub async fn submit(
        self: &Arc<Self>,
        parameters: JobParameters,
    ) -> Result<(JobId, JoinHandle<()>), RegistryError> {
        for field in REQUIRED_PARAMETERS {
            if !parameters.contains_key(*field) {
                return Err(RegistryError::Validation(format!(
                    "Missing required parameter: {field}"
                )));
            }
        }

        let job_id = JobId::new();
        let record = Arc::new(RwLock::new(JobRecord::new(job_id.clone(), parameters)));
        let stop = Arc::new(Notify::new());

        {
            let mut records = self.records.write().await;
            records.insert(job_id.clone(), record.clone());
        }
        {
            let mut stops = self.stops.write().await;
            stops.insert(job_id.clone(), stop.clone());
        }

        info!(job_id = %job_id, "Job submitted");

        let registry = self.clone();
        let id = job_id.clone();
        let handle = tokio::spawn(async move {
            registry.run_job(id, record, stop).await;
        });

        Ok((job_id, handle))
    }

    /// Launch the process and drive it to a terminal state
    async fn run_job(
        self: Arc<Self>,
        job_id: JobId,
        record: Arc<RwLock<JobRecord>>,
        stop: Arc<Notify>,
    ) {
        let parameters = record.read().await.parameters.clone();

        let launched = match self.launcher.launch(&parameters).await {
            Ok(launched) => launched,
            Err(e) => {
                error!(job_id = %job_id, "Launch failed: {}", e);
                let mut record = record.write().await;
                if let Err(t) = record.mark_failed(JobFailure {
                    kind: FailureKind::Launch,
                    returncode: None,
                    detail: e.to_string(),
                }) {
                    warn!(job_id = %job_id, "Could not record launch failure: {}", t);
                }
                drop(record);
                self.stops.write().await.remove(&job_id);
                return;
            }
        };

        {
            let mut record = record.write().await;
            if let Err(t) = record.mark_running() {
                warn!(job_id = %job_id, "Could not mark job running: {}", t);
            }
        }
        info!(job_id = %job_id, pid = ?launched.pid, "Job running");

        let readers = vec![
            spawn_stream_reader(record.clone(), StreamKind::Stdout, launched.stdout),
            spawn_stream_reader(record.clone(), StreamKind::Stderr, launched.stderr),
        ];

        supervisor::supervise(
            record.clone(),
            launched.child,
            readers,
            self.job_timeout,
            stop,
        )
        .await;

        self.stops.write().await.remove(&job_id);
    }

    /// Snapshot of one job record
    pub async fn status(&self, job_id: &JobId) -> Result<JobRecord, RegistryError> {
        let records = self.records.read().await;
        let record = records
            .get(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?;
        Ok(record.read().await.clone())
    }

    /// Lines with `sequence_index > since`, in increasing order
    pub async fn output(
        &self,
        job_id: &JobId,
        since: u64,
    ) -> Result<Vec<OutputLine>, RegistryError> {
        let records = self.records.read().await;
        let record = records
            .get(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?;
        Ok(record.read().await.lines_after(since))
    }

    /// Summaries of all tracked jobs, oldest first
    pub async fn list(&self) -> Vec<JobSummary> {
        let records = self.records.read().await;
        let mut summaries = Vec::with_capacity(records.len());
        for record in records.values() {
            summaries.push(JobSummary::from(&*record.read().await));
        }
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Request termination of a running job
    ///
    /// Kills the underlying process; the supervisor records STOPPED.
    pub async fn stop(&self, job_id: &JobId) -> Result<(), RegistryError> {
        let record = {
            let records = self.records.read().await;
            records
                .get(job_id)
                .ok_or_else(|| RegistryError::NotFound(job_id.clone()))?
                .clone()
        };

        if record.read().await.state.is_terminal() {
            return Err(RegistryError::NotRunning(job_id.clone()));
        }

        let stops = self.stops.read().await;
        if let Some(stop) = stops.get(job_id) {
            warn!(job_id = %job_id, "Stop requested");
            // Notify stores a permit, so a stop that lands before the
            // supervisor starts waiting is still honored.
            stop.notify_one();
            Ok(())
        } else {
            // Pipeline already finished between the state check and here.
            Err(RegistryError::NotRunning(job_id.clone()))
        }
    }

    /// Remove terminal records older than `retention_seconds`
    ///
    /// Pending/Running jobs are never removed regardless of age.
    pub async fn cleanup(&self, retention_seconds: u64) -> usize {
        let retention = chrono::Duration::seconds(retention_seconds as i64);
        let now = Utc::now();

        let mut expired = Vec::new();
        {
            let records = self.records.read().await;
            for (job_id, record) in records.iter() {
                let record = record.read().await;
                if !record.state.is_terminal() {
                    continue;
                }
                if let Some(ended_at) = record.ended_at {
                    if now - ended_at >= retention {
                        expired.push(job_id.clone());
                    }
                }
            }
        }

        if expired.is_empty() {
            return 0;
        }

        let mut records = self.records.write().await;
        let mut removed = 0;
        for job_id in expired {
            if records.remove(&job_id).is_some() {
                removed += 1;
            }
        }
        info!(removed, "Purged old job records");
        removed
    }

    /// Number of jobs that are not yet terminal
    pub async fn active_count(&self) -> usize {
        let records = self.records.read().await;
        let mut active = 0;
        for record in records.values() {
            if !record.read().await.state.is_terminal() {
                active += 1;
            }
        }
        active
    }

    /// Total number of tracked jobs
    pub async fn total_count(&self) -> usize {
        self.records.read().await.len()
    }
}
