//! Job domain types
//!
//! This module contains the job record and its value objects. State
//! transitions are enforced here so that no caller can move a job out
//! of a terminal state or skip the lifecycle order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    /// Completed, Failed and Stopped are terminal: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Check whether a transition to `next` is allowed
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed | Self::Stopped),
            Self::Running => matches!(next, Self::Completed | Self::Failed | Self::Stopped),
            Self::Completed | Self::Failed | Self::Stopped => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stream a captured line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One captured line of program output
///
/// `sequence_index` is strictly increasing per job and shared across
/// both streams; polling clients use it as their cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    pub sequence_index: u64,
    pub stream_kind: StreamKind,
    pub content: String,
    pub emitted_at: DateTime<Utc>,
}

/// Opaque key/value input passed to the launched program
pub type JobParameters = HashMap<String, String>;

/// Result of a job that ran to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub returncode: i32,
    pub summary: String,
}

/// Failure classification for a terminal Failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Process could not be started at all
    Launch,
    /// Process exited non-zero
    Runtime,
    /// Process exceeded the configured wall-clock limit
    Timeout,
}

/// Structured failure detail recorded on a Failed job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub returncode: Option<i32>,
    pub detail: String,
}

/// Error raised on an invalid lifecycle transition
#[derive(Debug, thiserror::Error)]
#[error("Invalid job state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// One tracked invocation of the automation program
///
/// The registry owns the record; only the job's own collector and
/// supervisor tasks mutate it after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub state: JobState,
    pub parameters: JobParameters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub output: Vec<OutputLine>,
    pub result: Option<ExecResult>,
    pub error: Option<JobFailure>,
    next_sequence: u64,
}

impl JobRecord {
    /// Create a new record in PENDING state
    pub fn new(job_id: JobId, parameters: JobParameters) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            parameters,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            output: Vec::new(),
            result: None,
            error: None,
            next_sequence: 1,
        }
    }

    fn transition(&mut self, next: JobState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Transition to RUNNING and stamp `started_at`
    pub fn mark_running(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to COMPLETED (terminal) with the execution result
    pub fn mark_completed(&mut self, result: ExecResult) -> Result<(), InvalidTransition> {
        self.transition(JobState::Completed)?;
        self.result = Some(result);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to FAILED (terminal) with structured failure detail
    pub fn mark_failed(&mut self, failure: JobFailure) -> Result<(), InvalidTransition> {
        self.transition(JobState::Failed)?;
        self.error = Some(failure);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to STOPPED (terminal) after a caller-requested stop
    pub fn mark_stopped(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobState::Stopped)?;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Append one captured output line, assigning the next sequence index
    pub fn append_line(&mut self, stream_kind: StreamKind, content: String) -> u64 {
        let sequence_index = self.next_sequence;
        self.next_sequence += 1;
        self.output.push(OutputLine {
            sequence_index,
            stream_kind,
            content,
            emitted_at: Utc::now(),
        });
        sequence_index
    }

    /// Lines with `sequence_index > since`, in increasing order
    pub fn lines_after(&self, since: u64) -> Vec<OutputLine> {
        // Output is append-only, so a partition point search is enough.
        let start = self.output.partition_point(|l| l.sequence_index <= since);
        self.output[start..].to_vec()
    }

    /// Captured stderr joined into one block, used as failure detail
    pub fn stderr_text(&self) -> String {
        self.output
            .iter()
            .filter(|l| l.stream_kind == StreamKind::Stderr)
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compact job view for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub has_error: bool,
    pub line_count: usize,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            state: record.state,
            created_at: record.created_at,
            started_at: record.started_at,
            ended_at: record.ended_at,
            has_error: record.error.is_some(),
            line_count: record.output.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(JobId::new(), JobParameters::new())
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut job = record();
        assert_eq!(job.state, JobState::Pending);
        assert!(job.mark_running().is_ok());
        assert!(job.started_at.is_some());
        assert!(job.ended_at.is_none());

        let result = ExecResult {
            returncode: 0,
            summary: "exited with code 0".to_string(),
        };
        assert!(job.mark_completed(result).is_ok());
        assert_eq!(job.state, JobState::Completed);
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = record();
        job.mark_running().unwrap();
        job.mark_stopped().unwrap();

        assert!(job.mark_running().is_err());
        assert!(
            job.mark_failed(JobFailure {
                kind: FailureKind::Runtime,
                returncode: Some(1),
                detail: "late".to_string(),
            })
            .is_err()
        );
        assert_eq!(job.state, JobState::Stopped);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        // Launch failures skip RUNNING entirely.
        let mut job = record();
        let failure = JobFailure {
            kind: FailureKind::Launch,
            returncode: None,
            detail: "No such file or directory".to_string(),
        };
        assert!(job.mark_failed(failure).is_ok());
        assert_eq!(job.state, JobState::Failed);
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut job = record();
        let result = ExecResult {
            returncode: 0,
            summary: String::new(),
        };
        assert!(job.mark_completed(result).is_err());
    }

    #[test]
    fn test_append_line_sequences_across_streams() {
        let mut job = record();
        assert_eq!(job.append_line(StreamKind::Stdout, "a".to_string()), 1);
        assert_eq!(job.append_line(StreamKind::Stderr, "b".to_string()), 2);
        assert_eq!(job.append_line(StreamKind::Stdout, "c".to_string()), 3);
    }

    #[test]
    fn test_lines_after_cursor() {
        let mut job = record();
        for i in 0..5 {
            job.append_line(StreamKind::Stdout, format!("line {i}"));
        }

        let all = job.lines_after(0);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].sequence_index, 1);

        let tail = job.lines_after(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence_index, 4);
        assert_eq!(tail[1].sequence_index, 5);

        assert!(job.lines_after(5).is_empty());
        assert!(job.lines_after(100).is_empty());
    }

    #[test]
    fn test_stderr_text() {
        let mut job = record();
        job.append_line(StreamKind::Stdout, "progress".to_string());
        job.append_line(StreamKind::Stderr, "boom".to_string());
        job.append_line(StreamKind::Stderr, "trace".to_string());
        assert_eq!(job.stderr_text(), "boom\ntrace");
    }

    #[test]
    fn test_summary_from_record() {
        let mut job = record();
        job.append_line(StreamKind::Stdout, "x".to_string());
        let summary = JobSummary::from(&job);
        assert_eq!(summary.state, JobState::Pending);
        assert_eq!(summary.line_count, 1);
        assert!(!summary.has_error);
    }
}
