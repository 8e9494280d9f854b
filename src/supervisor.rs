//! Lifecycle supervision
//!
//! One supervisor task per job awaits the child's exit, bounded by the
//! configured wall-clock limit, and finalizes the record exactly once.
//! Reader tasks are joined before the terminal transition so the
//! output buffer is complete by the time a poller sees a terminal
//! state.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::job::{ExecResult, FailureKind, JobFailure, JobRecord};

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    StopRequested,
    TimedOut,
}

/// Await child exit and finalize the job record
///
/// `stop` is signalled by the registry's stop() operation; the
/// supervisor then kills the child and records Stopped. A configured
/// `timeout` kills the child and records Failed with detail "Timeout".
pub async fn supervise(
    record: Arc<RwLock<JobRecord>>,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    timeout: Option<Duration>,
    stop: Arc<Notify>,
) {
    let outcome = match timeout {
        Some(limit) => {
            tokio::select! {
                status = child.wait() => Outcome::Exited(status),
                _ = stop.notified() => Outcome::StopRequested,
                _ = tokio::time::sleep(limit) => Outcome::TimedOut,
            }
        }
        None => {
            tokio::select! {
                status = child.wait() => Outcome::Exited(status),
                _ = stop.notified() => Outcome::StopRequested,
            }
        }
    };

    // Kill paths must reap the child before finalizing; Child::kill
    // awaits the exit as well as delivering the signal.
    if matches!(outcome, Outcome::StopRequested | Outcome::TimedOut) {
        if let Err(e) = child.kill().await {
            warn!("Failed to kill child process: {}", e);
        }
    }

    // With the child gone the pipes hit EOF; wait for the readers to
    // drain the remaining buffered bytes.
    for reader in readers {
        if let Err(e) = reader.await {
            warn!("Output reader task failed: {}", e);
        }
    }

    let mut record = record.write().await;
    let job_id = record.job_id.clone();

    let finalized = match outcome {
        Outcome::Exited(Ok(status)) => {
            // Exit by signal carries no code; the original service
            // reported those as -1.
            let returncode = status.code().unwrap_or(-1);
            if returncode == 0 {
                info!(job_id = %job_id, "Job completed successfully");
                record.mark_completed(ExecResult {
                    returncode,
                    summary: "exited with code 0".to_string(),
                })
            } else {
                warn!(job_id = %job_id, returncode, "Job failed");
                let detail = record.stderr_text();
                record.mark_failed(JobFailure {
                    kind: FailureKind::Runtime,
                    returncode: Some(returncode),
                    detail,
                })
            }
        }
        Outcome::Exited(Err(e)) => {
            error!(job_id = %job_id, "Failed to wait for job process: {}", e);
            record.mark_failed(JobFailure {
                kind: FailureKind::Runtime,
                returncode: None,
                detail: e.to_string(),
            })
        }
        Outcome::StopRequested => {
            info!(job_id = %job_id, "Job stopped on request");
            record.mark_stopped()
        }
        Outcome::TimedOut => {
            warn!(job_id = %job_id, "Job exceeded wall-clock limit, killed");
            record.mark_failed(JobFailure {
                kind: FailureKind::Timeout,
                returncode: None,
                detail: "Timeout".to_string(),
            })
        }
    };

    // The supervisor is the only writer after launch, so this only
    // trips if finalization somehow ran twice.
    if let Err(e) = finalized {
        warn!(job_id = %job_id, "Skipped duplicate finalization: {}", e);
    }
}
