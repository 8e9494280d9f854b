//! End-to-end registry behaviour against real child processes

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{base_params, params_with_script, script_registry, wait_until_terminal};
use runshed::job::FailureKind;
use runshed::{JobRegistry, JobState, ProcessLauncher, RegistryError, StreamKind};

#[tokio::test]
async fn test_completed_job_captures_full_output_in_order() {
    let registry = script_registry(None);
    let (job_id, handle) = registry
        .submit(params_with_script("echo one; echo two; echo three"))
        .await
        .unwrap();

    // Submission is fire-and-forget; the snapshot right after must be
    // pre-terminal or already done, never an inconsistent state.
    let early = registry.status(&job_id).await.unwrap();
    assert!(matches!(
        early.state,
        JobState::Pending | JobState::Running | JobState::Completed
    ));

    handle.await.unwrap();
    let record = wait_until_terminal(&registry, &job_id).await;

    assert_eq!(record.state, JobState::Completed);
    assert_eq!(record.result.as_ref().unwrap().returncode, 0);
    assert!(record.error.is_none());
    assert!(record.started_at.is_some());
    assert!(record.ended_at.is_some());

    let contents: Vec<&str> = record.output.iter().map(|l| l.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_output_cursor_returns_only_newer_lines() {
    let registry = script_registry(None);
    let (job_id, handle) = registry
        .submit(params_with_script("echo a; echo b; echo c; echo d"))
        .await
        .unwrap();
    handle.await.unwrap();

    let all = registry.output(&job_id, 0).await.unwrap();
    assert_eq!(all.len(), 4);
    let sequences: Vec<u64> = all.iter().map(|l| l.sequence_index).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    let tail = registry.output(&job_id, sequences[1]).await.unwrap();
    assert_eq!(tail.len(), 2);
    assert!(tail.iter().all(|l| l.sequence_index > sequences[1]));

    let none = registry.output(&job_id, u64::MAX).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_failed_job_records_stderr_detail() {
    let registry = script_registry(None);
    let (job_id, handle) = registry
        .submit(params_with_script(
            "echo progress; echo 'login rejected' >&2; exit 2",
        ))
        .await
        .unwrap();
    handle.await.unwrap();

    let record = registry.status(&job_id).await.unwrap();
    assert_eq!(record.state, JobState::Failed);
    assert!(record.result.is_none());

    let failure = record.error.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Runtime);
    assert_eq!(failure.returncode, Some(2));
    assert!(failure.detail.contains("login rejected"));

    // stderr lines are still part of the captured output stream
    assert!(
        record
            .output
            .iter()
            .any(|l| l.stream_kind == StreamKind::Stderr)
    );
}

#[tokio::test]
async fn test_submission_is_non_blocking() {
    let registry = script_registry(None);
    let (slow_id, slow_handle) = registry
        .submit(params_with_script("sleep 30"))
        .await
        .unwrap();
    let (quick_id, quick_handle) = registry
        .submit(params_with_script("echo done"))
        .await
        .unwrap();

    quick_handle.await.unwrap();
    let quick = registry.status(&quick_id).await.unwrap();
    assert_eq!(quick.state, JobState::Completed);

    // The earlier job is still going: submission never serialized them.
    let slow = registry.status(&slow_id).await.unwrap();
    assert!(!slow.state.is_terminal());

    registry.stop(&slow_id).await.unwrap();
    slow_handle.await.unwrap();
    let slow = registry.status(&slow_id).await.unwrap();
    assert_eq!(slow.state, JobState::Stopped);
    assert!(slow.ended_at.is_some());
}

#[tokio::test]
async fn test_stop_on_terminal_job_is_not_running() {
    let registry = script_registry(None);
    let (job_id, handle) = registry.submit(params_with_script("true")).await.unwrap();
    handle.await.unwrap();

    let err = registry.stop(&job_id).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotRunning(_)));
}

#[tokio::test]
async fn test_cleanup_zero_removes_terminal_and_spares_active() {
    let registry = script_registry(None);
    let (done_id, done_handle) = registry.submit(params_with_script("true")).await.unwrap();
    let (live_id, live_handle) = registry
        .submit(params_with_script("sleep 30"))
        .await
        .unwrap();
    done_handle.await.unwrap();

    let removed = registry.cleanup(0).await;
    assert_eq!(removed, 1);
    assert!(matches!(
        registry.status(&done_id).await.unwrap_err(),
        RegistryError::NotFound(_)
    ));
    // The running job survives retention 0.
    assert!(registry.status(&live_id).await.is_ok());

    registry.stop(&live_id).await.unwrap();
    live_handle.await.unwrap();
    assert_eq!(registry.cleanup(0).await, 1);
    assert_eq!(registry.total_count().await, 0);
}

#[tokio::test]
async fn test_timeout_kills_runaway_job() {
    let registry = script_registry(Some(Duration::from_millis(200)));
    let (job_id, handle) = registry
        .submit(params_with_script("echo started; sleep 30"))
        .await
        .unwrap();
    handle.await.unwrap();

    let record = registry.status(&job_id).await.unwrap();
    assert_eq!(record.state, JobState::Failed);
    let failure = record.error.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.detail, "Timeout");
}

#[tokio::test]
async fn test_launch_failure_fails_job_without_retry() {
    let launcher = ProcessLauncher::new(vec!["runshed-missing-program".to_string()], None);
    let registry = Arc::new(JobRegistry::new(Arc::new(launcher), None));

    let (job_id, handle) = registry.submit(base_params()).await.unwrap();
    handle.await.unwrap();

    let record = registry.status(&job_id).await.unwrap();
    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.error.as_ref().unwrap().kind, FailureKind::Launch);
    assert!(record.started_at.is_none());
    assert!(record.ended_at.is_some());
}

#[tokio::test]
async fn test_list_reports_all_jobs() {
    let registry = script_registry(None);
    let (_, h1) = registry.submit(params_with_script("true")).await.unwrap();
    let (_, h2) = registry.submit(params_with_script("false")).await.unwrap();
    h1.await.unwrap();
    h2.await.unwrap();

    let jobs = registry.list().await;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.state.is_terminal()));
    assert_eq!(jobs.iter().filter(|j| j.has_error).count(), 1);
}
