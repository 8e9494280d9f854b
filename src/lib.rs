//! runshed - job service for long-lived automation programs
//!
//! The service accepts job submissions over HTTP, runs each as an
//! independent child process, captures stdout/stderr incrementally and
//! serves status and output to polling clients until completion.
//!
//! Key pieces:
//! - Registry with monotonic job lifecycle and retention cleanup
//! - Non-blocking per-stream output capture with a poll cursor
//! - Pluggable process launcher behind a trait seam
//! - Bounded-retry guard for retry loops inside the automation logic

pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod job;
pub mod launcher;
pub mod loop_guard;
pub mod registry;
pub mod supervisor;
pub mod sweeper;

pub use api::{ApiAppState, api_routes};
pub use client::{PollingClient, PollingClientConfig};
pub use config::{Config, ConfigError};
pub use job::{JobId, JobParameters, JobRecord, JobState, JobSummary, OutputLine, StreamKind};
pub use launcher::{JobLauncher, LaunchError, ProcessLauncher};
pub use loop_guard::{LoopGuard, LoopGuardError};
pub use registry::{JobRegistry, RegistryError};
pub use sweeper::spawn_sweeper;
