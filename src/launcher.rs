//! Job launching
//!
//! One launcher spawns one independent child process per job, stdio
//! piped, and hands the streams over to the output collector. The
//! trait is the pluggable seam for alternative launch backends; tests
//! inject scripted executables through it.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{error, info};

use crate::job::JobParameters;

/// Launch error types
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Output streams unavailable for spawned process")]
    StreamsUnavailable,
}

/// A freshly spawned job process with its captured streams
#[derive(Debug)]
pub struct LaunchedJob {
    pub child: Child,
    pub pid: Option<u32>,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Launch strategy seam
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, parameters: &JobParameters) -> Result<LaunchedJob, LaunchError>;
}

/// Production launcher backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: Vec<String>,
    working_dir: Option<String>,
}

/// Parameter keys with a dedicated short flag on the automation program
const FLAG_MAP: &[(&str, &str)] = &[
    ("config", "-c"),
    ("username", "-u"),
    ("password", "-p"),
    ("course_list", "-l"),
    ("speed", "-s"),
    ("notopen_action", "-a"),
];

impl ProcessLauncher {
    pub fn new(program: Vec<String>, working_dir: Option<String>) -> Self {
        Self {
            program,
            working_dir,
        }
    }

    /// Build the full argv for one job from the configured program
    /// words plus parameter-derived flags.
    fn build_argv(&self, parameters: &JobParameters) -> Vec<String> {
        let mut argv = self.program.clone();

        for (key, flag) in FLAG_MAP {
            if let Some(value) = parameters.get(*key) {
                argv.push((*flag).to_string());
                argv.push(value.clone());
            }
        }

        // Unknown keys pass through as long options, sorted so the
        // command line is deterministic.
        let mut extras: Vec<(&String, &String)> = parameters
            .iter()
            .filter(|(key, _)| !FLAG_MAP.iter().any(|(known, _)| known == &key.as_str()))
            .collect();
        extras.sort_by_key(|(key, _)| key.as_str());
        for (key, value) in extras {
            argv.push(format!("--{key}"));
            argv.push(value.clone());
        }

        argv
    }
}

#[async_trait]
impl JobLauncher for ProcessLauncher {
    async fn launch(&self, parameters: &JobParameters) -> Result<LaunchedJob, LaunchError> {
        let argv = self.build_argv(parameters);
        if argv.is_empty() {
            return Err(LaunchError::SpawnFailed("empty program".to_string()));
        }

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", argv[0], e);
                return Err(LaunchError::SpawnFailed(e.to_string()));
            }
        };

        let pid = child.id();
        info!("Spawned {} with PID {:?}", argv[0], pid);

        let stdout = child.stdout.take().ok_or(LaunchError::StreamsUnavailable)?;
        let stderr = child.stderr.take().ok_or(LaunchError::StreamsUnavailable)?;

        Ok(LaunchedJob {
            child,
            pid,
            stdout,
            stderr,
        })
    }
}
