//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use runshed::launcher::{JobLauncher, LaunchError, LaunchedJob};
use runshed::{JobId, JobParameters, JobRecord, JobRegistry, ProcessLauncher};

/// Launcher that runs the shell script carried in the job's own
/// `script` parameter, so one registry can drive differently-behaving
/// jobs in a single test.
pub struct ParamScriptLauncher;

#[async_trait]
impl JobLauncher for ParamScriptLauncher {
    async fn launch(&self, parameters: &JobParameters) -> Result<LaunchedJob, LaunchError> {
        let script = parameters
            .get("script")
            .cloned()
            .unwrap_or_else(|| "true".to_string());
        let launcher = ProcessLauncher::new(
            vec!["sh".to_string(), "-c".to_string(), script],
            None,
        );
        launcher.launch(&JobParameters::new()).await
    }
}

pub fn script_registry(timeout: Option<Duration>) -> Arc<JobRegistry> {
    Arc::new(JobRegistry::new(Arc::new(ParamScriptLauncher), timeout))
}

/// Valid submission parameters running `script`
pub fn params_with_script(script: &str) -> JobParameters {
    let mut parameters = base_params();
    parameters.insert("script".to_string(), script.to_string());
    parameters
}

pub fn base_params() -> JobParameters {
    [
        ("username", "u1"),
        ("password", "secret"),
        ("course_list", "42"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Poll the registry until the job is terminal, up to ten seconds
pub async fn wait_until_terminal(registry: &JobRegistry, job_id: &JobId) -> JobRecord {
    for _ in 0..200 {
        let record = registry.status(job_id).await.expect("job disappeared");
        if record.state.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} did not reach a terminal state in time");
}
