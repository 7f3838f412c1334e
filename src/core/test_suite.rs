use serde::Serialize;

use crate::environment::Environment;
use crate::ops::LocalOp;
use crate::runner::run_local;
use crate::transport::Transport;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run the project's test suite on the operator's machine.
pub fn run_tests(env: &Environment, transport: &dyn Transport) -> Result<TestRunResult> {
    env.require_local_project()?;
    if env.project.name.trim().is_empty() {
        return Err(crate::Error::config_missing_key(
            vec!["project.name".to_string()],
            Some(env.name.clone()),
        ));
    }

    let op = LocalOp::RunTests {
        directory: env.project.directory.clone(),
        python: env.python.clone(),
        project: env.project.name.clone(),
    };
    let output = run_local(transport, &op)?;

    Ok(TestRunResult {
        command: op.render(),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    })
}
