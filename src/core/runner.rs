//! Fans typed operations out over every configured host.
//!
//! Each operation runs against all hosts, in host order, before the next one
//! starts. [`FailureMode::Strict`] stops at the first failure and returns it
//! as an error; [`FailureMode::BestEffort`] records failures and keeps going.

use serde::Serialize;
use std::path::Path;

use crate::environment::{Environment, Host};
use crate::error::{
    Error, LocalCommandFailedDetails, RemoteCommandFailedDetails, Result,
};
use crate::ops::{LocalOp, RemoteOp};
use crate::ssh::CommandOutput;
use crate::transport::{Privilege, Transport};

/// Whether a failed operation aborts the remaining sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Non-zero exit stops the sequence and returns an error.
    Strict,
    /// Failures are recorded and execution continues.
    BestEffort,
}

/// One operation bound to the privilege it runs with.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub op: RemoteOp,
    pub privilege: Privilege,
}

impl Invocation {
    pub fn user(op: RemoteOp) -> Self {
        Self {
            op,
            privilege: Privilege::User,
        }
    }

    pub fn elevated(op: RemoteOp) -> Self {
        Self {
            op,
            privilege: Privilege::Elevated,
        }
    }
}

/// Result of one operation on one host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpOutcome {
    pub host: String,
    pub op: &'static str,
    pub command: String,
    pub success: bool,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub outcomes: Vec<OpOutcome>,
    pub all_succeeded: bool,
}

pub struct Runner<'a> {
    transport: &'a dyn Transport,
    hosts: Vec<Host>,
}

impl<'a> Runner<'a> {
    pub fn new(env: &Environment, transport: &'a dyn Transport) -> Result<Self> {
        let hosts = env.hosts()?;
        if hosts.is_empty() {
            return Err(Error::config_missing_key(
                vec!["hosts".to_string()],
                Some(env.name.clone()),
            ));
        }
        Ok(Self { transport, hosts })
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Run on a single host; a non-zero exit is an error.
    pub fn run_on(&self, host: &Host, op: &RemoteOp, privilege: Privilege) -> Result<CommandOutput> {
        let (output, outcome) = self.execute(host, op, privilege);
        if output.success {
            return Ok(output);
        }
        Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command: outcome.command,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            host: outcome.host,
            elevated: privilege == Privilege::Elevated,
        }))
    }

    /// Run on every host, stopping at the first failure.
    pub fn run(&self, op: &RemoteOp, privilege: Privilege) -> Result<()> {
        for host in &self.hosts {
            self.run_on(host, op, privilege)?;
        }
        Ok(())
    }

    pub fn run_as_user(&self, op: RemoteOp) -> Result<()> {
        self.run(&op, Privilege::User)
    }

    pub fn run_elevated(&self, op: RemoteOp) -> Result<()> {
        self.run(&op, Privilege::Elevated)
    }

    /// Run a sequence of invocations on every host under `mode`.
    pub fn run_batch(&self, invocations: &[Invocation], mode: FailureMode) -> Result<BatchReport> {
        let mut outcomes = Vec::new();
        let mut all_succeeded = true;

        for invocation in invocations {
            for host in &self.hosts {
                match mode {
                    FailureMode::Strict => {
                        self.run_on(host, &invocation.op, invocation.privilege)?;
                        outcomes.push(OpOutcome {
                            host: host.to_string(),
                            op: invocation.op.label(),
                            command: invocation.op.render(),
                            success: true,
                            exit_code: 0,
                            stderr: String::new(),
                        });
                    }
                    FailureMode::BestEffort => {
                        let (output, outcome) =
                            self.execute(host, &invocation.op, invocation.privilege);
                        if !output.success {
                            all_succeeded = false;
                        }
                        outcomes.push(outcome);
                    }
                }
            }
        }

        Ok(BatchReport {
            outcomes,
            all_succeeded,
        })
    }

    /// Upload a local file to every host.
    pub fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        for host in &self.hosts {
            log_status!("upload", "{} -> {}:{}", local_path.display(), host, remote_path);
            let output = self.transport.upload(host, local_path, remote_path);
            if !output.success {
                return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                    command: format!("upload {} {}", local_path.display(), remote_path),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    host: host.to_string(),
                    elevated: false,
                }));
            }
        }
        Ok(())
    }

    /// Run on the operator's machine; a non-zero exit is an error.
    pub fn local(&self, op: &LocalOp) -> Result<CommandOutput> {
        run_local(self.transport, op)
    }

    fn execute(&self, host: &Host, op: &RemoteOp, privilege: Privilege) -> (CommandOutput, OpOutcome) {
        let command = op.render();
        log_status!(
            "remote",
            "{}{} {}",
            host,
            if privilege == Privilege::Elevated { " (sudo)" } else { "" },
            command
        );

        let output = self.transport.execute(host, op, privilege);
        let outcome = OpOutcome {
            host: host.to_string(),
            op: op.label(),
            command,
            success: output.success,
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        };
        (output, outcome)
    }
}

/// Run a local operation without needing any hosts configured.
pub fn run_local(transport: &dyn Transport, op: &LocalOp) -> Result<CommandOutput> {
    let command = op.render();
    log_status!("local", "{}", command);

    let output = transport.execute_local(op);
    if output.success {
        return Ok(output);
    }
    Err(Error::local_command_failed(LocalCommandFailedDetails {
        command,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    }))
}
