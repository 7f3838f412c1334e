//! Command transport seam.
//!
//! [`Transport`] is the "run this on host H, optionally elevated" capability.
//! [`SshTransport`] implements it with the system `ssh`/`scp` binaries; tests
//! substitute an in-memory host.

use serde::Serialize;
use std::path::Path;

use crate::environment::{Environment, Host};
use crate::error::{Error, Result};
use crate::ops::{LocalOp, RemoteOp};
use crate::ssh::{execute_local_command, CommandOutput, SshClient};
use crate::utils::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Runs as the environment's SSH user.
    User,
    /// Runs through `sudo`.
    Elevated,
}

pub trait Transport {
    fn execute(&self, host: &Host, op: &RemoteOp, privilege: Privilege) -> CommandOutput;
    fn upload(&self, host: &Host, local_path: &Path, remote_path: &str) -> CommandOutput;
    fn execute_local(&self, op: &LocalOp) -> CommandOutput;
}

pub struct SshTransport {
    shell: String,
    clients: Vec<(Host, SshClient)>,
}

impl SshTransport {
    pub fn connect(env: &Environment) -> Result<Self> {
        let clients = env
            .hosts()?
            .into_iter()
            .map(|host| SshClient::for_host(env, &host).map(|client| (host, client)))
            .collect::<Result<Vec<_>>>()?;

        if env.shell.trim().is_empty() {
            return Err(Error::config_missing_key(
                vec!["shell".to_string()],
                Some(env.name.clone()),
            ));
        }

        Ok(Self {
            shell: env.shell.trim().to_string(),
            clients,
        })
    }

    /// Transport for tasks that only run on the operator's machine.
    pub fn local_only() -> Self {
        Self {
            shell: String::new(),
            clients: Vec::new(),
        }
    }

    fn client(&self, host: &Host) -> Option<&SshClient> {
        self.clients
            .iter()
            .find(|(candidate, _)| candidate == host)
            .map(|(_, client)| client)
    }
}

impl Transport for SshTransport {
    fn execute(&self, host: &Host, op: &RemoteOp, privilege: Privilege) -> CommandOutput {
        let Some(client) = self.client(host) else {
            return CommandOutput::failed(-1, format!("No SSH client configured for {}", host));
        };
        let command = wrap_command(&self.shell, &op.render(), privilege);
        match op.stdin() {
            Some(input) => client.execute_with_input(&command, &input),
            None => client.execute(&command),
        }
    }

    fn upload(&self, host: &Host, local_path: &Path, remote_path: &str) -> CommandOutput {
        let Some(client) = self.client(host) else {
            return CommandOutput::failed(-1, format!("No SSH client configured for {}", host));
        };
        client.upload_file(local_path, remote_path)
    }

    fn execute_local(&self, op: &LocalOp) -> CommandOutput {
        execute_local_command(&op.render())
    }
}

/// Run `command` through the configured remote shell, via sudo when elevated.
pub fn wrap_command(remote_shell: &str, command: &str, privilege: Privilege) -> String {
    let wrapped = format!(
        "{} {}",
        remote_shell,
        shell::escape_command_for_shell(command)
    );
    match privilege {
        Privilege::User => wrapped,
        Privilege::Elevated => format!("sudo -n {}", wrapped),
    }
}
