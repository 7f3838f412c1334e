use crate::environment::{Environment, Host};
use crate::error::{Error, Result};
use crate::utils::shell;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }
}

impl SshClient {
    pub fn for_host(env: &Environment, host: &Host) -> Result<Self> {
        let identity_file = match &env.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        host.to_string(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&host.address) && host.port == 22;
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", host);
        }

        Ok(Self {
            host: host.address.clone(),
            user: env.user.clone(),
            port: host.port,
            identity_file,
            is_local,
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never block on prompts; stalled connections time out instead of hanging.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    pub fn execute(&self, command: &str) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command);
        }

        let args = self.build_ssh_args(command);
        capture(Command::new("ssh").args(&args), "SSH error")
    }

    /// Like [`SshClient::execute`], with `input` written to the remote stdin.
    pub fn execute_with_input(&self, command: &str, input: &str) -> CommandOutput {
        if self.is_local {
            return capture_with_input(&mut local_shell(command), input, "Command error");
        }

        let args = self.build_ssh_args(command);
        capture_with_input(Command::new("ssh").args(&args), input, "SSH error")
    }

    /// Copy a local file to `remote_path` with scp.
    pub fn upload_file(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        if self.is_local {
            return execute_local_command(&format!(
                "cp {} {}",
                shell::quote_path(&local_path.to_string_lossy()),
                shell::quote_path(remote_path)
            ));
        }

        let mut scp_args: Vec<String> = vec!["-q".to_string(), "-o".to_string(), "BatchMode=yes".to_string()];

        if let Some(identity_file) = &self.identity_file {
            scp_args.extend(["-i".to_string(), identity_file.clone()]);
        }

        if self.port != 22 {
            scp_args.extend(["-P".to_string(), self.port.to_string()]);
        }

        scp_args.push(local_path.to_string_lossy().to_string());
        scp_args.push(scp_destination(&self.user, &self.host, remote_path));

        capture(Command::new("scp").args(&scp_args), "SCP error")
    }
}

/// `user@host:path` for scp; IPv6 addresses need brackets to separate the path.
fn scp_destination(user: &str, host: &str, remote_path: &str) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    format!("{}@{}:{}", user, host, shell::quote_path(remote_path))
}

fn local_shell(command: &str) -> Command {
    #[cfg(windows)]
    let cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd
}

pub fn execute_local_command(command: &str) -> CommandOutput {
    capture(&mut local_shell(command), "Command error")
}

fn capture(cmd: &mut Command, context: &str) -> CommandOutput {
    match cmd.output() {
        Ok(out) => from_output(out),
        Err(e) => CommandOutput::failed(-1, format!("{}: {}", context, e)),
    }
}

fn capture_with_input(cmd: &mut Command, input: &str, context: &str) -> CommandOutput {
    let spawned = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return CommandOutput::failed(-1, format!("{}: {}", context, e)),
    };

    if let Some(mut stdin) = child.stdin.take() {
        // A child that exits early closes the pipe; its exit status reports why.
        let _ = stdin.write_all(input.as_bytes());
    }

    match child.wait_with_output() {
        Ok(out) => from_output(out),
        Err(e) => CommandOutput::failed(-1, format!("{}: {}", context, e)),
    }
}

fn from_output(out: Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        success: out.status.success(),
        exit_code: out.status.code().unwrap_or(-1),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(port: u16, identity_file: Option<&str>) -> SshClient {
        SshClient {
            host: "web1.example.com".to_string(),
            user: "deploy".to_string(),
            port,
            identity_file: identity_file.map(String::from),
            is_local: false,
        }
    }

    #[test]
    fn ssh_args_include_port_and_identity() {
        let args = client(4444, Some("/home/me/.ssh/id_ed25519")).build_ssh_args("uptime");
        assert_eq!(&args[..4], ["-i", "/home/me/.ssh/id_ed25519", "-p", "4444"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(args[args.len() - 2], "deploy@web1.example.com");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn default_port_is_omitted() {
        let args = client(22, None).build_ssh_args("true");
        assert!(!args.contains(&"-p".to_string()));
        assert!(!args.contains(&"-i".to_string()));
    }

    #[test]
    fn local_hosts_are_detected() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("::1"));
        assert!(!is_local_host("example.com"));
    }

    #[test]
    fn scp_destination_brackets_ipv6_addresses() {
        assert_eq!(
            scp_destination("deploy", "2001:db8::7", "/srv/app/packages/r1.tar.gz"),
            "deploy@[2001:db8::7]:'/srv/app/packages/r1.tar.gz'"
        );
        assert_eq!(
            scp_destination("deploy", "web1.example.com", "/tmp/a"),
            "deploy@web1.example.com:'/tmp/a'"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn local_command_reads_input_from_stdin() {
        let client = SshClient {
            host: "localhost".to_string(),
            user: "deploy".to_string(),
            port: 22,
            identity_file: None,
            is_local: true,
        };
        let output = client.execute_with_input("read -r secret && echo \"got $secret\"", "hunter2\n");
        assert!(output.success, "{}", output.stderr);
        assert_eq!(output.stdout.trim(), "got hunter2");
    }

    #[cfg(not(windows))]
    #[test]
    fn local_command_captures_output_and_status() {
        let ok = execute_local_command("echo hello");
        assert!(ok.success);
        assert_eq!(ok.stdout.trim(), "hello");

        let failed = execute_local_command("echo oops >&2; exit 3");
        assert!(!failed.success);
        assert_eq!(failed.exit_code, 3);
        assert_eq!(failed.stderr.trim(), "oops");
    }
}
