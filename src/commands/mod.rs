use std::path::PathBuf;

use liftoff::environment::{self, Environment};
use liftoff::transport::SshTransport;

pub type CmdResult<T> = liftoff::Result<(T, i32)>;

/// Environment selection shared by every command.
pub(crate) struct GlobalArgs {
    pub env: Option<String>,
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// Load the selected environment profile.
    pub fn environment(&self) -> liftoff::Result<Environment> {
        environment::select(self.env.as_deref(), self.config.as_deref()).map_err(|e| {
            if e.code == liftoff::ErrorCode::EnvironmentNotSelected {
                e.with_hint("Run 'liftoff env list' to see available profiles")
            } else {
                e
            }
        })
    }

    /// Load the selected environment and open a transport to its hosts.
    pub fn connect(&self) -> liftoff::Result<(Environment, SshTransport)> {
        let env = self.environment()?;
        env.require()?;
        let transport = SshTransport::connect(&env)?;
        Ok((env, transport))
    }
}

pub mod cleanup;
pub mod db;
pub mod deploy;
pub mod env;
pub mod rollback;
pub mod setup;
pub mod status;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run_json($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (liftoff::Result<serde_json::Value>, i32) {
    crate::tty::status("liftoff is working...");

    match command {
        // Commands without global context
        crate::Commands::Env(args) => dispatch!(args, env),

        // Commands with global context
        crate::Commands::RunTests(args) => dispatch!(args, global, test),
        crate::Commands::Setup(args) => dispatch!(args, global, setup),
        crate::Commands::DeploySite(args) => {
            crate::output::map_cmd_result_to_json(deploy::run_site(args, global))
        }
        crate::Commands::DeployDatabase(args) => dispatch!(args, global, db),
        crate::Commands::DeployRelease(args) => {
            crate::output::map_cmd_result_to_json(deploy::run_release(args, global))
        }
        crate::Commands::Rollback(args) => dispatch!(args, global, rollback),
        crate::Commands::Cleanup(args) => dispatch!(args, global, cleanup),
        crate::Commands::Status(args) => dispatch!(args, global, status),
    }
}
