use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{cleanup, db, deploy, env, rollback, setup, status, test};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "liftoff")]
#[command(version = VERSION)]
#[command(about = "Release-based site deployment over SSH")]
struct Cli {
    /// Environment profile to target (~/.config/liftoff/environments/<name>.json)
    #[arg(long, short = 'e', global = true)]
    env: Option<String>,

    /// Load the environment from this file instead of a named profile
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the project's test suite locally
    RunTests(test::TestArgs),
    /// Prepare hosts: base path, virtualenv, releases/ and packages/
    Setup(setup::SetupArgs),
    /// Build, upload and activate a new release
    DeploySite(deploy::DeploySiteArgs),
    /// Import a release's SQL dump into the database
    DeployDatabase(db::DbArgs),
    /// Make an existing release current
    DeployRelease(deploy::DeployReleaseArgs),
    /// Swap the current and previous releases
    Rollback(rollback::RollbackArgs),
    /// Remove everything the deployment installed
    Cleanup(cleanup::CleanupArgs),
    /// Show the current and previous release on every host
    Status(status::StatusArgs),
    /// Inspect environment profiles
    Env(env::EnvArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        env: cli.env,
        config: cli.config,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
