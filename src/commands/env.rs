use clap::{Args, Subcommand};
use serde::Serialize;

use liftoff::environment::{self, Environment};

use super::CmdResult;

#[derive(Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    command: EnvCommand,
}

#[derive(Subcommand)]
enum EnvCommand {
    /// List environment profiles
    List,
    /// Show one environment profile (secrets omitted)
    Show {
        /// Profile name
        name: String,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum EnvOutput {
    List {
        command: &'static str,
        environments: Vec<String>,
    },
    Show {
        command: &'static str,
        environment: Box<Environment>,
    },
}

pub fn run_json(args: EnvArgs) -> CmdResult<EnvOutput> {
    match args.command {
        EnvCommand::List => Ok((
            EnvOutput::List {
                command: "env.list",
                environments: environment::list_names()?,
            },
            0,
        )),
        EnvCommand::Show { name } => Ok((
            EnvOutput::Show {
                command: "env.show",
                environment: Box::new(environment::load(&name)?),
            },
            0,
        )),
    }
}
