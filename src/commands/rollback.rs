use clap::Args;
use serde::Serialize;

use liftoff::deploy::{self, SwitchReport};

use super::CmdResult;

#[derive(Args)]
pub struct RollbackArgs {}

#[derive(Serialize)]
pub struct RollbackOutput {
    pub command: &'static str,
    pub environment: String,
    #[serde(flatten)]
    pub report: SwitchReport,
}

pub fn run(_args: RollbackArgs, global: &crate::commands::GlobalArgs) -> CmdResult<RollbackOutput> {
    let (env, transport) = global.connect()?;
    let report = deploy::rollback(&env, &transport)?;

    Ok((
        RollbackOutput {
            command: "rollback",
            environment: env.name,
            report,
        },
        0,
    ))
}
