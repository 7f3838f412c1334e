use clap::Args;
use serde::Serialize;

use liftoff::setup::{self, SetupResult};

use super::CmdResult;

#[derive(Args)]
pub struct SetupArgs {}

#[derive(Serialize)]
pub struct SetupOutput {
    pub command: &'static str,
    #[serde(flatten)]
    pub result: SetupResult,
}

pub fn run(_args: SetupArgs, global: &crate::commands::GlobalArgs) -> CmdResult<SetupOutput> {
    let (env, transport) = global.connect()?;
    let result = setup::setup(&env, &transport)?;

    Ok((
        SetupOutput {
            command: "setup",
            result,
        },
        0,
    ))
}
