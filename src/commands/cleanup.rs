use clap::Args;
use serde::Serialize;

use liftoff::cleanup::{self, CleanupResult};

use super::CmdResult;

#[derive(Args)]
pub struct CleanupArgs {}

#[derive(Serialize)]
pub struct CleanupOutput {
    pub command: &'static str,
    #[serde(flatten)]
    pub result: CleanupResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

pub fn run(_args: CleanupArgs, global: &crate::commands::GlobalArgs) -> CmdResult<CleanupOutput> {
    let (env, transport) = global.connect()?;
    let result = cleanup::cleanup(&env, &transport)?;

    let mut hints = Vec::new();
    if result.summary.failed > 0 {
        hints.push(format!(
            "{} of {} cleanup step(s) failed; leftovers may need manual removal.",
            result.summary.failed, result.summary.attempted
        ));
    }

    // Partial teardown is still a completed cleanup.
    Ok((
        CleanupOutput {
            command: "cleanup",
            result,
            hints,
        },
        0,
    ))
}
