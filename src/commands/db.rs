use clap::Args;
use serde::Serialize;

use liftoff::db::{self, ImportReport};
use liftoff::release::ReleaseId;

use super::CmdResult;

#[derive(Args)]
pub struct DbArgs {
    /// Release whose dump to import (defaults to the current release)
    #[arg(long)]
    pub release: Option<String>,
}

#[derive(Serialize)]
pub struct DbOutput {
    pub command: &'static str,
    pub environment: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

pub fn run(args: DbArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DbOutput> {
    let release = args.release.as_deref().map(ReleaseId::parse).transpose()?;
    let (env, transport) = global.connect()?;

    let report = db::deploy_database(&env, &transport, release).map_err(|e| {
        if e.code == liftoff::ErrorCode::ReleaseNotGenerated {
            e.with_hint("Pass --release <id>, or run 'liftoff deploy-site' first")
        } else {
            e
        }
    })?;

    Ok((
        DbOutput {
            command: "deploy_database",
            environment: env.name,
            report,
        },
        0,
    ))
}
