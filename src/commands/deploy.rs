use clap::Args;
use serde::Serialize;

use liftoff::deploy::{self, DeployConfig, DeployReport, SwitchReport};
use liftoff::release::ReleaseId;

use super::CmdResult;

#[derive(Args)]
pub struct DeploySiteArgs {
    /// Import the release's SQL dump once the site is live
    #[arg(long)]
    pub import_database: bool,
}

#[derive(Args)]
pub struct DeployReleaseArgs {
    /// Release ID to make current (a directory under releases/)
    pub release_id: String,
}

#[derive(Serialize)]
pub struct DeploySiteOutput {
    pub command: &'static str,
    pub environment: String,
    #[serde(flatten)]
    pub report: DeployReport,
}

#[derive(Serialize)]
pub struct DeployReleaseOutput {
    pub command: &'static str,
    pub environment: String,
    #[serde(flatten)]
    pub report: SwitchReport,
}

pub fn run_site(
    args: DeploySiteArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<DeploySiteOutput> {
    let (env, transport) = global.connect()?;
    let config = DeployConfig {
        import_database: args.import_database,
    };

    let report = deploy::deploy_site(&env, &transport, ReleaseId::generate(), &config)?;

    Ok((
        DeploySiteOutput {
            command: "deploy_site",
            environment: env.name,
            report,
        },
        0,
    ))
}

pub fn run_release(
    args: DeployReleaseArgs,
    global: &crate::commands::GlobalArgs,
) -> CmdResult<DeployReleaseOutput> {
    let release = ReleaseId::parse(&args.release_id)?;
    let (env, transport) = global.connect()?;

    let report = deploy::deploy_release(&env, &transport, &release).map_err(|e| {
        if e.code == liftoff::ErrorCode::ReleaseNotFound {
            e.with_hint("Run 'liftoff status' to see the releases current and previous point at")
        } else {
            e
        }
    })?;

    Ok((
        DeployReleaseOutput {
            command: "deploy_release",
            environment: env.name,
            report,
        },
        0,
    ))
}
