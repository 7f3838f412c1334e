use clap::Args;
use serde::Serialize;

use liftoff::deploy::{self, HostPointers};

use super::CmdResult;

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub command: &'static str,
    pub environment: String,
    pub path: String,
    pub hosts: Vec<HostPointers>,
    /// Hosts whose `current` differs from the first host's.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diverged: Vec<String>,
}

pub fn run(_args: StatusArgs, global: &crate::commands::GlobalArgs) -> CmdResult<StatusOutput> {
    let (env, transport) = global.connect()?;
    let hosts = deploy::status(&env, &transport)?;

    let diverged = match hosts.first() {
        Some(first) => hosts
            .iter()
            .filter(|h| h.pointers.current != first.pointers.current)
            .map(|h| h.host.clone())
            .collect(),
        None => Vec::new(),
    };

    Ok((
        StatusOutput {
            command: "status",
            environment: env.name,
            path: env.path,
            hosts,
            diverged,
        },
        0,
    ))
}
