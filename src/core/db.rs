use serde::Serialize;

use crate::deploy::current_release;
use crate::environment::Environment;
use crate::ops::RemoteOp;
use crate::release::{ReleaseId, ReleaseLayout};
use crate::runner::Runner;
use crate::transport::Transport;
use crate::{Error, Result};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub release: ReleaseId,
    pub database: String,
    pub hostname: String,
    pub dump: String,
    pub hosts: Vec<String>,
}

/// `manage.py` invocation against the live release, using the virtualenv.
pub fn manage_op(env: &Environment, layout: &ReleaseLayout, args: &[&str]) -> RemoteOp {
    RemoteOp::ManagePy {
        python: layout.bin("python"),
        project_dir: layout.current_project(&env.project.name),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}

pub fn migrate_op(env: &Environment, layout: &ReleaseLayout) -> RemoteOp {
    manage_op(env, layout, &["migrate", "--noinput"])
}

/// Load the dump shipped with `release` into the configured database, then
/// delete the dump from every host.
pub fn import_dump(
    env: &Environment,
    runner: &Runner,
    layout: &ReleaseLayout,
    release: &ReleaseId,
) -> Result<ImportReport> {
    let db = env.require_database()?;
    let dump = layout.release_dump(release, &db.file);

    log_status!("db", "Importing {} into {}@{}", dump, db.name, db.hostname);
    runner.run_as_user(RemoteOp::ImportSql {
        hostname: db.hostname.clone(),
        username: db.username.clone(),
        password: db.password.clone(),
        database: db.name.clone(),
        dump: dump.clone(),
    })?;

    // Release trees belong to the www user after install.
    runner.run_elevated(RemoteOp::Remove { path: dump.clone() })?;

    Ok(ImportReport {
        release: release.clone(),
        database: db.name.clone(),
        hostname: db.hostname.clone(),
        dump,
        hosts: runner.hosts().iter().map(|h| h.to_string()).collect(),
    })
}

/// Import a release's SQL dump.
///
/// Without an explicit `release`, the release `current` points at on the first
/// host is used.
pub fn deploy_database(
    env: &Environment,
    transport: &dyn Transport,
    release: Option<ReleaseId>,
) -> Result<ImportReport> {
    env.require()?;
    env.require_database()?;

    let runner = Runner::new(env, transport)?;
    let layout = ReleaseLayout::new(&env.path);

    let release = match release {
        Some(release) => release,
        None => current_release(&runner, &layout)?.ok_or_else(Error::release_not_generated)?,
    };

    import_dump(env, &runner, &layout, &release)
}
