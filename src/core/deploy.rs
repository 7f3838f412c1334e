use serde::Serialize;
use std::path::PathBuf;

use crate::db::{self, ImportReport};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::ops::{LocalOp, RemoteOp};
use crate::pipeline::{Pipeline, PipelineReport, Step, StepExecutor};
use crate::release::{ReleaseId, ReleaseLayout, Slot};
use crate::runner::Runner;
use crate::tracker::{self, PointerSet, RemotePointerStore};
use crate::transport::Transport;

/// Pointer state of one host after an operation.
#[derive(Debug, Clone, Serialize)]
pub struct HostPointers {
    pub host: String,
    #[serde(flatten)]
    pub pointers: PointerSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub release: ReleaseId,
    pub pipeline: PipelineReport,
    pub hosts: Vec<HostPointers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ImportReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub release: Option<ReleaseId>,
    pub hosts: Vec<HostPointers>,
}

/// Options for a full site deployment.
#[derive(Debug, Clone, Default)]
pub struct DeployConfig {
    /// Import the release's SQL dump after the pipeline finishes.
    pub import_database: bool,
}

/// Include line the supervisor main config carries for this site.
pub fn supervisor_include_line(env: &Environment) -> String {
    format!("include \"{}\"", supervisor_program_file(env))
}

pub fn supervisor_program_file(env: &Environment) -> String {
    format!("{}/{}.conf", env.web.supervisor_dir, env.project.domain)
}

pub fn nginx_available_file(env: &Environment) -> String {
    format!("{}/{}", env.web.sites_available, env.project.domain)
}

pub fn nginx_enabled_file(env: &Environment) -> String {
    format!("{}/{}", env.web.sites_enabled, env.project.domain)
}

/// Executes the deployment pipeline steps for one release.
pub struct SiteDeployer<'r, 'a> {
    env: &'r Environment,
    runner: &'r Runner<'a>,
    layout: ReleaseLayout,
    release: ReleaseId,
}

impl<'r, 'a> SiteDeployer<'r, 'a> {
    pub fn new(env: &'r Environment, runner: &'r Runner<'a>, release: ReleaseId) -> Self {
        Self {
            env,
            runner,
            layout: ReleaseLayout::new(&env.path),
            release,
        }
    }

    fn local_archive(&self) -> PathBuf {
        std::env::temp_dir().join(ReleaseLayout::archive_name(&self.release))
    }

    fn fetch_artifact(&self) -> Result<()> {
        let archive = self.local_archive();
        let archive_str = archive.to_string_lossy().to_string();

        self.runner.local(&LocalOp::GitArchive {
            repo: self.env.project.directory.clone(),
            reference: self.env.project.git_ref.clone(),
            output: archive_str.clone(),
        })?;

        let remote = self.upload_and_extract(&archive);

        // The local archive goes away whether or not the remote side worked.
        let removed = self
            .runner
            .local(&LocalOp::RemoveFile { path: archive_str });

        remote.and(removed.map(|_| ()))
    }

    fn upload_and_extract(&self, archive: &std::path::Path) -> Result<()> {
        let release_dir = self.layout.release_dir(&self.release);
        let package = self.layout.package(&self.release);

        // Plain mkdir: an existing directory means the id is not unique.
        self.runner.run_as_user(RemoteOp::MakeDir {
            path: release_dir.clone(),
        })?;
        self.runner.upload(archive, &package)?;
        self.runner.run_as_user(RemoteOp::Extract {
            archive: package,
            dest: release_dir,
        })
    }

    fn install_dependencies(&self) -> Result<()> {
        self.runner.run_as_user(RemoteOp::InstallRequirements {
            pip: self.layout.bin("pip"),
            requirements: format!(
                "{}/dependencies.txt",
                self.layout.release_other(&self.release)
            ),
        })
    }

    fn install_site(&self) -> Result<()> {
        let project = &self.env.project.name;
        let release_dir = self.layout.release_dir(&self.release);
        let other = self.layout.release_other(&self.release);

        self.runner.run_as_user(RemoteOp::Move {
            from: format!("{}/dependencies.txt", other),
            to: format!("{}/dependencies.txt", release_dir),
        })?;
        self.runner.run_as_user(RemoteOp::Move {
            from: format!("{}/{}.wsgi", other, project),
            to: format!("{}/{}/{}.wsgi", release_dir, project, project),
        })?;

        // nginx virtual host
        self.runner.run_elevated(RemoteOp::Copy {
            from: format!("{}/{}.nginx", other, project),
            to: nginx_available_file(self.env),
        })?;
        self.runner.run_elevated(RemoteOp::Link {
            target: nginx_available_file(self.env),
            link: nginx_enabled_file(self.env),
        })?;

        // supervisor program
        self.runner.run_elevated(RemoteOp::Copy {
            from: format!("{}/{}.supervisor", other, project),
            to: supervisor_program_file(self.env),
        })?;
        self.runner.run_elevated(RemoteOp::AppendLine {
            file: self.env.web.supervisor_conf.clone(),
            line: supervisor_include_line(self.env),
        })?;

        self.runner.run_as_user(RemoteOp::Move {
            from: format!("{}/settings.py", other),
            to: format!("{}/{}/settings.py", release_dir, project),
        })?;

        if let Some(dump) = self.env.dump_file() {
            self.runner.run_as_user(RemoteOp::MoveIfPresent {
                from: format!("{}/{}", other, dump),
                to: self.layout.release_dump(&self.release, dump),
            })?;
        }

        self.runner.run_as_user(RemoteOp::RemoveTree { path: other })?;
        self.runner.run_elevated(RemoteOp::Chown {
            owner: self.env.www_user.clone(),
            path: release_dir,
        })
    }

    fn activate(&self) -> Result<()> {
        for host in self.runner.hosts() {
            let store = RemotePointerStore::new(self.runner, host, &self.layout);
            let pointers = tracker::activate(&store, &self.release)?;
            log_status!(
                "deploy",
                "{}: current -> {}, previous -> {}",
                host,
                self.release,
                describe(pointers.previous.as_ref())
            );
        }
        Ok(())
    }

    fn migrate_schema(&self) -> Result<()> {
        self.runner.run_as_user(db::migrate_op(self.env, &self.layout))
    }

    fn reload_services(&self) -> Result<()> {
        reload_web(self.env, self.runner)?;
        self.runner.run_elevated(RemoteOp::ReloadService {
            script: self.env.web.app_reload.clone(),
        })
    }
}

impl StepExecutor for SiteDeployer<'_, '_> {
    fn execute_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::FetchArtifact => self.fetch_artifact(),
            Step::InstallDependencies => self.install_dependencies(),
            Step::InstallSite => self.install_site(),
            Step::Activate => self.activate(),
            Step::MigrateSchema => self.migrate_schema(),
            Step::ReloadServices => self.reload_services(),
        }
    }
}

fn describe(release: Option<&ReleaseId>) -> String {
    release.map_or_else(|| "(none)".to_string(), |r| r.to_string())
}

fn reload_web(env: &Environment, runner: &Runner) -> Result<()> {
    runner.run_elevated(RemoteOp::ReloadService {
        script: env.web.web_reload.clone(),
    })
}

fn host_pointers(runner: &Runner, layout: &ReleaseLayout) -> Result<Vec<HostPointers>> {
    runner
        .hosts()
        .iter()
        .map(|host| {
            let store = RemotePointerStore::new(runner, host, layout);
            Ok(HostPointers {
                host: host.to_string(),
                pointers: tracker::pointers(&store)?,
            })
        })
        .collect()
}

/// Deploy `release` through the full pipeline.
pub fn deploy_site(
    env: &Environment,
    transport: &dyn Transport,
    release: ReleaseId,
    config: &DeployConfig,
) -> Result<DeployReport> {
    env.require()?;
    env.require_local_project()?;
    if config.import_database {
        env.require_database()?;
    }

    let runner = Runner::new(env, transport)?;
    log_status!(
        "deploy",
        "Deploying release {} to {} host(s)",
        release,
        runner.hosts().len()
    );

    let mut deployer = SiteDeployer::new(env, &runner, release.clone());
    let report = Pipeline::new().run(&mut deployer)?;

    let layout = ReleaseLayout::new(&env.path);
    let database = if config.import_database {
        Some(db::import_dump(env, &runner, &layout, &release)?)
    } else {
        None
    };

    Ok(DeployReport {
        hosts: host_pointers(&runner, &layout)?,
        release,
        pipeline: report,
        database,
    })
}

/// Make an existing release live on every host.
///
/// The release must exist on all hosts before any pointer changes anywhere.
pub fn deploy_release(
    env: &Environment,
    transport: &dyn Transport,
    release: &ReleaseId,
) -> Result<SwitchReport> {
    env.require()?;
    let runner = Runner::new(env, transport)?;
    let layout = ReleaseLayout::new(&env.path);

    for host in runner.hosts() {
        let store = RemotePointerStore::new(&runner, host, &layout);
        if !tracker::PointerStore::release_exists(&store, release)? {
            return Err(Error::release_not_found(
                release.as_str(),
                host.to_string(),
                layout.release_dir(release),
            ));
        }
    }

    for host in runner.hosts() {
        let store = RemotePointerStore::new(&runner, host, &layout);
        tracker::activate(&store, release)?;
    }

    reload_web(env, &runner)?;

    Ok(SwitchReport {
        release: Some(release.clone()),
        hosts: host_pointers(&runner, &layout)?,
    })
}

/// Swap `current` and `previous` on every host.
///
/// Every host must have both pointers before any of them is rotated.
pub fn rollback(env: &Environment, transport: &dyn Transport) -> Result<SwitchReport> {
    env.require()?;
    let runner = Runner::new(env, transport)?;
    let layout = ReleaseLayout::new(&env.path);

    let before = host_pointers(&runner, &layout)?;
    if let Some(incomplete) = before
        .iter()
        .find(|h| h.pointers.current.is_none() || h.pointers.previous.is_none())
    {
        return Err(Error::release_no_previous(incomplete.host.clone()));
    }

    let mut release = None;
    for host in runner.hosts() {
        let store = RemotePointerStore::new(&runner, host, &layout);
        let pointers = tracker::rollback(&store)?;
        log_status!(
            "rollback",
            "{}: current -> {}, previous -> {}",
            host,
            describe(pointers.current.as_ref()),
            describe(pointers.previous.as_ref())
        );
        release = pointers.current;
    }

    reload_web(env, &runner)?;

    Ok(SwitchReport {
        release,
        hosts: host_pointers(&runner, &layout)?,
    })
}

/// Read the pointer set on every host.
pub fn status(env: &Environment, transport: &dyn Transport) -> Result<Vec<HostPointers>> {
    env.require()?;
    let runner = Runner::new(env, transport)?;
    host_pointers(&runner, &ReleaseLayout::new(&env.path))
}

/// Current release on the first host, if any.
pub fn current_release(runner: &Runner, layout: &ReleaseLayout) -> Result<Option<ReleaseId>> {
    let Some(host) = runner.hosts().first() else {
        return Ok(None);
    };
    let store = RemotePointerStore::new(runner, host, layout);
    tracker::PointerStore::read(&store, Slot::Current)
}
