//! Deployment pipeline state machine.
//!
//! ```text
//! Init -> ArtifactFetched -> DependenciesInstalled -> SiteConfigured
//!      -> Activated -> SchemaMigrated -> ServicesReloaded -> Done
//! ```
//!
//! Any step failure moves the pipeline to `Failed` and the remaining steps
//! never run. Progress lives in memory only.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    ArtifactFetched,
    DependenciesInstalled,
    SiteConfigured,
    Activated,
    SchemaMigrated,
    ServicesReloaded,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    FetchArtifact,
    InstallDependencies,
    InstallSite,
    Activate,
    MigrateSchema,
    ReloadServices,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::FetchArtifact,
        Step::InstallDependencies,
        Step::InstallSite,
        Step::Activate,
        Step::MigrateSchema,
        Step::ReloadServices,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::FetchArtifact => "fetch_artifact",
            Step::InstallDependencies => "install_dependencies",
            Step::InstallSite => "install_site",
            Step::Activate => "activate",
            Step::MigrateSchema => "migrate_schema",
            Step::ReloadServices => "reload_services",
        }
    }
}

/// Transition table: the step that leaves `stage`, and where it lands.
pub fn transition(stage: Stage) -> Option<(Step, Stage)> {
    match stage {
        Stage::Init => Some((Step::FetchArtifact, Stage::ArtifactFetched)),
        Stage::ArtifactFetched => Some((Step::InstallDependencies, Stage::DependenciesInstalled)),
        Stage::DependenciesInstalled => Some((Step::InstallSite, Stage::SiteConfigured)),
        Stage::SiteConfigured => Some((Step::Activate, Stage::Activated)),
        Stage::Activated => Some((Step::MigrateSchema, Stage::SchemaMigrated)),
        Stage::SchemaMigrated => Some((Step::ReloadServices, Stage::ServicesReloaded)),
        Stage::ServicesReloaded | Stage::Done | Stage::Failed => None,
    }
}

/// Side effects behind each step.
pub trait StepExecutor {
    fn execute_step(&mut self, step: Step) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub stage: Stage,
    pub completed: Vec<Step>,
}

#[derive(Debug)]
pub struct Pipeline {
    stage: Stage,
    completed: Vec<Step>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stage: Stage::Init,
            completed: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn last_completed(&self) -> Option<Step> {
        self.completed.last().copied()
    }

    /// Drive every step in order. The first failure aborts the run.
    pub fn run(&mut self, executor: &mut dyn StepExecutor) -> Result<PipelineReport> {
        if self.stage == Stage::Failed {
            return Err(Error::internal_unexpected(
                "pipeline already failed; start a new run",
            ));
        }

        while let Some((step, next)) = transition(self.stage) {
            log_status!("deploy", "Step {}", step.name());

            if let Err(cause) = executor.execute_step(step) {
                self.stage = Stage::Failed;
                let completed = self.completed.iter().map(|s| s.name().to_string()).collect();
                return Err(Error::pipeline_step_failed(step.name(), completed, cause));
            }

            self.completed.push(step);
            self.stage = next;
        }

        if self.stage == Stage::ServicesReloaded {
            self.stage = Stage::Done;
        }

        Ok(PipelineReport {
            stage: self.stage,
            completed: self.completed.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        fail_at: Option<Step>,
        executed: Vec<Step>,
    }

    impl StepExecutor for Scripted {
        fn execute_step(&mut self, step: Step) -> Result<()> {
            self.executed.push(step);
            if self.fail_at == Some(step) {
                return Err(Error::internal_unexpected(format!("{} exploded", step.name())));
            }
            Ok(())
        }
    }

    #[test]
    fn runs_every_step_in_order() {
        let mut executor = Scripted {
            fail_at: None,
            executed: Vec::new(),
        };
        let mut pipeline = Pipeline::new();
        let report = pipeline.run(&mut executor).unwrap();

        assert_eq!(executor.executed, Step::ALL.to_vec());
        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.completed, Step::ALL.to_vec());
        assert!(pipeline.stage().is_terminal());
    }

    #[test]
    fn failure_at_each_step_stops_the_rest() {
        for (k, failing) in Step::ALL.iter().enumerate() {
            let mut executor = Scripted {
                fail_at: Some(*failing),
                executed: Vec::new(),
            };
            let mut pipeline = Pipeline::new();
            let err = pipeline.run(&mut executor).unwrap_err();

            assert_eq!(executor.executed, Step::ALL[..=k].to_vec());
            assert_eq!(err.failed_step(), Some(failing.name()));
            assert_eq!(
                err.details["cause"]["details"]["error"],
                format!("{} exploded", failing.name())
            );
            assert_eq!(pipeline.stage(), Stage::Failed);
            assert_eq!(pipeline.last_completed(), k.checked_sub(1).map(|i| Step::ALL[i]));
        }
    }

    #[test]
    fn transition_table_covers_every_step_once() {
        let mut stage = Stage::Init;
        let mut steps = Vec::new();
        while let Some((step, next)) = transition(stage) {
            steps.push(step);
            stage = next;
        }
        assert_eq!(steps, Step::ALL.to_vec());
        assert_eq!(stage, Stage::ServicesReloaded);
        assert!(transition(Stage::Failed).is_none());
    }

    #[test]
    fn finished_pipeline_does_not_rerun() {
        let mut executor = Scripted {
            fail_at: None,
            executed: Vec::new(),
        };
        let mut pipeline = Pipeline::new();
        pipeline.run(&mut executor).unwrap();
        pipeline.run(&mut executor).unwrap();
        assert_eq!(executor.executed.len(), Step::ALL.len());
    }
}
