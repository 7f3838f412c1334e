//! Site teardown.
//!
//! Cleanup must make as much progress as it can: every sub-step is attempted
//! even when earlier ones fail, and the failures come back as warnings rather
//! than aborting the run.

use serde::Serialize;

use crate::db;
use crate::deploy::{
    nginx_available_file, nginx_enabled_file, supervisor_include_line, supervisor_program_file,
};
use crate::environment::Environment;
use crate::ops::RemoteOp;
use crate::release::ReleaseLayout;
use crate::runner::{FailureMode, Invocation, OpOutcome, Runner};
use crate::transport::Transport;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub attempted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResult {
    pub environment: String,
    pub summary: CleanupSummary,
    pub outcomes: Vec<OpOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Teardown sequence, in execution order.
pub fn plan(env: &Environment) -> Vec<Invocation> {
    let layout = ReleaseLayout::new(&env.path);

    vec![
        Invocation::user(db::manage_op(env, &layout, &["flush", "--noinput"])),
        Invocation::elevated(RemoteOp::Remove {
            path: nginx_available_file(env),
        }),
        Invocation::elevated(RemoteOp::Remove {
            path: nginx_enabled_file(env),
        }),
        Invocation::elevated(RemoteOp::Remove {
            path: supervisor_program_file(env),
        }),
        Invocation::elevated(RemoteOp::RemoveLine {
            file: env.web.supervisor_conf.clone(),
            line: supervisor_include_line(env),
        }),
        Invocation::user(RemoteOp::UninstallRequirements {
            pip: layout.bin("pip"),
            requirements: format!("{}/current/dependencies.txt", layout.releases()),
        }),
        Invocation::elevated(RemoteOp::RemoveTree {
            path: layout.packages(),
        }),
        Invocation::elevated(RemoteOp::RemoveTree {
            path: layout.releases(),
        }),
        Invocation::elevated(RemoteOp::RemoveTree {
            path: layout.other(),
        }),
    ]
}

/// Remove everything the deployment installed on every host.
pub fn cleanup(env: &Environment, transport: &dyn Transport) -> Result<CleanupResult> {
    env.require()?;
    let runner = Runner::new(env, transport)?;

    let report = runner.run_batch(&plan(env), FailureMode::BestEffort)?;

    let warnings: Vec<String> = report
        .outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| {
            let reason = if o.stderr.is_empty() {
                format!("exit code {}", o.exit_code)
            } else {
                o.stderr.clone()
            };
            format!("{}: {} failed: {}", o.host, o.op, reason)
        })
        .collect();

    for warning in &warnings {
        log_status!("cleanup", "warning: {}", warning);
    }

    Ok(CleanupResult {
        environment: env.name.clone(),
        summary: CleanupSummary {
            attempted: report.outcomes.len(),
            failed: warnings.len(),
        },
        outcomes: report.outcomes,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        crate::environment::from_json(
            "production",
            r#"{
                "hosts": ["web1"],
                "path": "/srv/app",
                "user": "deploy",
                "wwwUser": "www",
                "project": { "name": "site", "domain": "example.com" }
            }"#,
            "inline",
        )
        .unwrap()
    }

    #[test]
    fn plan_runs_flush_first_and_tree_removal_last() {
        let plan = plan(&env());
        let labels: Vec<&str> = plan.iter().map(|i| i.op.label()).collect();
        assert_eq!(
            labels,
            vec![
                "manage_py",
                "remove",
                "remove",
                "remove",
                "remove_line",
                "uninstall_requirements",
                "remove_tree",
                "remove_tree",
                "remove_tree",
            ]
        );
        assert!(plan[0].op.render().ends_with("manage.py flush --noinput"));
        assert_eq!(
            plan[8].op,
            RemoteOp::RemoveTree {
                path: "/srv/app/other".to_string()
            }
        );
    }

    #[test]
    fn include_line_matches_install() {
        let env = env();
        let plan = plan(&env);
        assert_eq!(
            plan[4].op,
            RemoteOp::RemoveLine {
                file: "/usr/local/etc/supervisord.conf".to_string(),
                line: "include \"/usr/local/etc/supervisor/example.com.conf\"".to_string(),
            }
        );
    }
}
