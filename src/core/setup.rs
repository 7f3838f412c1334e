use serde::Serialize;

use crate::environment::Environment;
use crate::ops::RemoteOp;
use crate::release::ReleaseLayout;
use crate::runner::{BatchReport, FailureMode, Invocation, Runner};
use crate::transport::Transport;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct SetupResult {
    pub environment: String,
    pub path: String,
    pub report: BatchReport,
}

/// Provisioning sequence, in execution order.
pub fn plan(env: &Environment) -> Vec<Invocation> {
    let layout = ReleaseLayout::new(&env.path);

    vec![
        Invocation::elevated(RemoteOp::EnsureDir {
            path: layout.root().to_string(),
        }),
        Invocation::elevated(RemoteOp::CreateVirtualenv {
            python: env.python.clone(),
            path: layout.root().to_string(),
        }),
        Invocation::elevated(RemoteOp::Chown {
            owner: env.user.clone(),
            path: layout.root().to_string(),
        }),
        Invocation::user(RemoteOp::EnsureDir {
            path: layout.releases(),
        }),
        Invocation::user(RemoteOp::EnsureDir {
            path: layout.packages(),
        }),
    ]
}

/// Prepare a fresh host for deployments. No release pointer is created.
pub fn setup(env: &Environment, transport: &dyn Transport) -> Result<SetupResult> {
    env.require()?;
    let runner = Runner::new(env, transport)?;

    log_status!("setup", "Provisioning {} on {} host(s)", env.path, runner.hosts().len());
    let report = runner.run_batch(&plan(env), FailureMode::Strict)?;

    Ok(SetupResult {
        environment: env.name.clone(),
        path: env.path.clone(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Privilege;

    #[test]
    fn plan_provisions_base_then_release_dirs_as_user() {
        let env = crate::environment::from_json(
            "production",
            r#"{ "hosts": ["web1"], "path": "/srv/app/", "user": "deploy" }"#,
            "inline",
        )
        .unwrap();
        let plan = plan(&env);

        let privileges: Vec<Privilege> = plan.iter().map(|i| i.privilege).collect();
        assert_eq!(
            privileges,
            vec![
                Privilege::Elevated,
                Privilege::Elevated,
                Privilege::Elevated,
                Privilege::User,
                Privilege::User,
            ]
        );
        assert_eq!(plan[1].op.render(), "python3 -m venv '/srv/app'");
        assert_eq!(plan[2].op.render(), "chown -R deploy:deploy '/srv/app'");
        assert_eq!(
            plan[4].op,
            RemoteOp::EnsureDir {
                path: "/srv/app/packages".to_string()
            }
        );
    }
}
