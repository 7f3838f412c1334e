mod common;

use common::{env, env_with_hosts, id, FakeTransport, ROOT};
use liftoff::cleanup;
use liftoff::deploy::{self, DeployConfig};
use liftoff::setup;

#[test]
fn cleanup_removes_everything_deployed() {
    let transport = FakeTransport::new();
    setup::setup(&env(), &transport).unwrap();
    deploy::deploy_site(&env(), &transport, id("20240101120000"), &DeployConfig::default())
        .unwrap();

    let result = cleanup::cleanup(&env(), &transport).unwrap();
    assert_eq!(result.summary.failed, 0);
    assert!(result.warnings.is_empty());

    transport.state("web1", |host| {
        assert!(!host.dirs.iter().any(|d| d.starts_with(&format!("{}/releases", ROOT))));
        assert!(!host.dirs.iter().any(|d| d.starts_with(&format!("{}/packages", ROOT))));
        assert!(host
            .link("/usr/local/etc/nginx/sites-enabled/example.com")
            .is_none());
        assert!(host.lines["/usr/local/etc/supervisord.conf"].is_empty());
    });
}

#[test]
fn every_step_runs_when_any_single_step_fails() {
    let steps = cleanup::plan(&env());

    for (j, failing) in steps.iter().enumerate() {
        let failing_op = failing.op.clone();
        let transport = FakeTransport::failing(move |_, op| *op == failing_op);

        let result = cleanup::cleanup(&env(), &transport).unwrap();

        let attempted: Vec<_> = transport.calls.borrow().iter().map(|c| c.op.clone()).collect();
        let planned: Vec<_> = steps.iter().map(|s| s.op.clone()).collect();
        assert_eq!(attempted, planned, "step {} aborted the sequence", j);
        assert!(result.summary.failed >= 1);
        assert_eq!(result.summary.attempted, steps.len());
        assert!(!result.warnings.is_empty());
    }
}

#[test]
fn cleanup_on_a_bare_host_only_warns() {
    // Nothing was ever deployed: flush and uninstall fail, the rest still runs.
    let transport = FakeTransport::new();
    let result = cleanup::cleanup(&env(), &transport).unwrap();

    assert_eq!(result.summary.attempted, cleanup::plan(&env()).len());
    assert_eq!(result.summary.failed, 2);
    assert!(result.warnings[0].starts_with("web1: manage_py failed"));
}

#[test]
fn cleanup_covers_every_host() {
    let env = env_with_hosts(&["web1", "web2"]);
    let transport = FakeTransport::new();
    let result = cleanup::cleanup(&env, &transport).unwrap();

    assert_eq!(result.summary.attempted, 2 * cleanup::plan(&env).len());
}
