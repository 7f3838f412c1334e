//! In-memory hosts for driving whole deployments without SSH.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use liftoff::environment::{self, Environment, Host};
use liftoff::ops::{LocalOp, RemoteOp};
use liftoff::release::ReleaseId;
use liftoff::ssh::CommandOutput;
use liftoff::transport::{Privilege, Transport};

pub const ROOT: &str = "/srv/app";

/// Files every release archive unpacks, relative to the release directory.
pub const ARTIFACT: &[&str] = &[
    "other/dependencies.txt",
    "other/site.wsgi",
    "other/site.nginx",
    "other/site.supervisor",
    "other/settings.py",
    "other/db.sql",
    "site/manage.py",
    "site/urls.py",
];

pub fn env_with_hosts(hosts: &[&str]) -> Environment {
    let hosts = hosts
        .iter()
        .map(|h| format!("\"{}\"", h))
        .collect::<Vec<_>>()
        .join(", ");
    let json = format!(
        r#"{{
            "hosts": [{hosts}],
            "path": "{ROOT}",
            "user": "deploy",
            "wwwUser": "www",
            "project": {{ "name": "site", "domain": "example.com", "directory": "/home/dev/site" }},
            "database": {{ "hostname": "db.internal", "username": "site", "password": "hunter2", "name": "site", "file": "db.sql" }}
        }}"#
    );
    environment::from_json("test", &json, "inline").unwrap()
}

pub fn env() -> Environment {
    env_with_hosts(&["web1"])
}

pub fn id(value: &str) -> ReleaseId {
    ReleaseId::parse(value).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub host: String,
    pub op: RemoteOp,
    pub privilege: Privilege,
}

#[derive(Default)]
pub struct HostState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeSet<String>,
    pub links: BTreeMap<String, String>,
    pub lines: BTreeMap<String, Vec<String>>,
}

impl HostState {
    fn add_file(&mut self, path: &str) {
        let mut parent = parent_of(path);
        while let Some(dir) = parent {
            self.dirs.insert(dir.to_string());
            parent = parent_of(dir);
        }
        self.files.insert(path.to_string());
    }

    /// Resolve symlinked path components against their targets.
    fn resolve(&self, path: &str) -> String {
        for (link, target) in &self.links {
            if path == link || path.starts_with(&format!("{}/", link)) {
                let base = match parent_of(link) {
                    Some(parent) if !target.starts_with('/') => format!("{}/{}", parent, target),
                    _ => target.clone(),
                };
                return format!("{}{}", base, &path[link.len()..]);
            }
        }
        path.to_string()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(&self.resolve(path))
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.contains(&self.resolve(path))
    }

    fn remove_tree(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        let keep = |p: &String| p != path && !p.starts_with(&prefix);
        self.dirs.retain(keep);
        self.files.retain(keep);
        self.links.retain(|p, _| keep(p));
    }

    pub fn link(&self, path: &str) -> Option<&str> {
        self.links.get(path).map(String::as_str)
    }

    pub fn pointer(&self, slot: &str) -> Option<&str> {
        self.link(&format!("{}/releases/{}", ROOT, slot))
    }
}

fn parent_of(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

/// Transport backed by in-memory hosts that interpret every [`RemoteOp`].
#[derive(Default)]
pub struct FakeTransport {
    pub hosts: RefCell<HashMap<String, HostState>>,
    pub calls: RefCell<Vec<Call>>,
    pub local_calls: RefCell<Vec<LocalOp>>,
    /// Ops matching this predicate fail with exit 1 instead of running.
    fail_when: Option<Box<dyn Fn(&str, &RemoteOp) -> bool>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(predicate: impl Fn(&str, &RemoteOp) -> bool + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Default::default()
        }
    }

    pub fn state<R>(&self, host: &str, f: impl FnOnce(&HostState) -> R) -> R {
        let mut hosts = self.hosts.borrow_mut();
        f(hosts.entry(host.to_string()).or_default())
    }

    pub fn with_state(&self, host: &str, f: impl FnOnce(&mut HostState)) {
        let mut hosts = self.hosts.borrow_mut();
        f(hosts.entry(host.to_string()).or_default());
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|c| c.op.label()).collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.labels().iter().filter(|l| **l == label).count()
    }

    pub fn reloads(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match &c.op {
                RemoteOp::ReloadService { script } => Some(script.clone()),
                _ => None,
            })
            .collect()
    }

    fn apply(state: &mut HostState, op: &RemoteOp) -> CommandOutput {
        let missing = |path: &str| CommandOutput::failed(1, format!("{}: No such file or directory", path));

        match op {
            RemoteOp::EnsureDir { path } => {
                state.dirs.insert(path.clone());
            }
            RemoteOp::MakeDir { path } => {
                if !state.dirs.insert(path.clone()) {
                    return CommandOutput::failed(1, format!("mkdir: {}: File exists", path));
                }
            }
            RemoteOp::DirExists { path } => {
                let answer = if state.is_dir(path) { "present" } else { "absent" };
                return CommandOutput::ok(format!("{}\n", answer));
            }
            RemoteOp::CreateVirtualenv { path, .. } => {
                state.add_file(&format!("{}/bin/python", path));
                state.add_file(&format!("{}/bin/pip", path));
            }
            RemoteOp::Chown { path, .. } => {
                if !state.is_dir(path) {
                    return missing(path);
                }
            }
            RemoteOp::Extract { archive, dest } => {
                if !state.files.contains(archive) {
                    return missing(archive);
                }
                for file in ARTIFACT {
                    state.add_file(&format!("{}/{}", dest, file));
                }
            }
            RemoteOp::InstallRequirements { requirements, .. }
            | RemoteOp::UninstallRequirements { requirements, .. } => {
                if !state.is_file(requirements) {
                    return missing(requirements);
                }
            }
            RemoteOp::Move { from, to } => {
                if !state.files.remove(from) {
                    return missing(from);
                }
                state.add_file(to);
            }
            RemoteOp::MoveIfPresent { from, to } => {
                if state.files.remove(from) {
                    state.add_file(to);
                }
            }
            RemoteOp::Copy { from, to } => {
                if !state.files.contains(from) {
                    return missing(from);
                }
                state.add_file(to);
            }
            RemoteOp::Link { target, link } => {
                state.links.insert(link.clone(), target.clone());
            }
            RemoteOp::AtomicLink { target, link, .. } => {
                state.links.insert(link.clone(), target.clone());
            }
            RemoteOp::Rename { from, to, .. } => match state.links.remove(from) {
                Some(target) => {
                    state.links.insert(to.clone(), target);
                }
                None => return missing(from),
            },
            RemoteOp::ReadLink { path } => {
                return CommandOutput::ok(state.link(path).unwrap_or_default().to_string());
            }
            RemoteOp::Remove { path } => {
                state.files.remove(path);
                state.links.remove(path);
            }
            RemoteOp::RemoveTree { path } => state.remove_tree(path),
            RemoteOp::AppendLine { file, line } => {
                let lines = state.lines.entry(file.clone()).or_default();
                if !lines.contains(line) {
                    lines.push(line.clone());
                }
            }
            RemoteOp::RemoveLine { file, line } => {
                if let Some(lines) = state.lines.get_mut(file) {
                    lines.retain(|l| l != line);
                }
            }
            RemoteOp::ManagePy { project_dir, .. } => {
                if !state.is_dir(project_dir) {
                    return missing(project_dir);
                }
            }
            RemoteOp::ImportSql { dump, .. } => {
                if !state.is_file(dump) {
                    return missing(dump);
                }
            }
            RemoteOp::ReloadService { .. } => {}
        }
        CommandOutput::ok("")
    }
}

impl Transport for FakeTransport {
    fn execute(&self, host: &Host, op: &RemoteOp, privilege: Privilege) -> CommandOutput {
        let host = host.to_string();
        self.calls.borrow_mut().push(Call {
            host: host.clone(),
            op: op.clone(),
            privilege,
        });

        if let Some(fail) = &self.fail_when {
            if fail(&host, op) {
                return CommandOutput::failed(1, format!("{} refused", op.label()));
            }
        }

        let mut hosts = self.hosts.borrow_mut();
        Self::apply(hosts.entry(host).or_default(), op)
    }

    fn upload(&self, host: &Host, _local_path: &Path, remote_path: &str) -> CommandOutput {
        self.with_state(&host.to_string(), |state| state.add_file(remote_path));
        CommandOutput::ok("")
    }

    fn execute_local(&self, op: &LocalOp) -> CommandOutput {
        self.local_calls.borrow_mut().push(op.clone());
        CommandOutput::ok("")
    }
}
