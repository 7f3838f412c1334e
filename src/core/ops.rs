//! Typed remote and local operations.
//!
//! Every command the deployment issues is one variant here. Arguments are
//! always shell-quoted when the command line is rendered, so no caller ever
//! formats a shell string by hand.

use serde::Serialize;

use crate::utils::shell::{quote_arg, quote_path};

/// Python one-liner renaming `argv[1]` over `argv[2]` with `rename(2)`.
///
/// `mv` cannot do this portably: without GNU `-T` it moves the source into
/// the directory a destination symlink points at.
const REPLACE_ENTRY: &str = "import os, sys; os.replace(sys.argv[1], sys.argv[2])";

/// An operation executed on a target host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteOp {
    /// `mkdir -p`
    EnsureDir { path: String },
    /// `mkdir`; fails when the directory already exists.
    MakeDir { path: String },
    /// Probe whether a directory exists. Prints `present` or `absent`.
    DirExists { path: String },
    CreateVirtualenv { python: String, path: String },
    Chown { owner: String, path: String },
    /// Unpack a gzipped tarball into an existing directory.
    Extract { archive: String, dest: String },
    InstallRequirements { pip: String, requirements: String },
    UninstallRequirements { pip: String, requirements: String },
    Move { from: String, to: String },
    /// Move only when the source exists.
    MoveIfPresent { from: String, to: String },
    Copy { from: String, to: String },
    /// Point a symlink at `target`, replacing whatever link is there.
    Link { target: String, link: String },
    /// Stage a symlink at `staging` and rename it over `link` in one step.
    /// `python` performs the rename.
    AtomicLink {
        python: String,
        target: String,
        staging: String,
        link: String,
    },
    /// `rename(2)` of a directory entry over another, through `python`.
    Rename {
        python: String,
        from: String,
        to: String,
    },
    /// Print a symlink's target, or nothing when it does not exist.
    ReadLink { path: String },
    Remove { path: String },
    RemoveTree { path: String },
    /// Append `line` to `file` unless an identical line is already present.
    AppendLine { file: String, line: String },
    /// Drop every line equal to `line` from `file`.
    RemoveLine { file: String, line: String },
    ManagePy {
        python: String,
        project_dir: String,
        args: Vec<String>,
    },
    /// Load `dump` into `database`. The password is fed on stdin, see
    /// [`RemoteOp::stdin`].
    ImportSql {
        hostname: String,
        username: String,
        #[serde(skip_serializing)]
        password: String,
        database: String,
        dump: String,
    },
    ReloadService { script: String },
}

impl RemoteOp {
    /// Short stable name used in reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RemoteOp::EnsureDir { .. } => "ensure_dir",
            RemoteOp::MakeDir { .. } => "make_dir",
            RemoteOp::DirExists { .. } => "dir_exists",
            RemoteOp::CreateVirtualenv { .. } => "create_virtualenv",
            RemoteOp::Chown { .. } => "chown",
            RemoteOp::Extract { .. } => "extract",
            RemoteOp::InstallRequirements { .. } => "install_requirements",
            RemoteOp::UninstallRequirements { .. } => "uninstall_requirements",
            RemoteOp::Move { .. } => "move",
            RemoteOp::MoveIfPresent { .. } => "move_if_present",
            RemoteOp::Copy { .. } => "copy",
            RemoteOp::Link { .. } => "link",
            RemoteOp::AtomicLink { .. } => "atomic_link",
            RemoteOp::Rename { .. } => "rename",
            RemoteOp::ReadLink { .. } => "read_link",
            RemoteOp::Remove { .. } => "remove",
            RemoteOp::RemoveTree { .. } => "remove_tree",
            RemoteOp::AppendLine { .. } => "append_line",
            RemoteOp::RemoveLine { .. } => "remove_line",
            RemoteOp::ManagePy { .. } => "manage_py",
            RemoteOp::ImportSql { .. } => "import_sql",
            RemoteOp::ReloadService { .. } => "reload_service",
        }
    }

    pub fn render(&self) -> String {
        match self {
            RemoteOp::EnsureDir { path } => format!("mkdir -p {}", quote_path(path)),
            RemoteOp::MakeDir { path } => format!("mkdir {}", quote_path(path)),
            RemoteOp::DirExists { path } => format!(
                "if [ -d {} ]; then echo present; else echo absent; fi",
                quote_path(path)
            ),
            RemoteOp::CreateVirtualenv { python, path } => {
                format!("{} -m venv {}", quote_arg(python), quote_path(path))
            }
            RemoteOp::Chown { owner, path } => format!(
                "chown -R {}:{} {}",
                quote_arg(owner),
                quote_arg(owner),
                quote_path(path)
            ),
            RemoteOp::Extract { archive, dest } => format!(
                "tar -xzf {} -C {}",
                quote_path(archive),
                quote_path(dest)
            ),
            RemoteOp::InstallRequirements { pip, requirements } => format!(
                "{} install -r {}",
                quote_path(pip),
                quote_path(requirements)
            ),
            RemoteOp::UninstallRequirements { pip, requirements } => format!(
                "{} uninstall -y -r {}",
                quote_path(pip),
                quote_path(requirements)
            ),
            RemoteOp::Move { from, to } => {
                format!("mv {} {}", quote_path(from), quote_path(to))
            }
            RemoteOp::MoveIfPresent { from, to } => format!(
                "if [ -e {from} ]; then mkdir -p \"$(dirname {to})\" && mv {from} {to}; fi",
                from = quote_path(from),
                to = quote_path(to)
            ),
            RemoteOp::Copy { from, to } => {
                format!("cp {} {}", quote_path(from), quote_path(to))
            }
            RemoteOp::Link { target, link } => {
                format!("ln -sfn {} {}", quote_path(target), quote_path(link))
            }
            RemoteOp::AtomicLink {
                python,
                target,
                staging,
                link,
            } => format!(
                "ln -sfn {} {} && {}",
                quote_path(target),
                quote_path(staging),
                replace_entry(python, staging, link)
            ),
            RemoteOp::Rename { python, from, to } => replace_entry(python, from, to),
            RemoteOp::ReadLink { path } => {
                format!("readlink {} || true", quote_path(path))
            }
            RemoteOp::Remove { path } => format!("rm -f {}", quote_path(path)),
            RemoteOp::RemoveTree { path } => format!("rm -rf {}", quote_path(path)),
            RemoteOp::AppendLine { file, line } => format!(
                "grep -qxF -- {line} {file} 2>/dev/null || printf '%s\\n' {line} >> {file}",
                line = quote_arg(line),
                file = quote_path(file)
            ),
            // grep exits 1 when nothing is left and 2 on a read error.
            RemoteOp::RemoveLine { file, line } => format!(
                "if [ -f {file} ]; then grep -vxF -- {line} {file} > {tmp}; \
                 if [ $? -le 1 ]; then mv {tmp} {file}; else rm -f {tmp}; false; fi; fi",
                line = quote_arg(line),
                file = quote_path(file),
                tmp = quote_path(&format!("{}.liftoff.tmp", file))
            ),
            RemoteOp::ManagePy {
                python,
                project_dir,
                args,
            } => {
                let mut command = format!(
                    "cd {} && {} manage.py",
                    quote_path(project_dir),
                    quote_path(python)
                );
                for arg in args {
                    command.push(' ');
                    command.push_str(&quote_arg(arg));
                }
                command
            }
            RemoteOp::ImportSql {
                hostname,
                username,
                database,
                dump,
                ..
            } => format!(
                "read -r MYSQL_PWD && export MYSQL_PWD && mysql -h {} -u {} {} < {}",
                quote_arg(hostname),
                quote_arg(username),
                quote_arg(database),
                quote_path(dump)
            ),
            RemoteOp::ReloadService { script } => format!("{} reload", quote_path(script)),
        }
    }

    /// Input written to the command's stdin. Secrets travel here so they
    /// never appear in a command line.
    pub fn stdin(&self) -> Option<String> {
        match self {
            RemoteOp::ImportSql { password, .. } => Some(format!("{}\n", password)),
            _ => None,
        }
    }
}

fn replace_entry(python: &str, from: &str, to: &str) -> String {
    format!(
        "{} -c {} {} {}",
        quote_path(python),
        quote_arg(REPLACE_ENTRY),
        quote_path(from),
        quote_path(to)
    )
}

/// An operation executed on the operator's machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LocalOp {
    /// Build a gzipped tarball of `reference` from the repository at `repo`.
    GitArchive {
        repo: String,
        reference: String,
        output: String,
    },
    RemoveFile { path: String },
    RunTests {
        directory: String,
        python: String,
        project: String,
    },
}

impl LocalOp {
    pub fn label(&self) -> &'static str {
        match self {
            LocalOp::GitArchive { .. } => "git_archive",
            LocalOp::RemoveFile { .. } => "remove_file",
            LocalOp::RunTests { .. } => "run_tests",
        }
    }

    pub fn render(&self) -> String {
        match self {
            LocalOp::GitArchive {
                repo,
                reference,
                output,
            } => format!(
                "git -C {} archive --format=tar.gz -o {} {}",
                quote_path(repo),
                quote_path(output),
                quote_arg(reference)
            ),
            LocalOp::RemoveFile { path } => format!("rm -f {}", quote_path(path)),
            LocalOp::RunTests {
                directory,
                python,
                project,
            } => format!(
                "cd {} && {} {} test",
                quote_path(directory),
                quote_arg(python),
                quote_path(&format!("{}/manage.py", project))
            ),
        }
    }
}
