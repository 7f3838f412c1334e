//! Environment profiles.
//!
//! A profile is a JSON file under `~/.config/liftoff/environments/<name>.json`
//! describing the target hosts, remote layout, service paths and database.
//! It is loaded once per run into an immutable [`Environment`] that every
//! operation receives explicitly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(skip_deserializing, default)]
    pub name: String,
    /// Target hosts in `host[:port]` form.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Remote base path holding the virtualenv, `releases/` and `packages/`.
    #[serde(default)]
    pub path: String,
    /// Login user for SSH connections.
    #[serde(default)]
    pub user: String,
    /// Account the web server and app processes run as.
    #[serde(default)]
    pub www_user: String,
    /// Shell used to run remote commands, e.g. `/usr/local/bin/bash -l -c`.
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub identity_file: Option<String>,
    /// Interpreter used to create the remote virtualenv and run local tests.
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub web: WebSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Python package name of the project inside the release.
    #[serde(default)]
    pub name: String,
    /// Virtual host name used for the nginx and supervisor entries.
    #[serde(default)]
    pub domain: String,
    /// Local working copy the release archive is built from.
    #[serde(default)]
    pub directory: String,
    #[serde(default = "default_git_ref")]
    pub git_ref: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSettings {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    /// SQL dump shipped in the release's `other/` directory.
    #[serde(default)]
    pub file: String,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"***")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSettings {
    #[serde(default = "default_sites_available")]
    pub sites_available: String,
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: String,
    #[serde(default = "default_supervisor_dir")]
    pub supervisor_dir: String,
    /// Main supervisor config that receives one include line per site.
    #[serde(default = "default_supervisor_conf")]
    pub supervisor_conf: String,
    #[serde(default = "default_web_reload")]
    pub web_reload: String,
    #[serde(default = "default_app_reload")]
    pub app_reload: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            sites_available: default_sites_available(),
            sites_enabled: default_sites_enabled(),
            supervisor_dir: default_supervisor_dir(),
            supervisor_conf: default_supervisor_conf(),
            web_reload: default_web_reload(),
            app_reload: default_app_reload(),
        }
    }
}

fn default_shell() -> String {
    "/bin/bash -l -c".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_git_ref() -> String {
    "HEAD".to_string()
}

fn default_sites_available() -> String {
    "/usr/local/etc/nginx/sites-available".to_string()
}

fn default_sites_enabled() -> String {
    "/usr/local/etc/nginx/sites-enabled".to_string()
}

fn default_supervisor_dir() -> String {
    "/usr/local/etc/supervisor".to_string()
}

fn default_supervisor_conf() -> String {
    "/usr/local/etc/supervisord.conf".to_string()
}

fn default_web_reload() -> String {
    "/usr/local/etc/rc.d/nginx".to_string()
}

fn default_app_reload() -> String {
    "/usr/local/etc/rc.d/supervisord".to_string()
}

/// A parsed `host[:port]` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub address: String,
    pub port: u16,
}

impl Host {
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let invalid = |problem: &str| {
            Error::config_invalid_value("hosts", Some(entry.to_string()), problem.to_string())
        };

        if entry.is_empty() {
            return Err(invalid("host entry is empty"));
        }

        // Bare IPv6 addresses carry colons of their own.
        if entry.matches(':').count() > 1 && !entry.starts_with('[') {
            return Ok(Self {
                address: entry.to_string(),
                port: 22,
            });
        }

        if let Some(inner) = entry.strip_prefix('[').and_then(|e| e.strip_suffix(']')) {
            if inner.is_empty() {
                return Err(invalid("host address is empty"));
            }
            return Ok(Self {
                address: inner.to_string(),
                port: 22,
            });
        }

        let (address, port) = match entry.rsplit_once(':') {
            Some((address, port)) => {
                let port = port
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| invalid("port must be a number between 1 and 65535"))?;
                (address.trim_start_matches('[').trim_end_matches(']'), port)
            }
            None => (entry, 22),
        };

        if address.is_empty() {
            return Err(invalid("host address is empty"));
        }

        Ok(Self {
            address: address.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.port == 22 {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

impl Environment {
    /// Fail fast unless every field the remote tasks rely on is populated.
    pub fn require(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.hosts.iter().all(|h| h.trim().is_empty()) {
            missing.push("hosts");
        }
        if self.path.trim().is_empty() {
            missing.push("path");
        }
        if self.user.trim().is_empty() {
            missing.push("user");
        }
        if self.www_user.trim().is_empty() {
            missing.push("wwwUser");
        }
        if self.shell.trim().is_empty() {
            missing.push("shell");
        }
        if self.project.name.trim().is_empty() {
            missing.push("project.name");
        }
        if self.project.domain.trim().is_empty() {
            missing.push("project.domain");
        }

        if !missing.is_empty() {
            return Err(self.missing(missing));
        }

        if !self.path.starts_with('/') {
            return Err(Error::config_invalid_value(
                "path",
                Some(self.path.clone()),
                "remote path must be absolute",
            ));
        }

        self.hosts()?;
        Ok(())
    }

    /// Local settings needed to build a release archive.
    pub fn require_local_project(&self) -> Result<()> {
        if self.project.directory.trim().is_empty() {
            return Err(self.missing(vec!["project.directory"]));
        }
        Ok(())
    }

    /// Database settings, all of which must be present.
    pub fn require_database(&self) -> Result<&DatabaseSettings> {
        let Some(db) = &self.database else {
            return Err(self.missing(vec!["database"]));
        };

        let mut missing = Vec::new();
        if db.hostname.trim().is_empty() {
            missing.push("database.hostname");
        }
        if db.username.trim().is_empty() {
            missing.push("database.username");
        }
        if db.name.trim().is_empty() {
            missing.push("database.name");
        }
        if db.file.trim().is_empty() {
            missing.push("database.file");
        }

        if !missing.is_empty() {
            return Err(self.missing(missing));
        }

        if db.file.contains('/') {
            return Err(Error::config_invalid_value(
                "database.file",
                Some(db.file.clone()),
                "dump file must be a plain file name inside the release's other/ directory",
            ));
        }

        Ok(db)
    }

    pub fn hosts(&self) -> Result<Vec<Host>> {
        self.hosts
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| Host::parse(h))
            .collect()
    }

    /// Configured SQL dump name, when a database is configured.
    pub fn dump_file(&self) -> Option<&str> {
        self.database
            .as_ref()
            .map(|db| db.file.as_str())
            .filter(|f| !f.trim().is_empty() && !f.contains('/'))
    }

    fn missing(&self, keys: Vec<&str>) -> Error {
        let env = if self.name.is_empty() {
            None
        } else {
            Some(self.name.clone())
        };
        Error::config_missing_key(keys.into_iter().map(String::from).collect(), env)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Parse a profile from JSON text; `name` is recorded on the result.
pub fn from_json(name: &str, json: &str, source: &str) -> Result<Environment> {
    let mut env: Environment =
        serde_json::from_str(json).map_err(|e| Error::config_invalid_json(source, e))?;
    env.name = name.to_string();
    Ok(env)
}

/// Load a profile from an explicit file path; the file stem becomes its name.
pub fn load_from(path: &Path) -> Result<Environment> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    from_json(name, &content, &path.display().to_string())
}

/// Load a named profile from the environments directory.
pub fn load(name: &str) -> Result<Environment> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::validation_invalid_argument(
            "env",
            format!("'{}' is not a valid environment name", name),
            None,
        ));
    }

    let path = paths::environment(name)?;
    if !path.exists() {
        return Err(Error::environment_not_found(name, list_names().unwrap_or_default()));
    }
    load_from(&path)
}

/// Resolve the run's environment from `--config` or `--env`.
pub fn select(name: Option<&str>, config_file: Option<&Path>) -> Result<Environment> {
    match (config_file, name) {
        (Some(path), _) => load_from(path),
        (None, Some(name)) => load(name),
        (None, None) => Err(Error::environment_not_selected()),
    }
}

/// Names of every profile in `dir`, sorted.
pub fn list_names_in(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", dir.display())))
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    Ok(names)
}

pub fn list_names() -> Result<Vec<String>> {
    list_names_in(&paths::environments()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production_json() -> &'static str {
        r#"{
            "hosts": ["ec2-107-22-101-154.compute-1.amazonaws.com:4444"],
            "path": "/mnt/osm/tilecache",
            "user": "cornel",
            "wwwUser": "www",
            "shell": "/usr/local/bin/bash -l -c",
            "project": { "name": "tilecache_server", "domain": "tiles.example.com", "directory": "/home/osm/tilecache/src" },
            "database": { "hostname": "localhost", "username": "OSM", "password": "secret", "name": "BlueMarble", "file": "db_gis.sql" }
        }"#
    }

    #[test]
    fn parses_profile_with_defaults() {
        let env = from_json("production", production_json(), "inline").unwrap();
        assert_eq!(env.name, "production");
        assert_eq!(env.python, "python3");
        assert_eq!(env.project.git_ref, "HEAD");
        assert_eq!(env.web.sites_enabled, "/usr/local/etc/nginx/sites-enabled");
        assert!(env.require().is_ok());
        assert_eq!(env.require_database().unwrap().name, "BlueMarble");
    }

    #[test]
    fn require_lists_every_missing_key() {
        let env = from_json("staging", r#"{ "path": "/srv/app" }"#, "inline").unwrap();
        let err = env.require().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigMissingKey);
        let keys: Vec<String> = serde_json::from_value(err.details["keys"].clone()).unwrap();
        assert_eq!(
            keys,
            vec!["hosts", "user", "wwwUser", "project.name", "project.domain"]
        );
        assert_eq!(err.details["environment"], "staging");
    }

    #[test]
    fn require_rejects_relative_path() {
        let mut env = from_json("production", production_json(), "inline").unwrap();
        env.path = "srv/app".to_string();
        assert_eq!(
            env.require().unwrap_err().code,
            crate::error::ErrorCode::ConfigInvalidValue
        );
    }

    #[test]
    fn require_database_rejects_missing_section() {
        let mut env = from_json("production", production_json(), "inline").unwrap();
        env.database = None;
        assert!(env.require_database().is_err());
    }

    #[test]
    fn password_is_never_serialized_or_debug_printed() {
        let env = from_json("production", production_json(), "inline").unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", env).contains("secret"));
    }

    #[test]
    fn host_parsing() {
        assert_eq!(
            Host::parse("example.com:4444").unwrap(),
            Host {
                address: "example.com".to_string(),
                port: 4444
            }
        );
        assert_eq!(Host::parse("example.com").unwrap().port, 22);
        assert_eq!(Host::parse("[::1]:2222").unwrap().address, "::1");
        assert_eq!(Host::parse("fe80::1").unwrap().port, 22);
        assert_eq!(Host::parse("[::1]").unwrap().address, "::1");
        assert!(Host::parse("example.com:0").is_err());
        assert!(Host::parse("example.com:http").is_err());
        assert!(Host::parse(":22").is_err());
    }

    #[test]
    fn loads_and_lists_profiles_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("production.json"), production_json()).unwrap();
        fs::write(dir.path().join("staging.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let names = list_names_in(dir.path()).unwrap();
        assert_eq!(names, vec!["production", "staging"]);

        let env = load_from(&dir.path().join("production.json")).unwrap();
        assert_eq!(env.name, "production");
        assert_eq!(env.hosts().unwrap()[0].port, 4444);
    }

    #[test]
    fn invalid_json_reports_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_from(&path).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn select_without_profile_fails_fast() {
        let err = select(None, None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::EnvironmentNotSelected);
    }
}
