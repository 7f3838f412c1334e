//! Release identifiers and the remote directory layout.
//!
//! ```text
//! {path}/packages/{release}.tar.gz     uploaded archives
//! {path}/releases/{release}/           unpacked release
//! {path}/releases/current  -> {release}
//! {path}/releases/previous -> {release}
//! ```

use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::OnceLock;

use crate::error::{Error, Result};

const RELEASE_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifier of one deployed release. Timestamp ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// New id from the local clock.
    pub fn generate() -> Self {
        Self::generate_at(&Local::now())
    }

    pub fn generate_at<Tz: TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self(at.format(RELEASE_ID_FORMAT).to_string())
    }

    /// Validate an operator-supplied id so it is safe as a single path segment.
    pub fn parse(value: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

        let value = value.trim();
        if !pattern.is_match(value) {
            return Err(Error::validation_invalid_argument(
                "release",
                "release ids may only contain letters, digits, '.', '_' and '-'",
                Some(value.to_string()),
            ));
        }

        if Slot::ALL.iter().any(|slot| slot.name() == value) {
            return Err(Error::validation_invalid_argument(
                "release",
                format!("'{}' is a reserved pointer name", value),
                Some(value.to_string()),
            ));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ReleaseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Pointer entries inside `releases/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Current,
    Previous,
    /// Holds the outgoing `current` while a rollback rotates the pointers.
    Transient,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Current, Slot::Previous, Slot::Transient];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Current => "current",
            Slot::Previous => "previous",
            Slot::Transient => "_previous",
        }
    }
}

/// Remote paths derived from the environment's base path.
#[derive(Debug, Clone)]
pub struct ReleaseLayout {
    root: String,
}

impl ReleaseLayout {
    pub fn new(root: &str) -> Self {
        let trimmed = root.trim_end_matches('/');
        Self {
            root: if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }

    fn join(&self, tail: &str) -> String {
        if self.root == "/" {
            format!("/{}", tail)
        } else {
            format!("{}/{}", self.root, tail)
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn releases(&self) -> String {
        self.join("releases")
    }

    pub fn packages(&self) -> String {
        self.join("packages")
    }

    /// Top-level scratch directory removed by cleanup.
    pub fn other(&self) -> String {
        self.join("other")
    }

    pub fn bin(&self, program: &str) -> String {
        self.join(&format!("bin/{}", program))
    }

    pub fn release_dir(&self, release: &ReleaseId) -> String {
        self.join(&format!("releases/{}", release))
    }

    /// Directory inside a release holding files shipped for deployment only.
    pub fn release_other(&self, release: &ReleaseId) -> String {
        format!("{}/other", self.release_dir(release))
    }

    /// Release-scoped location of the SQL dump after site installation.
    pub fn release_dump(&self, release: &ReleaseId, file: &str) -> String {
        format!("{}/data/{}", self.release_dir(release), file)
    }

    pub fn archive_name(release: &ReleaseId) -> String {
        format!("{}.tar.gz", release)
    }

    pub fn package(&self, release: &ReleaseId) -> String {
        format!("{}/{}", self.packages(), Self::archive_name(release))
    }

    pub fn pointer(&self, slot: Slot) -> String {
        format!("{}/{}", self.releases(), slot.name())
    }

    /// Staging entry a pointer is written to before being renamed into place.
    pub fn staging(&self, slot: Slot) -> String {
        format!("{}/.{}.tmp", self.releases(), slot.name())
    }

    /// Project package of whatever release `current` points at.
    pub fn current_project(&self, project: &str) -> String {
        format!("{}/{}", self.pointer(Slot::Current), project)
    }
}
