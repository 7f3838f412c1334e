//! Release directory tracker.
//!
//! Maintains the `current` and `previous` pointers inside `releases/`. Every
//! pointer write goes through [`PointerStore::point`] or
//! [`PointerStore::rename`], both of which replace the destination in a single
//! rename, so a reader of `current` always finds a valid release. Remote hosts
//! perform the rename with the virtualenv's python (`os.replace`), which
//! behaves the same on GNU and BSD userlands.

use serde::Serialize;

use crate::environment::Host;
use crate::error::{Error, Result};
use crate::ops::RemoteOp;
use crate::release::{ReleaseId, ReleaseLayout, Slot};
use crate::runner::Runner;
use crate::transport::Privilege;

/// Storage for the pointer entries of one host.
pub trait PointerStore {
    /// Release a slot references, or `None` when the slot does not exist.
    fn read(&self, slot: Slot) -> Result<Option<ReleaseId>>;
    fn release_exists(&self, release: &ReleaseId) -> Result<bool>;
    /// Atomically make `slot` reference `release`.
    fn point(&self, slot: Slot, release: &ReleaseId) -> Result<()>;
    /// Atomically move the pointer in `from` over `to`; `from` stops existing.
    fn rename(&self, from: Slot, to: Slot) -> Result<()>;
    /// Delete the pointer in `slot`; a missing slot is not an error.
    fn remove(&self, slot: Slot) -> Result<()>;
    /// Where the store lives, for error reports.
    fn location(&self) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PointerSet {
    pub current: Option<ReleaseId>,
    pub previous: Option<ReleaseId>,
}

pub fn pointers(store: &dyn PointerStore) -> Result<PointerSet> {
    Ok(PointerSet {
        current: store.read(Slot::Current)?,
        previous: store.read(Slot::Previous)?,
    })
}

/// Make `release` current; the outgoing current becomes previous.
///
/// Works on a fresh host with no pointers at all. Activating the release that
/// is already current leaves the pointers untouched. When `current` is missing
/// and `previous` names `release`, the stale `previous` is dropped so the two
/// slots never reference the same release.
pub fn activate(store: &dyn PointerStore, release: &ReleaseId) -> Result<PointerSet> {
    if !store.release_exists(release)? {
        return Err(Error::release_not_found(
            release.as_str(),
            store.location(),
            format!("releases/{}", release),
        ));
    }

    let before = pointers(store)?;
    if before.current.as_ref() == Some(release) {
        return Ok(before);
    }

    if let Some(outgoing) = &before.current {
        store.point(Slot::Previous, outgoing)?;
    }
    store.point(Slot::Current, release)?;

    let previous = match before.current {
        Some(outgoing) => Some(outgoing),
        None if before.previous.as_ref() == Some(release) => {
            store.remove(Slot::Previous)?;
            None
        }
        None => before.previous,
    };

    Ok(PointerSet {
        current: Some(release.clone()),
        previous,
    })
}

/// Swap `current` and `previous` through the transient slot.
///
/// 1. transient := current
/// 2. current := previous
/// 3. transient renamed over previous
///
/// `current` is replaced in one rename at step 2, so it never disappears. A
/// second rollback restores the original assignment.
pub fn rollback(store: &dyn PointerStore) -> Result<PointerSet> {
    let before = pointers(store)?;
    let (Some(current), Some(previous)) = (before.current, before.previous) else {
        return Err(Error::release_no_previous(store.location()));
    };

    store.point(Slot::Transient, &current)?;
    store.point(Slot::Current, &previous)?;
    store.rename(Slot::Transient, Slot::Previous)?;

    Ok(PointerSet {
        current: Some(previous),
        previous: Some(current),
    })
}

/// Pointer store on one remote host, driven through typed operations.
pub struct RemotePointerStore<'r, 'a> {
    runner: &'r Runner<'a>,
    host: &'r Host,
    layout: &'r ReleaseLayout,
}

impl<'r, 'a> RemotePointerStore<'r, 'a> {
    pub fn new(runner: &'r Runner<'a>, host: &'r Host, layout: &'r ReleaseLayout) -> Self {
        Self {
            runner,
            host,
            layout,
        }
    }
}

impl PointerStore for RemotePointerStore<'_, '_> {
    fn read(&self, slot: Slot) -> Result<Option<ReleaseId>> {
        let output = self.runner.run_on(
            self.host,
            &RemoteOp::ReadLink {
                path: self.layout.pointer(slot),
            },
            Privilege::User,
        )?;

        let target = output.stdout.trim().trim_end_matches('/');
        if target.is_empty() {
            return Ok(None);
        }

        // Links are written relative to releases/, but tolerate absolute targets.
        let name = target.rsplit('/').next().unwrap_or(target);
        ReleaseId::parse(name).map(Some).map_err(|_| {
            Error::config_invalid_value(
                slot.name(),
                Some(target.to_string()),
                format!("pointer on {} does not reference a release directory", self.host),
            )
        })
    }

    fn release_exists(&self, release: &ReleaseId) -> Result<bool> {
        let output = self.runner.run_on(
            self.host,
            &RemoteOp::DirExists {
                path: self.layout.release_dir(release),
            },
            Privilege::User,
        )?;
        Ok(output.stdout.trim() == "present")
    }

    fn point(&self, slot: Slot, release: &ReleaseId) -> Result<()> {
        self.runner
            .run_on(
                self.host,
                &RemoteOp::AtomicLink {
                    python: self.layout.bin("python"),
                    target: release.to_string(),
                    staging: self.layout.staging(slot),
                    link: self.layout.pointer(slot),
                },
                Privilege::User,
            )
            .map(|_| ())
    }

    fn rename(&self, from: Slot, to: Slot) -> Result<()> {
        self.runner
            .run_on(
                self.host,
                &RemoteOp::Rename {
                    python: self.layout.bin("python"),
                    from: self.layout.pointer(from),
                    to: self.layout.pointer(to),
                },
                Privilege::User,
            )
            .map(|_| ())
    }

    fn remove(&self, slot: Slot) -> Result<()> {
        self.runner
            .run_on(
                self.host,
                &RemoteOp::Remove {
                    path: self.layout.pointer(slot),
                },
                Privilege::User,
            )
            .map(|_| ())
    }

    fn location(&self) -> String {
        self.host.to_string()
    }
}
