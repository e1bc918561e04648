//! Recording fakes for the mount and capability seams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::SetupStep;
use dns_overlay_core::capability::{CapSet, Capability, CapabilityOps, CapsHashSet, MOUNT_ADMIN};
use dns_overlay_core::filesystem::mount::MountOps;

/// A mount-table mutation observed by [`RecordingMounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Bind(PathBuf, PathBuf),
    MakePrivate(PathBuf),
    MakeRprivate(PathBuf),
    Unshare,
    Unmount(PathBuf),
}

/// Which kind of call to refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refuse {
    Bind,
    MakePrivate,
    MakeRprivate,
    Unshare,
}

/// In-memory mount table that records every call.
#[derive(Debug, Default)]
pub struct RecordingMounts {
    calls: RefCell<Vec<MountCall>>,
    counts: RefCell<HashMap<PathBuf, usize>>,
    refuse: Option<Refuse>,
    failing_unmounts: Vec<PathBuf>,
    strict: bool,
}

impl RecordingMounts {
    pub fn refusing(mut self, refuse: Refuse) -> Self {
        self.refuse = Some(refuse);
        self
    }

    pub fn failing_unmount(mut self, path: &str) -> Self {
        self.failing_unmounts.push(PathBuf::from(path));
        self
    }

    /// Unmounting a path with nothing mounted fails with `EINVAL`.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: MountCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, kind: Refuse) -> io::Result<()> {
        if self.refuse == Some(kind) {
            return Err(io::Error::from_raw_os_error(1));
        }
        Ok(())
    }
}

impl MountOps for RecordingMounts {
    fn bind(&self, source: &Path, target: &Path) -> io::Result<()> {
        self.record(MountCall::Bind(source.into(), target.into()));
        self.check(Refuse::Bind)?;
        *self.counts.borrow_mut().entry(target.into()).or_default() += 1;
        Ok(())
    }

    fn make_private(&self, target: &Path) -> io::Result<()> {
        self.record(MountCall::MakePrivate(target.into()));
        self.check(Refuse::MakePrivate)
    }

    fn make_rprivate(&self, target: &Path) -> io::Result<()> {
        self.record(MountCall::MakeRprivate(target.into()));
        self.check(Refuse::MakeRprivate)
    }

    fn unshare_namespace(&self) -> io::Result<()> {
        self.record(MountCall::Unshare);
        self.check(Refuse::Unshare)
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        self.record(MountCall::Unmount(target.into()));
        if self.failing_unmounts.iter().any(|p| p == target) {
            return Err(io::Error::from_raw_os_error(16));
        }
        let mut counts = self.counts.borrow_mut();
        let count = counts.entry(target.into()).or_default();
        if *count == 0 {
            if self.strict {
                return Err(io::Error::from_raw_os_error(22));
            }
        } else {
            *count -= 1;
        }
        Ok(())
    }

    fn mount_count(&self, target: &Path) -> io::Result<usize> {
        Ok(self.counts.borrow().get(target).copied().unwrap_or(0))
    }
}

/// Capability set as recorded by [`FakeCapabilities`]; `CapSet` itself is
/// neither `Eq` nor `Hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    Ambient,
    Bounding,
    Effective,
    Inheritable,
    Permitted,
}

impl From<CapSet> for SetKind {
    fn from(set: CapSet) -> Self {
        match set {
            CapSet::Ambient => Self::Ambient,
            CapSet::Bounding => Self::Bounding,
            CapSet::Effective => Self::Effective,
            CapSet::Inheritable => Self::Inheritable,
            CapSet::Permitted => Self::Permitted,
        }
    }
}

/// A capability call observed by [`FakeCapabilities`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapCall {
    Raise(SetKind, Capability),
    Lower(SetKind, Capability),
    Clear(SetKind),
}

/// In-memory capability sets that start with `CAP_SYS_ADMIN` permitted.
#[derive(Debug)]
pub struct FakeCapabilities {
    calls: RefCell<Vec<CapCall>>,
    sets: RefCell<HashMap<SetKind, CapsHashSet>>,
    refuse_raise: bool,
    refuse_clear: Option<SetKind>,
}

impl Default for FakeCapabilities {
    fn default() -> Self {
        let sets = HashMap::from([(SetKind::Permitted, [MOUNT_ADMIN].into_iter().collect())]);
        Self {
            calls: RefCell::default(),
            sets: RefCell::new(sets),
            refuse_raise: false,
            refuse_clear: None,
        }
    }
}

impl FakeCapabilities {
    pub fn refusing_raise(mut self) -> Self {
        self.refuse_raise = true;
        self
    }

    pub fn refusing_clear(mut self, set: CapSet) -> Self {
        self.refuse_clear = Some(set.into());
        self
    }

    pub fn calls(&self) -> Vec<CapCall> {
        self.calls.borrow().clone()
    }

    pub fn holds(&self, set: CapSet, cap: Capability) -> bool {
        self.sets
            .borrow()
            .get(&SetKind::from(set))
            .is_some_and(|caps| caps.contains(&cap))
    }

    fn refused(step: SetupStep, call: &'static str) -> OverlayError {
        OverlayError::Capability {
            step,
            call,
            message: "Operation not permitted".into(),
        }
    }
}

impl CapabilityOps for FakeCapabilities {
    fn raise(&self, set: CapSet, cap: Capability) -> Result<()> {
        let kind = SetKind::from(set);
        self.calls.borrow_mut().push(CapCall::Raise(kind, cap));
        if self.refuse_raise {
            return Err(Self::refused(SetupStep::RaiseCapability, "cap raise"));
        }
        let _ = self.sets.borrow_mut().entry(kind).or_default().insert(cap);
        Ok(())
    }

    fn lower(&self, set: CapSet, cap: Capability) -> Result<()> {
        let kind = SetKind::from(set);
        self.calls.borrow_mut().push(CapCall::Lower(kind, cap));
        if let Some(caps) = self.sets.borrow_mut().get_mut(&kind) {
            let _ = caps.remove(&cap);
        }
        Ok(())
    }

    fn clear(&self, set: CapSet) -> Result<()> {
        let kind = SetKind::from(set);
        self.calls.borrow_mut().push(CapCall::Clear(kind));
        if self.refuse_clear == Some(kind) {
            return Err(Self::refused(SetupStep::DropCapabilities, "cap clear"));
        }
        let _ = self.sets.borrow_mut().remove(&kind);
        Ok(())
    }

    fn read(&self, set: CapSet) -> Result<CapsHashSet> {
        Ok(self
            .sets
            .borrow()
            .get(&SetKind::from(set))
            .cloned()
            .unwrap_or_default())
    }
}

/// Writes an overlay file and returns a validated config pointing at it.
pub fn overlay_config(
    dir: &tempfile::TempDir,
) -> dns_overlay_common::config::ValidatedConfig {
    let overlay = dir.path().join("resolv.conf");
    std::fs::write(&overlay, "nameserver 192.0.2.53\n").expect("write overlay");
    dns_overlay_common::config::OverlayConfig::new(overlay)
        .with_command("exit 7")
        .validate()
        .expect("valid config")
}
