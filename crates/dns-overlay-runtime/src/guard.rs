//! Scoped ownership of the mounts a stage created.
//!
//! A stage pushes each mount onto its [`MountGuard`] right after the mount
//! succeeds. The guard unmounts them in reverse order when released or
//! dropped, so early error returns clean up too. A forked child that
//! inherits a guard it does not own calls [`MountGuard::disarm`] first.

use std::path::{Path, PathBuf};

use dns_overlay_common::types::Stage;
use dns_overlay_core::filesystem::mount::MountOps;

/// Result of tearing down a guard's mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Unmounts attempted.
    pub attempted: usize,
    /// Unmounts that failed.
    pub failed: usize,
}

impl CleanupReport {
    /// Whether every unmount succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Mounts owned by one stage, unmounted in reverse order of creation.
pub struct MountGuard<'m, M: MountOps> {
    mounts: &'m M,
    stage: Stage,
    paths: Vec<PathBuf>,
    armed: bool,
}

impl<'m, M: MountOps> MountGuard<'m, M> {
    /// Creates an empty, armed guard for `stage`.
    pub const fn new(mounts: &'m M, stage: Stage) -> Self {
        Self {
            mounts,
            stage,
            paths: Vec::new(),
            armed: true,
        }
    }

    /// Records a mount at `path` that this stage must undo.
    pub fn push(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    /// Gives up ownership without unmounting anything.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.paths.clear();
    }

    /// Unmounts every owned path, newest first.
    ///
    /// Failures are logged and counted; they never stop the remaining
    /// unmounts.
    pub fn release(mut self) -> CleanupReport {
        self.unmount_all()
    }

    fn unmount_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !self.armed {
            return report;
        }
        self.armed = false;
        while let Some(path) = self.paths.pop() {
            report.attempted += 1;
            match self.mounts.unmount(&path) {
                Ok(()) => tracing::debug!(stage = %self.stage, path = %path.display(), "unmounted"),
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(
                        stage = %self.stage,
                        path = %path.display(),
                        error = %err,
                        "unmount failed"
                    );
                }
            }
        }
        report
    }
}

impl<M: MountOps> Drop for MountGuard<'_, M> {
    fn drop(&mut self) {
        if self.armed && !self.paths.is_empty() {
            tracing::debug!(stage = %self.stage, "releasing mounts on early exit");
            let _ = self.unmount_all();
        }
    }
}
