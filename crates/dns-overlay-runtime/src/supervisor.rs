//! The namespace supervisor: the middle stage.
//!
//! Runs in the gate's child. Its setup order is fixed:
//!
//! 1. mark the overlay's self-bind private (still in the host namespace),
//! 2. unshare into a new mount namespace,
//! 3. recursively mark `/` private, so no later mount event propagates back
//!    to the host,
//! 4. bind the overlay onto the resolver path.
//!
//! Mounts made after the unshare belong to the supervisor and are undone by
//! its guard on every return path.

use std::path::Path;

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::{SetupStep, Stage, StageOutcome};
use dns_overlay_core::capability::{CapabilityGrant, CapabilityOps};
use dns_overlay_core::filesystem::mount::MountOps;

use crate::guard::MountGuard;

/// Root of the mount tree marked private after unsharing.
const ROOT: &str = "/";

/// Resources held by the supervisor between its setup and its child's exit.
///
/// Fields drop in order, so mounts are undone while the capability is
/// still held.
pub struct Supervisor<'a, M: MountOps, C: CapabilityOps> {
    guard: MountGuard<'a, M>,
    grant: CapabilityGrant<'a, C>,
}

impl<'a, M: MountOps, C: CapabilityOps> Supervisor<'a, M, C> {
    /// Builds the private namespace and places the overlay in it.
    ///
    /// # Errors
    ///
    /// Returns a [`OverlayError::Setup`] naming the first step that failed.
    /// Mounts already made in the new namespace are undone before returning.
    pub fn establish(
        config: &ValidatedConfig,
        mounts: &'a M,
        grant: CapabilityGrant<'a, C>,
    ) -> Result<Self> {
        let overlay = config.overlay();
        let target = config.target();
        let mut guard = MountGuard::new(mounts, Stage::Supervisor);

        mounts
            .make_private(overlay)
            .map_err(|e| OverlayError::setup(SetupStep::PrivatizeOverlay, e))?;
        mounts
            .unshare_namespace()
            .map_err(|e| OverlayError::setup(SetupStep::UnshareMountNamespace, e))?;
        // The namespace copy of the self-bind is ours from here on.
        guard.push(overlay);
        mounts
            .make_rprivate(Path::new(ROOT))
            .map_err(|e| OverlayError::setup(SetupStep::PrivatizeRoot, e))?;
        mounts
            .bind(overlay, target)
            .map_err(|e| OverlayError::setup(SetupStep::BindOverlayTarget, e))?;
        guard.push(target);

        tracing::info!(
            overlay = %overlay.display(),
            target = %target.display(),
            "overlay mounted in private namespace"
        );
        Ok(Self { guard, grant })
    }

    /// Hands the capability to a freshly forked executor and disarms the
    /// inherited guard; the executor owns no mounts.
    pub fn into_child(self) -> CapabilityGrant<'a, C> {
        let Self { mut guard, grant } = self;
        guard.disarm();
        grant
    }

    /// Tears down after the executor exited with `exit_code`.
    pub fn finish(self, exit_code: i32) -> StageOutcome {
        let Self { guard, grant } = self;
        let cleanup = guard.release();
        tracing::debug!(
            attempted = cleanup.attempted,
            failed = cleanup.failed,
            "supervisor teardown complete"
        );
        grant.release();
        StageOutcome::exited(exit_code).with_cleanup_failed(!cleanup.is_clean())
    }
}
