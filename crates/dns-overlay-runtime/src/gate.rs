//! The privilege gate: the outermost stage.
//!
//! Raises `CAP_SYS_ADMIN` and bind mounts the overlay onto itself in the
//! host namespace, where the supervisor can still see it before it
//! unshares. After the supervisor exits, the gate removes that self-bind
//! and releases the capability.

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::{SetupStep, Stage, StageOutcome};
use dns_overlay_core::capability::{CapabilityGrant, CapabilityOps};
use dns_overlay_core::filesystem::mount::MountOps;

use crate::guard::MountGuard;

/// Resources held by the gate between its setup and its child's exit.
///
/// `guard` is declared before `grant` so an unfinished gate unmounts while
/// it still holds the capability.
pub struct Gate<'a, M: MountOps, C: CapabilityOps> {
    config: &'a ValidatedConfig,
    mounts: &'a M,
    guard: MountGuard<'a, M>,
    grant: CapabilityGrant<'a, C>,
    baseline: Option<usize>,
}

impl<'a, M: MountOps, C: CapabilityOps> Gate<'a, M, C> {
    /// Raises the capability and binds the overlay onto itself.
    ///
    /// Nothing is mounted if the capability cannot be raised; the
    /// capability is released again if the bind fails.
    ///
    /// # Errors
    ///
    /// Returns the capability error, or [`SetupStep::BindOverlaySelf`].
    pub fn establish(config: &'a ValidatedConfig, mounts: &'a M, caps: &'a C) -> Result<Self> {
        let grant = CapabilityGrant::acquire(caps)?;
        let baseline = mounts.mount_count(config.overlay()).ok();
        let mut guard = MountGuard::new(mounts, Stage::Gate);

        mounts
            .bind(config.overlay(), config.overlay())
            .map_err(|e| OverlayError::setup(SetupStep::BindOverlaySelf, e))?;
        guard.push(config.overlay());
        tracing::info!(overlay = %config.overlay().display(), "overlay bound onto itself");

        Ok(Self {
            config,
            mounts,
            guard,
            grant,
            baseline,
        })
    }

    /// Hands the capability to a freshly forked supervisor.
    ///
    /// The self-bind stays owned by the gate process, so the child's copy
    /// of the guard is disarmed.
    pub fn into_child(self) -> CapabilityGrant<'a, C> {
        let Self {
            grant, mut guard, ..
        } = self;
        guard.disarm();
        grant
    }

    /// Tears down after the supervisor exited with `exit_code`.
    ///
    /// Cleanup failures are logged and flagged but never change the exit
    /// code.
    pub fn finish(self, exit_code: i32) -> StageOutcome {
        let Self {
            config,
            mounts,
            guard,
            grant,
            baseline,
        } = self;

        let cleanup = guard.release();
        if cleanup.is_clean() {
            tracing::debug!(unmounted = cleanup.attempted, "gate teardown complete");
        } else {
            tracing::warn!(
                overlay = %config.overlay().display(),
                "final unmount failed"
            );
        }
        let leaked = leaked_mounts(mounts, config, baseline);
        grant.release();

        StageOutcome::exited(exit_code).with_cleanup_failed(!cleanup.is_clean() || leaked)
    }
}

fn leaked_mounts<M: MountOps>(mounts: &M, config: &ValidatedConfig, baseline: Option<usize>) -> bool {
    let (Some(before), Ok(after)) = (baseline, mounts.mount_count(config.overlay())) else {
        return false;
    };
    if after > before {
        tracing::warn!(
            overlay = %config.overlay().display(),
            before,
            after,
            "overlay is still mounted after teardown"
        );
        return true;
    }
    false
}
