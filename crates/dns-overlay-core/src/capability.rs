//! Linux capability management for least-privilege execution.
//!
//! The gate raises exactly `CAP_SYS_ADMIN` into its effective set; the
//! resulting [`CapabilityGrant`] is inherited by the supervisor and finally
//! consumed by [`CapabilityGrant::drop_all`] in the executor, which leaves
//! every set empty before user code runs.

use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::SetupStep;

pub use caps::{CapSet, Capability, CapsHashSet};

/// The capability the overlay needs: administrative mount rights.
pub const MOUNT_ADMIN: Capability = Capability::CAP_SYS_ADMIN;

/// Capability-set operations on the calling thread.
pub trait CapabilityOps {
    /// Adds `cap` to `set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the change.
    fn raise(&self, set: CapSet, cap: Capability) -> Result<()>;

    /// Removes `cap` from `set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the change.
    fn lower(&self, set: CapSet, cap: Capability) -> Result<()>;

    /// Empties `set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the change.
    fn clear(&self, set: CapSet) -> Result<()>;

    /// Reads the current contents of `set`.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be read.
    fn read(&self, set: CapSet) -> Result<CapsHashSet>;
}

/// [`CapabilityOps`] acting on the current thread through `capset(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCapabilities;

impl ProcessCapabilities {
    fn error(step: SetupStep, call: &'static str, err: &caps::errors::CapsError) -> OverlayError {
        OverlayError::Capability {
            step,
            call,
            message: err.to_string(),
        }
    }
}

impl CapabilityOps for ProcessCapabilities {
    fn raise(&self, set: CapSet, cap: Capability) -> Result<()> {
        caps::raise(None, set, cap)
            .map_err(|e| Self::error(SetupStep::RaiseCapability, "cap raise", &e))
    }

    fn lower(&self, set: CapSet, cap: Capability) -> Result<()> {
        caps::drop(None, set, cap)
            .map_err(|e| Self::error(SetupStep::DropCapabilities, "cap drop", &e))
    }

    fn clear(&self, set: CapSet) -> Result<()> {
        caps::clear(None, set)
            .map_err(|e| Self::error(SetupStep::DropCapabilities, "cap clear", &e))
    }

    fn read(&self, set: CapSet) -> Result<CapsHashSet> {
        caps::read(None, set)
            .map_err(|e| Self::error(SetupStep::DropCapabilities, "cap read", &e))
    }
}

/// Phase of the executor's capability drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPhase {
    /// Empty the ambient and inheritable sets.
    Clear,
    /// Empty the effective and permitted sets of the process.
    Commit,
    /// Read the sets back and confirm nothing survived.
    Verify,
}

/// Phases that failed while dropping capabilities. Empty means fully
/// dropped; each failure was logged with its error when it happened.
#[derive(Debug, Default)]
pub struct DropReport {
    failed: Vec<DropPhase>,
}

impl DropReport {
    /// Number of failed phases.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failed.len()
    }

    /// Whether every phase succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// The failed phases, in the order they ran.
    #[must_use]
    pub fn failed_phases(&self) -> &[DropPhase] {
        &self.failed
    }
}

/// `CAP_SYS_ADMIN` held in the effective set.
///
/// Released by [`release`](Self::release), by [`drop_all`](Self::drop_all),
/// or when dropped.
#[derive(Debug)]
pub struct CapabilityGrant<'c, C: CapabilityOps> {
    ops: &'c C,
    held: bool,
}

impl<'c, C: CapabilityOps> CapabilityGrant<'c, C> {
    /// Raises `CAP_SYS_ADMIN` into the effective set.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is not in the permitted set or
    /// the kernel rejects the change.
    pub fn acquire(ops: &'c C) -> Result<Self> {
        ops.raise(CapSet::Effective, MOUNT_ADMIN)?;
        tracing::debug!("CAP_SYS_ADMIN raised");
        Ok(Self { ops, held: true })
    }

    /// Lowers `CAP_SYS_ADMIN` from the effective set.
    pub fn release(mut self) {
        self.lower();
    }

    /// Clears every capability set of the process.
    ///
    /// Each phase runs even if an earlier one failed, so the report lists
    /// every failure. Any failure means the caller must not exec.
    pub fn drop_all(mut self) -> DropReport {
        self.held = false;
        let ops = self.ops;
        let mut report = DropReport::default();

        let phases: [(DropPhase, &dyn Fn() -> Result<()>); 3] = [
            (DropPhase::Clear, &|| {
                ops.clear(CapSet::Ambient)?;
                ops.clear(CapSet::Inheritable)
            }),
            (DropPhase::Commit, &|| {
                ops.clear(CapSet::Effective)?;
                ops.clear(CapSet::Permitted)
            }),
            (DropPhase::Verify, &|| verify_empty(ops)),
        ];
        for (phase, run) in phases {
            if let Err(err) = run() {
                tracing::error!(phase = ?phase, error = %err, "capability drop failed");
                report.failed.push(phase);
            }
        }
        report
    }

    fn lower(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match self.ops.lower(CapSet::Effective, MOUNT_ADMIN) {
            Ok(()) => tracing::debug!("CAP_SYS_ADMIN released"),
            Err(err) => tracing::warn!(error = %err, "failed to release CAP_SYS_ADMIN"),
        }
    }
}

impl<C: CapabilityOps> Drop for CapabilityGrant<'_, C> {
    fn drop(&mut self) {
        self.lower();
    }
}

fn verify_empty(ops: &impl CapabilityOps) -> Result<()> {
    for set in [CapSet::Effective, CapSet::Permitted, CapSet::Inheritable] {
        let left = ops.read(set)?;
        if !left.is_empty() {
            return Err(OverlayError::Capability {
                step: SetupStep::DropCapabilities,
                call: "cap read",
                message: format!("{set:?} set still holds {} capabilities", left.len()),
            });
        }
    }
    Ok(())
}
