//! Mount-table operations used by the overlay stages.
//!
//! [`MountOps`] is the seam between the stage logic and the kernel;
//! [`HostMounts`] is the implementation that issues real `mount(2)`,
//! `umount(2)` and `unshare(2)` calls.

use std::io;
use std::path::Path;

use nix::mount::{MsFlags, mount, umount};

use crate::filesystem::mountinfo;

/// Mount-table operations required to place and remove the overlay.
pub trait MountOps {
    /// Bind mounts `source` onto `target` with default, non-recursive flags.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `mount(2)`.
    fn bind(&self, source: &Path, target: &Path) -> io::Result<()>;

    /// Sets the propagation type of the mount at `target` to private.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `mount(2)`.
    fn make_private(&self, target: &Path) -> io::Result<()>;

    /// Recursively sets the propagation type of every mount under `target`
    /// to private.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `mount(2)`.
    fn make_rprivate(&self, target: &Path) -> io::Result<()>;

    /// Moves the calling process into a new mount namespace.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `unshare(2)`.
    fn unshare_namespace(&self) -> io::Result<()>;

    /// Unmounts the topmost mount at `target`.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `umount(2)`, e.g. `EINVAL` when
    /// nothing is mounted there.
    fn unmount(&self, target: &Path) -> io::Result<()>;

    /// Number of mount-table entries whose mount point is `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    fn mount_count(&self, target: &Path) -> io::Result<usize>;
}

/// [`MountOps`] backed by the calling process's real mount table.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMounts;

impl MountOps for HostMounts {
    fn bind(&self, source: &Path, target: &Path) -> io::Result<()> {
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            "creating bind mount"
        );
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )?;
        Ok(())
    }

    fn make_private(&self, target: &Path) -> io::Result<()> {
        tracing::debug!(target = %target.display(), "marking mount private");
        mount(
            None::<&str>,
            target,
            None::<&str>,
            MsFlags::MS_PRIVATE,
            None::<&str>,
        )?;
        Ok(())
    }

    fn make_rprivate(&self, target: &Path) -> io::Result<()> {
        tracing::debug!(target = %target.display(), "marking mount tree private");
        mount(
            None::<&str>,
            target,
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )?;
        Ok(())
    }

    fn unshare_namespace(&self) -> io::Result<()> {
        crate::namespace::mount::create_mount_namespace()
    }

    fn unmount(&self, target: &Path) -> io::Result<()> {
        tracing::debug!(target = %target.display(), "unmounting");
        umount(target)?;
        Ok(())
    }

    fn mount_count(&self, target: &Path) -> io::Result<usize> {
        mountinfo::mount_count(target)
    }
}
