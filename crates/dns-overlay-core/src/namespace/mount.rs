//! Mount namespace isolation.
//!
//! Gives the supervisor its own mount table so the resolver overlay never
//! shows up in the host namespace.

use std::io;

/// Creates a new mount namespace for the calling process.
///
/// The new namespace starts as a copy of the caller's mount table, sharing
/// propagation with it until the caller marks its mounts private.
///
/// # Errors
///
/// Returns an error if the `unshare(CLONE_NEWNS)` syscall fails.
#[cfg(target_os = "linux")]
pub fn create_mount_namespace() -> io::Result<()> {
    use nix::sched::{CloneFlags, unshare};

    unshare(CloneFlags::CLONE_NEWNS)?;
    tracing::debug!("mount namespace created");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error; mount namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn create_mount_namespace() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Linux required for mount namespaces",
    ))
}
