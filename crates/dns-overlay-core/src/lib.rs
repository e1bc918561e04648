//! # dns-overlay-core
//!
//! Low-level Linux primitives for the dns-overlay runtime.
//!
//! This crate provides safe abstractions over:
//! - **Capabilities**: raising `CAP_SYS_ADMIN` and clearing every set before exec.
//! - **Filesystem**: bind mounts, propagation changes, unmounts, and
//!   `/proc/self/mountinfo` inspection.
//! - **Namespaces**: creating a private mount namespace.
//!
//! The privileged operations sit behind the [`capability::CapabilityOps`] and
//! [`filesystem::mount::MountOps`] traits so the stage logic above them can be
//! exercised without privileges.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod capability;
pub mod filesystem;
pub mod namespace;
