//! Filesystem operations on the mount table.
//!
//! Provides bind mounts, propagation changes and unmounts, plus a reader
//! for `/proc/self/mountinfo` used to check that nothing is left mounted.

pub mod mount;
pub mod mountinfo;
