//! Linux namespace management.
//!
//! Only the mount namespace is used: the overlay must be visible to one
//! process tree and to nothing else on the host.

pub mod mount;
