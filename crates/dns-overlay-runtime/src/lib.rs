//! The three-stage process chain that overlays the resolver configuration
//! for one command.
//!
//! ```text
//! gate        raise CAP_SYS_ADMIN, bind overlay onto itself
//!  └─ fork ─> supervisor  privatize overlay, unshare, privatize /, bind overlay onto resolv.conf
//!              └─ fork ─> executor  drop every capability, exec /bin/sh -c <command>
//! ```
//!
//! Each stage owns the mounts it created through a [`guard::MountGuard`] and
//! undoes them on every return path; exit statuses flow back up through
//! `waitpid(2)`.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod executor;
pub mod gate;
pub mod guard;
pub mod pipeline;
pub mod plan;
pub mod signals;
pub mod status;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;
