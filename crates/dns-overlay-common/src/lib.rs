//! # dns-overlay-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire dns-overlay workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and carries no system-call code of its own.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
