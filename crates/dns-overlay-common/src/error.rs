//! Unified error types for the dns-overlay workspace.
//!
//! Every failure names the stage or step that produced it so the operator
//! can tell which part of the mount sequence went wrong.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{EXEC_FAILURE_EXIT, SETUP_FAILURE_EXIT};
use crate::types::{SetupStep, Stage};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The overlay file cannot be read.
    #[error("cannot read file '{}': {source}", path.display())]
    OverlayUnreadable {
        /// Overlay path as given by the operator.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A capability call failed.
    #[error("{step}: {call} failed: {message} (does this executable carry cap_sys_admin+p?)")]
    Capability {
        /// Step during which the call was made.
        step: SetupStep,
        /// Name of the failing capability call.
        call: &'static str,
        /// Error reported by the capability layer.
        message: String,
    },

    /// A mount, namespace, fork, or exec step failed.
    #[error("failed to {step}: {source}")]
    Setup {
        /// The step that failed.
        step: SetupStep,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Clearing the executor's capabilities did not fully succeed.
    #[error("refusing to run command: {failures} capability drop operation(s) failed")]
    PrivilegeDrop {
        /// Number of failed drop phases.
        failures: usize,
    },

    /// Waiting for a child stage failed.
    #[error("{stage} failed to wait for its child: {source}")]
    Wait {
        /// Stage that was waiting.
        stage: Stage,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl OverlayError {
    /// Builds a [`OverlayError::Setup`] for `step` from any OS error.
    pub fn setup(step: SetupStep, source: impl Into<std::io::Error>) -> Self {
        Self::Setup {
            step,
            source: source.into(),
        }
    }

    /// The step this error belongs to, when it came from the state machine.
    #[must_use]
    pub const fn step(&self) -> Option<SetupStep> {
        match self {
            Self::Capability { step, .. } | Self::Setup { step, .. } => Some(*step),
            Self::PrivilegeDrop { .. } => Some(SetupStep::DropCapabilities),
            _ => None,
        }
    }

    /// Process exit status used when this error terminates a stage.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Setup {
                step: SetupStep::Exec,
                ..
            } => EXEC_FAILURE_EXIT,
            _ => SETUP_FAILURE_EXIT,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, OverlayError>;
