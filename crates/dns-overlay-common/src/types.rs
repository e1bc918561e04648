//! Domain primitive types used across the dns-overlay workspace.

use std::fmt;

use serde::Serialize;

/// One of the three processes in the overlay chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Outermost process: raises the mount capability and binds the overlay onto itself.
    Gate,
    /// First child: owns the private mount namespace and the resolver mount.
    Supervisor,
    /// Innermost child: drops every capability and execs the command.
    Executor,
}

impl Stage {
    /// Stages in fork order.
    pub const ALL: [Self; 3] = [Self::Gate, Self::Supervisor, Self::Executor];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gate => write!(f, "gate"),
            Self::Supervisor => write!(f, "supervisor"),
            Self::Executor => write!(f, "executor"),
        }
    }
}

/// An ordered, individually failing step of the overlay state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    /// Raise `CAP_SYS_ADMIN` into the effective set.
    RaiseCapability,
    /// Bind the overlay file onto itself in the host namespace.
    BindOverlaySelf,
    /// Fork the supervisor.
    ForkSupervisor,
    /// Mark the overlay mount's propagation private.
    PrivatizeOverlay,
    /// Unshare into a new mount namespace.
    UnshareMountNamespace,
    /// Recursively mark `/` private inside the new namespace.
    PrivatizeRoot,
    /// Bind the overlay onto the resolver configuration path.
    BindOverlayTarget,
    /// Fork the executor.
    ForkExecutor,
    /// Clear every capability set of the executor.
    DropCapabilities,
    /// Replace the executor image with the interpreter.
    Exec,
}

impl SetupStep {
    /// Steps in execution order.
    pub const ALL: [Self; 10] = [
        Self::RaiseCapability,
        Self::BindOverlaySelf,
        Self::ForkSupervisor,
        Self::PrivatizeOverlay,
        Self::UnshareMountNamespace,
        Self::PrivatizeRoot,
        Self::BindOverlayTarget,
        Self::ForkExecutor,
        Self::DropCapabilities,
        Self::Exec,
    ];

    /// The stage that performs this step.
    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::RaiseCapability | Self::BindOverlaySelf | Self::ForkSupervisor => Stage::Gate,
            Self::PrivatizeOverlay
            | Self::UnshareMountNamespace
            | Self::PrivatizeRoot
            | Self::BindOverlayTarget
            | Self::ForkExecutor => Stage::Supervisor,
            Self::DropCapabilities | Self::Exec => Stage::Executor,
        }
    }

    /// Steps performed by `stage`, in order.
    pub fn of_stage(stage: Stage) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |step| step.stage() == stage)
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RaiseCapability => "raise CAP_SYS_ADMIN",
            Self::BindOverlaySelf => "initial bind mount of overlay",
            Self::ForkSupervisor => "fork supervisor",
            Self::PrivatizeOverlay => "mark overlay mount private",
            Self::UnshareMountNamespace => "unshare mount namespace",
            Self::PrivatizeRoot => "mark / recursively private",
            Self::BindOverlayTarget => "bind mount overlay onto resolver path",
            Self::ForkExecutor => "fork executor",
            Self::DropCapabilities => "drop capabilities",
            Self::Exec => "exec command",
        };
        f.write_str(text)
    }
}

/// Result handed up one link of the chain once a child has been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    /// Exit status of the sandboxed command, already decoded.
    pub exit_code: i32,
    /// Whether this stage failed to undo one of its mounts.
    pub cleanup_failed: bool,
}

impl StageOutcome {
    /// Outcome for a child that exited with `exit_code` and a clean teardown.
    #[must_use]
    pub const fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            cleanup_failed: false,
        }
    }

    /// Records whether teardown left something behind. The exit code is kept.
    #[must_use]
    pub const fn with_cleanup_failed(mut self, failed: bool) -> Self {
        self.cleanup_failed = self.cleanup_failed || failed;
        self
    }
}
