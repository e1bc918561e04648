//! The fork chain tying the three stages together.
//!
//! Each stage sets up completely before it forks the next one, so mount
//! visibility follows fork order. A child stage never returns into its
//! parent's code: it runs its own stage function, which drops that stage's
//! resources on the way out, and then exits with the result.

use nix::unistd::{ForkResult, fork};

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::{SetupStep, Stage, StageOutcome};
use dns_overlay_core::capability::{CapabilityGrant, CapabilityOps};
use dns_overlay_core::filesystem::mount::MountOps;

use crate::executor::ExecPlan;
use crate::gate::Gate;
use crate::signals::{self, SavedDispositions};
use crate::status;
use crate::supervisor::Supervisor;

/// Runs the configured command under a private resolver overlay.
///
/// Returns in the gate process only, once the whole chain has exited.
///
/// # Errors
///
/// Returns an error if the gate's own setup, its fork, or its wait fails.
/// Failures further down the chain arrive as the supervisor's exit code.
pub fn run<M, C>(config: &ValidatedConfig, mounts: &M, caps: &C) -> Result<StageOutcome>
where
    M: MountOps,
    C: CapabilityOps,
{
    let gate = Gate::establish(config, mounts, caps)?;
    let inherited = signals::ignore_interactive();

    match fork_stage(SetupStep::ForkSupervisor)? {
        ForkResult::Child => {
            let grant = gate.into_child();
            terminate(Stage::Supervisor, supervise(config, mounts, grant, &inherited))
        }
        ForkResult::Parent { child } => {
            tracing::debug!(pid = child.as_raw(), "supervisor forked");
            let exit_code = status::wait_for_exit(child, Stage::Gate)?;
            let outcome = gate.finish(exit_code);
            log_outcome(Stage::Gate, outcome);
            Ok(outcome)
        }
    }
}

fn supervise<M, C>(
    config: &ValidatedConfig,
    mounts: &M,
    grant: CapabilityGrant<'_, C>,
    inherited: &SavedDispositions,
) -> Result<StageOutcome>
where
    M: MountOps,
    C: CapabilityOps,
{
    let supervisor = Supervisor::establish(config, mounts, grant)?;

    match fork_stage(SetupStep::ForkExecutor)? {
        ForkResult::Child => {
            let grant = supervisor.into_child();
            terminate(Stage::Executor, execute(config, grant, inherited))
        }
        ForkResult::Parent { child } => {
            tracing::debug!(pid = child.as_raw(), "executor forked");
            let exit_code = status::wait_for_exit(child, Stage::Supervisor)?;
            let outcome = supervisor.finish(exit_code);
            log_outcome(Stage::Supervisor, outcome);
            Ok(outcome)
        }
    }
}

fn execute<C: CapabilityOps>(
    config: &ValidatedConfig,
    grant: CapabilityGrant<'_, C>,
    inherited: &SavedDispositions,
) -> Result<StageOutcome> {
    let plan = ExecPlan::prepare(config, grant, std::env::vars_os())?;
    Err(plan.exec(inherited))
}

fn fork_stage(step: SetupStep) -> Result<ForkResult> {
    // SAFETY: the process is single-threaded; the child only continues
    // with the stage code below and ends in `terminate`.
    unsafe { fork() }.map_err(|e| OverlayError::setup(step, e))
}

/// Ends a child stage with its result. Resources were dropped when the
/// stage function returned.
fn terminate(stage: Stage, result: Result<StageOutcome>) -> ! {
    let code = match result {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            report(stage, &err);
            err.exit_code()
        }
    };
    std::process::exit(code)
}

/// Logs a stage failure and prints it on standard error.
pub fn report(stage: Stage, err: &OverlayError) {
    tracing::error!(%stage, step = ?err.step(), error = %err, "stage failed");
    #[allow(clippy::print_stderr)]
    {
        eprintln!("{}: {err}", dns_overlay_common::constants::APP_NAME);
    }
}

fn log_outcome(stage: Stage, outcome: StageOutcome) {
    if outcome.cleanup_failed {
        tracing::warn!(%stage, exit_code = outcome.exit_code, "child exited, cleanup incomplete");
    } else {
        tracing::debug!(%stage, exit_code = outcome.exit_code, "child exited");
    }
}
