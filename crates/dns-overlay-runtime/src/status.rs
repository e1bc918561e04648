//! Reaping a child stage and decoding its wait status.

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use dns_overlay_common::constants::SIGNAL_EXIT_BASE;
use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::Stage;

/// Exit code for a terminal wait status, using the shell convention of
/// `128 + signo` for a signal death. `None` for stop/continue reports.
#[must_use]
pub fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(SIGNAL_EXIT_BASE + signal as i32),
        _ => None,
    }
}

/// Blocks until `child` terminates and returns its decoded exit code.
///
/// Interrupted waits are retried; there is no timeout.
///
/// # Errors
///
/// Returns an error if `waitpid(2)` fails for a reason other than `EINTR`.
pub fn wait_for_exit(child: Pid, stage: Stage) -> Result<i32> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    tracing::debug!(%stage, pid = child.as_raw(), code, "child exited");
                    return Ok(code);
                }
            }
            Err(Errno::EINTR) => {}
            Err(errno) => {
                return Err(OverlayError::Wait {
                    stage,
                    source: errno.into(),
                });
            }
        }
    }
}
