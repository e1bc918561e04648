//! Interactive signal dispositions for the waiting stages.
//!
//! `SIGINT` and `SIGQUIT` from the terminal reach the whole foreground
//! process group. The gate and supervisor ignore them while they wait, the
//! way `system(3)` does, so an interrupt ends only the command and the
//! waiting stages still unmount. The dispositions the gate inherited are
//! kept and put back in the executor before exec, because ignored
//! dispositions survive `execve(2)`.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

const INTERACTIVE: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

/// Dispositions replaced by [`ignore_interactive`].
#[derive(Debug, Clone, Default)]
pub struct SavedDispositions {
    saved: Vec<(Signal, SigAction)>,
}

impl SavedDispositions {
    /// Puts every saved disposition back in the calling process.
    pub fn restore(&self) {
        for (signal, action) in &self.saved {
            // SAFETY: the saved action was installed in this process image
            // before the fork; it is SigIgn, SigDfl, or a handler that is
            // still mapped.
            if let Err(err) = unsafe { sigaction(*signal, action) } {
                tracing::warn!(?signal, error = %err, "failed to restore signal disposition");
            }
        }
    }
}

/// Ignores `SIGINT` and `SIGQUIT` in the calling process and returns the
/// dispositions they had before.
#[must_use]
pub fn ignore_interactive() -> SavedDispositions {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let mut saved = Vec::with_capacity(INTERACTIVE.len());
    for signal in INTERACTIVE {
        // SAFETY: SigIgn installs no Rust handler code.
        match unsafe { sigaction(signal, &ignore) } {
            Ok(previous) => saved.push((signal, previous)),
            Err(err) => tracing::warn!(?signal, error = %err, "failed to ignore signal"),
        }
    }
    SavedDispositions { saved }
}
