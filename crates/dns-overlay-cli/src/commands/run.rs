//! Default mode: run the command under the overlay.

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::types::Stage;
use dns_overlay_core::capability::ProcessCapabilities;
use dns_overlay_core::filesystem::mount::HostMounts;
use dns_overlay_runtime::pipeline;

/// Runs the command and exits with its exit status.
///
/// Gate setup failures are reported here and exit with the setup status;
/// everything after the first fork reports from the stage that failed.
///
/// # Errors
///
/// Never returns an error; the process exits instead.
pub fn execute(config: &ValidatedConfig) -> anyhow::Result<()> {
    tracing::info!(
        overlay = %config.overlay().display(),
        command = config.command(),
        "starting overlay"
    );

    let code = match pipeline::run(config, &HostMounts, &ProcessCapabilities) {
        Ok(outcome) => crate::output::exit_code(outcome),
        Err(err) => {
            pipeline::report(Stage::Gate, &err);
            err.exit_code()
        }
    };
    std::process::exit(code);
}
