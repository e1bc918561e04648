//! Formatted output helpers for the CLI.

use dns_overlay_common::types::StageOutcome;
use dns_overlay_runtime::plan::Plan;

/// Renders a dry-run plan with a short header.
#[must_use]
pub fn render_plan(plan: &Plan) -> String {
    let mut text = format!(
        "Overlay plan for {} -> {}\n\n",
        plan.config.overlay().display(),
        plan.config.target().display()
    );
    text.push_str(&plan.to_string());
    text.trim_end().to_owned()
}

/// Process exit status for a finished run. Cleanup trouble was already
/// logged and does not change the command's status.
#[must_use]
pub const fn exit_code(outcome: StageOutcome) -> i32 {
    outcome.exit_code
}

#[cfg(test)]
mod tests {
    use dns_overlay_common::config::OverlayConfig;

    use super::*;

    #[test]
    fn exit_code_ignores_cleanup_failure() {
        let outcome = StageOutcome::exited(42).with_cleanup_failed(true);
        assert_eq!(exit_code(outcome), 42);
    }

    #[test]
    fn render_plan_has_header_and_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let overlay = dir.path().join("resolv.conf");
        std::fs::write(&overlay, "nameserver 192.0.2.53\n").expect("write");
        let config = OverlayConfig::new(&overlay).validate().expect("valid");

        let text = render_plan(&Plan::for_config(&config));
        assert!(text.starts_with("Overlay plan for "));
        assert!(text.contains("-> /etc/resolv.conf"));
        assert!(text.contains("supervisor:"));
        assert!(text.contains("executor:"));
        assert!(!text.ends_with('\n'));
    }
}
