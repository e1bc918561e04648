//! `--dry-run`: display the planned steps without touching the mount table.

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_runtime::plan::Plan;

/// Prints the plan for `config`, as text or JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(config: &ValidatedConfig, json: bool) -> anyhow::Result<()> {
    let plan = Plan::for_config(config);
    let rendered = if json {
        plan.to_json()?
    } else {
        crate::output::render_plan(&plan)
    };
    println!("{rendered}");
    Ok(())
}
