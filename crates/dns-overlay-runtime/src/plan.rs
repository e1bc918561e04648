//! Dry-run description of what a run would do.
//!
//! Built from the configuration alone; no capability or mount call is made.

use std::fmt;

use serde::Serialize;

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::error::Result;
use dns_overlay_common::types::{SetupStep, Stage};

/// One planned step with the concrete paths it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    /// The step.
    pub step: SetupStep,
    /// Human-readable description with concrete arguments.
    pub detail: String,
}

/// Steps of one stage, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    /// The stage.
    pub stage: Stage,
    /// Its steps.
    pub steps: Vec<PlannedStep>,
    /// Mounts this stage undoes on exit, in unmount order.
    pub cleanup: Vec<String>,
}

/// The full plan for one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// The validated configuration the plan was built from.
    pub config: ValidatedConfig,
    /// Stages in fork order.
    pub stages: Vec<PlannedStage>,
}

impl Plan {
    /// Describes the run `config` would perform.
    #[must_use]
    pub fn for_config(config: &ValidatedConfig) -> Self {
        let stages = Stage::ALL
            .into_iter()
            .map(|stage| PlannedStage {
                stage,
                steps: SetupStep::of_stage(stage)
                    .map(|step| PlannedStep {
                        step,
                        detail: detail(step, config),
                    })
                    .collect(),
                cleanup: cleanup(stage, config),
            })
            .collect();
        Self {
            config: config.clone(),
            stages,
        }
    }

    /// Renders the plan as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, stage) in self.stages.iter().enumerate() {
            let indent = "  ".repeat(depth);
            writeln!(f, "{indent}{}:", stage.stage)?;
            for planned in &stage.steps {
                writeln!(f, "{indent}  - {}", planned.detail)?;
            }
            for path in &stage.cleanup {
                writeln!(f, "{indent}  ~ unmount {path} on exit")?;
            }
        }
        Ok(())
    }
}

fn detail(step: SetupStep, config: &ValidatedConfig) -> String {
    let overlay = config.overlay().display();
    let target = config.target().display();
    match step {
        SetupStep::BindOverlaySelf => format!("bind {overlay} onto itself"),
        SetupStep::PrivatizeOverlay => format!("mark {overlay} private"),
        SetupStep::BindOverlayTarget => format!("bind {overlay} onto {target}"),
        SetupStep::DropCapabilities => match config.marker_env() {
            Some(name) => format!("drop capabilities, set {name}=1"),
            None => "drop capabilities".to_owned(),
        },
        SetupStep::Exec => format!("exec /bin/sh -c {:?}", config.command()),
        other => other.to_string(),
    }
}

fn cleanup(stage: Stage, config: &ValidatedConfig) -> Vec<String> {
    let overlay = config.overlay().display().to_string();
    match stage {
        Stage::Gate => vec![overlay],
        Stage::Supervisor => vec![config.target().display().to_string(), overlay],
        Stage::Executor => Vec::new(),
    }
}
