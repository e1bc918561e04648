//! The sandboxed executor: the innermost stage.
//!
//! Drops every capability, prepares the command's environment and argument
//! vector, then replaces itself with `/bin/sh -c <command>`. A failed drop
//! always stops here; the command never runs with privileges left over.

use std::ffi::{CString, OsString};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;

use nix::unistd::execve;

use dns_overlay_common::config::ValidatedConfig;
use dns_overlay_common::constants::{MARKER_VALUE, SHELL_PATH};
use dns_overlay_common::error::{OverlayError, Result};
use dns_overlay_common::types::SetupStep;
use dns_overlay_core::capability::{CapabilityGrant, CapabilityOps};

use crate::signals::SavedDispositions;

/// A fully prepared `execve(2)` call, built only after the drop succeeded.
#[derive(Debug)]
pub struct ExecPlan {
    command: String,
    verbose: bool,
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

impl ExecPlan {
    /// Drops every capability held through `grant`, then builds the exec
    /// call from `config` and the inherited environment `env`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::PrivilegeDrop`] if any drop phase failed, or a
    /// configuration error if the command or environment contains NUL bytes.
    pub fn prepare<C, I>(config: &ValidatedConfig, grant: CapabilityGrant<'_, C>, env: I) -> Result<Self>
    where
        C: CapabilityOps,
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let report = grant.drop_all();
        if !report.is_clean() {
            tracing::error!(phases = ?report.failed_phases(), "capability drop incomplete");
            return Err(OverlayError::PrivilegeDrop {
                failures: report.failures(),
            });
        }
        tracing::debug!("all capabilities dropped");

        let program = c_string(SHELL_PATH.as_bytes())?;
        let argv = vec![
            program.clone(),
            c_string(b"-c")?,
            c_string(config.command().as_bytes())?,
        ];
        let envp = environment(env, config.marker_env())?;

        Ok(Self {
            command: config.command().to_owned(),
            verbose: config.verbose(),
            program,
            argv,
            envp,
        })
    }

    /// Argument vector handed to the interpreter.
    #[must_use]
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Environment handed to the interpreter, as `NAME=value` entries.
    #[must_use]
    pub fn envp(&self) -> &[CString] {
        &self.envp
    }

    /// Restores the interactive signal dispositions the gate inherited,
    /// then replaces the current process image. Only returns on failure.
    pub fn exec(self, signals: &SavedDispositions) -> OverlayError {
        signals.restore();
        if self.verbose {
            #[allow(clippy::print_stdout)]
            {
                println!("calling: \"{}\"", self.command);
            }
            let _ = std::io::stdout().flush();
        }
        match execve(&self.program, &self.argv, &self.envp) {
            Ok(never) => match never {},
            Err(errno) => OverlayError::setup(SetupStep::Exec, errno),
        }
    }
}

fn c_string(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| OverlayError::Config {
        message: format!("'{}' contains a NUL byte", String::from_utf8_lossy(bytes)),
    })
}

/// Inherited environment with the marker variable set, if one was named.
/// An inherited variable of the same name is replaced.
fn environment<I>(env: I, marker: Option<&str>) -> Result<Vec<CString>>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut entries = Vec::new();
    for (name, value) in env {
        if marker.is_some_and(|m| name.as_bytes() == m.as_bytes()) {
            continue;
        }
        let mut entry = name.as_bytes().to_vec();
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        entries.push(c_string(&entry)?);
    }
    if let Some(marker) = marker {
        entries.push(c_string(format!("{marker}={MARKER_VALUE}").as_bytes())?);
    }
    Ok(entries)
}
