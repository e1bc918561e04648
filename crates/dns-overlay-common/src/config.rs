//! Invocation configuration for a single overlay run.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constants::{DEFAULT_COMMAND, RESOLV_CONF};
use crate::error::{OverlayError, Result};

/// Everything one invocation needs: which file to overlay, where, and what to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayConfig {
    /// File exposed at the target path.
    pub overlay: PathBuf,
    /// Path covered by the overlay inside the private namespace.
    pub target: PathBuf,
    /// Command string handed to the interpreter.
    pub command: String,
    /// Name of the marker variable set in the sandboxed environment.
    pub marker_env: Option<String>,
    /// Echo the command line before running it.
    pub verbose: bool,
}

impl OverlayConfig {
    /// Creates a configuration overlaying `overlay` onto the resolver path
    /// and running the default command.
    #[must_use]
    pub fn new(overlay: impl Into<PathBuf>) -> Self {
        Self {
            overlay: overlay.into(),
            target: PathBuf::from(RESOLV_CONF),
            command: DEFAULT_COMMAND.to_owned(),
            marker_env: None,
            verbose: false,
        }
    }

    /// Replaces the command string.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the marker variable name.
    #[must_use]
    pub fn with_marker_env(mut self, name: impl Into<String>) -> Self {
        self.marker_env = Some(name.into());
        self
    }

    /// Checks the configuration before anything privileged happens.
    ///
    /// The overlay must be an existing, readable, non-directory file; it is
    /// canonicalised so every later mount call sees the same absolute path.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay cannot be read, the command is empty,
    /// or the marker variable name is not a valid environment name.
    pub fn validate(mut self) -> Result<ValidatedConfig> {
        if self.command.trim().is_empty() {
            return Err(OverlayError::Config {
                message: "no command given".into(),
            });
        }
        if let Some(name) = &self.marker_env {
            validate_env_name(name)?;
        }
        self.overlay = check_readable(&self.overlay)?;
        Ok(ValidatedConfig(self))
    }
}

/// A configuration that passed [`OverlayConfig::validate`].
///
/// Privileged code only accepts this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedConfig(OverlayConfig);

impl ValidatedConfig {
    /// Canonical overlay path.
    #[must_use]
    pub fn overlay(&self) -> &Path {
        &self.0.overlay
    }

    /// Path covered by the overlay.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.0.target
    }

    /// Command string handed to the interpreter.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.0.command
    }

    /// Marker variable name, if any.
    #[must_use]
    pub fn marker_env(&self) -> Option<&str> {
        self.0.marker_env.as_deref()
    }

    /// Whether to echo the command line.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.0.verbose
    }
}

fn check_readable(path: &Path) -> Result<PathBuf> {
    let unreadable = |source| OverlayError::OverlayUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(unreadable)?;
    if metadata.is_dir() {
        return Err(OverlayError::Config {
            message: format!("'{}' is a directory, expected a file", path.display()),
        });
    }
    let _ = File::open(path).map_err(unreadable)?;
    path.canonicalize().map_err(unreadable)
}

fn validate_env_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return Err(OverlayError::Config {
            message: format!("invalid environment variable name '{name}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn overlay_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "nameserver 192.0.2.53").expect("write");
        file
    }

    #[test]
    fn defaults_target_resolver_and_run_bash() {
        let config = OverlayConfig::new("/tmp/resolv");
        assert_eq!(config.target, PathBuf::from(RESOLV_CONF));
        assert_eq!(config.command, "bash");
        assert!(config.marker_env.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn validate_canonicalises_overlay() {
        let file = overlay_file();
        let validated = OverlayConfig::new(file.path())
            .with_command("true")
            .validate()
            .expect("valid");
        assert!(validated.overlay().is_absolute());
        assert_eq!(
            validated.overlay(),
            file.path().canonicalize().expect("canonical")
        );
        assert_eq!(validated.command(), "true");
    }

    #[test]
    fn missing_overlay_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = OverlayConfig::new(dir.path().join("absent"))
            .validate()
            .expect_err("missing file");
        assert!(matches!(err, OverlayError::OverlayUnreadable { .. }));
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn unreadable_overlay_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let file = overlay_file();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o000))
            .expect("chmod");
        // root and CAP_DAC_OVERRIDE holders read it anyway.
        if File::open(file.path()).is_ok() {
            return;
        }
        let err = OverlayConfig::new(file.path())
            .validate()
            .expect_err("unreadable file");
        assert!(matches!(err, OverlayError::OverlayUnreadable { .. }));
        assert!(err.to_string().starts_with("cannot read file"));
    }

    #[test]
    fn directory_overlay_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = OverlayConfig::new(dir.path())
            .validate()
            .expect_err("directory");
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let file = overlay_file();
        let err = OverlayConfig::new(file.path())
            .with_command("   ")
            .validate()
            .expect_err("empty command");
        assert!(err.to_string().contains("no command"));
    }

    #[test]
    fn marker_name_with_equals_is_rejected() {
        let file = overlay_file();
        let err = OverlayConfig::new(file.path())
            .with_marker_env("A=B")
            .validate()
            .expect_err("bad marker");
        assert!(err.to_string().contains("A=B"));
    }

    #[test]
    fn marker_name_is_carried_through() {
        let file = overlay_file();
        let validated = OverlayConfig::new(file.path())
            .with_marker_env("IN_DNS_OVERLAY")
            .validate()
            .expect("valid");
        assert_eq!(validated.marker_env(), Some("IN_DNS_OVERLAY"));
    }
}
