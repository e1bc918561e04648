//! System-wide constants and default paths.

/// Resolver configuration path covered by the overlay mount.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Command run in the sandbox when none is given.
pub const DEFAULT_COMMAND: &str = "bash";

/// Interpreter used to run the requested command string.
pub const SHELL_PATH: &str = "/bin/sh";

/// Value assigned to the marker environment variable.
pub const MARKER_VALUE: &str = "1";

/// Exit status reported when validation or any setup step fails.
pub const SETUP_FAILURE_EXIT: i32 = 1;

/// Exit status reported when the interpreter cannot be executed.
pub const EXEC_FAILURE_EXIT: i32 = 127;

/// Base added to the signal number of a signal-terminated command.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Environment variable consulted for the overlay file path.
pub const OVERLAY_FILE_ENV: &str = "DNS_OVERLAY_FILE";

/// Mount table of the calling process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Application name used in diagnostics.
pub const APP_NAME: &str = "dns-overlay";
