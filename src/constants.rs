// src/constants.rs

use std::time::Duration;

/// Exit code reported when the child did not exit normally or could not be launched.
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Line terminator appended to split output lines and to the stdin payload.
#[cfg(windows)]
pub const LINE_TERMINATOR: &str = "\r\n";
/// Line terminator appended to split output lines and to the stdin payload.
#[cfg(not(windows))]
pub const LINE_TERMINATOR: &str = "\n";

/// How often a cancellable wait polls the child for an exit status.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long workers get to finish after a cancelled or failed wait before they are detached.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Name of the directory holding safeproc configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "safeproc";

/// Name of the settings file (inside the config dir).
pub const SETTINGS_FILENAME: &str = "settings.toml";

/// Exit code used by the CLI when the run was interrupted with Ctrl+C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
