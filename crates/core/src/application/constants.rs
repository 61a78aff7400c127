// Invoker constants (no magic values)
use std::time::Duration;

/// Time a terminated process gets to exit before it is killed (5 seconds)
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a terminated process (50ms)
pub const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for a killed process to be reaped, or for its output
/// to close after it exited (2 seconds)
pub const KILL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// Prefix of generated scratch directory names
pub const SCRATCH_DIR_PREFIX: &str = "relais-";
