use std::time::Duration;

/// Grace period between a launch request and the first evidence of the child.
pub const LAUNCH_DETECT_GRACE_SECS: f64 = 1.0;
/// Delay before retrying a launch that was never detected.
pub const LAUNCH_RETRY_DELAY_SECS: f64 = 5.0;
/// Cooldown after an unexpected exit before the next launch attempt.
pub const RELAUNCH_COOLDOWN_SECS: f64 = 3.0;
/// How long a stop request may take before the child is declared stuck.
pub const SHUTDOWN_GRACE_SECS: f64 = 5.0;

/// Window over which recent starts count against stability.
pub const STABILITY_WINDOW_SECS: f64 = 120.0;
/// Bound on the retained start-time history.
pub const MAX_TRACKED_START_TIMES: usize = 200;
/// A stability factor at or below this marks a crash loop.
pub const UNSTABLE_FACTOR_THRESHOLD: f64 = 0.5;

/// Retained lines per captured output stream.
pub const OUTPUT_RING_CAPACITY: usize = 100;
/// Stderr attachments longer than this are trimmed...
pub const STDERR_ATTACH_FULL_LIMIT: usize = 50;
/// ...down to this many trailing lines.
pub const STDERR_ATTACH_TAIL_LINES: usize = 20;

/// Exit code reported when the container runtime does not provide one.
pub const UNKNOWN_EXIT_CODE: i32 = 127;

/// Upper bound on the sleep between reconciliation passes.
pub const DEFAULT_TICK_CEILING: Duration = Duration::from_secs(1);
/// Default cadence for refreshing the container inventory.
pub const DEFAULT_INVENTORY_INTERVAL: Duration = Duration::from_secs(5);
/// Time granted to the drain pass on shutdown; generous enough for a
/// stop request plus a full "refused to die" grace period.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(12);

pub const DEFAULT_CONFIG_PATH: &str = "/etc/agent-manager/config.yaml";
pub const DEFAULT_COMPOSE_BIN: &str = "docker-compose";
pub const DEFAULT_DOCKER_BIN: &str = "docker";
