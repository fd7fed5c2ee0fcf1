use std::time::SystemTime;

/// Seconds since the Unix epoch, as a float.
///
/// The reconciliation state machine takes its clock as a plain `f64` so tests
/// can feed synthetic values; this is the production source for it.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
