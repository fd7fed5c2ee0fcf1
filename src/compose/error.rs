use thiserror::Error;

/// Failures while reading container inventory. These escape to the caller,
/// which logs them and skips the affected observation pass; they never take
/// the supervisor down.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The compose file could not be read or the orchestrator rejected it.
    #[error("could not enumerate compose services: {0}")]
    Config(String),

    /// A container runtime query failed.
    #[error("container runtime query failed: {0}")]
    Runtime(String),

    /// A container's labels disagree with the compose file contents.
    #[error("compose state inconsistency: {0}")]
    Consistency(String),
}
