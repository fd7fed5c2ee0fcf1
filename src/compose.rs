//! Container inventory: enumerating the services a compose file declares,
//! querying the container runtime for their state, and producing the
//! observation map consumed by container service executors.

pub mod error;
pub mod inventory;
pub mod runtime;
