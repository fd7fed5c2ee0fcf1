//! The reconciliation core: per-instance records, the pure lifecycle state
//! machine producing [`state_machine::Decision`]s, and the stability
//! estimator used to detect crash loops.

pub mod instance;
pub mod stability;
pub mod state_machine;
