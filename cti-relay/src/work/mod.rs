//! Work-unit lifecycle.
//!
//! Every run that obtains a work id reports `initiate → declare_expectations →
//! finalize` to the platform. [`WorkUnit`] enforces the local state machine;
//! [`WorkTracker`] is the remote side.

mod tracker;
mod unit;

pub use tracker::WorkTracker;
#[cfg(test)]
pub use tracker::MockWorkTracker;
pub use unit::{WorkOutcome, WorkStatus, WorkUnit};
