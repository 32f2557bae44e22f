//! Run loop.
//!
//! Each cycle loads the checkpoint, opens a work unit, collects, splits and
//! publishes, reports the outcome, stores the checkpoint, then sleeps until the
//! next scheduled start. Cycles never overlap; an overrun skips the sleep.

mod cycle;
mod runner;

pub use cycle::{Pace, RunCycle};
pub use runner::{ConnectorRunner, RunReport, RunnerConfig};
