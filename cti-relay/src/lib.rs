//! cti-relay library crate.
//!
//! A scheduled ingestion connector: it pulls intelligence objects from a pluggable
//! collector, splits them into ordered chunks, delivers the chunks to the platform
//! through an acknowledging AMQP broker, reports progress as a work unit, and keeps
//! an opaque checkpoint between runs.

pub mod broker;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod panic_hook;
pub mod platform;
pub mod scheduler;
pub mod state;
pub mod work;

pub use error::{Error, Result};
