//! # Bundle Split
//!
//! This crate partitions one large intelligence bundle into an ordered sequence of
//! smaller bundles ("chunks") that are safe to hand to a message broker.
//!
//! ## Features
//!
//! - Opaque objects: every object is a `serde_json::Value`, the schema is never inspected
//! - Deterministic, total splitting bounded by an object-count and a byte ceiling
//! - Order preservation: concatenating the chunks in sequence order yields the bundle
//!
//! ## Example
//!
//! ```rust
//! use bundle_split::{Bundle, SplitPolicy};
//! use serde_json::json;
//!
//! let bundle = Bundle::new((0..250).map(|i| json!({ "id": i })).collect());
//! let policy = SplitPolicy::new(100, 1024 * 1024).unwrap();
//! let chunks = policy.split(bundle);
//!
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].objects().len(), 50);
//! ```

use thiserror::Error;

mod bundle;
mod policy;

pub use bundle::{Bundle, Chunk, IntelObject};
pub use policy::{DEFAULT_MAX_BYTES, DEFAULT_MAX_OBJECTS, SplitPolicy};

/// Errors raised while configuring or encoding bundles.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Invalid split policy: {0}")]
    InvalidPolicy(String),

    #[error("Failed to encode chunk {sequence}/{total}: {source}")]
    Encode {
        sequence: usize,
        total: usize,
        #[source]
        source: serde_json::Error,
    },
}
