//! Bundle and chunk types.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::SplitError;

/// A single intelligence object. The schema belongs to the collector.
pub type IntelObject = Value;

/// STIX version stamped on every serialized chunk.
const BUNDLE_SPEC_VERSION: &str = "2.1";

/// One run's complete output, an ordered collection of objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    id: String,
    objects: Vec<IntelObject>,
}

impl Bundle {
    /// Create a bundle with a fresh `bundle--<uuid>` identifier.
    pub fn new(objects: Vec<IntelObject>) -> Self {
        Self::with_id(format!("bundle--{}", Uuid::new_v4()), objects)
    }

    /// Create a bundle with an explicit identifier.
    pub fn with_id(id: impl Into<String>, objects: Vec<IntelObject>) -> Self {
        Self {
            id: id.into(),
            objects,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn objects(&self) -> &[IntelObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<IntelObject>) {
        (self.id, self.objects)
    }
}

/// One ordered slice of a [`Bundle`].
///
/// `sequence` is 1-based; the parent bundle is rebuilt downstream purely from the
/// sequence ordering, so chunks must be delivered in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    bundle_id: String,
    sequence: usize,
    total: usize,
    objects: Vec<IntelObject>,
}

#[derive(Serialize)]
struct WireBundle<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    spec_version: &'static str,
    objects: &'a [IntelObject],
}

/// Encoded length of a chunk document with an empty `objects` array.
pub(crate) fn wrapper_len(bundle_id: &str) -> usize {
    let wire = WireBundle {
        kind: "bundle",
        id: bundle_id,
        spec_version: BUNDLE_SPEC_VERSION,
        objects: &[],
    };
    serde_json::to_vec(&wire)
        .map(|bytes| bytes.len())
        .unwrap_or_default()
}

impl Chunk {
    pub(crate) fn new(
        bundle_id: String,
        sequence: usize,
        total: usize,
        objects: Vec<IntelObject>,
    ) -> Self {
        Self {
            bundle_id,
            sequence,
            total,
            objects,
        }
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn objects(&self) -> &[IntelObject] {
        &self.objects
    }

    /// Whether this is the final chunk of its bundle.
    pub fn is_last(&self) -> bool {
        self.sequence == self.total
    }

    /// Serialize the chunk as a standalone bundle document.
    pub fn to_bundle_json(&self) -> Result<String, SplitError> {
        let wire = WireBundle {
            kind: "bundle",
            id: &self.bundle_id,
            spec_version: BUNDLE_SPEC_VERSION,
            objects: &self.objects,
        };
        serde_json::to_string(&wire).map_err(|source| SplitError::Encode {
            sequence: self.sequence,
            total: self.total,
            source,
        })
    }
}
