//! Chunking policy.

use tracing::{debug, trace};

use crate::bundle::{Bundle, Chunk, IntelObject, wrapper_len};
use crate::SplitError;

/// Default maximum number of objects per chunk.
pub const DEFAULT_MAX_OBJECTS: usize = 100;

/// Default maximum payload size per chunk (4 MiB).
pub const DEFAULT_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Ceilings applied when splitting a bundle.
///
/// `max_bytes` bounds the whole document produced by [`Chunk::to_bundle_json`]:
/// the bundle wrapper, the encoded objects and one separator byte between
/// consecutive objects. An object that does not fit on its own is never split;
/// it travels alone in its own chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPolicy {
    max_objects: usize,
    max_bytes: usize,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            max_objects: DEFAULT_MAX_OBJECTS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl SplitPolicy {
    /// Create a policy, rejecting zero ceilings.
    pub fn new(max_objects: usize, max_bytes: usize) -> Result<Self, SplitError> {
        if max_objects == 0 {
            return Err(SplitError::InvalidPolicy(
                "max_objects must be greater than zero".to_string(),
            ));
        }
        if max_bytes == 0 {
            return Err(SplitError::InvalidPolicy(
                "max_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_objects,
            max_bytes,
        })
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Encoded size of a run of objects and their separators, without the wrapper.
    pub fn payload_len(objects: &[IntelObject]) -> usize {
        let separators = objects.len().saturating_sub(1);
        objects.iter().map(encoded_len).sum::<usize>() + separators
    }

    /// Partition `bundle` into chunks numbered `1..=N`.
    ///
    /// Total and deterministic: an empty bundle yields no chunks, and object `n`
    /// never lands in a lower-numbered chunk than object `n - 1`.
    pub fn split(&self, bundle: Bundle) -> Vec<Chunk> {
        let (bundle_id, objects) = bundle.into_parts();
        if objects.is_empty() {
            return Vec::new();
        }

        let object_count = objects.len();
        let overhead = wrapper_len(&bundle_id);
        let mut groups: Vec<Vec<IntelObject>> = Vec::new();
        let mut current: Vec<IntelObject> = Vec::new();
        let mut current_bytes = 0usize;

        for object in objects {
            let size = encoded_len(&object);

            if !current.is_empty() {
                let projected = current_bytes + 1 + size;
                if current.len() >= self.max_objects || overhead + projected > self.max_bytes {
                    trace!(
                        objects = current.len(),
                        bytes = current_bytes,
                        "Closing chunk"
                    );
                    groups.push(std::mem::take(&mut current));
                    current_bytes = 0;
                }
            }

            current_bytes = if current.is_empty() {
                size
            } else {
                current_bytes + 1 + size
            };
            current.push(object);
        }
        groups.push(current);

        let total = groups.len();
        debug!(
            bundle_id = %bundle_id,
            objects = object_count,
            chunks = total,
            "Split bundle"
        );

        groups
            .into_iter()
            .enumerate()
            .map(|(index, objects)| Chunk::new(bundle_id.clone(), index + 1, total, objects))
            .collect()
    }
}

fn encoded_len(object: &IntelObject) -> usize {
    serde_json::to_vec(object)
        .map(|bytes| bytes.len())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn objects(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({ "type": "indicator", "id": format!("indicator--{i}") }))
            .collect()
    }

    #[test]
    fn test_empty_bundle_yields_no_chunks() {
        let chunks = SplitPolicy::default().split(Bundle::new(Vec::new()));
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_zero_ceilings_rejected() {
        assert!(SplitPolicy::new(0, 10).is_err());
        assert!(SplitPolicy::new(10, 0).is_err());
    }

    #[rstest]
    #[case(250, 100, vec![100, 100, 50])]
    #[case(100, 100, vec![100])]
    #[case(101, 100, vec![100, 1])]
    #[case(1, 100, vec![1])]
    #[case(7, 3, vec![3, 3, 1])]
    fn test_count_ceiling(
        #[case] count: usize,
        #[case] max_objects: usize,
        #[case] expected: Vec<usize>,
    ) {
        let policy = SplitPolicy::new(max_objects, DEFAULT_MAX_BYTES).unwrap();
        let chunks = policy.split(Bundle::new(objects(count)));

        let sizes: Vec<usize> = chunks.iter().map(|c| c.objects().len()).collect();
        assert_eq!(sizes, expected);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence(), index + 1);
            assert_eq!(chunk.total(), expected.len());
        }
        assert!(chunks.last().unwrap().is_last());
    }

    #[test]
    fn test_concatenation_preserves_order() {
        let original = objects(37);
        let bundle = Bundle::with_id("bundle--order", original.clone());
        let chunks = SplitPolicy::new(5, 200).unwrap().split(bundle);

        let rebuilt: Vec<Value> = chunks
            .iter()
            .flat_map(|c| c.objects().iter().cloned())
            .collect();
        assert_eq!(rebuilt, original);
        assert!(chunks.iter().all(|c| c.bundle_id() == "bundle--order"));
    }

    #[test]
    fn test_byte_ceiling_covers_serialized_chunk() {
        let max_bytes = 300;
        let policy = SplitPolicy::new(1000, max_bytes).unwrap();
        let chunks = policy.split(Bundle::new(objects(40)));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.objects().len() > 1);
            let document = chunk.to_bundle_json().unwrap();
            assert!(document.len() <= max_bytes, "{} > {max_bytes}", document.len());
            assert_eq!(
                document.len(),
                wrapper_len(chunk.bundle_id()) + SplitPolicy::payload_len(chunk.objects())
            );
        }
    }

    #[test]
    fn test_oversized_object_travels_alone() {
        let big = json!({ "type": "note", "content": "x".repeat(500) });
        let small = json!({ "type": "note", "content": "y" });
        let policy = SplitPolicy::new(10, 100).unwrap();
        let chunks = policy.split(Bundle::new(vec![small.clone(), big.clone(), small.clone()]));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].objects(), &[big]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let bundle = Bundle::with_id("bundle--same", objects(23));
        let policy = SplitPolicy::new(4, 120).unwrap();
        assert_eq!(policy.split(bundle.clone()), policy.split(bundle));
    }
}
