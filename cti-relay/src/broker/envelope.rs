//! Wire envelope handed to the broker for each chunk.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bundle_split::Chunk;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Message body published for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Platform user the import is applied as.
    pub applicant_id: String,
    /// 1-based chunk sequence within the bundle.
    pub action_sequence: usize,
    pub work_id: String,
    pub entities_types: Vec<String>,
    /// Base64 of the chunk's serialized bundle.
    pub content: String,
    /// Whether existing platform data should be updated.
    pub update: bool,
}

impl Envelope {
    pub fn for_chunk(
        chunk: &Chunk,
        applicant_id: &str,
        work_id: &str,
        update: bool,
    ) -> Result<Self> {
        let bundle = chunk.to_bundle_json()?;
        Ok(Self {
            applicant_id: applicant_id.to_string(),
            action_sequence: chunk.sequence(),
            work_id: work_id.to_string(),
            entities_types: Vec::new(),
            content: STANDARD.encode(bundle.as_bytes()),
            update,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the carried bundle document.
    pub fn decode_content(&self) -> Result<String> {
        let bytes = STANDARD
            .decode(&self.content)
            .map_err(|e| crate::Error::validation(format!("envelope content is not base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| crate::Error::validation(format!("envelope content is not UTF-8: {e}")))
    }
}
