use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bundle_split::IntelObject;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::Collector;
use crate::domain::Checkpoint;
use crate::{Error, Result};

/// Checkpoint key holding the modification time of the last imported file.
pub const FEED_MODIFIED_KEY: &str = "feed_modified_at";
/// Checkpoint key holding the unix timestamp of the last run.
pub const LAST_RUN_KEY: &str = "last_run";

/// Reads objects from a local JSON file.
///
/// The file holds either a JSON array of objects or a bundle document with an
/// `objects` array. A file whose modification time matches the checkpoint is
/// skipped.
#[derive(Debug, Clone)]
pub struct FileFeedCollector {
    path: PathBuf,
}

impl FileFeedCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modified_at(&self) -> Result<String> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            Error::collector(format!("cannot stat feed {}: {e}", self.path.display()))
        })?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        Ok(modified.to_rfc3339())
    }
}

#[async_trait]
impl Collector for FileFeedCollector {
    fn name(&self) -> &'static str {
        "file-feed"
    }

    #[instrument(skip(self, checkpoint), fields(path = %self.path.display()))]
    async fn collect(&self, checkpoint: &mut Checkpoint) -> Result<Vec<IntelObject>> {
        checkpoint.insert(LAST_RUN_KEY, Utc::now().timestamp());

        let modified = self.modified_at().await?;
        if checkpoint.get(FEED_MODIFIED_KEY).and_then(Value::as_str) == Some(modified.as_str()) {
            info!(modified = %modified, "Feed unchanged since last import, nothing to collect");
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::collector(format!("cannot read feed {}: {e}", self.path.display()))
        })?;
        let objects = parse_feed(&raw)?;
        debug!(count = objects.len(), "Feed parsed");

        checkpoint.insert(FEED_MODIFIED_KEY, modified);
        Ok(objects)
    }
}

fn parse_feed(raw: &[u8]) -> Result<Vec<IntelObject>> {
    let document: Value = serde_json::from_slice(raw)
        .map_err(|e| Error::collector(format!("feed is not valid JSON: {e}")))?;

    match document {
        Value::Array(objects) => Ok(objects),
        Value::Object(mut map) => match map.remove("objects") {
            Some(Value::Array(objects)) => Ok(objects),
            Some(_) => Err(Error::collector("feed 'objects' is not an array")),
            None => Err(Error::collector("feed document has no 'objects' array")),
        },
        _ => Err(Error::collector(
            "feed must be a JSON array or a document with an 'objects' array",
        )),
    }
}
