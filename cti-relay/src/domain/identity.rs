//! Connector identity.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Kind of connector declared to the platform at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorType {
    /// Pulls data from an external source on a schedule.
    #[default]
    ExternalImport,
    /// Enriches existing platform entities on demand.
    InternalEnrichment,
    /// Imports files uploaded to the platform.
    InternalImportFile,
    /// Exports platform data to files.
    InternalExportFile,
    /// Consumes the platform live stream.
    Stream,
}

impl ConnectorType {
    /// Wire representation used by the platform API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalImport => "EXTERNAL_IMPORT",
            Self::InternalEnrichment => "INTERNAL_ENRICHMENT",
            Self::InternalImportFile => "INTERNAL_IMPORT_FILE",
            Self::InternalExportFile => "INTERNAL_EXPORT_FILE",
            Self::Stream => "STREAM",
        }
    }

    /// Parse the wire representation (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXTERNAL_IMPORT" => Some(Self::ExternalImport),
            "INTERNAL_ENRICHMENT" => Some(Self::InternalEnrichment),
            "INTERNAL_IMPORT_FILE" => Some(Self::InternalImportFile),
            "INTERNAL_EXPORT_FILE" => Some(Self::InternalExportFile),
            "STREAM" => Some(Self::Stream),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable identity of this connector.
///
/// Built once at startup and used to tag every work unit and envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorIdentity {
    pub id: String,
    pub name: String,
    pub connector_type: ConnectorType,
    pub scope: Vec<String>,
}

impl ConnectorIdentity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        connector_type: ConnectorType,
        scope: Vec<String>,
    ) -> Result<Self, Error> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::validation("connector id is empty"));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("connector name is empty"));
        }
        Ok(Self {
            id,
            name,
            connector_type,
            scope,
        })
    }

    /// Split a comma-separated scope string into trimmed, non-empty labels.
    pub fn parse_scope(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_type_round_trip() {
        for ty in [
            ConnectorType::ExternalImport,
            ConnectorType::InternalEnrichment,
            ConnectorType::InternalImportFile,
            ConnectorType::InternalExportFile,
            ConnectorType::Stream,
        ] {
            assert_eq!(ConnectorType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(
            ConnectorType::parse("external_import"),
            Some(ConnectorType::ExternalImport)
        );
        assert_eq!(ConnectorType::parse("bogus"), None);
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(
            ConnectorIdentity::parse_scope("stix2, indicator,,"),
            vec!["stix2".to_string(), "indicator".to_string()]
        );
        assert!(ConnectorIdentity::parse_scope("").is_empty());
    }

    #[test]
    fn test_identity_rejects_blank_id() {
        let result = ConnectorIdentity::new(" ", "feed", ConnectorType::ExternalImport, vec![]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
