//! Core data models for the knowledge graph.
//!
//! These types represent the documents, entities, relationships, and links
//! that flow through the scan, extraction, and retrieval pipeline.

use anyhow::{bail, Result};

/// Document processing state, stored as an INTEGER column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processed,
    Errored,
}

impl ProcessingStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            ProcessingStatus::Pending => 0,
            ProcessingStatus::Processed => 1,
            ProcessingStatus::Errored => 2,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self> {
        match value {
            0 => Ok(ProcessingStatus::Pending),
            1 => Ok(ProcessingStatus::Processed),
            2 => Ok(ProcessingStatus::Errored),
            other => bail!("Invalid processing status: {}", other),
        }
    }
}

/// A stored document: either backed by a vault file or a manually added entry.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// `"file"` or `"entry"`.
    pub kind: String,
    pub file_path: Option<String>,
    pub file_hash: Option<String>,
    pub file_type: Option<String>,
    /// Inline content for entry documents.
    pub content: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    /// Free-form metadata as a JSON object string.
    pub metadata: Option<String>,
    pub extracted_text: Option<String>,
    pub processed: i64,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn status(&self) -> ProcessingStatus {
        ProcessingStatus::from_i64(self.processed).unwrap_or(ProcessingStatus::Pending)
    }

    /// Text to feed downstream consumers: inline content for entries,
    /// extracted text otherwise.
    pub fn body(&self) -> &str {
        self.content
            .as_deref()
            .or(self.extracted_text.as_deref())
            .unwrap_or("")
    }
}

/// A deduplicated named referent in the graph.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    /// Alias strings as a JSON array string, oldest first.
    pub aliases: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity {
    /// Decode the alias JSON column; malformed data degrades to empty.
    pub fn alias_list(&self) -> Vec<String> {
        serde_json::from_str(&self.aliases).unwrap_or_default()
    }
}

/// A directed typed edge between two entities.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub rel_type: String,
    pub properties: String,
    pub created_at: String,
}

/// Edge direction relative to a queried entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A one-hop neighbor of an entity, tagged with the connecting edge.
#[derive(Debug, Clone)]
pub struct RelatedEntity {
    pub entity: Entity,
    pub rel_type: String,
    pub direction: Direction,
}

/// A document that mentions an entity, with the recorded mention string.
#[derive(Debug, Clone)]
pub struct EntityDocument {
    pub document_id: String,
    pub kind: String,
    pub file_path: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub content: Option<String>,
    pub mention: Option<String>,
}

/// Aggregate result of one vault scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

/// Document counts by state, for `note status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCounts {
    pub total: i64,
    pub files: i64,
    pub entries: i64,
    pub processed: i64,
    pub pending: i64,
    pub errored: i64,
}

/// Current timestamp in the format persisted to the database.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Today's date as `YYYY-MM-DD`, used for entry documents.
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processed,
            ProcessingStatus::Errored,
        ] {
            assert_eq!(
                ProcessingStatus::from_i64(status.as_i64()).unwrap(),
                status
            );
        }
        assert!(ProcessingStatus::from_i64(7).is_err());
    }

    #[test]
    fn test_alias_list_malformed_json() {
        let entity = Entity {
            id: "e1".to_string(),
            name: "Acme".to_string(),
            entity_type: "organization".to_string(),
            aliases: "not json".to_string(),
            metadata: "{}".to_string(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };
        assert!(entity.alias_list().is_empty());
    }

    #[test]
    fn test_document_body_prefers_content() {
        let mut doc = Document {
            id: "d1".to_string(),
            kind: "entry".to_string(),
            file_path: None,
            file_hash: None,
            file_type: None,
            content: Some("inline".to_string()),
            title: None,
            date: None,
            metadata: None,
            extracted_text: Some("extracted".to_string()),
            processed: 0,
            error_msg: None,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };
        assert_eq!(doc.body(), "inline");
        doc.content = None;
        assert_eq!(doc.body(), "extracted");
    }
}
