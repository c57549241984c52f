//! Normalized entity model
//!
//! Every connector decomposes its source's object graph into [`Entity`]
//! values. An entity carries a stable `entity_id` (unique within one
//! source + sync), the indexable `content`, the breadcrumb chain back to its
//! root ancestor, and source-specific typed attributes serialized as JSON.
//!
//! The [`EntityKind`] separates hierarchy-only records from indexable chunks:
//! only chunks (including files and table rows) are tracked by the change
//! detector and forwarded to the destination.

pub mod discord;
pub mod dixa;
pub mod intercom;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tributary_common::hash::sha256_hex_fields;
use tributary_common::{Result, SyncError};

use crate::introspect::TableDescriptor;

/// One ancestor reference in an entity's provenance path.
///
/// Breadcrumbs are ordered root → immediate parent and never include the
/// entity itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub entity_id: String,
    pub name: String,
    pub kind: String,
}

impl Breadcrumb {
    pub fn new(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Binary reference carried by file entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub download_url: String,
}

/// Record kind. `Record` is hierarchy-only; the other kinds are indexable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    /// Plain metadata-only entity (a guild, a channel, a conversation shell).
    Record,
    /// Entity with indexable content, tracked by the change detector.
    Chunk,
    /// Chunk with an attached binary reference.
    File(FileRef),
    /// Tabular row whose attribute set comes from the introspected
    /// [`TableDescriptor`] built once at sync start.
    Row { descriptor: Arc<TableDescriptor> },
}

/// One normalized record extracted from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub kind: EntityKind,
    pub content: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Hierarchy-only entity without indexable content.
    pub fn record(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: EntityKind::Record,
            content: String::new(),
            breadcrumbs: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Indexable entity.
    pub fn chunk(entity_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            kind: EntityKind::Chunk,
            content: content.into(),
            breadcrumbs: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Indexable entity with a binary reference.
    pub fn file(entity_id: impl Into<String>, file: FileRef) -> Self {
        let content = file.name.clone();
        Self {
            entity_id: entity_id.into(),
            kind: EntityKind::File(file),
            content,
            breadcrumbs: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Tabular row entity. The id is derived from the descriptor's ordered
    /// primary-key values as `schema.table:pk1:pk2:...`.
    pub fn row(descriptor: Arc<TableDescriptor>, values: Map<String, Value>) -> Result<Self> {
        let entity_id = descriptor.row_entity_id(&values)?;
        // serde_json maps are BTreeMap-backed, so this render is canonical.
        let content = serde_json::to_string(&Value::Object(values.clone()))?;
        Ok(Self {
            entity_id,
            kind: EntityKind::Row { descriptor },
            content,
            breadcrumbs: Vec::new(),
            attributes: values,
        })
    }

    pub fn with_breadcrumbs(mut self, breadcrumbs: Vec<Breadcrumb>) -> Self {
        self.breadcrumbs = breadcrumbs;
        self
    }

    /// Attach a typed attribute struct, serialized to the JSON attribute map.
    pub fn with_attributes<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.attributes = attributes_of(value)?;
        Ok(self)
    }

    /// Whether the change detector tracks this entity.
    pub fn is_indexable(&self) -> bool {
        !matches!(self.kind, EntityKind::Record)
    }

    /// Stable hex SHA-256 over the content-bearing fields.
    ///
    /// Covers `content`, the attribute map (canonical key order) and the file
    /// reference. Identity (`entity_id`) and provenance (`breadcrumbs`) are
    /// excluded: moving an entity in the hierarchy is not a content change.
    pub fn content_hash(&self) -> String {
        let attributes = Value::Object(self.attributes.clone()).to_string();
        let mut fields: Vec<String> = vec![self.content.clone(), attributes];
        if let EntityKind::File(file) = &self.kind {
            fields.push(file.file_id.clone());
            fields.push(file.name.clone());
            fields.push(file.mime_type.clone().unwrap_or_default());
            fields.push(file.size.unwrap_or_default().to_string());
            fields.push(file.download_url.clone());
        }
        sha256_hex_fields(fields)
    }
}

/// Serialize a typed struct into an entity attribute map.
pub fn attributes_of<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::Configuration(format!(
            "entity attributes must serialize to a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_entity() -> Entity {
        let mut attributes = Map::new();
        attributes.insert("author_id".to_string(), json!("42"));
        attributes.insert("pinned".to_string(), json!(false));
        Entity {
            entity_id: "msg-1".to_string(),
            kind: EntityKind::Chunk,
            content: "hello there".to_string(),
            breadcrumbs: vec![Breadcrumb::new("guild-1", "Lobby", "guild")],
            attributes,
        }
    }

    #[test]
    fn test_hash_is_stable() {
        let entity = message_entity();
        assert_eq!(entity.content_hash(), entity.content_hash());
        assert_eq!(entity.content_hash(), entity.clone().content_hash());
    }

    #[test]
    fn test_hash_ignores_attribute_insertion_order() {
        let mut a = Map::new();
        a.insert("x".to_string(), json!(1));
        a.insert("y".to_string(), json!(2));
        let mut b = Map::new();
        b.insert("y".to_string(), json!(2));
        b.insert("x".to_string(), json!(1));

        let mut left = message_entity();
        left.attributes = a;
        let mut right = message_entity();
        right.attributes = b;
        assert_eq!(left.content_hash(), right.content_hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let entity = message_entity();
        let mut edited = entity.clone();
        edited.content = "hello there, edited".to_string();
        assert_ne!(entity.content_hash(), edited.content_hash());
    }

    #[test]
    fn test_hash_changes_with_attributes() {
        let entity = message_entity();
        let mut edited = entity.clone();
        edited
            .attributes
            .insert("pinned".to_string(), json!(true));
        assert_ne!(entity.content_hash(), edited.content_hash());
    }

    #[test]
    fn test_hash_ignores_breadcrumbs() {
        let entity = message_entity();
        let mut moved = entity.clone();
        moved.breadcrumbs = vec![
            Breadcrumb::new("guild-2", "Other", "guild"),
            Breadcrumb::new("chan-9", "general", "channel"),
        ];
        assert_eq!(entity.content_hash(), moved.content_hash());
    }

    #[test]
    fn test_hash_covers_file_fields() {
        let file = FileRef {
            file_id: "f-1".to_string(),
            name: "report.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size: Some(1024),
            download_url: "https://cdn.example.com/f-1".to_string(),
        };
        let entity = Entity::file("att-1", file.clone());
        let mut resized = file;
        resized.size = Some(2048);
        let changed = Entity::file("att-1", resized);
        assert_ne!(entity.content_hash(), changed.content_hash());
    }

    #[test]
    fn test_record_is_not_indexable() {
        assert!(!Entity::record("guild-1").is_indexable());
        assert!(Entity::chunk("msg-1", "body").is_indexable());
    }

    #[test]
    fn test_attributes_of_rejects_non_objects() {
        assert!(attributes_of(&"just a string").is_err());
    }
}
