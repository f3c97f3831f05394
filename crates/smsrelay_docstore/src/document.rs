//! Document types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document body: a JSON object.
pub type Document = Map<String, Value>;

/// Opaque document id. Generated ids are UUID v4 text.
pub type DocumentId = String;

/// Generates a fresh document id.
#[must_use]
pub fn generate_id() -> DocumentId {
    uuid::Uuid::new_v4().to_string()
}

/// A stored document together with its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    /// Document id.
    pub id: DocumentId,
    /// Sequence number of the commit that last wrote this document.
    pub version: u64,
    /// Document body.
    pub data: Document,
}

impl VersionedDocument {
    /// Returns a string field, or `None` if absent or not a string.
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Returns an unsigned integer field, or `None` if absent or not a `u64`.
    #[must_use]
    pub fn u64_field(&self, field: &str) -> Option<u64> {
        self.data.get(field).and_then(Value::as_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn typed_field_access() {
        let Value::Object(data) = json!({"name": "q", "len": 3, "neg": -1}) else {
            unreachable!()
        };
        let doc = VersionedDocument {
            id: "d".into(),
            version: 1,
            data,
        };
        assert_eq!(doc.str_field("name"), Some("q"));
        assert_eq!(doc.u64_field("len"), Some(3));
        assert_eq!(doc.u64_field("neg"), None);
        assert_eq!(doc.str_field("len"), None);
        assert_eq!(doc.str_field("missing"), None);
    }
}
