//! Atomic multi-document write batches.

use crate::document::{Document, DocumentId};

/// What a batch operation does to its target document.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Insert a new document; fails if the id is taken.
    Create(Document),
    /// Insert or fully replace a document.
    Set(Document),
    /// Overwrite the given top-level fields; the document must exist.
    Merge(Document),
    /// Remove the document; it must exist.
    Delete,
    /// Write nothing, only check the current version.
    ///
    /// `None` requires the document to be absent.
    Require(Option<u64>),
}

/// One operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOp {
    /// Target collection.
    pub collection: String,
    /// Target document id.
    pub id: DocumentId,
    /// The operation.
    pub action: Action,
}

/// A set of document writes applied all-or-nothing.
///
/// Operations are validated in order, each one against the state left by
/// the operations before it. If any check fails the whole batch is rejected
/// and nothing is written.
///
/// # Example
///
/// ```rust
/// use smsrelay_docstore::WriteBatch;
/// use serde_json::{json, Map};
///
/// let mut fields = Map::new();
/// fields.insert("next".into(), json!("b"));
///
/// let mut batch = WriteBatch::new();
/// batch
///     .require_version("queues", "q1", Some(4))
///     .merge("nodes", "a", fields)
///     .delete("nodes", "z");
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, collection: &str, id: &str, action: Action) -> &mut Self {
        self.ops.push(BatchOp {
            collection: collection.to_string(),
            id: id.to_string(),
            action,
        });
        self
    }

    /// Adds a create of a new document.
    pub fn create(&mut self, collection: &str, id: &str, data: Document) -> &mut Self {
        self.push(collection, id, Action::Create(data))
    }

    /// Adds an insert-or-replace.
    pub fn set(&mut self, collection: &str, id: &str, data: Document) -> &mut Self {
        self.push(collection, id, Action::Set(data))
    }

    /// Adds a shallow merge of `fields` into an existing document.
    pub fn merge(&mut self, collection: &str, id: &str, fields: Document) -> &mut Self {
        self.push(collection, id, Action::Merge(fields))
    }

    /// Adds a delete of an existing document.
    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.push(collection, id, Action::Delete)
    }

    /// Adds a version precondition.
    ///
    /// `Some(v)` requires the document to exist at version `v`; `None`
    /// requires it to be absent.
    pub fn require_version(
        &mut self,
        collection: &str,
        id: &str,
        version: Option<u64>,
    ) -> &mut Self {
        self.push(collection, id, Action::Require(version))
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Sequence number assigned to the batch.
    ///
    /// Every document the batch wrote now has this version.
    pub sequence: u64,
    /// Number of operations in the batch.
    pub operations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_keep_insertion_order() {
        let mut batch = WriteBatch::new();
        batch
            .create("c", "1", Document::new())
            .set("c", "2", Document::new())
            .delete("c", "3");

        let ids: Vec<_> = batch.ops().iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(matches!(batch.ops()[2].action, Action::Delete));
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
