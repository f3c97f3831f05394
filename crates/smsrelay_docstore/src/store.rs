//! Document store trait.

use crate::batch::{CommitReceipt, WriteBatch};
use crate::document::{generate_id, DocumentId, VersionedDocument};
use crate::error::DocStoreResult;
use serde_json::Value;

/// A store of JSON documents grouped into named collections.
///
/// Collections spring into existence on first write. Lookups of missing
/// documents return `None`; only store-level failures are errors.
pub trait DocumentStore: Send + Sync {
    /// Returns a fresh, unused document id.
    fn allocate_id(&self) -> DocumentId {
        generate_id()
    }

    /// Looks up a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure.
    fn get(&self, collection: &str, id: &str) -> DocStoreResult<Option<VersionedDocument>>;

    /// Returns the first document (by id order) whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure.
    fn find_first(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> DocStoreResult<Option<VersionedDocument>>;

    /// Returns every document of a collection, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error only on store failure.
    fn list(&self, collection: &str) -> DocStoreResult<Vec<VersionedDocument>>;

    /// Applies a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns a precondition error (see
    /// [`crate::DocStoreError::is_precondition_failure`]) if any operation
    /// is rejected, in which case nothing was written. Storage failures are
    /// propagated as-is.
    fn commit(&self, batch: WriteBatch) -> DocStoreResult<CommitReceipt>;
}
