//! Metadata repository trait
//!
//! Defines the interface for the keyed metadata store. All operations are
//! single-key and atomic per call; the pipeline never takes out-of-band
//! locks. Implementations exist for in-memory and PostgreSQL backends.

use async_trait::async_trait;
use tokio::sync::broadcast;

use darkroom_core::types::{AttributeName, MetadataRecord, RecordChange};
use darkroom_core::Result;

/// Buffered capacity of the change stream. Lagging subscribers skip ahead
/// rather than blocking writers.
pub const CHANGE_STREAM_CAPACITY: usize = 256;

/// Metadata repository trait
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Create or replace the record for `file_name` as a bare record.
    ///
    /// Idempotent: calling twice with the same key leaves exactly one
    /// record and never fails on a duplicate key. Replacing an existing
    /// record resets its attributes.
    async fn put(&self, file_name: &str, bucket: &str) -> Result<()>;

    /// Set a single attribute on an existing record.
    ///
    /// Returns [`darkroom_core::Error::RecordNotFound`] when no record
    /// exists for `file_name`; that is a legitimate outcome the caller's
    /// retry/drop policy must handle.
    async fn update(&self, file_name: &str, attribute: AttributeName, value: &str) -> Result<()>;

    /// Remove the full record. Deleting an absent key is not an error.
    async fn delete(&self, file_name: &str) -> Result<()>;

    /// Fetch the record for `file_name`, if any.
    async fn get(&self, file_name: &str) -> Result<Option<MetadataRecord>>;

    /// Subscribe to the store's change stream.
    ///
    /// `Inserted` fires only when `put` created a previously-absent key;
    /// replaces and attribute writes fire `Modified`, actual deletes fire
    /// `Removed`.
    fn changes(&self) -> broadcast::Receiver<RecordChange>;
}
