/// File metadata store
///
/// Structured records describing stored blobs and their lifecycle state.

pub mod models;
pub mod sqlite;

pub use models::*;
pub use sqlite::SqliteMetadataStore;

use crate::error::VaultResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Metadata store contract
///
/// Implementations must tolerate concurrent inserts and updates keyed by
/// distinct ids.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a Pending record, returning the generated id
    async fn create(&self, record: NewFileRecord) -> VaultResult<Option<Uuid>>;

    /// Flip a record to Available at `location`; false if no row matched
    async fn mark_available(&self, id: Uuid, location: &str) -> VaultResult<bool>;

    /// Fetch a record by id, restricted to `owner` (None = anonymous)
    async fn get_by_id_and_owner(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> VaultResult<Option<FileRecord>>;
}
