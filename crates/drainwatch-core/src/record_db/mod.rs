//! Durable record of in-flight jobs (SQLite via sqlx).
//!
//! One row per resource id holding the request and, once known, the
//! baseline snapshot. Rows are written at job start and deleted on any
//! terminal transition, so whatever is left after a crash or restart is
//! exactly the set of jobs that may be resumed.

mod db;
mod memory;
mod records;
mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::clock::UnixMillis;
use crate::job::ResourceId;

pub use db::RecordDb;
pub use memory::MemoryRecords;
pub use types::PersistedJobRecord;

#[cfg(test)]
pub(crate) use db::open_memory;

/// Record operations the controller and samplers rely on.
///
/// `created_at` identifies which job owns a key; the `_if_current` variants
/// do nothing when a newer job has taken the resource over.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: &PersistedJobRecord) -> Result<()>;
    async fn update_if_current(&self, record: &PersistedJobRecord) -> Result<bool>;
    async fn load(&self, resource_id: &ResourceId) -> Result<Option<PersistedJobRecord>>;
    /// Oldest first.
    async fn list(&self) -> Result<Vec<PersistedJobRecord>>;
    async fn delete(&self, resource_id: &ResourceId) -> Result<bool>;
    async fn delete_if_current(&self, resource_id: &ResourceId, created_at: UnixMillis)
        -> Result<bool>;
}

#[async_trait]
impl RecordStore for RecordDb {
    async fn save(&self, record: &PersistedJobRecord) -> Result<()> {
        RecordDb::save(self, record).await
    }

    async fn update_if_current(&self, record: &PersistedJobRecord) -> Result<bool> {
        RecordDb::update_if_current(self, record).await
    }

    async fn load(&self, resource_id: &ResourceId) -> Result<Option<PersistedJobRecord>> {
        RecordDb::load(self, resource_id).await
    }

    async fn list(&self) -> Result<Vec<PersistedJobRecord>> {
        RecordDb::list(self).await
    }

    async fn delete(&self, resource_id: &ResourceId) -> Result<bool> {
        RecordDb::delete(self, resource_id).await
    }

    async fn delete_if_current(
        &self,
        resource_id: &ResourceId,
        created_at: UnixMillis,
    ) -> Result<bool> {
        RecordDb::delete_if_current(self, resource_id, created_at).await
    }
}
