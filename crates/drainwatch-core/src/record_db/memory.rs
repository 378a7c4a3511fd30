//! In-process record store. Used when the SQLite file cannot be opened
//! (records then only last as long as the process) and by tests that run
//! under paused tokio time, where real I/O would let the clock jump ahead.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::types::PersistedJobRecord;
use super::RecordStore;
use crate::clock::UnixMillis;
use crate::job::ResourceId;

#[derive(Debug, Default)]
pub struct MemoryRecords {
    rows: Mutex<HashMap<ResourceId, PersistedJobRecord>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceId, PersistedJobRecord>> {
        // A panic while holding the lock cannot leave a row half-written.
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn save(&self, record: &PersistedJobRecord) -> Result<()> {
        self.rows()
            .insert(record.request.resource_id.clone(), record.clone());
        Ok(())
    }

    async fn update_if_current(&self, record: &PersistedJobRecord) -> Result<bool> {
        let mut rows = self.rows();
        match rows.get_mut(&record.request.resource_id) {
            Some(row) if row.created_at() == record.created_at() => {
                *row = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load(&self, resource_id: &ResourceId) -> Result<Option<PersistedJobRecord>> {
        Ok(self.rows().get(resource_id).cloned())
    }

    async fn list(&self) -> Result<Vec<PersistedJobRecord>> {
        let mut out: Vec<PersistedJobRecord> = self.rows().values().cloned().collect();
        out.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.request.resource_id.cmp(&b.request.resource_id))
        });
        Ok(out)
    }

    async fn delete(&self, resource_id: &ResourceId) -> Result<bool> {
        Ok(self.rows().remove(resource_id).is_some())
    }

    async fn delete_if_current(
        &self,
        resource_id: &ResourceId,
        created_at: UnixMillis,
    ) -> Result<bool> {
        let mut rows = self.rows();
        if rows.get(resource_id).map(|r| r.created_at()) == Some(created_at) {
            rows.remove(resource_id);
            return Ok(true);
        }
        Ok(false)
    }
}
