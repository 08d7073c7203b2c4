use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::types::{DraftRecord, unix_timestamp_seconds};
use super::{DraftStore, StorageResult};

/// Draft store that lives for the process only.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftRecord>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DraftRecord>> {
        self.drafts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DraftStore for MemoryDraftStore {
    fn save_draft(&self, conversation_id: &str, text: &str) -> StorageResult<()> {
        let mut drafts = self.lock();
        if text.is_empty() {
            drafts.remove(conversation_id);
            return Ok(());
        }

        drafts.insert(
            conversation_id.to_string(),
            DraftRecord {
                conversation_id: conversation_id.to_string(),
                text: text.to_string(),
                updated_at_unix_seconds: unix_timestamp_seconds().max(0) as u64,
            },
        );
        Ok(())
    }

    fn load_draft(&self, conversation_id: &str) -> StorageResult<Option<String>> {
        Ok(self
            .lock()
            .get(conversation_id)
            .map(|record| record.text.clone()))
    }

    fn clear_draft(&self, conversation_id: &str) -> StorageResult<()> {
        self.lock().remove(conversation_id);
        Ok(())
    }

    fn list_drafts(&self) -> StorageResult<Vec<DraftRecord>> {
        let mut records = self.lock().values().cloned().collect::<Vec<_>>();
        records.sort_by(|left, right| {
            right
                .updated_at_unix_seconds
                .cmp(&left.updated_at_unix_seconds)
                .then_with(|| left.conversation_id.cmp(&right.conversation_id))
        });
        Ok(records)
    }
}
