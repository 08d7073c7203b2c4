pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryDraftStore;
pub use sqlite::SqliteDraftStore;
pub use types::DraftRecord;

/// Per-conversation persistence of unsent input text.
///
/// Saving an empty text removes the draft, so a later load yields `None`.
pub trait DraftStore: Send + Sync {
    fn save_draft(&self, conversation_id: &str, text: &str) -> StorageResult<()>;
    fn load_draft(&self, conversation_id: &str) -> StorageResult<Option<String>>;
    fn clear_draft(&self, conversation_id: &str) -> StorageResult<()>;
    /// Every stored draft, most recently updated first.
    fn list_drafts(&self) -> StorageResult<Vec<DraftRecord>>;
}
