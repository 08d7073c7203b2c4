/// One persisted unsent draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    pub conversation_id: String,
    pub text: String,
    pub updated_at_unix_seconds: u64,
}

pub(crate) fn unix_timestamp_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_secs() as i64)
}
