//! Database layer (Firestore, with an in-memory fallback).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    pub const ACTIVITIES: &str = "activities";
    /// Ingested stream headers, one document per activity
    pub const ACTIVITY_STREAMS: &str = "activity_streams";
    /// Stream points in fixed-size chunks, `{activity_id}_{chunk}`
    pub const ACTIVITY_STREAM_CHUNKS: &str = "activity_stream_chunks";
    pub const QUALITY_METRICS: &str = "activity_quality_metrics";
    pub const QUALITY_LABELS: &str = "activity_quality_labels";
    pub const ML_FEATURES: &str = "activity_ml_features";
}

/// Filters for listing quality labels.
#[derive(Debug, Clone, Default)]
pub struct LabelQuery {
    pub label_bad: Option<bool>,
    pub label_source: Option<String>,
    pub activity_id: Option<u64>,
    pub limit: u32,
    pub offset: u32,
}
