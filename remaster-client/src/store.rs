//! Persistence adapter contract
//!
//! The client performs no storage of its own. Hosts implement [`JobStore`]
//! over whatever they have (a relational table, a document store, a
//! metadata sidecar) and drive the state machine through it. Values are
//! strings; structured payloads such as reports are stored as JSON text.

use async_trait::async_trait;

/// Canonical per-entity keys for mastering bookkeeping.
///
/// Every process touching one entity's job must address the same keys,
/// whichever host component it runs in.
pub mod keys {
    /// Persisted [`JobState`](crate::JobState) string.
    pub const STATE: &str = "mastering_state";
    /// Remote job id returned by job creation.
    pub const JOB_ID: &str = "mastering_job_id";
    /// Last normalized report, serialized as JSON.
    pub const REPORT: &str = "mastering_report";
    /// Human-readable progress or failure message.
    pub const MESSAGE: &str = "mastering_message";
    /// Remote id of the mastered artifact, set on completion.
    pub const OUTPUT_AUDIO_ID: &str = "mastering_output_audio_id";
    /// SHA-256 of the source file at submission time.
    pub const SOURCE_HASH: &str = "mastering_source_hash";
    /// RFC 3339 instant the remote accepted the job.
    pub const SUBMITTED_AT: &str = "mastering_submitted_at";
    /// Nonce distinguishing one submission attempt from the next.
    pub const ATTEMPT: &str = "mastering_attempt";
}

/// Key-value persistence scoped per entity (track, post, file).
///
/// `entity` is an opaque host-chosen identifier. Implementations must make
/// `set` an upsert and `delete` a no-op for absent keys.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, entity: &str, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, entity: &str, key: &str, value: &str) -> anyhow::Result<()>;

    async fn delete(&self, entity: &str, key: &str) -> anyhow::Result<()>;
}
