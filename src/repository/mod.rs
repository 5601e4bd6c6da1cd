//! Persistence boundary for slide drafts.
//!
//! The relational store behind the moderation UI is an external
//! collaborator; the pipeline only needs upsert-by-natural-key and a few
//! lookups, expressed by [`SlideRepository`]. Two implementations ship
//! with the crate: an in-memory store for tests and a JSON-file store
//! that makes the CLI usable standalone.

mod json;
mod memory;

pub use json::JsonSlideStore;
pub use memory::MemorySlideStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SlideDraft;

/// Errors from a slide store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Whether an upsert created a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Store for persisted slide drafts, keyed by
/// `(source_document_id, source_node_id)`.
#[async_trait]
pub trait SlideRepository: Send + Sync {
    /// Look up a slide by its natural key.
    async fn find_by_source(
        &self,
        document_id: &str,
        node_id: &str,
    ) -> Result<Option<SlideDraft>>;

    /// Insert or update by natural key. Updating preserves the stored
    /// `id`, `created_at`, and `is_active`; re-ingestion never duplicates
    /// and never un-publishes a slide.
    async fn upsert(&self, draft: SlideDraft) -> Result<UpsertOutcome>;

    /// All slides, in creation order.
    async fn list_all(&self) -> Result<Vec<SlideDraft>>;
}

/// Merge an incoming draft over a stored one for an update.
///
/// Shared by implementations so upsert semantics cannot drift between
/// stores.
pub(crate) fn merge_for_update(stored: &SlideDraft, mut incoming: SlideDraft) -> SlideDraft {
    incoming.id = stored.id.clone();
    incoming.created_at = stored.created_at;
    incoming.is_active = stored.is_active;
    if !stored.tags.is_empty() && incoming.tags.is_empty() {
        incoming.tags = stored.tags.clone();
    }
    incoming
}
