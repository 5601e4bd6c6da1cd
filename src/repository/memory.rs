//! In-memory slide store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{merge_for_update, Result, SlideRepository, UpsertOutcome};
use crate::models::SlideDraft;

/// HashMap-backed store keyed by the natural key. Cheap to clone; clones
/// share state.
#[derive(Debug, Clone, Default)]
pub struct MemorySlideStore {
    slides: Arc<RwLock<HashMap<(String, String), SlideDraft>>>,
}

impl MemorySlideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.slides.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slides.read().await.is_empty()
    }
}

#[async_trait]
impl SlideRepository for MemorySlideStore {
    async fn find_by_source(
        &self,
        document_id: &str,
        node_id: &str,
    ) -> Result<Option<SlideDraft>> {
        let slides = self.slides.read().await;
        Ok(slides
            .get(&(document_id.to_string(), node_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, mut draft: SlideDraft) -> Result<UpsertOutcome> {
        let key = (
            draft.source_document_id.clone(),
            draft.source_node_id.clone(),
        );
        let mut slides = self.slides.write().await;
        match slides.get(&key) {
            Some(stored) => {
                let mut merged = merge_for_update(stored, draft);
                merged.updated_at = Utc::now();
                slides.insert(key, merged);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                draft.updated_at = draft.created_at;
                slides.insert(key, draft);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<SlideDraft>> {
        let slides = self.slides.read().await;
        let mut all: Vec<SlideDraft> = slides.values().cloned().collect();
        // Map iteration order is arbitrary; break timestamp ties on the
        // natural key so callers see a stable order.
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.source_key().cmp(&b.source_key()))
        });
        Ok(all)
    }
}
