//! JSON-file-backed slide store.
//!
//! Holds the corpus in memory and rewrites the file on every mutation
//! via temp-file-and-rename, so a crash mid-write never corrupts the
//! store. Fine for the corpus sizes a single library holds.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use super::{merge_for_update, Result, SlideRepository, UpsertOutcome};
use crate::models::SlideDraft;

#[derive(Debug)]
struct StoreInner {
    slides: Vec<SlideDraft>,
}

/// Slide store persisted to a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonSlideStore {
    path: PathBuf,
    inner: Arc<RwLock<StoreInner>>,
}

impl JsonSlideStore {
    /// Open the store, loading existing slides if the file exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let slides = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };
        info!(path = %path.display(), count = slides.len(), "opened slide store");
        Ok(Self {
            path,
            inner: Arc::new(RwLock::new(StoreInner { slides })),
        })
    }

    fn flush(&self, slides: &[SlideDraft]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(slides)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl SlideRepository for JsonSlideStore {
    async fn find_by_source(
        &self,
        document_id: &str,
        node_id: &str,
    ) -> Result<Option<SlideDraft>> {
        let inner = self.inner.read().await;
        Ok(inner
            .slides
            .iter()
            .find(|s| s.source_key() == (document_id, node_id))
            .cloned())
    }

    async fn upsert(&self, mut draft: SlideDraft) -> Result<UpsertOutcome> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .slides
            .iter()
            .position(|s| s.source_key() == draft.source_key());

        let outcome = match existing {
            Some(index) => {
                let mut merged = merge_for_update(&inner.slides[index], draft);
                merged.updated_at = Utc::now();
                inner.slides[index] = merged;
                UpsertOutcome::Updated
            }
            None => {
                draft.updated_at = draft.created_at;
                inner.slides.push(draft);
                UpsertOutcome::Created
            }
        };

        self.flush(&inner.slides)?;
        Ok(outcome)
    }

    async fn list_all(&self) -> Result<Vec<SlideDraft>> {
        let inner = self.inner.read().await;
        let mut all = inner.slides.clone();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.source_key().cmp(&b.source_key()))
        });
        Ok(all)
    }
}
