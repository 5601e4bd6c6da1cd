//! End-to-end ingestion: fetch tree, classify, retrieve images, extract
//! text, autofill metadata, persist drafts.
//!
//! The run is linear with per-stage error containment. Losing an image
//! or a metadata field costs that field, not the candidate; losing the
//! tree or the credentials costs the run. Per-run state is isolated, so
//! independent runs can proceed concurrently, but within one run all
//! external API I/O is serialized through the retriever's pacer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::autofill::MetadataAutoFiller;
use crate::classify::FrameClassifier;
use crate::client::{ApiError, DocumentApi};
use crate::dedup::{DedupReport, DedupScope, DuplicateDetector, DEFAULT_THRESHOLD};
use crate::extract::TextExtractor;
use crate::images::{ImageOutcome, ImageRetriever};
use crate::models::{CandidateSlide, Node, SlideDraft, SlideMetadata};
use crate::repository::{RepositoryError, SlideRepository, UpsertOutcome};

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Unreachable API, missing token, or rejected credentials.
    #[error(transparent)]
    Api(ApiError),

    /// The API rejected the full-document request for being too large.
    /// Not retried automatically: the caller must pre-select node ids.
    #[error("document {document_id} is too large for full-tree ingestion; retry with selected node ids")]
    DocumentTooLarge { document_id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A node-level failure recorded during a run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeError {
    pub node_id: String,
    pub reason: String,
}

/// What one ingestion run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub created_count: usize,
    pub updated_count: usize,
    /// Candidates under the acceptance score, left unprocessed.
    pub skipped_count: usize,
    /// Candidates the classifier found, accepted or not.
    pub candidate_count: usize,
    /// Node-level failures; the affected drafts were still persisted
    /// with whatever fields survived.
    pub per_node_errors: Vec<NodeError>,
    /// True when the run was aborted between candidates. Already
    /// persisted drafts are retained.
    pub cancelled: bool,
}

/// Cooperative cancellation for a run, checked between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Find a node by id anywhere in a tree.
fn find_node<'a>(root: &'a Node, id: &str) -> Option<&'a Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter());
    }
    None
}

/// Coordinates the ingestion pipeline against one API and one store.
pub struct IngestionOrchestrator {
    api: Arc<dyn DocumentApi>,
    repo: Arc<dyn SlideRepository>,
    retriever: ImageRetriever,
    classifier: FrameClassifier,
    extractor: TextExtractor,
    autofiller: MetadataAutoFiller,
    /// Candidates scoring below this are skipped on full-document runs.
    min_score: u32,
}

impl IngestionOrchestrator {
    pub fn new(
        api: Arc<dyn DocumentApi>,
        repo: Arc<dyn SlideRepository>,
        retriever: ImageRetriever,
        min_score: u32,
    ) -> Self {
        Self {
            api,
            repo,
            retriever,
            classifier: FrameClassifier::new(),
            extractor: TextExtractor::new(),
            autofiller: MetadataAutoFiller::new(),
            min_score,
        }
    }

    pub fn with_classifier(mut self, classifier: FrameClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Ingest a document, or just the pre-selected nodes of one.
    ///
    /// With `selected_node_ids` the full-document fetch (and its size
    /// limit) is bypassed and every selected frame is ingested no matter
    /// how it scores.
    pub async fn ingest(
        &self,
        document_id: &str,
        selected_node_ids: Option<&[String]>,
        cancel: &CancelFlag,
    ) -> Result<IngestReport, IngestError> {
        info!(document_id, selected = selected_node_ids.is_some(), "starting ingestion");

        // FETCH_TREE + CLASSIFY. Owned subtrees so nothing borrows the
        // snapshot across await points.
        let mut report = IngestReport::default();
        let mut skipped = 0usize;
        let accepted: Vec<(CandidateSlide, Node)> = match selected_node_ids {
            Some(ids) => {
                let nodes = self
                    .api
                    .get_nodes(document_id, ids)
                    .await
                    .map_err(IngestError::Api)?;

                // Every requested id must show up in the report: either
                // as a draft or as a node-level failure the operator can
                // act on. Ids the API does not know never come back.
                let mut accepted = Vec::with_capacity(nodes.len());
                let mut returned: Vec<String> = Vec::with_capacity(nodes.len());
                for node in nodes {
                    returned.push(node.id.clone());
                    match self.classifier.classify_selected(&node) {
                        Some(candidate) => accepted.push((candidate, node)),
                        None => {
                            warn!(node_id = %node.id, "selected node has no bounding box");
                            report.per_node_errors.push(NodeError {
                                node_id: node.id.clone(),
                                reason: "node has no bounding box".to_string(),
                            });
                        }
                    }
                }
                for id in ids {
                    if !returned.contains(id) {
                        warn!(node_id = %id, "selected node not found in document");
                        report.per_node_errors.push(NodeError {
                            node_id: id.clone(),
                            reason: "node not found".to_string(),
                        });
                    }
                }
                accepted
            }
            None => {
                let tree = match self.api.get_file(document_id).await {
                    Ok(tree) => tree,
                    Err(ApiError::TooLarge) => {
                        return Err(IngestError::DocumentTooLarge {
                            document_id: document_id.to_string(),
                        })
                    }
                    Err(e) => return Err(IngestError::Api(e)),
                };
                // An empty candidate list is a valid outcome, not an error.
                self.classifier
                    .classify(&tree)
                    .into_iter()
                    .filter(|c| {
                        if c.score >= self.min_score {
                            true
                        } else {
                            debug!(node_id = %c.node_id, score = c.score, "candidate under threshold");
                            skipped += 1;
                            false
                        }
                    })
                    .filter_map(|candidate| {
                        find_node(&tree, &candidate.node_id)
                            .cloned()
                            .map(|node| (candidate, node))
                    })
                    .collect()
            }
        };

        report.skipped_count = skipped;
        report.candidate_count = accepted.len() + skipped;
        info!(
            document_id,
            accepted = accepted.len(),
            skipped,
            "classification complete"
        );

        // Per-candidate stages with error containment.
        for (candidate, subtree) in accepted {
            if cancel.is_cancelled() {
                warn!(document_id, "ingestion cancelled between candidates");
                report.cancelled = true;
                break;
            }

            let outcome = self
                .ingest_candidate(document_id, &candidate, &subtree, &mut report)
                .await?;
            match outcome {
                UpsertOutcome::Created => report.created_count += 1,
                UpsertOutcome::Updated => report.updated_count += 1,
            }
        }

        info!(
            document_id,
            created = report.created_count,
            updated = report.updated_count,
            errors = report.per_node_errors.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    /// Run the per-candidate stages and persist the draft.
    ///
    /// Stage failures are recorded on the report; the draft is persisted
    /// with whatever fields survived so an operator can repair it.
    async fn ingest_candidate(
        &self,
        document_id: &str,
        candidate: &CandidateSlide,
        subtree: &Node,
        report: &mut IngestReport,
    ) -> Result<UpsertOutcome, IngestError> {
        // FETCH_IMAGE: a missing preview is not fatal.
        let image_ref = match self.retriever.fetch_one(document_id, &candidate.node_id).await {
            ImageOutcome::Fetched { url, .. } => Some(url),
            ImageOutcome::Exhausted { reason } => {
                report.per_node_errors.push(NodeError {
                    node_id: candidate.node_id.clone(),
                    reason: format!("image export failed: {}", reason),
                });
                None
            }
        };

        // EXTRACT_TEXT: pure over the subtree.
        debug!(
            node_id = %candidate.node_id,
            nodes = subtree.subtree_len(),
            "extracting text"
        );
        let extraction = self.extractor.extract(subtree);

        // AUTOFILL over any previously persisted metadata, so manual
        // moderation work is never thrown away.
        let mut metadata = self
            .repo
            .find_by_source(document_id, &candidate.node_id)
            .await?
            .map(|existing| existing.metadata)
            .unwrap_or_else(SlideMetadata::default);
        let patch = self
            .autofiller
            .infer(&extraction.text, &candidate.name, &metadata);
        patch.apply_to(&mut metadata);

        let now = Utc::now();
        let draft = SlideDraft {
            id: Uuid::new_v4().to_string(),
            title: extraction.title,
            extracted_text: extraction.text,
            source_document_id: document_id.to_string(),
            source_node_id: candidate.node_id.clone(),
            image_ref,
            width: candidate.width,
            height: candidate.height,
            // Drafts queue for moderation; activation is a moderation
            // action, never an ingestion one.
            is_active: false,
            metadata,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        Ok(self.repo.upsert(draft).await?)
    }

    /// Scan the stored corpus for near-duplicate groups.
    pub async fn find_duplicates(
        &self,
        threshold: Option<f64>,
        scope: DedupScope,
    ) -> Result<DedupReport, IngestError> {
        let slides = self.repo.list_all().await?;
        let detector = DuplicateDetector::new(threshold.unwrap_or(DEFAULT_THRESHOLD));
        Ok(detector.detect(&slides, scope))
    }
}
