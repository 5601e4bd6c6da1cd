//! End-to-end pipeline tests against a scripted design API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use slidevault::client::{ApiError, DocumentApi, ImageFormat};
use slidevault::dedup::DedupScope;
use slidevault::images::ImageRetriever;
use slidevault::ingest::{CancelFlag, IngestError, IngestionOrchestrator};
use slidevault::models::{Node, NodeType};
use slidevault::pacer::CallPacer;
use slidevault::repository::{MemorySlideStore, SlideRepository};

/// Scripted stand-in for the design API.
struct MockApi {
    tree: Node,
    reject_full_document: bool,
    reject_auth: bool,
    /// Node ids that fail every export scale.
    unrenderable: HashSet<String>,
    image_calls: AtomicUsize,
}

impl MockApi {
    fn new(tree: Node) -> Self {
        Self {
            tree,
            reject_full_document: false,
            reject_auth: false,
            unrenderable: HashSet::new(),
            image_calls: AtomicUsize::new(0),
        }
    }

    fn find(&self, id: &str) -> Option<Node> {
        let mut stack = vec![&self.tree];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node.clone());
            }
            stack.extend(node.children.iter());
        }
        None
    }
}

#[async_trait]
impl DocumentApi for MockApi {
    async fn get_file(&self, _document_id: &str) -> Result<Node, ApiError> {
        if self.reject_auth {
            return Err(ApiError::AuthDenied { status: 403 });
        }
        if self.reject_full_document {
            return Err(ApiError::TooLarge);
        }
        Ok(self.tree.clone())
    }

    async fn get_nodes(&self, _document_id: &str, ids: &[String]) -> Result<Vec<Node>, ApiError> {
        if self.reject_auth {
            return Err(ApiError::AuthDenied { status: 403 });
        }
        Ok(ids.iter().filter_map(|id| self.find(id)).collect())
    }

    async fn get_images(
        &self,
        _document_id: &str,
        ids: &[String],
        _format: ImageFormat,
        scale: f64,
    ) -> Result<HashMap<String, Option<String>>, ApiError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .map(|id| {
                let url = (!self.unrenderable.contains(id))
                    .then(|| format!("https://cdn.example/{}@{}.jpg", id, scale));
                (id.clone(), url)
            })
            .collect())
    }
}

fn slide_frame(id: &str, name: &str, text: &str) -> Node {
    Node::new(id, NodeType::Frame, name)
        .with_size(1920.0, 1080.0)
        .with_children(vec![Node::new(format!("{}-t", id), NodeType::Text, "text")
            .with_text(text)])
}

/// A document with five real slides and one icon that should be skipped.
fn sample_document() -> Node {
    Node::new("0:0", NodeType::Document, "Document").with_children(vec![Node::new(
        "0:1",
        NodeType::Page,
        "Deck",
    )
    .with_children(vec![
        slide_frame("1:1", "Title", "Acme platform overview"),
        slide_frame("1:2", "Case", "Client: Acme\nCase study EMEA rollout 2021 to 2023"),
        slide_frame("1:3", "Numbers", "Revenue grew across analytics workloads"),
        slide_frame("1:4", "Plan", "Cloud migration roadmap for retail"),
        Node::new("1:5", NodeType::Frame, "Close")
            .with_size(1920.0, 1080.0)
            .with_children(vec![
                Node::new("1:5-t", NodeType::Text, "text").with_text("Thank you\nQuestions welcome"),
                Node::new("1:6", NodeType::Frame, "icon-button").with_size(48.0, 48.0),
            ]),
    ])])
}

fn orchestrator(api: Arc<MockApi>, repo: Arc<MemorySlideStore>) -> IngestionOrchestrator {
    let retriever = ImageRetriever::new(
        api.clone(),
        CallPacer::unthrottled(),
        vec![0.5, 0.25, 0.1, 0.05, 0.02, 0.01],
    );
    IngestionOrchestrator::new(api, repo, retriever, 2)
}

#[tokio::test]
async fn test_full_document_ingestion() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());
    let report = orchestrator(api, repo.clone())
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.created_count, 5);
    assert_eq!(report.updated_count, 0);
    assert_eq!(report.skipped_count, 1);
    assert_eq!(report.candidate_count, 6);
    assert!(report.per_node_errors.is_empty());
    assert!(!report.cancelled);
    assert_eq!(repo.len().await, 5);

    let title_slide = repo.find_by_source("doc1", "1:1").await.unwrap().unwrap();
    assert_eq!(title_slide.title, "Acme platform overview");
    assert!(!title_slide.is_active);
    assert!(title_slide.image_ref.is_some());
}

#[tokio::test]
async fn test_autofill_runs_during_ingestion() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());
    orchestrator(api, repo.clone())
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();

    let case_slide = repo.find_by_source("doc1", "1:2").await.unwrap().unwrap();
    assert_eq!(case_slide.metadata.is_case_study, Some(true));
    assert_eq!(case_slide.metadata.region.as_deref(), Some("emea"));
    assert_eq!(case_slide.metadata.year_start, Some(2021));
    assert_eq!(case_slide.metadata.year_finish, Some(2023));
}

#[tokio::test]
async fn test_partial_image_failure_still_persists_all_drafts() {
    let mut api = MockApi::new(sample_document());
    api.unrenderable.insert("1:3".to_string());
    let api = Arc::new(api);
    let repo = Arc::new(MemorySlideStore::new());

    let report = orchestrator(api, repo.clone())
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.created_count, 5);
    assert_eq!(report.per_node_errors.len(), 1);
    assert_eq!(report.per_node_errors[0].node_id, "1:3");

    let failed = repo.find_by_source("doc1", "1:3").await.unwrap().unwrap();
    assert!(failed.image_ref.is_none());
    // Text extraction still succeeded for the same draft.
    assert!(failed.extracted_text.contains("Revenue"));
}

#[tokio::test]
async fn test_unrenderable_node_walks_whole_ladder() {
    let mut api = MockApi::new(sample_document());
    api.unrenderable.insert("1:1".to_string());
    let api = Arc::new(api);
    let repo = Arc::new(MemorySlideStore::new());

    orchestrator(api.clone(), repo)
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();

    // 6 rungs for the failing node, one call each for the other four.
    assert_eq!(api.image_calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_reingestion_updates_instead_of_duplicating() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());
    let orchestrator = orchestrator(api, repo.clone());

    let first = orchestrator
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();
    let second = orchestrator
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(first.created_count, 5);
    assert_eq!(second.created_count, 0);
    assert_eq!(second.updated_count, 5);
    assert_eq!(repo.len().await, 5);
}

#[tokio::test]
async fn test_too_large_document_requires_selection() {
    let mut api = MockApi::new(sample_document());
    api.reject_full_document = true;
    let api = Arc::new(api);
    let repo = Arc::new(MemorySlideStore::new());
    let orchestrator = orchestrator(api, repo.clone());

    let error = orchestrator
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(error, IngestError::DocumentTooLarge { .. }));

    // The selected-nodes path sidesteps the size limit.
    let selected = vec!["1:1".to_string(), "1:4".to_string()];
    let report = orchestrator
        .ingest("doc1", Some(&selected), &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(report.created_count, 2);
    assert_eq!(repo.len().await, 2);
}

#[tokio::test]
async fn test_unresolvable_selected_nodes_are_reported() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());

    // 9:9 does not exist and 1:1-t is a text node with no bounding box;
    // both must surface as node-level errors rather than vanish.
    let selected = vec![
        "1:1".to_string(),
        "9:9".to_string(),
        "1:1-t".to_string(),
    ];
    let report = orchestrator(api, repo.clone())
        .ingest("doc1", Some(&selected), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.created_count, 1);
    assert_eq!(report.per_node_errors.len(), 2);
    let missing = report
        .per_node_errors
        .iter()
        .find(|e| e.node_id == "9:9")
        .unwrap();
    assert_eq!(missing.reason, "node not found");
    let unboxed = report
        .per_node_errors
        .iter()
        .find(|e| e.node_id == "1:1-t")
        .unwrap();
    assert_eq!(unboxed.reason, "node has no bounding box");
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_auth_denial_is_fatal() {
    let mut api = MockApi::new(sample_document());
    api.reject_auth = true;
    let api = Arc::new(api);
    let repo = Arc::new(MemorySlideStore::new());

    let error = orchestrator(api, repo.clone())
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(error, IngestError::Api(ApiError::AuthDenied { .. })));
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_drafts() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = orchestrator(api, repo.clone())
        .ingest("doc1", None, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.created_count, 0);
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_find_duplicates_over_persisted_corpus() {
    let api = Arc::new(MockApi::new(sample_document()));
    let repo = Arc::new(MemorySlideStore::new());
    let orchestrator = orchestrator(api, repo.clone());

    orchestrator
        .ingest("doc1", None, &CancelFlag::new())
        .await
        .unwrap();
    // Same frames from a second document: texts are identical, so each
    // pair clears any threshold.
    orchestrator
        .ingest("doc2", None, &CancelFlag::new())
        .await
        .unwrap();

    let report = orchestrator
        .find_duplicates(Some(0.9), DedupScope::Drafts)
        .await
        .unwrap();
    assert_eq!(report.stats.total_slides, 10);
    assert_eq!(report.stats.group_count, 5);
    for group in &report.groups {
        assert_eq!(group.members.len(), 2);
        assert!(group.max_similarity >= 0.9);
    }
}
