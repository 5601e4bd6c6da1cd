//! Rendered-image retrieval with an adaptive degradation ladder.
//!
//! The export endpoint enforces a payload-size limit and rejects large or
//! complex frames non-deterministically, and rejections get more likely
//! with batch size. So: one node per call, a pacer between calls, and a
//! ladder of decreasing scales tried until one succeeds. A node whose
//! every rung fails simply ends up without a preview; that is never
//! fatal to the batch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{DocumentApi, ImageFormat};
use crate::pacer::CallPacer;

/// Outcome of retrieval for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Export succeeded; URL of the rendered image and the scale used.
    Fetched { url: String, scale_milli: u32 },
    /// Every rung of the ladder failed.
    Exhausted { reason: String },
}

impl ImageOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Fetched { url, .. } => Some(url),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Fetches rendered previews for candidate frames.
pub struct ImageRetriever {
    api: Arc<dyn DocumentApi>,
    pacer: CallPacer,
    scales: Vec<f64>,
    format: ImageFormat,
}

impl ImageRetriever {
    pub fn new(api: Arc<dyn DocumentApi>, pacer: CallPacer, scales: Vec<f64>) -> Self {
        Self {
            api,
            pacer,
            scales,
            format: ImageFormat::Jpg,
        }
    }

    /// Use a different export format. Vector formats are only worth it on
    /// an explicit high-fidelity request; they fail the size limit far
    /// more often.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Fetch a preview for one node, walking the scale ladder.
    ///
    /// Terminates after at most `scales.len()` export calls.
    pub async fn fetch_one(&self, document_id: &str, node_id: &str) -> ImageOutcome {
        let ids = [node_id.to_string()];
        let mut last_reason = String::from("no scales configured");

        for &scale in &self.scales {
            self.pacer.pause().await;

            match self
                .api
                .get_images(document_id, &ids, self.format, scale)
                .await
            {
                Ok(images) => match images.get(node_id).cloned().flatten() {
                    Some(url) => {
                        debug!(node_id, scale, "export succeeded");
                        return ImageOutcome::Fetched {
                            url,
                            scale_milli: (scale * 1000.0).round() as u32,
                        };
                    }
                    None => {
                        debug!(node_id, scale, "node not renderable at this scale");
                        last_reason = format!("not renderable at scale {}", scale);
                    }
                },
                Err(e) => {
                    warn!(node_id, scale, error = %e, "export attempt failed");
                    last_reason = e.to_string();
                }
            }
        }

        info!(node_id, "image export exhausted all scales");
        ImageOutcome::Exhausted {
            reason: last_reason,
        }
    }

    /// Fetch previews for a batch of nodes.
    ///
    /// Deliberately chunked to one node per external call; larger batches
    /// trip the size limit non-deterministically. One bad node never
    /// fails the others.
    pub async fn fetch_many(
        &self,
        document_id: &str,
        node_ids: &[String],
    ) -> HashMap<String, ImageOutcome> {
        let mut results = HashMap::with_capacity(node_ids.len());
        for node_id in node_ids {
            let outcome = self.fetch_one(document_id, node_id).await;
            results.insert(node_id.clone(), outcome);
        }
        results
    }
}
