//! Client for the external design-document API.
//!
//! The API serves a document's node tree and rendered exports of
//! individual nodes. Everything here goes through the [`DocumentApi`]
//! trait so the pipeline can be driven by a scripted fake in tests.

mod http;
mod types;

pub use http::{DesignApiClient, RetryPolicy};
pub use types::{FileResponse, ImagesResponse, NodeEntry, NodesResponse};

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Node;

/// Raster/vector formats the export endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Compressed raster, the default for previews.
    Jpg,
    Png,
    /// Vector output; only used on the explicit high-fidelity path.
    Svg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            other => Err(format!("unknown image format: {}", other)),
        }
    }
}

/// Errors from the design API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("design API unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("no API token configured")]
    AuthMissing,

    #[error("design API rejected credentials (HTTP {status})")]
    AuthDenied { status: u16 },

    #[error("document too large for a full-tree request")]
    TooLarge,

    #[error("design API returned HTTP {status}")]
    Http { status: u16 },

    #[error("export rejected: {0}")]
    Export(String),

    #[error("failed to decode design API response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether this error poisons the whole ingestion run, as opposed to
    /// one node or one export attempt.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            ApiError::Unreachable(_) | ApiError::AuthMissing | ApiError::AuthDenied { .. }
        )
    }
}

/// The surface of the external document API the pipeline consumes.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Fetch the full node tree of a document.
    async fn get_file(&self, document_id: &str) -> Result<Node, ApiError>;

    /// Fetch the subtrees for specific node ids. Ids the API does not
    /// know are simply absent from the result.
    async fn get_nodes(&self, document_id: &str, ids: &[String]) -> Result<Vec<Node>, ApiError>;

    /// Render nodes to images at the given scale. An entry mapped to
    /// `None` means the node could not be rendered at that scale.
    async fn get_images(
        &self,
        document_id: &str,
        ids: &[String],
        format: ImageFormat,
        scale: f64,
    ) -> Result<HashMap<String, Option<String>>, ApiError>;
}
