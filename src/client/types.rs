//! Wire types for the design API's JSON responses.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::Node;

/// Response of `GET /files/{docId}`.
#[derive(Debug, Deserialize)]
pub struct FileResponse {
    #[serde(default)]
    pub name: String,
    pub document: Node,
}

/// One entry in a `GET /files/{docId}/nodes` response.
#[derive(Debug, Deserialize)]
pub struct NodeEntry {
    pub document: Node,
}

/// Response of `GET /files/{docId}/nodes?ids=...`.
#[derive(Debug, Deserialize)]
pub struct NodesResponse {
    #[serde(default)]
    pub nodes: HashMap<String, NodeEntry>,
}

/// Response of `GET /images/{docId}`.
///
/// The API maps unrenderable nodes to `null` rather than omitting them,
/// but both shapes appear in the wild, so absence and `null` are treated
/// the same by callers.
#[derive(Debug, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
}
