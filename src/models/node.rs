//! Node tree model for externally hosted design documents.
//!
//! A document is a tree of pages, frames, and nested shape/text nodes,
//! fetched as an immutable snapshot from the design tool's API. One
//! snapshot is owned and dropped per ingestion run.

use serde::{Deserialize, Serialize};

/// Node kind as reported by the design tool.
///
/// Only the kinds the pipeline cares about are named; everything else
/// collapses into `Other` so new upstream node types never break parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Document,
    /// The design tool calls pages "CANVAS" on the wire.
    #[serde(alias = "CANVAS")]
    Page,
    Frame,
    Component,
    Text,
    Group,
    #[serde(other)]
    Other,
}

impl NodeType {
    /// Whether nodes of this kind can be slide candidates.
    pub fn is_frame_like(&self) -> bool {
        matches!(self, NodeType::Frame | NodeType::Component)
    }
}

/// Absolute bounding box of a node, in document pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
}

/// A single node in the document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node id, unique within the document (e.g. "12:34").
    pub id: String,
    /// Node kind.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-assigned layer name.
    #[serde(default)]
    pub name: String,
    /// Child nodes in layer order.
    #[serde(default)]
    pub children: Vec<Node>,
    /// Rendered size, absent for non-geometric nodes.
    #[serde(rename = "absoluteBoundingBox", default)]
    pub bounding_box: Option<BoundingBox>,
    /// Literal text content for TEXT nodes.
    #[serde(rename = "characters", default)]
    pub text_content: Option<String>,
}

impl Node {
    /// Build a bare node, mostly useful in tests and fixtures.
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            children: Vec::new(),
            bounding_box: None,
            text_content: None,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.bounding_box = Some(BoundingBox { width, height });
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Count of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}
