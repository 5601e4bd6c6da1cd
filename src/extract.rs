//! Text extraction from a candidate frame's subtree.
//!
//! Pure over the input subtree: extracting twice from identical input
//! yields byte-identical output, which is what makes re-ingestion
//! idempotent.

use crate::models::Node;

/// How many leading text segments are considered for the title.
const TITLE_CANDIDATE_WINDOW: usize = 5;

/// Maximum length for a heading-like title segment.
const TITLE_MAX_LEN: usize = 80;

/// Text pulled out of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// All text content in tree order, one segment per line.
    pub text: String,
    /// Heading-like first segment, or the frame's layer name.
    pub title: String,
}

/// Collapse runs of whitespace (including newlines) into single spaces.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts and normalizes text from frame subtrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Walk the subtree rooted at `frame` and collect its text.
    pub fn extract(&self, frame: &Node) -> Extraction {
        let mut segments: Vec<String> = Vec::new();

        // Depth-first, document order, without recursion.
        let mut stack: Vec<&Node> = vec![frame];
        while let Some(node) = stack.pop() {
            if let Some(text) = &node.text_content {
                let collapsed = collapse_whitespace(text);
                if !collapsed.is_empty() {
                    segments.push(collapsed);
                }
            }
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }

        let title = self.derive_title(&segments, &frame.name);
        Extraction {
            text: segments.join("\n"),
            title,
        }
    }

    /// Prefer an early, short text segment over the layer name: designers
    /// name frames "Frame 417" far more often than they name them after
    /// the slide's headline.
    fn derive_title(&self, segments: &[String], frame_name: &str) -> String {
        segments
            .iter()
            .take(TITLE_CANDIDATE_WINDOW)
            .find(|s| !s.is_empty() && s.chars().count() < TITLE_MAX_LEN)
            .cloned()
            .unwrap_or_else(|| frame_name.to_string())
    }
}
