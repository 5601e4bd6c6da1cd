//! Frame classification: find and rank candidate slides in a document tree.
//!
//! Pages are containers; only their direct children and grandchildren are
//! plausible slides. Anything deeper is structural content inside a slide.
//! Scoring is a ranking heuristic, not a hard filter - callers pick their
//! own acceptance threshold via [`CandidateQuality`] buckets or a raw score.

use tracing::debug;

use crate::models::{CandidateFlags, CandidateQuality, CandidateSlide, Node, NodeType};

/// Layer-name tokens that mark a frame as not-a-slide.
const NAME_BLOCKLIST: &[&str] = &[
    "icon", "button", "component", "symbol", "group", "mask", "overlay", "popup", "modal",
    "tooltip",
];

/// Size bands for common presentation canvases.
const STANDARD_SIZES: &[(f64, f64)] = &[(1200.0, 600.0), (800.0, 600.0), (1920.0, 1080.0)];

/// All thresholds and weights used by the classifier, in one place so the
/// scoring policy is testable and tunable without touching traversal code.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    pub min_width: f64,
    pub min_height: f64,
    pub probable_width: f64,
    pub probable_height: f64,
    /// Max depth below a page at which frames are still evaluated.
    pub max_candidate_depth: usize,
    pub weight_large_enough: u32,
    pub weight_standard_size: u32,
    pub weight_plausible_name: u32,
    pub weight_probable_size: u32,
    pub weight_top_level: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            min_width: 600.0,
            min_height: 400.0,
            probable_width: 800.0,
            probable_height: 500.0,
            max_candidate_depth: 2,
            weight_large_enough: 1,
            weight_standard_size: 2,
            weight_plausible_name: 1,
            weight_probable_size: 1,
            weight_top_level: 2,
        }
    }
}

impl ScoringRules {
    /// Maximum achievable score under these rules.
    pub fn max_score(&self) -> u32 {
        self.weight_large_enough
            + self.weight_standard_size
            + self.weight_plausible_name
            + self.weight_probable_size
            + self.weight_top_level
    }
}

/// Scores candidate frames in a document tree.
#[derive(Debug, Clone, Default)]
pub struct FrameClassifier {
    rules: ScoringRules,
}

impl FrameClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Score one frame. Pure: identical inputs always yield identical scores.
    ///
    /// `depth` is the frame's depth below its containing page (1 = direct
    /// child of the page).
    pub fn score_frame(
        &self,
        width: f64,
        height: f64,
        name: &str,
        depth: usize,
    ) -> (u32, CandidateFlags) {
        let rules = &self.rules;
        let flags = CandidateFlags {
            is_large_enough: width >= rules.min_width && height >= rules.min_height,
            is_standard_size: STANDARD_SIZES
                .iter()
                .any(|&(w, h)| width >= w && height >= h),
            has_plausible_name: {
                let lower = name.to_lowercase();
                !NAME_BLOCKLIST.iter().any(|token| lower.contains(token))
            },
            is_top_level: depth == 1,
        };

        let probable_slide_size =
            width >= rules.probable_width && height >= rules.probable_height;

        let mut score = 0;
        if flags.is_large_enough {
            score += rules.weight_large_enough;
        }
        if flags.is_standard_size {
            score += rules.weight_standard_size;
        }
        if flags.has_plausible_name {
            score += rules.weight_plausible_name;
        }
        if probable_slide_size {
            score += rules.weight_probable_size;
        }
        if flags.is_top_level {
            score += rules.weight_top_level;
        }

        (score, flags)
    }

    /// Walk a document tree and return candidate slides, best first.
    ///
    /// Ties keep encounter order (stable sort), so two frames with the same
    /// score come back in document order.
    pub fn classify(&self, root: &Node) -> Vec<CandidateSlide> {
        let mut candidates = Vec::new();

        // Explicit work stack instead of recursion: design documents can
        // nest arbitrarily deep. Depth is tracked relative to the nearest
        // enclosing page; `None` means we have not entered a page yet.
        let mut stack: Vec<(&Node, Option<usize>, String)> = vec![(root, None, String::new())];

        while let Some((node, page_depth, path)) = stack.pop() {
            let child_depth = match node.node_type {
                NodeType::Page => Some(0),
                _ => page_depth,
            }
            .map(|d| d + 1);

            if let (Some(depth), Some(bbox)) = (page_depth, node.bounding_box) {
                if node.node_type.is_frame_like() && depth <= self.rules.max_candidate_depth {
                    let (score, flags) =
                        self.score_frame(bbox.width, bbox.height, &node.name, depth);
                    debug!(
                        node_id = %node.id,
                        name = %node.name,
                        score,
                        quality = CandidateQuality::from_score(score).as_str(),
                        "scored candidate frame"
                    );
                    candidates.push(CandidateSlide {
                        node_id: node.id.clone(),
                        name: node.name.clone(),
                        width: bbox.width,
                        height: bbox.height,
                        depth,
                        path: path.clone(),
                        score,
                        flags,
                    });
                }
            }

            // Nodes deeper than the candidate band are slide content, not
            // slides; no need to descend further below a page.
            let descend = match child_depth {
                Some(d) => d <= self.rules.max_candidate_depth,
                None => true,
            };
            if descend {
                let child_path = if path.is_empty() {
                    node.name.clone()
                } else {
                    format!("{} / {}", path, node.name)
                };
                // Reverse push keeps document order on a LIFO stack.
                for child in node.children.iter().rev() {
                    stack.push((child, child_depth, child_path.clone()));
                }
            }
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates
    }

    /// Score a pre-selected subtree root as if it were a top-level frame.
    ///
    /// Used when the caller sidesteps full-document classification by
    /// naming specific node ids.
    pub fn classify_selected(&self, node: &Node) -> Option<CandidateSlide> {
        let bbox = node.bounding_box?;
        let (score, flags) = self.score_frame(bbox.width, bbox.height, &node.name, 1);
        Some(CandidateSlide {
            node_id: node.id.clone(),
            name: node.name.clone(),
            width: bbox.width,
            height: bbox.height,
            depth: 1,
            path: node.name.clone(),
            score,
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    fn page_with(children: Vec<Node>) -> Node {
        Node::new("doc", NodeType::Document, "Document").with_children(vec![Node::new(
            "0:1",
            NodeType::Page,
            "Page 1",
        )
        .with_children(children)])
    }

    #[test]
    fn test_full_marks_for_standard_top_level_frame() {
        let classifier = FrameClassifier::new();
        let (score, flags) = classifier.score_frame(1920.0, 1080.0, "Q1 Overview", 1);
        assert_eq!(score, 7);
        assert!(flags.is_large_enough);
        assert!(flags.is_standard_size);
        assert!(flags.has_plausible_name);
        assert!(flags.is_top_level);
    }

    #[test]
    fn test_zero_for_small_blocklisted_deep_frame() {
        let classifier = FrameClassifier::new();
        let (score, flags) = classifier.score_frame(200.0, 200.0, "icon-button", 3);
        assert_eq!(score, 0);
        assert!(!flags.has_plausible_name);
        assert!(!flags.is_top_level);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let classifier = FrameClassifier::new();
        let a = classifier.score_frame(1280.0, 720.0, "Agenda", 2);
        let b = classifier.score_frame(1280.0, 720.0, "Agenda", 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_classify_orders_by_score_stable_on_ties() {
        let tree = page_with(vec![
            Node::new("1:1", NodeType::Frame, "Intro").with_size(1920.0, 1080.0),
            Node::new("1:2", NodeType::Frame, "icon set").with_size(64.0, 64.0),
            Node::new("1:3", NodeType::Frame, "Summary").with_size(1920.0, 1080.0),
        ]);
        let candidates = FrameClassifier::new().classify(&tree);
        assert_eq!(candidates.len(), 3);
        // Equal top scores keep document order.
        assert_eq!(candidates[0].node_id, "1:1");
        assert_eq!(candidates[1].node_id, "1:3");
        assert_eq!(candidates[2].node_id, "1:2");
    }

    #[test]
    fn test_frames_below_depth_two_are_not_candidates() {
        let deep = Node::new("3:1", NodeType::Frame, "Buried").with_size(1920.0, 1080.0);
        let tree = page_with(vec![Node::new("1:1", NodeType::Frame, "Slide")
            .with_size(1920.0, 1080.0)
            .with_children(vec![Node::new("2:1", NodeType::Group, "content")
                .with_size(900.0, 700.0)
                .with_children(vec![deep])])]);
        let candidates = FrameClassifier::new().classify(&tree);
        assert!(candidates.iter().all(|c| c.node_id != "3:1"));
    }

    #[test]
    fn test_grandchild_frames_are_candidates() {
        let tree = page_with(vec![Node::new("1:1", NodeType::Group, "wrap")
            .with_size(2000.0, 1200.0)
            .with_children(vec![
                Node::new("2:1", NodeType::Frame, "Nested slide").with_size(1920.0, 1080.0)
            ])]);
        let candidates = FrameClassifier::new().classify(&tree);
        let nested = candidates.iter().find(|c| c.node_id == "2:1").unwrap();
        assert_eq!(nested.depth, 2);
        assert!(!nested.flags.is_top_level);
    }

    #[test]
    fn test_nodes_without_bounding_box_are_skipped() {
        let tree = page_with(vec![Node::new("1:1", NodeType::Frame, "No geometry")]);
        assert!(FrameClassifier::new().classify(&tree).is_empty());
    }

    #[test]
    fn test_text_nodes_are_not_candidates() {
        let tree = page_with(vec![
            Node::new("1:1", NodeType::Text, "Big text").with_size(1920.0, 1080.0)
        ]);
        assert!(FrameClassifier::new().classify(&tree).is_empty());
    }

    #[test]
    fn test_max_score_matches_weights() {
        assert_eq!(ScoringRules::default().max_score(), 7);
    }
}
