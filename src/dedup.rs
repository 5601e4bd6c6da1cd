//! Near-duplicate detection over the slide corpus.
//!
//! Pairwise Jaccard similarity over normalized text tokens, with an
//! exact-source shortcut, clustered by a single greedy pass.
//!
//! The greedy pass is deliberately not transitively closed: if A~B and
//! B~C pass the threshold but A~C does not, the outcome depends on
//! processing order. That matches the behavior moderators already rely
//! on; turning it into a union-find closure would change which slides
//! get flagged.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::{DuplicateGroup, DuplicateMember, SlideDraft};

/// Default similarity threshold for grouping.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Tokens this short are noise and dropped before comparison.
const MIN_TOKEN_LEN: usize = 3;

/// Which part of the corpus to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    /// Only drafts awaiting moderation.
    Drafts,
    /// Drafts and published slides.
    All,
}

/// Corpus-level numbers alongside the groups.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DedupStats {
    pub total_slides: usize,
    pub group_count: usize,
}

/// Result of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub stats: DedupStats,
    pub groups: Vec<DuplicateGroup>,
}

/// Normalize slide text into a token set: lowercase, punctuation to
/// whitespace, tokens shorter than three characters dropped.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Jaccard coefficient of two token sets. Zero when either is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

struct Entry<'a> {
    slide: &'a SlideDraft,
    tokens: HashSet<String>,
}

impl Entry<'_> {
    /// Similarity against another entry. Same source document and node
    /// means the same frame was ingested twice; that is an exact
    /// duplicate no matter what the text says.
    fn similarity(&self, other: &Entry<'_>) -> f64 {
        if self.slide.source_key() == other.slide.source_key() {
            return 1.0;
        }
        jaccard(&self.tokens, &other.tokens)
    }
}

/// Finds near-duplicate clusters in the slide corpus.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    threshold: f64,
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run detection over the given slides.
    ///
    /// Slides are processed in creation order. Each unprocessed slide
    /// anchors a group; every later unprocessed slide meeting the
    /// threshold against the anchor joins it and is marked processed.
    /// Groups of one are not emitted. O(n²), CPU-bound, no I/O.
    pub fn detect(&self, slides: &[SlideDraft], scope: DedupScope) -> DedupReport {
        let mut entries: Vec<Entry<'_>> = slides
            .iter()
            .filter(|s| match scope {
                DedupScope::Drafts => !s.is_active,
                DedupScope::All => true,
            })
            .map(|slide| Entry {
                slide,
                tokens: tokenize(&slide.extracted_text),
            })
            .collect();
        entries.sort_by_key(|e| e.slide.created_at);

        let total_slides = entries.len();
        let mut processed = vec![false; entries.len()];
        let mut groups: Vec<DuplicateGroup> = Vec::new();

        for i in 0..entries.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;

            let anchor = &entries[i];
            let mut members = vec![DuplicateMember {
                slide_id: anchor.slide.id.clone(),
                title: anchor.slide.title.clone(),
                similarity: 1.0,
            }];
            let mut max_similarity: f64 = 0.0;

            for j in (i + 1)..entries.len() {
                if processed[j] {
                    continue;
                }
                let similarity = anchor.similarity(&entries[j]);
                if similarity >= self.threshold {
                    debug!(
                        anchor = %anchor.slide.id,
                        member = %entries[j].slide.id,
                        similarity,
                        "slides grouped"
                    );
                    processed[j] = true;
                    max_similarity = max_similarity.max(similarity);
                    members.push(DuplicateMember {
                        slide_id: entries[j].slide.id.clone(),
                        title: entries[j].slide.title.clone(),
                        similarity,
                    });
                }
            }

            if members.len() >= 2 {
                groups.push(DuplicateGroup {
                    members,
                    max_similarity,
                });
            }
        }

        groups.sort_by(|a, b| {
            b.max_similarity
                .partial_cmp(&a.max_similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            total_slides,
            group_count = groups.len(),
            threshold = self.threshold,
            "duplicate detection finished"
        );

        DedupReport {
            stats: DedupStats {
                total_slides,
                group_count: groups.len(),
            },
            groups,
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
