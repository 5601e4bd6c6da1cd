//! Slide models for the library and moderation queue.
//!
//! Drafts are keyed by their source document and node ids, so re-ingesting
//! the same frame updates the existing record instead of duplicating it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which predicates a candidate frame satisfied during classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFlags {
    pub is_large_enough: bool,
    pub is_standard_size: bool,
    pub has_plausible_name: bool,
    pub is_top_level: bool,
}

/// A frame that scored as a possible slide. Transient: produced by the
/// classifier, consumed by the orchestrator, dropped after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSlide {
    pub node_id: String,
    pub name: String,
    pub width: f64,
    pub height: f64,
    /// Depth below the containing page (1 = direct child).
    pub depth: usize,
    /// Human-readable path from the page down to this frame.
    pub path: String,
    pub score: u32,
    pub flags: CandidateFlags,
}

/// Coarse quality bucket derived from a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateQuality {
    Poor,
    Ok,
    Good,
    Excellent,
}

impl CandidateQuality {
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => Self::Poor,
            1 => Self::Ok,
            2..=3 => Self::Good,
            _ => Self::Excellent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Ok => "ok",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl CandidateSlide {
    pub fn quality(&self) -> CandidateQuality {
        CandidateQuality::from_score(self.score)
    }
}

/// Normalize a user- or machine-supplied field value.
///
/// Empty strings and the legacy sentinel "none" both mean "unset"
/// downstream, so they collapse to `None` on write.
pub fn normalize_field(value: Option<String>) -> Option<String> {
    match value {
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => None,
    }
}

/// Structured metadata attached to a slide.
///
/// Every field is optional; the autofiller only ever adds values,
/// moderation can set or clear anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideMetadata {
    pub status: Option<String>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub domain: Option<String>,
    pub department: Option<String>,
    pub author_name: Option<String>,
    pub is_case_study: Option<bool>,
    pub year_start: Option<i32>,
    pub year_finish: Option<i32>,
    /// Solution-area codes; many-valued, unlike the fields above.
    #[serde(default)]
    pub solution_areas: Vec<String>,
}

impl SlideMetadata {
    /// Collapse empty/sentinel values to `None` in place.
    pub fn normalize(&mut self) {
        self.status = normalize_field(self.status.take());
        self.format = normalize_field(self.format.take());
        self.language = normalize_field(self.language.take());
        self.region = normalize_field(self.region.take());
        self.domain = normalize_field(self.domain.take());
        self.department = normalize_field(self.department.take());
        self.author_name = normalize_field(self.author_name.take());
        self.solution_areas.retain(|c| !c.trim().is_empty());
    }
}

/// A persisted slide record.
///
/// Created with `is_active = false` (the moderation queue); moderation
/// flips it active. Uniquely identified by
/// `(source_document_id, source_node_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideDraft {
    pub id: String,
    pub title: String,
    pub extracted_text: String,
    pub source_document_id: String,
    pub source_node_id: String,
    /// URL of the rendered preview, absent when every export attempt failed.
    pub image_ref: Option<String>,
    pub width: f64,
    pub height: f64,
    pub is_active: bool,
    pub metadata: SlideMetadata,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlideDraft {
    /// Natural key used for upserts and the exact-duplicate shortcut.
    pub fn source_key(&self) -> (&str, &str) {
        (&self.source_document_id, &self.source_node_id)
    }
}

/// One member of a duplicate group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMember {
    pub slide_id: String,
    pub title: String,
    /// Jaccard similarity against the group's anchor (first member).
    pub similarity: f64,
}

/// A cluster of near-duplicate slides. Computed on demand, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Members, anchor first. Always at least two.
    pub members: Vec<DuplicateMember>,
    /// Highest non-anchor similarity in the group.
    pub max_similarity: f64,
}
