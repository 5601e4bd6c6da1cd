//! Data models for slidevault.

mod node;
mod slide;

pub use node::{BoundingBox, Node, NodeType};
pub use slide::{
    normalize_field, CandidateFlags, CandidateQuality, CandidateSlide, DuplicateGroup,
    DuplicateMember, SlideDraft, SlideMetadata,
};
