//! slidevault - slide library ingestion and deduplication.
//!
//! Walks an externally hosted design document's node tree looking for
//! slide-shaped frames, scores them, fetches rendered previews under the
//! design API's rate and size limits, extracts text, infers metadata,
//! and persists moderation drafts. A separate pass finds near-duplicate
//! slides across the stored corpus.

pub mod autofill;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod images;
pub mod ingest;
pub mod models;
pub mod pacer;
pub mod repository;
