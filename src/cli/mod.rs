//! CLI commands implementation.

mod commands;

pub use commands::{is_verbose, run};
