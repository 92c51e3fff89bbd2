//! Property-based tests for hashing, deduplication and bounded history

mod content_hash;
mod context_model;
