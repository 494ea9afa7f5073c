//! Core ingestion logic for docweave.
//!
//! Builds the normalized content tree from the tokenizers' outline events,
//! merges the text-stream source into it, derives the search index and
//! writes the per-language artifacts (`ingest`).

pub mod assembler;
pub mod index;
pub mod merge;
pub mod outline;
pub mod pipeline;
pub mod render;
