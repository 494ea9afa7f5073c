//! Shared types, error model, and configuration for docweave.
//!
//! This crate is the foundation depended on by all other docweave crates.
//! It provides:
//! - [`DocweaveError`]: the unified error type
//! - The content tree ([`Chapter`], [`Section`], [`Subsection`], [`ContentBlock`]),
//!   the tokenizer-to-builder [`OutlineEvent`], and search records
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LanguageConfig, MarkupConfig, OutputConfig, SearchConfig, TextStreamConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{DocweaveError, Result};
pub use types::{
    ArtifactMeta, BuildId, BuildManifest, CURRENT_SCHEMA_VERSION, Chapter, ContentBlock,
    LanguageSummary, MANIFEST_FILE, MergeSummary, OutlineEvent, SearchEntry, SearchHit, Section,
    Subsection, chapter_prefix, chapters_artifact, search_index_artifact, section_prefix, slugify,
};
