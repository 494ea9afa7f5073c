//! Core domain types: the content tree, outline events, and search records.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the build manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Content tree
// ---------------------------------------------------------------------------

/// A top-level outline node (`N`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub number: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// A second-level outline node (`N.M`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub subsections: Vec<Subsection>,
}

/// A third-level outline node (`N.M.K`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub id: String,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// One discrete unit of content attached to exactly one outline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    Paragraph {
        text: String,
        /// Text with inline `<strong>`/`<em>`/`<u>` spans preserved.
        formatted_text: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    List {
        items: Vec<String>,
    },
    Callout {
        text: String,
    },
}

impl ContentBlock {
    /// Plain paragraph whose formatted text is the text itself.
    pub fn paragraph(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::Paragraph {
            formatted_text: text.clone(),
            text,
        }
    }

    /// The text this block contributes to the search index.
    ///
    /// Primary text first, then list items, then caption. Tables contribute nothing.
    pub fn search_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Paragraph { text, .. } | Self::Callout { text } => {
                Some(Cow::Borrowed(text.as_str()))
            }
            Self::List { items } => Some(Cow::Owned(items.join(" "))),
            Self::Image { caption, .. } => caption.as_deref().map(Cow::Borrowed),
            Self::Table { .. } => None,
        }
    }

    /// Header row of a table block (row 0).
    pub fn table_header(&self) -> Option<&[String]> {
        match self {
            Self::Table { rows } => rows.first().map(Vec::as_slice),
            _ => None,
        }
    }

    /// Body rows of a table block (everything after row 0).
    pub fn table_body(&self) -> &[Vec<String>] {
        match self {
            Self::Table { rows } if !rows.is_empty() => &rows[1..],
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Outline events
// ---------------------------------------------------------------------------

/// Structural event emitted by a tokenizer and consumed by the hierarchy builder.
#[derive(Debug, Clone, PartialEq)]
pub enum OutlineEvent {
    /// Switch to (or open) chapter `number`.
    Chapter { number: String },
    /// Section heading `N.M Title`.
    Section { number: String, title: String },
    /// Subsection heading `N.M.K Title`.
    Subsection { number: String, title: String },
    /// Content for the innermost open node.
    Block(ContentBlock),
}

// ---------------------------------------------------------------------------
// Numbering and identifiers
// ---------------------------------------------------------------------------

/// Chapter component of a dotted number (`"4.1.2"` → `"4"`).
pub fn chapter_prefix(number: &str) -> &str {
    number.split('.').next().unwrap_or(number)
}

/// First two components of a dotted number (`"4.1.2"` → `"4.1"`).
pub fn section_prefix(number: &str) -> &str {
    match number.match_indices('.').nth(1) {
        Some((idx, _)) => &number[..idx],
        None => number,
    }
}

/// Deterministic, URL-safe slug: lowercase ASCII alphanumerics joined by `-`.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// Search records
// ---------------------------------------------------------------------------

/// One flattened, searchable record derived from the content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub title: String,
    pub chapter_slug: String,
    pub section_id: String,
    pub text: String,
    pub number: String,
}

/// A ranked search result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub chapter_slug: String,
    pub section_id: String,
    pub snippet: String,
    #[serde(skip)]
    pub score: u8,
}

// ---------------------------------------------------------------------------
// Build manifest
// ---------------------------------------------------------------------------

/// File name of the build manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of a language's serialized content tree.
pub fn chapters_artifact(lang: &str) -> String {
    format!("chapters-{lang}.json")
}

/// File name of a language's flat search index.
pub fn search_index_artifact(lang: &str) -> String {
    format!("search-index-{lang}.json")
}

/// A UUID v7 wrapper identifying one ingestion run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub Uuid);

impl BuildId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `manifest.json` written next to the per-language artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub schema_version: u32,
    pub build_id: BuildId,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub languages: Vec<LanguageSummary>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactMeta>,
}

/// Per-language build statistics recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSummary {
    pub code: String,
    pub chapter_count: usize,
    pub entry_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Outcome of merging the text-stream source into the markup tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSummary {
    pub anchor: String,
    pub anchor_found: bool,
    pub lines_merged: usize,
    pub blocks_added: usize,
}

/// Checksum and size of one written artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}
