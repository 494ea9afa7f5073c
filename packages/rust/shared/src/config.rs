//! Application configuration for docweave.
//!
//! User config lives at `~/.docweave/docweave.toml` unless `--config` points
//! elsewhere. Source paths inside the config are resolved relative to the
//! config file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocweaveError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docweave.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docweave";

// ---------------------------------------------------------------------------
// Config structs (matching docweave.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Artifact output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Runtime search tuning.
    #[serde(default)]
    pub search: SearchConfig,

    /// Style markers recognized in the markup source.
    #[serde(default)]
    pub markup: MarkupConfig,

    /// Line heuristics for the paginated text source.
    #[serde(default)]
    pub text_stream: TextStreamConfig,

    /// One entry per supported language.
    #[serde(default)]
    pub languages: Vec<LanguageConfig>,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `chapters-*.json`, `search-index-*.json`, `manifest.json`.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "content".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queries with fewer characters return nothing.
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Characters kept on each side of the first match in a snippet.
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,

    /// Maximum number of ranked hits.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Quiescence delay before a query is evaluated.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Marker inserted before each highlighted occurrence.
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,

    /// Marker inserted after each highlighted occurrence.
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_len: default_min_query_len(),
            snippet_radius: default_snippet_radius(),
            max_results: default_max_results(),
            debounce_ms: default_debounce_ms(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
        }
    }
}

fn default_min_query_len() -> usize {
    2
}
fn default_snippet_radius() -> usize {
    50
}
fn default_max_results() -> usize {
    10
}
fn default_debounce_ms() -> u64 {
    150
}
fn default_highlight_open() -> String {
    r#"<mark class="search-highlight">"#.into()
}
fn default_highlight_close() -> String {
    "</mark>".into()
}

/// `[markup]` section: markers are tied to one export's stylesheet, so they
/// live here rather than in the tokenizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Paragraph classes used by repeated page headers.
    #[serde(default = "default_page_header_classes")]
    pub page_header_classes: Vec<String>,

    /// Span class present inside page headers and the contents heading.
    #[serde(default = "default_header_span_class")]
    pub header_span_class: String,

    /// Span class carrying `N.M Title` section headings.
    #[serde(default = "default_section_span_class")]
    pub section_span_class: String,

    /// Span class carrying `N.M.K Title` subsection headings.
    #[serde(default = "default_subsection_span_class")]
    pub subsection_span_class: String,

    /// Inline style fragments meaning bold.
    #[serde(default = "default_bold_styles")]
    pub bold_styles: Vec<String>,

    /// Inline style fragments meaning italic.
    #[serde(default = "default_italic_styles")]
    pub italic_styles: Vec<String>,

    /// Span classes meaning underline.
    #[serde(default = "default_underline_classes")]
    pub underline_classes: Vec<String>,

    /// Paragraph prefixes that implicitly open chapter 1.
    #[serde(default = "default_body_start_cues")]
    pub body_start_cues: Vec<String>,

    /// Prefix applied to relative image sources.
    #[serde(default = "default_image_src_prefix")]
    pub image_src_prefix: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            page_header_classes: default_page_header_classes(),
            header_span_class: default_header_span_class(),
            section_span_class: default_section_span_class(),
            subsection_span_class: default_subsection_span_class(),
            bold_styles: default_bold_styles(),
            italic_styles: default_italic_styles(),
            underline_classes: default_underline_classes(),
            body_start_cues: default_body_start_cues(),
            image_src_prefix: default_image_src_prefix(),
        }
    }
}

fn default_page_header_classes() -> Vec<String> {
    vec!["c80".into(), "c67".into(), "c5".into()]
}
fn default_header_span_class() -> String {
    "c15".into()
}
fn default_section_span_class() -> String {
    "c44".into()
}
fn default_subsection_span_class() -> String {
    "c9".into()
}
fn default_bold_styles() -> Vec<String> {
    vec!["font-weight:700".into(), "font-weight:bold".into()]
}
fn default_italic_styles() -> Vec<String> {
    vec!["font-style:italic".into()]
}
fn default_underline_classes() -> Vec<String> {
    vec!["c84".into()]
}
fn default_body_start_cues() -> Vec<String> {
    vec!["In this chapter we would like".into()]
}
fn default_image_src_prefix() -> String {
    "/".into()
}

/// `[text_stream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStreamConfig {
    /// Regex matching page separator lines.
    #[serde(default = "default_page_separator")]
    pub page_separator: String,

    /// Regexes matching running page headers.
    #[serde(default = "default_page_header_patterns")]
    pub page_header_patterns: Vec<String>,

    /// Exact lines to drop (chapter title continuations and similar).
    #[serde(default)]
    pub skip_lines: Vec<String>,

    /// Chapter numbers whose bare `N Word` line switches chapter context.
    #[serde(default)]
    pub chapter_numbers: Vec<String>,

    /// Minimum heading title length in characters.
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,

    /// Leading glyphs that mark list items.
    #[serde(default = "default_bullet_glyphs")]
    pub bullet_glyphs: Vec<String>,
}

impl Default for TextStreamConfig {
    fn default() -> Self {
        Self {
            page_separator: default_page_separator(),
            page_header_patterns: default_page_header_patterns(),
            skip_lines: Vec::new(),
            chapter_numbers: Vec::new(),
            min_title_len: default_min_title_len(),
            bullet_glyphs: default_bullet_glyphs(),
        }
    }
}

fn default_page_separator() -> String {
    r"^-- \d+ of \d+ --$".into()
}
fn default_page_header_patterns() -> Vec<String> {
    vec![r"^\d+\.\d+\.\s+\w.{0,50}$".into()]
}
fn default_min_title_len() -> usize {
    4
}
fn default_bullet_glyphs() -> Vec<String> {
    vec!["•".into(), "-".into(), "–".into()]
}

/// `[[languages]]` entry: sources and naming for one language build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language code used in artifact names (`en`, `ko`, ...).
    pub code: String,

    /// Markup export (required).
    pub markup: String,

    /// Paginated text export to merge after the anchor (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_stream: Option<String>,

    /// Heading text where the markup export stops and the text export resumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,

    /// Chapter number → chapter title.
    #[serde(default)]
    pub chapter_titles: BTreeMap<String, String>,
}

impl LanguageConfig {
    /// Markup path resolved against `base`.
    pub fn markup_path(&self, base: &Path) -> PathBuf {
        base.join(&self.markup)
    }

    /// Text-stream path resolved against `base`.
    pub fn text_stream_path(&self, base: &Path) -> Option<PathBuf> {
        self.text_stream.as_ref().map(|p| base.join(p))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docweave/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocweaveError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docweave/docweave.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocweaveError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocweaveError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject configs that would make ingestion or search meaningless.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for lang in &config.languages {
        if lang.code.trim().is_empty() {
            return Err(DocweaveError::config("language code must not be empty"));
        }
        if !seen.insert(lang.code.as_str()) {
            return Err(DocweaveError::config(format!(
                "language '{}' configured more than once",
                lang.code
            )));
        }
        if lang.text_stream.is_some() && lang.anchor.is_none() {
            return Err(DocweaveError::config(format!(
                "language '{}' has a text_stream source but no anchor",
                lang.code
            )));
        }
    }
    if config.search.min_query_len == 0 {
        return Err(DocweaveError::config("search.min_query_len must be at least 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocweaveError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocweaveError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocweaveError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("debounce_ms"));
        assert!(toml_str.contains("section_span_class"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.search.min_query_len, 2);
        assert_eq!(parsed.search.snippet_radius, 50);
        assert_eq!(parsed.search.max_results, 10);
        assert_eq!(parsed.markup.section_span_class, "c44");
    }

    #[test]
    fn config_with_languages() {
        let toml_str = r#"
[output]
dir = "/tmp/content"

[[languages]]
code = "en"
markup = "sources/manual.html"
text_stream = "sources/manual.txt"
anchor = "4.1.1 Sources for Displaying Results"

[languages.chapter_titles]
"1" = "Fundamental Terms"
"4" = "Data and Result Visualization"

[[languages]]
code = "ko"
markup = "sources/manual-ko.html"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        validate_config(&config).expect("valid");
        assert_eq!(config.languages.len(), 2);
        assert_eq!(config.languages[0].chapter_titles["4"], "Data and Result Visualization");
        assert!(config.languages[1].text_stream.is_none());
        assert_eq!(
            config.languages[0].markup_path(Path::new("/docs")),
            PathBuf::from("/docs/sources/manual.html")
        );
    }

    #[test]
    fn text_stream_without_anchor_rejected() {
        let toml_str = r#"
[[languages]]
code = "en"
markup = "a.html"
text_stream = "a.txt"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("no anchor"));
    }

    #[test]
    fn duplicate_language_rejected() {
        let toml_str = r#"
[[languages]]
code = "en"
markup = "a.html"

[[languages]]
code = "en"
markup = "b.html"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn sample_fixture_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/docweave.toml");
        let config = load_config_from(&path).expect("fixture config");
        assert_eq!(config.languages[0].code, "en");
        assert_eq!(config.text_stream.skip_lines, vec!["Result Visualization"]);
        assert_eq!(config.search.debounce_ms, 150);
    }
}
