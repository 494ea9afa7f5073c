//! End-to-end ingestion: sources → tokenize → build → merge → index → artifacts.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use docweave_markup::{MarkupStats, MarkupTokenizer};
use docweave_shared::{
    AppConfig, ArtifactMeta, BuildId, Chapter, DocweaveError, LanguageConfig, LanguageSummary,
    Result, SearchEntry,
};
use docweave_textstream::StreamTokenizer;

use crate::assembler::{self, AssembleConfig};
use crate::index::build_index;
use crate::merge::{MergeReport, merge_text_stream};
use crate::outline::{BuildStats, OutlineBuilder, validate_tree};

/// Configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub app: AppConfig,
    /// Directory that relative source paths are resolved against.
    pub base_dir: PathBuf,
    /// Directory receiving the artifacts.
    pub output_dir: PathBuf,
    pub tool_version: String,
}

/// Result of an ingestion run.
#[derive(Debug)]
pub struct IngestResult {
    pub build_id: BuildId,
    pub output_dir: PathBuf,
    pub languages: Vec<LanguageSummary>,
    pub artifacts: Vec<ArtifactMeta>,
    /// Non-fatal build warnings across all languages.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Source documents of one language, read into memory.
#[derive(Debug, Clone)]
pub struct LanguageSources {
    pub markup: String,
    pub text_stream: Option<String>,
}

/// Everything built in memory for one language.
#[derive(Debug, Clone, Default)]
pub struct LanguageBuild {
    pub code: String,
    pub chapters: Vec<Chapter>,
    pub index: Vec<SearchEntry>,
    pub markup: MarkupStats,
    pub outline: BuildStats,
    pub merge: Option<MergeReport>,
    pub warnings: Vec<String>,
}

impl LanguageBuild {
    /// Manifest view of the build.
    pub fn summary(&self) -> LanguageSummary {
        LanguageSummary {
            code: self.code.clone(),
            chapter_count: self.chapters.len(),
            entry_count: self.index.len(),
            merge: self.merge.as_ref().map(MergeReport::summary),
            warnings: self.warnings.clone(),
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a language has been built in memory.
    fn language_built(&self, code: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &IngestResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn language_built(&self, _code: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &IngestResult) {}
}

/// Run the full ingestion.
///
/// 1. Read every language's sources (a missing one aborts the run)
/// 2. Tokenize the markup source and build the tree
/// 3. Validate the markup tree, then merge the text-stream source after the
///    anchor into a builder re-seeded from it
/// 4. Validate the merged tree and derive the search index
/// 5. Write artifacts and the manifest
///
/// Nothing is written until every language has been built.
#[instrument(skip_all, fields(languages = config.app.languages.len(), out = %config.output_dir.display()))]
pub fn ingest(config: &IngestConfig, progress: &dyn ProgressReporter) -> Result<IngestResult> {
    let start = Instant::now();
    let build_id = BuildId::new();
    let languages = &config.app.languages;

    if languages.is_empty() {
        return Err(DocweaveError::config("no [[languages]] configured"));
    }

    info!(%build_id, "starting ingestion");

    // --- Phase 1: Sources ---
    progress.phase("Reading sources");
    let sources = languages
        .iter()
        .map(|lang| read_sources(lang, &config.base_dir))
        .collect::<Result<Vec<_>>>()?;

    // --- Phase 2: Build ---
    progress.phase("Building content trees");
    let mut builds = Vec::with_capacity(languages.len());
    for (i, (lang, src)) in languages.iter().zip(&sources).enumerate() {
        let build = build_language(lang, src, &config.app)?;
        progress.language_built(&lang.code, i + 1, languages.len());
        builds.push(build);
    }

    // --- Phase 3: Assemble ---
    progress.phase("Writing artifacts");
    let assembled = assembler::assemble(
        &AssembleConfig {
            output_dir: config.output_dir.clone(),
            build_id: build_id.clone(),
            tool_version: config.tool_version.clone(),
        },
        &builds,
    )?;

    let warnings: Vec<String> = builds
        .iter()
        .flat_map(|b| b.warnings.iter().map(|w| format!("[{}] {w}", b.code)))
        .collect();

    let result = IngestResult {
        build_id,
        output_dir: assembled.output_dir,
        languages: assembled.manifest.languages,
        artifacts: assembled.manifest.artifacts,
        warnings,
        elapsed: start.elapsed(),
    };

    info!(
        languages = result.languages.len(),
        warnings = result.warnings.len(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "ingestion complete"
    );

    progress.done(&result);
    Ok(result)
}

/// Read a language's source documents.
pub fn read_sources(lang: &LanguageConfig, base_dir: &Path) -> Result<LanguageSources> {
    let read = |path: PathBuf| {
        if !path.is_file() {
            return Err(DocweaveError::MissingSource {
                lang: lang.code.clone(),
                path,
            });
        }
        std::fs::read_to_string(&path).map_err(|e| DocweaveError::io(&path, e))
    };

    let markup = read(lang.markup_path(base_dir))?;
    let text_stream = lang.text_stream_path(base_dir).map(read).transpose()?;

    debug!(
        lang = %lang.code,
        markup_bytes = markup.len(),
        text_stream = text_stream.is_some(),
        "sources read"
    );
    Ok(LanguageSources {
        markup,
        text_stream,
    })
}

/// Build one language's tree and index in memory.
#[instrument(skip_all, fields(lang = %lang.code))]
pub fn build_language(
    lang: &LanguageConfig,
    sources: &LanguageSources,
    app: &AppConfig,
) -> Result<LanguageBuild> {
    let mut warnings = Vec::new();

    let markup = MarkupTokenizer::new(&app.markup).tokenize(&sources.markup);
    if markup.stats.headings == 0 {
        warnings.push("markup source contains no recognized headings".to_string());
    }

    let mut builder = OutlineBuilder::new(lang.chapter_titles.clone());
    builder.apply_all(markup.events);
    let mut outline = builder.stats().clone();
    let markup_tree = builder.finish();
    // The markup tree must stand on its own; the merge only adds to it.
    validate_tree(&markup_tree)?;

    let (chapters, merge) = match (&sources.text_stream, &lang.anchor) {
        (Some(text), Some(anchor)) => {
            let tokenizer = StreamTokenizer::new(&stream_config(app, lang))?;
            let mut builder = OutlineBuilder::from_tree(markup_tree, lang.chapter_titles.clone());
            let lines: Vec<&str> = text.lines().collect();
            let report = merge_text_stream(&mut builder, &tokenizer, &lines, anchor);
            warnings.extend(report.warning.clone());
            outline.absorb(builder.stats());

            let chapters = builder.finish();
            validate_tree(&chapters)?;
            (chapters, Some(report))
        }
        (Some(_), None) => {
            // validate_config rejects this for loaded configs.
            warn!("text stream configured without an anchor; skipping merge");
            warnings.push("text stream configured without an anchor; zero lines merged".into());
            (markup_tree, None)
        }
        (None, _) => (markup_tree, None),
    };

    if outline.blocks_orphaned > 0 {
        warnings.push(format!("{} blocks arrived before any chapter", outline.blocks_orphaned));
    }

    let index = build_index(&chapters);

    info!(
        chapters = chapters.len(),
        entries = index.len(),
        placeholders = outline.placeholders,
        warnings = warnings.len(),
        "language built"
    );

    Ok(LanguageBuild {
        code: lang.code.clone(),
        chapters,
        index,
        markup: markup.stats,
        outline,
        merge,
        warnings,
    })
}

/// Text-stream settings for one language.
///
/// Chapter numbers default to the language's titled chapters when none are
/// configured. Each titled chapter also yields a running page header
/// (`5. Repository`) so that it is dropped rather than read as a step.
fn stream_config(app: &AppConfig, lang: &LanguageConfig) -> docweave_shared::TextStreamConfig {
    let mut config = app.text_stream.clone();
    if config.chapter_numbers.is_empty() {
        config.chapter_numbers = lang.chapter_titles.keys().cloned().collect();
    }
    config.page_header_patterns.extend(
        lang.chapter_titles
            .iter()
            .filter(|(_, title)| !title.trim().is_empty())
            .map(|(number, title)| {
                format!(
                    r"^{}\.\s+{}$",
                    regex::escape(number),
                    regex::escape(title.trim())
                )
            }),
    );
    config
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use docweave_shared::{ContentBlock, MANIFEST_FILE, OutlineEvent};
    use docweave_textstream::LineKind;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
    }

    fn english() -> LanguageConfig {
        LanguageConfig {
            code: "en".into(),
            markup: "markup/manual.html".into(),
            text_stream: Some("text/manual.txt".into()),
            anchor: Some("4.1.1 Sources for Displaying Results".into()),
            chapter_titles: BTreeMap::from([
                ("1".to_string(), "Fundamental Terms".to_string()),
                ("4".to_string(), "Data and Result Visualization".to_string()),
                ("5".to_string(), "Repository".to_string()),
            ]),
        }
    }

    fn app(languages: Vec<LanguageConfig>) -> AppConfig {
        let mut app = AppConfig {
            languages,
            ..AppConfig::default()
        };
        app.text_stream.skip_lines = vec!["Result Visualization".into()];
        app
    }

    fn ingest_config(app: AppConfig, out: &Path) -> IngestConfig {
        IngestConfig {
            app,
            base_dir: fixtures_dir(),
            output_dir: out.to_path_buf(),
            tool_version: "0.1.0".into(),
        }
    }

    #[test]
    fn ingest_fixture_language() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("content");
        let config = ingest_config(app(vec![english()]), &out);

        let result = ingest(&config, &SilentProgress).unwrap();

        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
        assert_eq!(result.languages.len(), 1);
        assert_eq!(result.languages[0].chapter_count, 3);
        let merge = result.languages[0].merge.as_ref().unwrap();
        assert!(merge.anchor_found);
        assert!(merge.blocks_added > 0);
        assert!(out.join(MANIFEST_FILE).exists());

        let manifest = assembler::validate_output(&out).unwrap();
        assert_eq!(manifest.build_id, result.build_id);

        let chapters: Vec<Chapter> = serde_json::from_str(
            &std::fs::read_to_string(out.join("chapters-en.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(chapters[2].slug, "chapter-5-repository");
    }

    #[test]
    fn missing_source_aborts_before_any_write() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("content");
        let korean = LanguageConfig {
            code: "ko".into(),
            markup: "markup/manual-ko.html".into(),
            text_stream: None,
            anchor: None,
            chapter_titles: BTreeMap::new(),
        };
        let config = ingest_config(app(vec![english(), korean]), &out);

        let err = ingest(&config, &SilentProgress).unwrap_err();
        assert!(matches!(err, DocweaveError::MissingSource { ref lang, .. } if lang == "ko"));
        assert!(!out.exists());
    }

    #[test]
    fn no_languages_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ingest_config(app(vec![]), tmp.path());
        let err = ingest(&config, &SilentProgress).unwrap_err();
        assert!(err.to_string().contains("no [[languages]]"));
    }

    #[test]
    fn missing_anchor_is_a_warning() {
        let mut lang = english();
        lang.anchor = Some("9.9.9 Nowhere To Be Found".into());
        let sources = read_sources(&lang, &fixtures_dir()).unwrap();

        let build = build_language(&lang, &sources, &app(vec![])).unwrap();
        assert_eq!(build.warnings.len(), 1);
        assert!(build.warnings[0].contains("zero lines merged"));
        assert_eq!(build.chapters.len(), 2);
    }

    #[test]
    fn chapter_numbers_default_to_titled_chapters() {
        let config = stream_config(&AppConfig::default(), &english());
        assert_eq!(config.chapter_numbers, vec!["1", "4", "5"]);
    }

    #[test]
    fn chapter_page_headers_are_dropped() {
        let config = stream_config(&AppConfig::default(), &english());
        let tokenizer = StreamTokenizer::new(&config).unwrap();
        assert_eq!(tokenizer.classify("5. Repository"), LineKind::PageHeader);
        assert_eq!(
            tokenizer.classify("4. Data and Result Visualization"),
            LineKind::PageHeader
        );
        // Steps and other chapters' titles are untouched.
        assert!(matches!(
            tokenizer.classify("1. Select the result tab."),
            LineKind::NumberedStep(_)
        ));

        let out = tokenizer.tokenize([
            "The repository stores data",
            "-- 90 of 120 --",
            "90",
            "5. Repository",
            "and processes.",
        ]);
        assert_eq!(
            out.events,
            vec![OutlineEvent::Block(ContentBlock::paragraph(
                "The repository stores data and processes."
            ))]
        );
    }
}
