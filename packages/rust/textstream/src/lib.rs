//! Structural tokenizer for a paginated plain-text export.
//!
//! The text carries no structural tags: running headers, page counters and
//! separators interleave with body sentences. Each line is classified with
//! line-level heuristics only:
//! - `N.M Title` / `N.M.K Title`: heading, if Title starts with a capital and is long enough
//! - `Figure N.M: ...`: caption-only image placeholder
//! - `• item`: list item (accumulated until a non-bullet line)
//! - `N Word` at a known chapter number: chapter switch
//! - anything else: paragraph text, flushed on a blank line

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use docweave_shared::{ContentBlock, DocweaveError, OutlineEvent, Result, TextStreamConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Classification of a single raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    PageSeparator,
    PageNumber,
    PageHeader,
    /// Configured line to drop (e.g. a chapter title's second line).
    Skipped,
    TocEntry,
    Section { number: String, title: String },
    Subsection { number: String, title: String },
    Figure { caption: String },
    ChapterSwitch { number: String },
    /// `1. Automatic Opening` style step; starts a new paragraph.
    NumberedStep(String),
    Bullet(String),
    Text(String),
}

impl LineKind {
    /// Whether the line is page noise that contributes nothing.
    pub fn is_discarded(&self) -> bool {
        matches!(
            self,
            Self::PageSeparator | Self::PageNumber | Self::PageHeader | Self::Skipped | Self::TocEntry
        )
    }
}

/// Counters describing one tokenizer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub lines: usize,
    pub blank: usize,
    pub discarded: usize,
    /// Non-blank lines that reached a heading, figure, list or paragraph.
    pub attributed: usize,
    pub headings: usize,
    pub chapter_switches: usize,
    pub figures: usize,
    pub paragraphs: usize,
    pub lists: usize,
    /// Paragraphs dropped for being shorter than three characters.
    pub fragments_dropped: usize,
}

/// Events and statistics produced from one text stream.
#[derive(Debug, Clone, Default)]
pub struct StreamOutput {
    pub events: Vec<OutlineEvent>,
    pub stats: StreamStats,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static PAGE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}$").expect("page number regex"));

/// `N.M Title`; the `\s+` right after `N.M` keeps `N.M.K` lines out.
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)\s+(.+)$").expect("section regex"));

static SUBSECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+\.\d+)\s+(.+)$").expect("subsection regex"));

static FIGURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Figure \d+\.\d+:").expect("figure regex"));

static CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+\w").expect("chapter regex"));

static NUMBERED_STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+[A-Z]").expect("numbered step regex"));

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const DOTTED_LEADER: &str = ". . . .";

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Line classifier and paragraph/list accumulator for the text export.
#[derive(Debug, Clone)]
pub struct StreamTokenizer {
    page_separator: Regex,
    page_headers: Vec<Regex>,
    skip_lines: HashSet<String>,
    chapter_numbers: HashSet<String>,
    min_title_len: usize,
    bullet_glyphs: Vec<String>,
}

impl StreamTokenizer {
    /// Compile the configured patterns.
    pub fn new(config: &TextStreamConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                DocweaveError::config(format!("invalid text_stream pattern '{pattern}': {e}"))
            })
        };

        Ok(Self {
            page_separator: compile(config.page_separator.as_str())?,
            page_headers: config
                .page_header_patterns
                .iter()
                .map(|p| compile(p.as_str()))
                .collect::<Result<_>>()?,
            skip_lines: config.skip_lines.iter().map(|l| l.trim().to_string()).collect(),
            chapter_numbers: config.chapter_numbers.iter().cloned().collect(),
            min_title_len: config.min_title_len,
            bullet_glyphs: config
                .bullet_glyphs
                .iter()
                .filter(|g| !g.is_empty())
                .cloned()
                .collect(),
        })
    }

    /// Classify one raw line. Rules are tried in priority order.
    pub fn classify(&self, raw: &str) -> LineKind {
        let line = raw.trim();

        if line.is_empty() {
            return LineKind::Blank;
        }
        if self.page_separator.is_match(line) {
            return LineKind::PageSeparator;
        }
        if PAGE_NUMBER_RE.is_match(line) {
            return LineKind::PageNumber;
        }
        if self.page_headers.iter().any(|re| re.is_match(line)) {
            return LineKind::PageHeader;
        }
        if self.skip_lines.contains(line) {
            return LineKind::Skipped;
        }
        if line.contains(DOTTED_LEADER) {
            return LineKind::TocEntry;
        }
        if FIGURE_RE.is_match(line) {
            return LineKind::Figure {
                caption: line.to_string(),
            };
        }
        if let Some(caps) = SECTION_RE.captures(line) {
            if self.is_heading_title(&caps[2]) {
                return LineKind::Section {
                    number: caps[1].to_string(),
                    title: caps[2].trim().to_string(),
                };
            }
        }
        if let Some(caps) = SUBSECTION_RE.captures(line) {
            if self.is_heading_title(&caps[2]) {
                return LineKind::Subsection {
                    number: caps[1].to_string(),
                    title: caps[2].trim().to_string(),
                };
            }
        }
        if let Some(caps) = CHAPTER_RE.captures(line) {
            if self.chapter_numbers.contains(&caps[1]) {
                return LineKind::ChapterSwitch {
                    number: caps[1].to_string(),
                };
            }
        }
        if NUMBERED_STEP_RE.is_match(line) && line.chars().count() > 5 {
            return LineKind::NumberedStep(line.to_string());
        }
        if let Some(item) = self.strip_bullet(line) {
            return LineKind::Bullet(item);
        }

        LineKind::Text(line.to_string())
    }

    /// Tokenize a sequence of raw lines into outline events.
    #[instrument(skip_all)]
    pub fn tokenize<I, S>(&self, lines: I) -> StreamOutput
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = Accumulator::default();

        for raw in lines {
            acc.out.stats.lines += 1;
            let kind = self.classify(raw.as_ref());

            if kind.is_discarded() {
                acc.out.stats.discarded += 1;
                continue;
            }

            if kind != LineKind::Blank {
                acc.out.stats.attributed += 1;
            }

            match kind {
                // A blank line ends a paragraph but not a list.
                LineKind::Blank => {
                    acc.out.stats.blank += 1;
                    acc.flush_paragraph();
                }
                LineKind::Section { number, title } => {
                    acc.flush_all();
                    acc.out.stats.headings += 1;
                    acc.out.events.push(OutlineEvent::Section { number, title });
                }
                LineKind::Subsection { number, title } => {
                    acc.flush_all();
                    acc.out.stats.headings += 1;
                    acc.out.events.push(OutlineEvent::Subsection { number, title });
                }
                LineKind::ChapterSwitch { number } => {
                    acc.flush_all();
                    acc.out.stats.chapter_switches += 1;
                    acc.out.events.push(OutlineEvent::Chapter { number });
                }
                LineKind::Figure { caption } => {
                    acc.flush_all();
                    acc.out.stats.figures += 1;
                    acc.out.events.push(OutlineEvent::Block(ContentBlock::Image {
                        src: None,
                        caption: Some(caption),
                    }));
                }
                LineKind::NumberedStep(line) => {
                    acc.flush_all();
                    acc.pending.push(line);
                }
                LineKind::Bullet(item) => {
                    acc.flush_paragraph();
                    acc.list.push(item);
                }
                LineKind::Text(line) => {
                    acc.flush_list();
                    acc.pending.push(line);
                }
                // Discarded kinds were filtered above.
                _ => {}
            }
        }

        acc.flush_all();

        let out = acc.out;
        debug!(
            lines = out.stats.lines,
            discarded = out.stats.discarded,
            headings = out.stats.headings,
            paragraphs = out.stats.paragraphs,
            lists = out.stats.lists,
            "text stream tokenized"
        );
        out
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// A heading title starts with a letter that is not lowercase (caseless
    /// scripts pass) and is at least `min_title_len` characters long.
    fn is_heading_title(&self, title: &str) -> bool {
        let title = title.trim();
        let starts_capital = title
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() && !c.is_lowercase());
        starts_capital && title.chars().count() >= self.min_title_len
    }

    fn strip_bullet(&self, line: &str) -> Option<String> {
        self.bullet_glyphs
            .iter()
            .find_map(|glyph| line.strip_prefix(glyph.as_str()))
            .map(|rest| rest.trim().to_string())
    }
}

/// Pending paragraph lines and list items between flushes.
#[derive(Default)]
struct Accumulator {
    pending: Vec<String>,
    list: Vec<String>,
    out: StreamOutput,
}

impl Accumulator {
    fn flush_paragraph(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let joined = self.pending.join(" ");
        self.pending.clear();
        let text = WS_RE.replace_all(joined.trim(), " ").into_owned();

        if text.chars().count() < 3 {
            self.out.stats.fragments_dropped += 1;
            return;
        }
        self.out.stats.paragraphs += 1;
        self.out
            .events
            .push(OutlineEvent::Block(ContentBlock::paragraph(text)));
    }

    fn flush_list(&mut self) {
        if self.list.is_empty() {
            return;
        }
        self.out.stats.lists += 1;
        let items = std::mem::take(&mut self.list);
        self.out
            .events
            .push(OutlineEvent::Block(ContentBlock::List { items }));
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }
}
