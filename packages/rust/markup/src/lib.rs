//! Structural tokenizer for the HTML export of a document.
//!
//! The export is a flat run of block-level nodes under `<body>`: paragraphs
//! carrying styled spans, and tables. Each node is classified into page noise,
//! a heading, or content, and turned into [`OutlineEvent`]s for the
//! hierarchy builder. Which classes and styles mean "heading" or "page header"
//! comes from [`MarkupConfig`].

mod inline;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use docweave_shared::{ContentBlock, MarkupConfig, OutlineEvent, chapter_prefix};

use crate::inline::{collapse_whitespace, render_formatted};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outline level of a recognized heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    Section,
    Subsection,
}

/// Classification of a single block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    /// Running header repeated at the top of each page.
    PageHeader,
    /// Bare page counter.
    PageNumber,
    /// Table-of-contents line.
    TocEntry,
    Heading {
        level: HeadingLevel,
        number: String,
        title: String,
    },
    Image {
        src: String,
        caption: Option<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    Paragraph {
        text: String,
        formatted_text: String,
    },
    /// Nothing usable (empty paragraph, unsupported tag).
    Empty,
}

/// Counters describing one tokenizer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupStats {
    pub nodes: usize,
    pub page_headers: usize,
    pub page_numbers: usize,
    pub toc_entries: usize,
    /// Whether a table of contents was seen at all.
    pub toc_seen: bool,
    pub headings: usize,
    pub paragraphs: usize,
    pub images: usize,
    pub tables_retained: usize,
    pub tables_dropped: usize,
    /// Content nodes discarded because no chapter had started yet.
    pub preamble_discarded: usize,
}

/// Events and statistics produced from one markup document.
#[derive(Debug, Clone, Default)]
pub struct MarkupOutput {
    pub events: Vec<OutlineEvent>,
    pub stats: MarkupStats,
}

// ---------------------------------------------------------------------------
// Patterns (compiled once)
// ---------------------------------------------------------------------------

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector"));
static SPAN_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("span selector"));
static IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("img selector"));
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("tr selector"));
static CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("cell selector"));

/// `N.M Title`
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)\s+(.+)$").expect("section regex"));

/// `N.M.K Title`
static SUBSECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+\.\d+)\s+(.+)$").expect("subsection regex"));

static PAGE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}$").expect("page number regex"));

const DOTTED_LEADER: &str = ". . . . .";

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Classifies markup nodes and emits outline events in document order.
#[derive(Debug, Clone)]
pub struct MarkupTokenizer {
    config: MarkupConfig,
}

impl MarkupTokenizer {
    pub fn new(config: &MarkupConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Tokenize a full HTML document.
    ///
    /// Content before the first chapter is discarded unless it starts with a
    /// configured body-start cue, which opens chapter 1. Tables seen before any
    /// chapter are held back and attached to the first chapter that opens.
    #[instrument(skip_all, fields(html_len = html.len()))]
    pub fn tokenize(&self, html: &str) -> MarkupOutput {
        let doc = Html::parse_document(html);
        let mut out = MarkupOutput::default();

        let Some(body) = doc.select(&BODY_SEL).next() else {
            warn!("markup document has no <body>");
            return out;
        };

        let mut chapter_open = false;
        let mut held_tables: Vec<ContentBlock> = Vec::new();

        for node in body.children().filter_map(ElementRef::wrap) {
            out.stats.nodes += 1;

            match self.classify(&node) {
                MarkupNode::PageHeader => out.stats.page_headers += 1,
                MarkupNode::PageNumber => out.stats.page_numbers += 1,
                MarkupNode::TocEntry => {
                    out.stats.toc_entries += 1;
                    out.stats.toc_seen = true;
                }
                MarkupNode::Heading {
                    level,
                    number,
                    title,
                } => {
                    out.stats.headings += 1;
                    if !chapter_open {
                        open_chapter(&mut out.events, chapter_prefix(&number), &mut held_tables);
                        chapter_open = true;
                    }
                    out.events.push(match level {
                        HeadingLevel::Section => OutlineEvent::Section { number, title },
                        HeadingLevel::Subsection => OutlineEvent::Subsection { number, title },
                    });
                }
                MarkupNode::Table { rows } => {
                    if rows.is_empty() {
                        out.stats.tables_dropped += 1;
                        continue;
                    }
                    out.stats.tables_retained += 1;
                    let block = ContentBlock::Table { rows };
                    if chapter_open {
                        out.events.push(OutlineEvent::Block(block));
                    } else {
                        held_tables.push(block);
                    }
                }
                MarkupNode::Image { src, caption } => {
                    let cue_text = caption.clone().unwrap_or_default();
                    if !chapter_open {
                        if !self.is_body_start(&cue_text) {
                            out.stats.preamble_discarded += 1;
                            continue;
                        }
                        open_chapter(&mut out.events, "1", &mut held_tables);
                        chapter_open = true;
                    }
                    out.stats.images += 1;
                    out.events.push(OutlineEvent::Block(ContentBlock::Image {
                        src: Some(src),
                        caption,
                    }));
                }
                MarkupNode::Paragraph {
                    text,
                    formatted_text,
                } => {
                    if !chapter_open {
                        if !self.is_body_start(&text) {
                            out.stats.preamble_discarded += 1;
                            continue;
                        }
                        debug!(cue = %text, "body start cue opens chapter 1");
                        open_chapter(&mut out.events, "1", &mut held_tables);
                        chapter_open = true;
                    }
                    out.stats.paragraphs += 1;
                    out.events.push(OutlineEvent::Block(ContentBlock::Paragraph {
                        text,
                        formatted_text,
                    }));
                }
                MarkupNode::Empty => {}
            }
        }

        if !held_tables.is_empty() {
            warn!(
                count = held_tables.len(),
                "tables found but no chapter ever opened; dropping them"
            );
            out.stats.tables_retained -= held_tables.len();
            out.stats.tables_dropped += held_tables.len();
        }

        debug!(
            nodes = out.stats.nodes,
            events = out.events.len(),
            headings = out.stats.headings,
            tables = out.stats.tables_retained,
            toc_seen = out.stats.toc_seen,
            "markup tokenized"
        );

        out
    }

    /// Classify one block-level node. Order matters: noise checks run before
    /// heading detection, and headings before content extraction.
    pub fn classify(&self, node: &ElementRef) -> MarkupNode {
        match node.value().name() {
            "table" => return MarkupNode::Table {
                rows: extract_rows(node),
            },
            "p" => {}
            _ => return MarkupNode::Empty,
        }

        if self.is_page_header(node) {
            return MarkupNode::PageHeader;
        }

        let text = node.text().collect::<String>();
        let trimmed = text.trim();

        if PAGE_NUMBER_RE.is_match(trimmed) {
            return MarkupNode::PageNumber;
        }

        if trimmed.contains(DOTTED_LEADER)
            || (trimmed.contains("Contents") && self.has_span_class(node, &self.config.header_span_class))
        {
            return MarkupNode::TocEntry;
        }

        if let Some(heading) = self.heading(node) {
            return heading;
        }

        if let Some(image) = self.image(node) {
            return image;
        }

        let text = collapse_whitespace(trimmed);
        if text.chars().count() < 2 {
            return MarkupNode::Empty;
        }

        let mut formatted_text = render_formatted(node, &self.config);
        if formatted_text.is_empty() {
            formatted_text = text.clone();
        }

        MarkupNode::Paragraph {
            text,
            formatted_text,
        }
    }

    // -----------------------------------------------------------------------
    // Node predicates
    // -----------------------------------------------------------------------

    fn is_page_header(&self, node: &ElementRef) -> bool {
        let has_header_class = node
            .value()
            .classes()
            .any(|c| self.config.page_header_classes.iter().any(|h| h == c));
        has_header_class && self.has_span_class(node, &self.config.header_span_class)
    }

    fn has_span_class(&self, node: &ElementRef, class: &str) -> bool {
        node.select(&SPAN_SEL)
            .any(|span| span.value().classes().any(|c| c == class))
    }

    fn is_body_start(&self, text: &str) -> bool {
        self.config
            .body_start_cues
            .iter()
            .any(|cue| !cue.is_empty() && text.starts_with(cue.as_str()))
    }

    fn heading(&self, node: &ElementRef) -> Option<MarkupNode> {
        let candidates = [
            (
                &self.config.section_span_class,
                &*SECTION_RE,
                HeadingLevel::Section,
            ),
            (
                &self.config.subsection_span_class,
                &*SUBSECTION_RE,
                HeadingLevel::Subsection,
            ),
        ];

        for (class, pattern, level) in candidates {
            let span_text: String = node
                .select(&SPAN_SEL)
                .filter(|span| span.value().classes().any(|c| c == class.as_str()))
                .flat_map(|span| span.text())
                .collect();
            let span_text = collapse_whitespace(&span_text);
            if let Some(caps) = pattern.captures(&span_text) {
                return Some(MarkupNode::Heading {
                    level,
                    number: caps[1].to_string(),
                    title: caps[2].trim().to_string(),
                });
            }
        }

        None
    }

    fn image(&self, node: &ElementRef) -> Option<MarkupNode> {
        let img = node.select(&IMG_SEL).next()?;
        let src = img.value().attr("src").unwrap_or_default().trim();
        if src.is_empty() {
            return None;
        }

        let mut parts: Vec<String> = Vec::new();
        for child in node.children() {
            let text = match ElementRef::wrap(child) {
                Some(el) if el.value().name() == "img" => continue,
                Some(el) => el.text().collect::<String>(),
                None => child
                    .value()
                    .as_text()
                    .map(|t| String::from(&**t))
                    .unwrap_or_default(),
            };
            let text = collapse_whitespace(&text);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        let caption = parts.join(" ");

        Some(MarkupNode::Image {
            src: self.resolve_src(src),
            caption: (!caption.is_empty()).then_some(caption),
        })
    }

    /// Prefix relative image paths (`images/a.png` → `/images/a.png`).
    fn resolve_src(&self, src: &str) -> String {
        let absolute = src.starts_with('/') || src.contains("://") || src.starts_with("data:");
        if absolute {
            src.to_string()
        } else {
            format!("{}{src}", self.config.image_src_prefix)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Emit the chapter-open event followed by any tables held before it.
fn open_chapter(events: &mut Vec<OutlineEvent>, number: &str, held: &mut Vec<ContentBlock>) {
    events.push(OutlineEvent::Chapter {
        number: number.to_string(),
    });
    events.extend(held.drain(..).map(OutlineEvent::Block));
}

/// Trimmed cell text for every `tr` of a table. Rows without cells are skipped.
fn extract_rows(table: &ElementRef) -> Vec<Vec<String>> {
    table
        .select(&TR_SEL)
        .map(|tr| {
            tr.select(&CELL_SEL)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
