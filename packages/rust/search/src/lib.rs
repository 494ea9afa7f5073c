//! Runtime search over the flat index.
//!
//! Case-insensitive literal substring matching against entry titles and
//! text, scored 2 for a title match and 1 for a text-only match. Text matches
//! carry a highlighted snippet.
//!
//! - [`SearchIndex`]: the immutable, in-memory index and its `search`
//! - [`DebouncedSearch`]: per-keystroke input, latest query wins
//! - [`Catalog`]: per-language artifacts loaded from the output directory

pub mod catalog;
pub mod debounce;

use regex::{Regex, RegexBuilder};
use tracing::{debug, instrument};

use docweave_shared::{DocweaveError, Result, SearchConfig, SearchEntry, SearchHit};

pub use catalog::Catalog;
pub use debounce::{DebouncedSearch, SearchResults};

const ELLIPSIS: &str = "...";

/// Tuning knobs for [`SearchIndex::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub min_query_len: usize,
    /// Characters kept on each side of the first text match.
    pub snippet_radius: usize,
    pub max_results: usize,
    pub highlight_open: String,
    pub highlight_close: String,
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            min_query_len: config.min_query_len,
            snippet_radius: config.snippet_radius,
            max_results: config.max_results,
            highlight_open: config.highlight_open.clone(),
            highlight_close: config.highlight_close.clone(),
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

/// Immutable search index for one language.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
    options: SearchOptions,
}

impl SearchIndex {
    pub fn new(entries: Vec<SearchEntry>, options: SearchOptions) -> Self {
        Self { entries, options }
    }

    /// Parse a `search-index-{lang}.json` artifact.
    pub fn from_json(json: &str, options: SearchOptions) -> Result<Self> {
        let entries: Vec<SearchEntry> = serde_json::from_str(json)
            .map_err(|e| DocweaveError::parse(format!("invalid search index: {e}")))?;
        Ok(Self::new(entries, options))
    }

    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Rank entries against `query`.
    ///
    /// Queries shorter than `min_query_len` characters, not counting
    /// surrounding whitespace, return nothing. Matching uses the query as
    /// typed. Ties keep index order.
    #[instrument(skip(self), fields(entries = self.entries.len()))]
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        if query.trim().chars().count() < self.options.min_query_len {
            return Vec::new();
        }
        let Some(pattern) = query_pattern(query) else {
            return Vec::new();
        };

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let title_match = pattern.is_match(&entry.title);
                let snippet = snippet(&entry.text, &pattern, &self.options);
                if !title_match && snippet.is_none() {
                    return None;
                }
                Some(SearchHit {
                    id: entry.id.clone(),
                    title: entry.title.clone(),
                    chapter_slug: entry.chapter_slug.clone(),
                    section_id: entry.section_id.clone(),
                    snippet: snippet.unwrap_or_default(),
                    score: if title_match { 2 } else { 1 },
                })
            })
            .collect();

        // `sort_by` is stable: equal scores keep index order.
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(self.options.max_results);

        debug!(hits = hits.len(), "search evaluated");
        hits
    }
}

/// Case-insensitive literal pattern for `query`.
fn query_pattern(query: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Highlighted window around the first match of `pattern` in `text`.
///
/// The window spans `snippet_radius` characters before the match and after
/// its end, clamped to the text. Every match inside the window is wrapped in
/// the highlight markers; `...` marks a side where text was cut.
pub fn snippet(text: &str, pattern: &Regex, options: &SearchOptions) -> Option<String> {
    let first = pattern.find(text)?;

    let char_start = text[..first.start()].chars().count();
    let char_end = char_start + first.as_str().chars().count();
    let total = char_start + text[first.start()..].chars().count();

    let win_start = char_start.saturating_sub(options.snippet_radius);
    let win_end = (char_end + options.snippet_radius).min(total);

    let byte_at = |char_idx: usize| {
        text.char_indices()
            .nth(char_idx)
            .map_or(text.len(), |(byte, _)| byte)
    };
    let window = &text[byte_at(win_start)..byte_at(win_end)];

    let highlighted = pattern.replace_all(window, |caps: &regex::Captures| {
        format!("{}{}{}", options.highlight_open, &caps[0], options.highlight_close)
    });

    let mut out = String::with_capacity(highlighted.len() + 2 * ELLIPSIS.len());
    if win_start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(&highlighted);
    if win_end < total {
        out.push_str(ELLIPSIS);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn entry(id: &str, title: &str, text: &str) -> SearchEntry {
        SearchEntry {
            id: id.into(),
            title: title.into(),
            chapter_slug: "chapter-1-basics".into(),
            section_id: id.into(),
            text: text.into(),
            number: "1.1".into(),
        }
    }

    fn index(entries: Vec<SearchEntry>) -> SearchIndex {
        SearchIndex::new(entries, SearchOptions::default())
    }

    #[test]
    fn single_character_query_is_empty() {
        let idx = index(vec![entry("a", "Alpha", "a b c")]);
        assert!(idx.search("a").is_empty());
        assert!(idx.search(" a ").is_empty());
        assert!(idx.search("").is_empty());
    }

    #[test]
    fn title_match_ranks_before_body_match() {
        let idx = index(vec![
            entry("body", "1.1 Intro", "All about repositories."),
            entry("title", "5.1 The Repository", "Stores data."),
        ]);
        let hits = idx.search("repositor");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "title");
        assert_eq!(hits[0].score, 2);
        assert_eq!(hits[0].snippet, "");
        assert_eq!(hits[1].id, "body");
        assert_eq!(hits[1].score, 1);
    }

    #[test]
    fn ties_keep_index_order() {
        let idx = index(vec![
            entry("first", "x", "data one"),
            entry("second", "y", "data two"),
            entry("third", "z", "data three"),
        ]);
        let ids: Vec<String> = idx.search("data").into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn short_text_snippet_has_no_ellipsis() {
        let idx = index(vec![entry(
            "fox",
            "Animals",
            "The quick brown fox jumps over the lazy dog",
        )]);
        let hits = idx.search("fox");
        assert_eq!(
            hits[0].snippet,
            r#"The quick brown <mark class="search-highlight">fox</mark> jumps over the lazy dog"#
        );
    }

    #[test]
    fn long_text_snippet_is_clamped_with_ellipses() {
        let text = format!("{}needle{}", "a".repeat(80), "b".repeat(80));
        let pattern = query_pattern("NEEDLE").unwrap();
        let options = SearchOptions {
            highlight_open: "[".into(),
            highlight_close: "]".into(),
            ..SearchOptions::default()
        };
        let snippet = snippet(&text, &pattern, &options).unwrap();
        assert_eq!(
            snippet,
            format!("...{}[needle]{}...", "a".repeat(50), "b".repeat(50))
        );
    }

    #[test]
    fn every_occurrence_in_window_is_highlighted() {
        let pattern = query_pattern("data").unwrap();
        let options = SearchOptions {
            highlight_open: "<".into(),
            highlight_close: ">".into(),
            ..SearchOptions::default()
        };
        let snippet = snippet("Data in, data out", &pattern, &options).unwrap();
        assert_eq!(snippet, "<Data> in, <data> out");
    }

    #[test]
    fn snippet_window_counts_characters() {
        let pattern = query_pattern("결과").unwrap();
        let options = SearchOptions {
            snippet_radius: 2,
            highlight_open: "<".into(),
            highlight_close: ">".into(),
            ..SearchOptions::default()
        };
        let snippet = snippet("가나다라결과마바사", &pattern, &options).unwrap();
        assert_eq!(snippet, "...다라<결과>마바...");
    }

    #[test]
    fn query_whitespace_is_part_of_the_literal() {
        let idx = index(vec![
            entry("end", "Animals", "The lazy fox."),
            entry("mid", "Animals", "A fox jumps."),
        ]);
        let hits = idx.search("fox ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "mid");
        assert_eq!(idx.search("fox").len(), 2);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let idx = index(vec![entry("p", "Prices", "costs $5.00 (approx)")]);
        assert_eq!(idx.search("(approx)").len(), 1);
        assert!(idx.search("5\\.00").is_empty());
    }

    #[test]
    fn results_are_capped() {
        let entries = (0..25)
            .map(|i| entry(&format!("e{i}"), "t", "common text"))
            .collect();
        assert_eq!(index(entries).search("common").len(), 10);
    }

    #[test]
    fn from_json_reads_camel_case() {
        let json = r#"[{"id":"a","title":"1. A","chapterSlug":"chapter-1-a","sectionId":"","text":"hello","number":"1"}]"#;
        let idx = SearchIndex::from_json(json, SearchOptions::default()).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.entries()[0].chapter_slug, "chapter-1-a");
        assert!(SearchIndex::from_json("{", SearchOptions::default()).is_err());
    }
}
