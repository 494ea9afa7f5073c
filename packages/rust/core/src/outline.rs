//! Hierarchy builder.
//!
//! Consumes [`OutlineEvent`]s from either tokenizer and grows the
//! chapter → section → subsection tree. Nodes live in one arena per level and
//! the cursors are plain indices into those arenas, so reopening an existing
//! node is a lookup by number rather than a walk over borrowed references.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use docweave_shared::{
    Chapter, ContentBlock, DocweaveError, OutlineEvent, Result, Section, Subsection,
    chapter_prefix, section_prefix, slugify,
};

// ---------------------------------------------------------------------------
// Arena nodes
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ChapterNode {
    id: String,
    number: String,
    title: String,
    slug: String,
    blocks: Vec<ContentBlock>,
    sections: Vec<usize>,
}

#[derive(Debug)]
struct SectionNode {
    id: String,
    number: String,
    title: String,
    blocks: Vec<ContentBlock>,
    subsections: Vec<usize>,
}

#[derive(Debug)]
struct SubsectionNode {
    id: String,
    number: String,
    title: String,
    blocks: Vec<ContentBlock>,
}

/// Innermost open node at each level.
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    chapter: Option<usize>,
    section: Option<usize>,
    subsection: Option<usize>,
}

/// Counters describing what the builder did with its events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub chapters_created: usize,
    pub sections_created: usize,
    pub subsections_created: usize,
    /// Sections synthesized for a subsection whose parent never appeared.
    pub placeholders: usize,
    /// Heading events that landed on a node that already existed.
    pub nodes_reused: usize,
    pub blocks_appended: usize,
    /// Blocks that arrived with no chapter open.
    pub blocks_orphaned: usize,
}

impl BuildStats {
    /// Add the counters of a later build phase.
    pub fn absorb(&mut self, other: &BuildStats) {
        self.chapters_created += other.chapters_created;
        self.sections_created += other.sections_created;
        self.subsections_created += other.subsections_created;
        self.placeholders += other.placeholders;
        self.nodes_reused += other.nodes_reused;
        self.blocks_appended += other.blocks_appended;
        self.blocks_orphaned += other.blocks_orphaned;
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Incrementally builds the content tree from outline events.
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    chapter_titles: BTreeMap<String, String>,
    chapters: Vec<ChapterNode>,
    sections: Vec<SectionNode>,
    subsections: Vec<SubsectionNode>,
    cursor: Cursor,
    ids: HashSet<String>,
    stats: BuildStats,
}

impl OutlineBuilder {
    /// Empty builder. `chapter_titles` maps chapter number to title.
    pub fn new(chapter_titles: BTreeMap<String, String>) -> Self {
        Self {
            chapter_titles,
            ..Self::default()
        }
    }

    /// Re-seed the arena from a finished tree. Cursors start closed.
    pub fn from_tree(tree: Vec<Chapter>, chapter_titles: BTreeMap<String, String>) -> Self {
        let mut builder = Self::new(chapter_titles);

        for chapter in tree {
            builder.ids.insert(chapter.id.clone());
            let mut section_idxs = Vec::with_capacity(chapter.sections.len());

            for section in chapter.sections {
                builder.ids.insert(section.id.clone());
                let mut subsection_idxs = Vec::with_capacity(section.subsections.len());

                for sub in section.subsections {
                    builder.ids.insert(sub.id.clone());
                    subsection_idxs.push(builder.subsections.len());
                    builder.subsections.push(SubsectionNode {
                        id: sub.id,
                        number: sub.number,
                        title: sub.title,
                        blocks: sub.blocks,
                    });
                }

                section_idxs.push(builder.sections.len());
                builder.sections.push(SectionNode {
                    id: section.id,
                    number: section.number,
                    title: section.title,
                    blocks: section.blocks,
                    subsections: subsection_idxs,
                });
            }

            builder.chapters.push(ChapterNode {
                id: chapter.id,
                number: chapter.number,
                title: chapter.title,
                slug: chapter.slug,
                blocks: chapter.blocks,
                sections: section_idxs,
            });
        }

        debug!(
            chapters = builder.chapters.len(),
            sections = builder.sections.len(),
            subsections = builder.subsections.len(),
            "outline re-seeded from tree"
        );
        builder
    }

    /// Apply one event.
    pub fn apply(&mut self, event: OutlineEvent) {
        match event {
            OutlineEvent::Chapter { number } => {
                self.open_chapter(&number);
            }
            OutlineEvent::Section { number, title } => {
                self.open_section(&number, &title);
            }
            OutlineEvent::Subsection { number, title } => {
                self.open_subsection(&number, &title);
            }
            OutlineEvent::Block(block) => {
                self.push_block(block);
            }
        }
    }

    /// Apply every event in order.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = OutlineEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Move the cursors onto the existing node numbered `number` (any level).
    ///
    /// Returns `false` and leaves the cursors alone when no such node exists.
    pub fn rehome(&mut self, number: &str) -> bool {
        let Some(ch) = self.find_chapter(chapter_prefix(number)) else {
            return false;
        };
        let depth = number.split('.').count();

        if depth == 1 {
            self.cursor = Cursor {
                chapter: Some(ch),
                ..Cursor::default()
            };
            return true;
        }

        let Some(sec) = self.find_section(ch, section_prefix(number)) else {
            return false;
        };
        if depth == 2 {
            self.cursor = Cursor {
                chapter: Some(ch),
                section: Some(sec),
                subsection: None,
            };
            return true;
        }

        let Some(sub) = self.find_subsection(sec, number) else {
            return false;
        };
        self.cursor = Cursor {
            chapter: Some(ch),
            section: Some(sec),
            subsection: Some(sub),
        };
        true
    }

    /// Whether a node with this number exists at any level.
    #[cfg(test)]
    pub(crate) fn contains(&self, number: &str) -> bool {
        let Some(ch) = self.find_chapter(chapter_prefix(number)) else {
            return false;
        };
        match number.split('.').count() {
            1 => true,
            2 => self.find_section(ch, number).is_some(),
            _ => self
                .find_section(ch, section_prefix(number))
                .and_then(|sec| self.find_subsection(sec, number))
                .is_some(),
        }
    }

    /// Total number of outline nodes across all levels.
    pub fn node_count(&self) -> usize {
        self.chapters.len() + self.sections.len() + self.subsections.len()
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Materialize the nested tree.
    pub fn finish(self) -> Vec<Chapter> {
        let Self {
            chapters,
            sections,
            subsections,
            ..
        } = self;

        let mut subsections: Vec<Option<SubsectionNode>> =
            subsections.into_iter().map(Some).collect();
        let mut sections: Vec<Option<SectionNode>> = sections.into_iter().map(Some).collect();

        chapters
            .into_iter()
            .map(|ch| Chapter {
                id: ch.id,
                number: ch.number,
                title: ch.title,
                slug: ch.slug,
                blocks: ch.blocks,
                sections: ch
                    .sections
                    .into_iter()
                    .filter_map(|si| sections[si].take())
                    .map(|sec| Section {
                        id: sec.id,
                        number: sec.number,
                        title: sec.title,
                        blocks: sec.blocks,
                        subsections: sec
                            .subsections
                            .into_iter()
                            .filter_map(|ki| subsections[ki].take())
                            .map(|sub| Subsection {
                                id: sub.id,
                                number: sub.number,
                                title: sub.title,
                                blocks: sub.blocks,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// Open or reuse chapter `number` and close the deeper cursors.
    fn open_chapter(&mut self, number: &str) -> usize {
        let idx = match self.find_chapter(number) {
            Some(idx) => {
                self.stats.nodes_reused += 1;
                idx
            }
            None => self.create_chapter(number),
        };
        self.cursor = Cursor {
            chapter: Some(idx),
            ..Cursor::default()
        };
        idx
    }

    /// Keep the current chapter if it already matches `number`.
    fn ensure_chapter(&mut self, number: &str) -> usize {
        match self.cursor.chapter {
            Some(idx) if self.chapters[idx].number == number => idx,
            _ => self.open_chapter(number),
        }
    }

    fn open_section(&mut self, number: &str, title: &str) -> usize {
        let ch = self.ensure_chapter(chapter_prefix(number));
        let idx = match self.find_section(ch, number) {
            Some(idx) => {
                self.stats.nodes_reused += 1;
                self.fill_placeholder(idx, title);
                idx
            }
            None => self.create_section(ch, number, title),
        };
        self.cursor.section = Some(idx);
        self.cursor.subsection = None;
        idx
    }

    fn open_subsection(&mut self, number: &str, title: &str) -> usize {
        let ch = self.ensure_chapter(chapter_prefix(number));
        let parent = section_prefix(number);

        let sec = match self.cursor.section {
            Some(idx) if self.sections[idx].number == parent => idx,
            _ => match self.find_section(ch, parent) {
                Some(idx) => idx,
                None => {
                    debug!(number = %parent, child = %number, "synthesizing placeholder section");
                    self.stats.placeholders += 1;
                    self.create_section(ch, parent, "")
                }
            },
        };
        self.cursor.section = Some(sec);

        let idx = match self.find_subsection(sec, number) {
            Some(idx) => {
                self.stats.nodes_reused += 1;
                idx
            }
            None => self.create_subsection(sec, number, title),
        };
        self.cursor.subsection = Some(idx);
        idx
    }

    /// Append to the innermost open node. Returns `false` when orphaned.
    fn push_block(&mut self, block: ContentBlock) -> bool {
        let target = match self.cursor {
            Cursor {
                subsection: Some(k),
                ..
            } => &mut self.subsections[k].blocks,
            Cursor {
                section: Some(s), ..
            } => &mut self.sections[s].blocks,
            Cursor {
                chapter: Some(c), ..
            } => &mut self.chapters[c].blocks,
            _ => {
                trace!("block arrived before any chapter; dropping");
                self.stats.blocks_orphaned += 1;
                return false;
            }
        };
        target.push(block);
        self.stats.blocks_appended += 1;
        true
    }

    // -----------------------------------------------------------------------
    // Node creation
    // -----------------------------------------------------------------------

    fn create_chapter(&mut self, number: &str) -> usize {
        let title = self
            .chapter_titles
            .get(number)
            .cloned()
            .unwrap_or_else(|| format!("Chapter {number}"));
        let id = self.unique_id(format!("chapter-{number}"));
        let title_slug = slugify(&title);
        let slug = if title_slug.is_empty() {
            format!("chapter-{number}")
        } else {
            format!("chapter-{number}-{title_slug}")
        };

        debug!(%number, %title, "opening chapter");
        self.stats.chapters_created += 1;
        self.chapters.push(ChapterNode {
            id,
            number: number.to_string(),
            title,
            slug,
            blocks: Vec::new(),
            sections: Vec::new(),
        });
        self.chapters.len() - 1
    }

    fn create_section(&mut self, chapter: usize, number: &str, title: &str) -> usize {
        let id = self.unique_id(node_id(number, title));
        self.stats.sections_created += 1;
        self.sections.push(SectionNode {
            id,
            number: number.to_string(),
            title: title.to_string(),
            blocks: Vec::new(),
            subsections: Vec::new(),
        });
        let idx = self.sections.len() - 1;
        self.chapters[chapter].sections.push(idx);
        idx
    }

    fn create_subsection(&mut self, section: usize, number: &str, title: &str) -> usize {
        let id = self.unique_id(node_id(number, title));
        self.stats.subsections_created += 1;
        self.subsections.push(SubsectionNode {
            id,
            number: number.to_string(),
            title: title.to_string(),
            blocks: Vec::new(),
        });
        let idx = self.subsections.len() - 1;
        self.sections[section].subsections.push(idx);
        idx
    }

    /// A placeholder section that later meets its real heading takes the
    /// heading's title and the id that title implies.
    fn fill_placeholder(&mut self, idx: usize, title: &str) {
        if !self.sections[idx].title.is_empty() || title.is_empty() {
            return;
        }
        let old_id = std::mem::take(&mut self.sections[idx].id);
        self.ids.remove(&old_id);
        let id = self.unique_id(node_id(&self.sections[idx].number, title));
        let section = &mut self.sections[idx];
        section.title = title.to_string();
        section.id = id;
    }

    /// Reserve `base`, or `base-2`, `base-3`, ... if it is taken.
    fn unique_id(&mut self, base: String) -> String {
        if self.ids.insert(base.clone()) {
            return base;
        }
        let id = (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.ids.contains(candidate))
            .unwrap_or_else(|| base.clone());
        self.ids.insert(id.clone());
        id
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn find_chapter(&self, number: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.number == number)
    }

    fn find_section(&self, chapter: usize, number: &str) -> Option<usize> {
        self.chapters[chapter]
            .sections
            .iter()
            .copied()
            .find(|&s| self.sections[s].number == number)
    }

    fn find_subsection(&self, section: usize, number: &str) -> Option<usize> {
        self.sections[section]
            .subsections
            .iter()
            .copied()
            .find(|&k| self.subsections[k].number == number)
    }
}

/// Section/subsection id: `slugify("{number}-{title}")`, or
/// `slugify("section-{number}")` for an untitled placeholder.
fn node_id(number: &str, title: &str) -> String {
    if title.is_empty() {
        slugify(&format!("section-{number}"))
    } else {
        slugify(&format!("{number}-{title}"))
    }
}

// ---------------------------------------------------------------------------
// Tree validation
// ---------------------------------------------------------------------------

/// Check the numbering and id invariants of a finished tree.
pub fn validate_tree(chapters: &[Chapter]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut claim = |id: &str| {
        if ids.insert(id.to_string()) {
            Ok(())
        } else {
            Err(DocweaveError::validation(format!("duplicate node id '{id}'")))
        }
    };

    for chapter in chapters {
        claim(&chapter.id)?;
        for section in &chapter.sections {
            claim(&section.id)?;
            if chapter_prefix(&section.number) != chapter.number {
                return Err(DocweaveError::validation(format!(
                    "section {} filed under chapter {}",
                    section.number, chapter.number
                )));
            }
            for sub in &section.subsections {
                claim(&sub.id)?;
                if section_prefix(&sub.number) != section.number {
                    return Err(DocweaveError::validation(format!(
                        "subsection {} filed under section {}",
                        sub.number, section.number
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("1".to_string(), "Fundamental Terms".to_string()),
            ("4".to_string(), "Data and Result Visualization".to_string()),
        ])
    }

    fn section(number: &str, title: &str) -> OutlineEvent {
        OutlineEvent::Section {
            number: number.into(),
            title: title.into(),
        }
    }

    fn subsection(number: &str, title: &str) -> OutlineEvent {
        OutlineEvent::Subsection {
            number: number.into(),
            title: title.into(),
        }
    }

    fn para(text: &str) -> OutlineEvent {
        OutlineEvent::Block(ContentBlock::paragraph(text))
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        let builder = OutlineBuilder::new(titles());
        let tree = builder.finish();
        assert!(tree.is_empty());
        validate_tree(&tree).expect("empty tree is valid");
    }

    #[test]
    fn blocks_land_in_innermost_node() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            OutlineEvent::Chapter { number: "1".into() },
            para("intro"),
            section("1.1", "Coincidence or not?"),
            para("section body"),
            subsection("1.1.1", "Details"),
            para("subsection body"),
        ]);
        let tree = builder.finish();

        assert_eq!(tree.len(), 1);
        let ch = &tree[0];
        assert_eq!(ch.id, "chapter-1");
        assert_eq!(ch.slug, "chapter-1-fundamental-terms");
        assert_eq!(ch.blocks, vec![ContentBlock::paragraph("intro")]);
        assert_eq!(ch.sections[0].id, "1-1-coincidence-or-not");
        assert_eq!(ch.sections[0].blocks.len(), 1);
        assert_eq!(ch.sections[0].subsections[0].id, "1-1-1-details");
        assert_eq!(ch.sections[0].subsections[0].blocks.len(), 1);
    }

    #[test]
    fn section_prefix_switches_chapter() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            OutlineEvent::Chapter { number: "1".into() },
            section("1.1", "Intro"),
            section("4.1", "Result Visualization"),
            para("results"),
        ]);
        let tree = builder.finish();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].number, "4");
        assert_eq!(tree[1].title, "Data and Result Visualization");
        assert_eq!(tree[1].sections[0].number, "4.1");
        validate_tree(&tree).expect("valid tree");
    }

    #[test]
    fn unknown_chapter_gets_fallback_title() {
        let mut builder = OutlineBuilder::new(BTreeMap::new());
        builder.apply(OutlineEvent::Chapter { number: "7".into() });
        let tree = builder.finish();
        assert_eq!(tree[0].title, "Chapter 7");
        assert_eq!(tree[0].slug, "chapter-7-chapter-7");
    }

    #[test]
    fn orphan_subsection_gets_placeholder_section() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            OutlineEvent::Chapter { number: "4".into() },
            section("4.1", "Result Visualization"),
            subsection("4.3.1", "Description"),
            para("summary"),
        ]);
        assert_eq!(builder.stats().placeholders, 1);
        let tree = builder.finish();

        let placeholder = &tree[0].sections[1];
        assert_eq!(placeholder.number, "4.3");
        assert_eq!(placeholder.title, "");
        assert_eq!(placeholder.id, "section-4-3");
        assert_eq!(placeholder.subsections[0].number, "4.3.1");
        validate_tree(&tree).expect("valid tree");
    }

    #[test]
    fn placeholder_takes_title_when_heading_arrives() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            subsection("4.3.1", "Description"),
            section("4.3", "Display Formats"),
        ]);
        let tree = builder.finish();

        assert_eq!(tree[0].sections.len(), 1);
        assert_eq!(tree[0].sections[0].title, "Display Formats");
        assert_eq!(tree[0].sections[0].id, "4-3-display-formats");
    }

    #[test]
    fn repeated_headings_reuse_nodes() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            section("1.1", "Intro"),
            para("first"),
            section("1.2", "Terms"),
            section("1.1", "Intro"),
            para("second"),
        ]);
        assert_eq!(builder.node_count(), 3);
        assert_eq!(builder.stats().nodes_reused, 1);
        let tree = builder.finish();
        assert_eq!(tree[0].sections[0].blocks.len(), 2);
    }

    #[test]
    fn sibling_ids_are_unique() {
        // Distinct number/title pairs that slugify to the same string.
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            section("1.1", "1 a"),
            section("1.1-1", "a"),
        ]);
        let tree = builder.finish();
        let ids: Vec<&str> = tree[0].sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1-1-1-a", "1-1-1-a-2"]);
        validate_tree(&tree).expect("unique ids");
    }

    #[test]
    fn block_before_any_chapter_is_orphaned() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply(para("lost"));
        assert_eq!(builder.stats().blocks_orphaned, 1);
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn from_tree_roundtrips_and_rehomes() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            section("4.1", "Result Visualization"),
            subsection("4.1.1", "Sources for Displaying Results"),
            para("markup body"),
        ]);
        let tree = builder.finish();

        let mut reseeded = OutlineBuilder::from_tree(tree.clone(), titles());
        assert!(reseeded.contains("4.1.1"));
        assert!(!reseeded.contains("4.2"));
        assert!(reseeded.rehome("4.1.1"));
        reseeded.apply(para("text body"));
        assert!(!reseeded.rehome("9.9.9"));

        let merged = reseeded.finish();
        assert_eq!(merged[0].sections[0].subsections[0].blocks.len(), 2);
        assert_eq!(merged[0].id, tree[0].id);
    }

    #[test]
    fn reseeded_placeholder_still_takes_title_and_stats_add_up() {
        let mut builder = OutlineBuilder::new(titles());
        builder.apply_all([
            section("4.1", "Result Visualization"),
            subsection("4.3.1", "Description"),
        ]);
        let mut stats = builder.stats().clone();
        let tree = builder.finish();

        let mut reseeded = OutlineBuilder::from_tree(tree, titles());
        assert!(reseeded.rehome("4.3.1"));
        reseeded.apply_all([section("4.3", "Display Formats"), section("4.4", "Views")]);
        stats.absorb(reseeded.stats());

        assert_eq!(stats.placeholders, 1);
        assert_eq!(stats.nodes_reused, 1);
        assert_eq!(stats.sections_created, 3);

        let merged = reseeded.finish();
        let numbers: Vec<&str> = merged[0].sections.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(numbers, vec!["4.1", "4.3", "4.4"]);
        assert_eq!(merged[0].sections[1].title, "Display Formats");
        assert_eq!(merged[0].sections[1].id, "4-3-display-formats");
    }

    #[test]
    fn validate_tree_rejects_misfiled_section() {
        let tree = vec![Chapter {
            id: "chapter-1".into(),
            number: "1".into(),
            title: "One".into(),
            slug: "chapter-1-one".into(),
            blocks: vec![],
            sections: vec![Section {
                id: "2-1-x".into(),
                number: "2.1".into(),
                title: "x".into(),
                blocks: vec![],
                subsections: vec![],
            }],
        }];
        let err = validate_tree(&tree).unwrap_err();
        assert!(err.to_string().contains("2.1"));
    }
}
