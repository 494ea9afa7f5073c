//! Flat search index derived from the finished content tree.

use tracing::{debug, instrument};

use docweave_shared::{Chapter, ContentBlock, SearchEntry};

/// Build one search entry per chapter with content and one per section or
/// subsection that has content or a title, in document order.
#[instrument(skip_all, fields(chapters = chapters.len()))]
pub fn build_index(chapters: &[Chapter]) -> Vec<SearchEntry> {
    let mut entries = Vec::new();

    for chapter in chapters {
        if !chapter.blocks.is_empty() {
            entries.push(SearchEntry {
                id: chapter.id.clone(),
                title: format!("{}. {}", chapter.number, chapter.title),
                chapter_slug: chapter.slug.clone(),
                section_id: String::new(),
                text: block_text(&chapter.blocks),
                number: chapter.number.clone(),
            });
        }

        for section in &chapter.sections {
            if !section.blocks.is_empty() || !section.title.is_empty() {
                entries.push(node_entry(
                    chapter,
                    &section.id,
                    &section.number,
                    &section.title,
                    &section.blocks,
                ));
            }

            for sub in &section.subsections {
                if !sub.blocks.is_empty() || !sub.title.is_empty() {
                    entries.push(node_entry(chapter, &sub.id, &sub.number, &sub.title, &sub.blocks));
                }
            }
        }
    }

    debug!(entries = entries.len(), "search index built");
    entries
}

fn node_entry(
    chapter: &Chapter,
    id: &str,
    number: &str,
    title: &str,
    blocks: &[ContentBlock],
) -> SearchEntry {
    SearchEntry {
        id: id.to_string(),
        title: format!("{number} {title}").trim_end().to_string(),
        chapter_slug: chapter.slug.clone(),
        section_id: id.to_string(),
        text: block_text(blocks),
        number: number.to_string(),
    }
}

/// Searchable text of a block list: each block's contribution joined by
/// single spaces with whitespace collapsed.
pub fn block_text(blocks: &[ContentBlock]) -> String {
    let joined = blocks
        .iter()
        .filter_map(ContentBlock::search_text)
        .collect::<Vec<_>>()
        .join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use docweave_shared::{Section, Subsection};

    use super::*;

    fn chapter(blocks: Vec<ContentBlock>, sections: Vec<Section>) -> Chapter {
        Chapter {
            id: "chapter-1".into(),
            number: "1".into(),
            title: "Fundamental Terms".into(),
            slug: "chapter-1-fundamental-terms".into(),
            blocks,
            sections,
        }
    }

    #[test]
    fn hello_world_chapter_yields_one_entry() {
        let tree = vec![chapter(vec![ContentBlock::paragraph("Hello world")], vec![])];
        let index = build_index(&tree);

        assert_eq!(index.len(), 1);
        assert_eq!(index[0].text, "Hello world");
        assert_eq!(index[0].title, "1. Fundamental Terms");
        assert_eq!(index[0].section_id, "");
        assert_eq!(index[0].chapter_slug, "chapter-1-fundamental-terms");
    }

    #[test]
    fn empty_chapter_has_no_entry_but_titled_sections_do() {
        let section = Section {
            id: "1-1-intro".into(),
            number: "1.1".into(),
            title: "Intro".into(),
            blocks: vec![],
            subsections: vec![Subsection {
                id: "section-1-1-1".into(),
                number: "1.1.1".into(),
                title: String::new(),
                blocks: vec![],
            }],
        };
        let index = build_index(&[chapter(vec![], vec![section])]);

        assert_eq!(index.len(), 1);
        assert_eq!(index[0].title, "1.1 Intro");
        assert_eq!(index[0].section_id, "1-1-intro");
        assert_eq!(index[0].text, "");
    }

    #[test]
    fn block_text_skips_tables_and_collapses_whitespace() {
        let blocks = vec![
            ContentBlock::paragraph("  first \n line "),
            ContentBlock::Table {
                rows: vec![vec!["hidden".into()]],
            },
            ContentBlock::List {
                items: vec!["a".into(), "b".into()],
            },
            ContentBlock::Image {
                src: None,
                caption: Some("Figure 4.1: Results".into()),
            },
            ContentBlock::Callout {
                text: "note".into(),
            },
        ];
        assert_eq!(block_text(&blocks), "first line a b Figure 4.1: Results note");
    }
}
