//! Markdown rendering of content blocks.
//!
//! Used by the CLI `show` command. Every block kind has an explicit arm, so a
//! new [`ContentBlock`] variant fails to compile here until it is rendered.

use std::sync::LazyLock;

use regex::Regex;

use docweave_shared::{Chapter, ContentBlock};

static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?(strong|em|u)>").expect("emphasis regex"));

/// Render a whole chapter, headings included.
pub fn render_chapter(chapter: &Chapter) -> String {
    let mut md = format!("# {}. {}\n", chapter.number, chapter.title);
    push_blocks(&mut md, &chapter.blocks);

    for section in &chapter.sections {
        md.push_str(&format!("\n## {}\n", heading_text(&section.number, &section.title)));
        push_blocks(&mut md, &section.blocks);

        for sub in &section.subsections {
            md.push_str(&format!("\n### {}\n", heading_text(&sub.number, &sub.title)));
            push_blocks(&mut md, &sub.blocks);
        }
    }

    md
}

/// Render one block as Markdown (no trailing newline).
pub fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Paragraph { formatted_text, .. } => formatted_to_markdown(formatted_text),
        ContentBlock::Image { src, caption } => {
            let caption = caption.as_deref().unwrap_or_default();
            match src {
                Some(src) => format!("![{caption}]({src})"),
                None => format!("*{caption}*"),
            }
        }
        ContentBlock::Table { rows } => table_to_markdown(rows),
        ContentBlock::List { items } => items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
        ContentBlock::Callout { text } => format!("> {text}"),
    }
}

fn push_blocks(md: &mut String, blocks: &[ContentBlock]) {
    for block in blocks {
        let rendered = render_block(block);
        if rendered.is_empty() {
            continue;
        }
        md.push('\n');
        md.push_str(&rendered);
        md.push('\n');
    }
}

fn heading_text(number: &str, title: &str) -> String {
    format!("{number} {title}").trim_end().to_string()
}

/// Map the inline tags of formatted text to Markdown and decode entities.
fn formatted_to_markdown(formatted: &str) -> String {
    let md = EMPHASIS_RE.replace_all(formatted, |caps: &regex::Captures| match &caps[1] {
        "strong" => "**",
        "em" => "*",
        _ => "_",
    });
    html_escape::decode_html_entities(&md).into_owned()
}

/// Pipe table with row 0 as the header; short rows are padded.
fn table_to_markdown(rows: &[Vec<String>]) -> String {
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    let pad = |row: &[String]| {
        let mut cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        cells.resize(col_count, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(pad(&rows[0]));
    lines.push(format!("| {} |", vec!["---"; col_count].join(" | ")));
    lines.extend(rows[1..].iter().map(|row| pad(row)));
    lines.join("\n")
}
