//! Inline span rendering for paragraph nodes.
//!
//! Walks a node's children and re-emits text with bold/italic/underline
//! spans mapped to `<strong>`, `<em>` and `<u>`. Text content is HTML-escaped
//! so the formatted string is safe to inject as markup downstream.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

use docweave_shared::MarkupConfig;

/// Inline emphasis recognized on a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emphasis {
    Bold,
    Italic,
    Underline,
}

impl Emphasis {
    fn tags(self) -> (&'static str, &'static str) {
        match self {
            Self::Bold => ("<strong>", "</strong>"),
            Self::Italic => ("<em>", "</em>"),
            Self::Underline => ("<u>", "</u>"),
        }
    }
}

/// Collapse whitespace runs to a single space and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Decide which emphasis a span carries, bold winning over italic over underline.
pub(crate) fn span_emphasis(span: &ElementRef, config: &MarkupConfig) -> Option<Emphasis> {
    let el = span.value();
    if el.name() != "span" {
        return None;
    }

    // Style attributes are compared with whitespace removed: `font-weight: 700`
    // and `font-weight:700` are the same marker.
    let style: String = el
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if config.bold_styles.iter().any(|s| style.contains(s.as_str())) {
        Some(Emphasis::Bold)
    } else if config.italic_styles.iter().any(|s| style.contains(s.as_str())) {
        Some(Emphasis::Italic)
    } else if el
        .classes()
        .any(|c| config.underline_classes.iter().any(|u| u == c))
    {
        Some(Emphasis::Underline)
    } else {
        None
    }
}

/// Render the inline content of `el` with emphasis preserved.
pub(crate) fn render_formatted(el: &ElementRef, config: &MarkupConfig) -> String {
    let mut out = String::new();
    render_children(el, config, &mut out);
    collapse_whitespace(&out)
}

fn render_children(el: &ElementRef, config: &MarkupConfig, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&html_escape::encode_text(&**text));
            }
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if child_el.value().name() == "img" {
                    continue;
                }
                match span_emphasis(&child_el, config) {
                    Some(emphasis) => {
                        let (open, close) = emphasis.tags();
                        out.push_str(open);
                        render_children(&child_el, config, out);
                        out.push_str(close);
                    }
                    None => render_children(&child_el, config, out),
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first_p(html: &str) -> Html {
        Html::parse_fragment(html)
    }

    fn render(html: &str) -> String {
        let doc = first_p(html);
        let sel = Selector::parse("p").unwrap();
        let p = doc.select(&sel).next().expect("paragraph");
        render_formatted(&p, &MarkupConfig::default())
    }

    #[test]
    fn collapse_whitespace_trims_and_joins() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn bold_italic_underline_spans() {
        let html = r#"<p><span style="font-weight:700">Bold</span> and <span style="font-style:italic">slanted</span> and <span class="c84">lined</span></p>"#;
        assert_eq!(
            render(html),
            "<strong>Bold</strong> and <em>slanted</em> and <u>lined</u>"
        );
    }

    #[test]
    fn style_whitespace_is_ignored() {
        let html = r#"<p><span style="font-weight: bold">Loud</span></p>"#;
        assert_eq!(render(html), "<strong>Loud</strong>");
    }

    #[test]
    fn plain_text_is_escaped() {
        let html = r#"<p><span>a &lt; b &amp; c</span></p>"#;
        assert_eq!(render(html), "a &lt; b &amp; c");
    }

    #[test]
    fn unstyled_spans_pass_through() {
        let html = r#"<p><span class="c2">Just</span> <span>text</span></p>"#;
        assert_eq!(render(html), "Just text");
    }
}
