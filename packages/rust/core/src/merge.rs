//! Source merge reconciler.
//!
//! The markup export stops partway through the document. The text export
//! covers the whole document, so everything after one known heading (the
//! anchor) is fed from it into the same builder that holds the markup tree.

use tracing::{info, instrument, warn};

use docweave_shared::{MergeSummary, OutlineEvent};
use docweave_textstream::{LineKind, StreamTokenizer};

use crate::outline::OutlineBuilder;

/// Outcome of one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub anchor: String,
    pub anchor_found: bool,
    /// Lines inspected while looking for the anchor (anchor line included).
    pub lines_scanned: usize,
    /// Lines after the anchor fed through the tokenizer.
    pub lines_merged: usize,
    pub blocks_added: usize,
    pub nodes_created: usize,
    /// Build warning when nothing could be merged.
    pub warning: Option<String>,
}

impl MergeReport {
    /// Manifest view of the report.
    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            anchor: self.anchor.clone(),
            anchor_found: self.anchor_found,
            lines_merged: self.lines_merged,
            blocks_added: self.blocks_added,
        }
    }
}

/// Merge the text-stream `lines` that follow `anchor` into `builder`.
///
/// The anchor is a literal heading line compared after trimming. Lines before
/// it are ignored. When the anchor is missing, or is not a heading the
/// tokenizer recognizes, nothing is merged and the builder is left untouched.
#[instrument(skip_all, fields(anchor = %anchor.trim(), lines = lines.len()))]
pub fn merge_text_stream<S: AsRef<str>>(
    builder: &mut OutlineBuilder,
    tokenizer: &StreamTokenizer,
    lines: &[S],
    anchor: &str,
) -> MergeReport {
    let anchor = anchor.trim();
    let mut report = MergeReport {
        anchor: anchor.to_string(),
        ..MergeReport::default()
    };

    let Some(pos) = lines.iter().position(|l| l.as_ref().trim() == anchor) else {
        report.lines_scanned = lines.len();
        let message = format!("merge anchor '{anchor}' not found; zero lines merged");
        warn!(lines_scanned = report.lines_scanned, "{message}");
        report.warning = Some(message);
        return report;
    };
    report.anchor_found = true;
    report.lines_scanned = pos + 1;

    let anchor_event = match tokenizer.classify(anchor) {
        LineKind::Section { number, title } => OutlineEvent::Section { number, title },
        LineKind::Subsection { number, title } => OutlineEvent::Subsection { number, title },
        LineKind::ChapterSwitch { number } => OutlineEvent::Chapter { number },
        other => {
            let message =
                format!("merge anchor '{anchor}' is not a heading ({other:?}); zero lines merged");
            warn!("{message}");
            report.warning = Some(message);
            return report;
        }
    };

    let nodes_before = builder.node_count();
    let blocks_before = builder.stats().blocks_appended;

    let rehomed = match &anchor_event {
        OutlineEvent::Section { number, .. }
        | OutlineEvent::Subsection { number, .. }
        | OutlineEvent::Chapter { number } => builder.rehome(number),
        OutlineEvent::Block(_) => false,
    };
    if !rehomed {
        warn!("anchor heading absent from markup tree; opening it from the text stream");
        builder.apply(anchor_event);
    }

    let rest = &lines[pos + 1..];
    let out = tokenizer.tokenize(rest);
    builder.apply_all(out.events);

    report.lines_merged = rest.len();
    report.blocks_added = builder.stats().blocks_appended - blocks_before;
    report.nodes_created = builder.node_count() - nodes_before;

    info!(
        rehomed,
        lines_merged = report.lines_merged,
        blocks_added = report.blocks_added,
        nodes_created = report.nodes_created,
        "text stream merged"
    );
    report
}
