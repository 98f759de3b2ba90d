//! Structured, format-annotated text for exchange between components.
//!
//! [`RichText`] is self-contained: it carries full [`Format`] values instead
//! of interned handles, so it outlives the document it came from and can be
//! serialized with `serde`.

use crate::custom_item::CustomItem;
use crate::document::{Fragment, FragmentPiece};
use crate::error::Result;
use crate::format::{Format, FormatCollection, FormatHandle};
use crate::paragraph_layout::ParagraphLayout;
use crate::run::{CharacterRun, StyledChar};
use serde::{Deserialize, Serialize};

const OBJECT_REPLACEMENT: &str = "\u{FFFC}";

/// A span of uniformly formatted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RichSpan {
    /// Text in one format.
    Text {
        /// The characters.
        text: String,
        /// Their format.
        format: Format,
    },
    /// A custom item.
    Item {
        /// The item.
        item: CustomItem,
        /// Format of the surrounding text.
        format: Format,
    },
}

impl RichSpan {
    /// Format of the span.
    pub fn format(&self) -> &Format {
        match self {
            RichSpan::Text { format, .. } | RichSpan::Item { format, .. } => format,
        }
    }
}

/// One paragraph of exported content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichParagraph {
    /// Paragraph layout. Ignored for the first paragraph on insertion, which
    /// merges into the paragraph at the insertion point.
    pub layout: ParagraphLayout,
    /// Format of the paragraph's terminator.
    pub terminator: Format,
    /// Content spans.
    pub spans: Vec<RichSpan>,
}

/// Exported content: one entry per paragraph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RichText {
    /// Paragraphs in order.
    pub paragraphs: Vec<RichParagraph>,
}

impl RichText {
    /// Export a fragment.
    pub fn from_fragment(fragment: &Fragment) -> Self {
        let paragraphs = fragment
            .pieces
            .iter()
            .map(|piece| RichParagraph {
                layout: piece.layout.clone(),
                terminator: piece.terminator.format().clone(),
                spans: spans_of(&piece.run),
            })
            .collect();
        Self { paragraphs }
    }

    /// Import into `formats`, interning every format.
    pub fn to_fragment(&self, formats: &mut FormatCollection) -> Fragment {
        let mut pieces: Vec<FragmentPiece> = self
            .paragraphs
            .iter()
            .map(|paragraph| {
                let mut run = CharacterRun::new();
                for span in &paragraph.spans {
                    let handle = formats.intern(span.format());
                    match span {
                        RichSpan::Text { text, .. } => {
                            run.append(CharacterRun::from_text(text, &handle));
                        }
                        RichSpan::Item { item, .. } => {
                            run.append(CharacterRun::from_chars(vec![StyledChar::Custom {
                                item: Box::new(item.clone()),
                                format: handle,
                            }]));
                        }
                    }
                }
                FragmentPiece {
                    run,
                    layout: paragraph.layout.clone(),
                    terminator: formats.intern(&paragraph.terminator),
                }
            })
            .collect();
        if pieces.is_empty() {
            pieces.push(FragmentPiece {
                run: CharacterRun::new(),
                layout: ParagraphLayout::default(),
                terminator: formats.default_format().clone(),
            });
        }
        Fragment { pieces }
    }

    /// Plain text with paragraphs joined by `'\n'`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (i, paragraph) in self.paragraphs.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for span in &paragraph.spans {
                match span {
                    RichSpan::Text { text, .. } => out.push_str(text),
                    RichSpan::Item { item, .. } => {
                        out.push_str(item.display_text().unwrap_or(OBJECT_REPLACEMENT))
                    }
                }
            }
        }
        out
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Group consecutive characters sharing a format handle into spans.
fn spans_of(run: &CharacterRun) -> Vec<RichSpan> {
    fn flush(spans: &mut Vec<RichSpan>, pending: Option<(String, FormatHandle)>) {
        if let Some((text, format)) = pending {
            spans.push(RichSpan::Text {
                text,
                format: format.format().clone(),
            });
        }
    }

    let mut spans = Vec::new();
    let mut pending: Option<(String, FormatHandle)> = None;
    for c in run {
        match c {
            StyledChar::Regular { ch, format } => {
                if let Some((text, current)) = &mut pending
                    && *current == *format
                {
                    text.push(*ch);
                    continue;
                }
                flush(&mut spans, pending.take());
                pending = Some((ch.to_string(), format.clone()));
            }
            StyledChar::Custom { item, format } => {
                flush(&mut spans, pending.take());
                spans.push(RichSpan::Item {
                    item: item.as_ref().clone(),
                    format: format.format().clone(),
                });
            }
        }
    }
    flush(&mut spans, pending);
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Position, TextRange};
    use crate::format::FormatFlags;

    #[test]
    fn test_spans_group_by_format() {
        let mut doc = Document::from_text("plain bold").unwrap();
        doc.set_format(
            TextRange::within(0, 6, 10),
            &Format::default().bold(),
            FormatFlags::WEIGHT,
        )
        .unwrap();
        let rich = doc.rich_text(doc.full_range()).unwrap();
        assert_eq!(rich.paragraphs.len(), 1);
        let spans = &rich.paragraphs[0].spans;
        assert_eq!(spans.len(), 2);
        assert!(matches!(&spans[0], RichSpan::Text { text, format } if text == "plain " && !format.is_bold()));
        assert!(matches!(&spans[1], RichSpan::Text { text, format } if text == "bold" && format.is_bold()));
    }

    #[test]
    fn test_items_become_their_own_spans() {
        let mut doc = Document::from_text("ab").unwrap();
        doc.insert_custom_item(
            Position::new(0, 1),
            CustomItem::image("cat.png", 4, 4),
            &Format::default(),
        )
        .unwrap();
        let rich = doc.rich_text(doc.full_range()).unwrap();
        assert_eq!(rich.paragraphs[0].spans.len(), 3);
        assert_eq!(rich.plain_text(), "a\u{FFFC}b");
    }

    #[test]
    fn test_json_round_trip() {
        let doc = Document::from_text("one\ntwo").unwrap();
        let rich = doc.rich_text(doc.full_range()).unwrap();
        let parsed = RichText::from_json(&rich.to_json().unwrap()).unwrap();
        assert_eq!(parsed, rich);
    }
}
