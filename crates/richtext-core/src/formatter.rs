//! Line breaking and line metrics for one paragraph.
//!
//! The formatter measures every character, breaks the paragraph into lines,
//! resolves each line's bidi levels and assigns x positions in visual order.
//! The result is applied to the paragraph by the document's reflow driver.

use crate::bidi::{BidiContext, BidiResolver, Direction, paragraph_direction};
use crate::custom_item::{CustomItem, ExternalRelations};
use crate::measure::{TextMeasure, WidthCache};
use crate::paragraph::{CharLayout, LayoutResult, LineStart, Paragraph};
use crate::paragraph_layout::{Alignment, ParagraphLayout, TabKind, TabStop, TextDirection};
use crate::run::StyledChar;

/// A horizontal band of the flow, in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Top of the band.
    pub y: i32,
    /// Height of the band.
    pub height: i32,
}

/// Host collaborator describing the space text flows into.
///
/// Lets text wrap around obstacles (pictures, frame edges) the engine knows
/// nothing about.
pub trait Flow {
    /// Width available for text in `band`. Values wider than the document
    /// width are clipped to it.
    fn available_width(&self, band: Band) -> i32;

    /// Where a line of `height` that would start at `y` must actually start.
    /// Returning a smaller `y` has no effect.
    fn adjust_vertical_position(&self, y: i32, height: i32) -> i32 {
        let _ = height;
        y
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Metrics {
    width: i32,
    ascent: i32,
    descent: i32,
}

fn is_hard_break(c: &StyledChar) -> bool {
    matches!(
        c,
        StyledChar::Regular {
            ch: '\n' | '\u{2028}',
            ..
        }
    )
}

/// Base embedding level of a paragraph.
pub(crate) fn base_level(layout: &ParagraphLayout, glyphs: &[char]) -> u8 {
    match layout.direction {
        TextDirection::Ltr => 0,
        TextDirection::Rtl => 1,
        TextDirection::Auto => paragraph_direction(glyphs).map_or(0, Direction::base_level),
    }
}

pub(crate) struct Formatter<'a> {
    pub measure: &'a dyn TextMeasure,
    pub widths: &'a mut WidthCache,
    pub flow: Option<&'a dyn Flow>,
    pub relations: Option<&'a dyn ExternalRelations>,
    pub document_width: i32,
    pub allow_break_in_words: bool,
    pub default_tab_width: i32,
}

impl Formatter<'_> {
    /// Lay out `paragraph` with its top at document position `y`.
    pub fn format(&mut self, paragraph: &Paragraph, y: i32, label_width: i32) -> LayoutResult {
        let chars = paragraph.run().as_slice();
        let layout = paragraph.layout();
        let glyphs: Vec<char> = chars.iter().map(StyledChar::ch).collect();
        let base_level = base_level(layout, &glyphs[..paragraph.len()]);
        let (left, right) = layout.horizontal_insets();
        let (top, bottom) = layout.vertical_insets();
        let content_width = (self.document_width - left - right).max(0);

        let mut metrics: Vec<Metrics> = chars
            .iter()
            .map(|c| self.measure_char(c, content_width))
            .collect();
        let mut placed = vec![CharLayout::default(); chars.len()];
        let mut lines: Vec<LineStart> = Vec::new();
        let mut context = BidiContext::new();
        let mut line_start = 0;
        let mut cursor_y = top;

        while line_start < chars.len() {
            let indent = if lines.is_empty() {
                layout.margins.first_line + label_width
            } else {
                0
            };
            // A line pushed down by the flow is re-broken against the band it lands in.
            let mut try_top = cursor_y;
            let mut height = metrics[line_start].ascent + metrics[line_start].descent;
            let (available, end, ascent, descent, line_top) = loop {
                let available =
                    (self.available_width(y + try_top, height) - left - right - indent).max(0);
                let end =
                    self.find_line_end(chars, &mut metrics, layout, line_start, available, indent);
                let ascent = metrics[line_start..end].iter().map(|m| m.ascent).max().unwrap_or(0);
                let descent = metrics[line_start..end].iter().map(|m| m.descent).max().unwrap_or(0);
                height = layout.line_spacing.apply(ascent + descent).max(0);
                let line_top = match self.flow {
                    Some(flow) => {
                        (flow.adjust_vertical_position(y + try_top, height) - y).max(try_top)
                    }
                    None => try_top,
                };
                if line_top == try_top {
                    break (available, end, ascent, descent, line_top);
                }
                let landed =
                    (self.available_width(y + line_top, height) - left - right - indent).max(0);
                if landed >= available {
                    break (available, end, ascent, descent, line_top);
                }
                try_top = line_top;
            };

            let bidi = BidiResolver::resolve(&glyphs[line_start..end], base_level, &context);
            let line_context = std::mem::replace(&mut context, bidi.end_context.clone());

            let mut used_end = end;
            while used_end > line_start && glyphs[used_end - 1].is_whitespace() {
                used_end -= 1;
            }
            let used: i32 = metrics[line_start..used_end].iter().map(|m| m.width).sum();
            let slack = (available - used).max(0);
            let last_line = end == chars.len() || is_hard_break(&chars[end - 1]);
            let rtl = base_level % 2 == 1;
            let alignment = match (layout.alignment, rtl) {
                (Alignment::Auto, false) => Alignment::Left,
                (Alignment::Auto, true) => Alignment::Right,
                (Alignment::Justify, false) if last_line => Alignment::Left,
                (Alignment::Justify, true) if last_line => Alignment::Right,
                (other, _) => other,
            };
            let offset = match alignment {
                Alignment::Right => slack,
                Alignment::Center => slack / 2,
                Alignment::Auto | Alignment::Left | Alignment::Justify => 0,
            };
            let spaces = glyphs[line_start..used_end].iter().filter(|&&g| g == ' ').count() as i32;
            let (per_space, mut remainder) = if alignment == Alignment::Justify && spaces > 0 {
                (slack / spaces, slack % spaces)
            } else {
                (0, 0)
            };

            // Trailing whitespace may come first visually; align the content.
            let mut provisional = Vec::with_capacity(end - line_start);
            let mut x = 0;
            for visual in bidi.visual_order() {
                let index = line_start + visual;
                let mut width = metrics[index].width;
                if alignment == Alignment::Justify && index < used_end && glyphs[index] == ' ' {
                    width += per_space;
                    if remainder > 0 {
                        width += 1;
                        remainder -= 1;
                    }
                }
                provisional.push((index, x, width));
                x += width;
            }
            let content_left = provisional
                .iter()
                .filter(|(index, _, _)| *index < used_end)
                .map(|(_, x, _)| *x)
                .min()
                .unwrap_or(0);
            let leading_indent = if rtl { 0 } else { indent };
            let shift = left + leading_indent + offset - content_left;
            let line_index = lines.len();
            for (index, x, width) in provisional {
                placed[index] = CharLayout {
                    x: x + shift,
                    width,
                    line: line_index,
                };
            }

            lines.push(LineStart {
                char_index: line_start,
                y: line_top,
                baseline: ascent,
                height,
                width: used,
                context: line_context,
                bidi,
            });
            cursor_y = line_top + height;
            line_start = end;
        }

        LayoutResult {
            lines,
            chars: placed,
            height: cursor_y + bottom,
            label_width,
        }
    }

    fn available_width(&self, y: i32, height: i32) -> i32 {
        match self.flow {
            Some(flow) => flow
                .available_width(Band { y, height })
                .min(self.document_width),
            None => self.document_width,
        }
    }

    fn measure_char(&mut self, c: &StyledChar, line_width: i32) -> Metrics {
        match c {
            StyledChar::Regular { ch, format } => {
                let width = if matches!(ch, '\t' | '\n' | '\u{2028}') {
                    0
                } else {
                    self.widths.advance(self.measure, format, *ch)
                };
                Metrics {
                    width,
                    ascent: self.measure.ascent(format),
                    descent: self.measure.descent(format),
                }
            }
            StyledChar::Custom { item, format } => {
                let size = item.size(format, self.measure, self.relations, line_width);
                match item.as_ref() {
                    CustomItem::Variable(_) => Metrics {
                        width: size.width,
                        ascent: self.measure.ascent(format),
                        descent: self.measure.descent(format),
                    },
                    CustomItem::Image(_)
                    | CustomItem::Anchor(_)
                    | CustomItem::Table(_)
                    | CustomItem::Rule(_) => Metrics {
                        width: size.width,
                        ascent: size.height,
                        descent: 0,
                    },
                }
            }
        }
    }

    /// End (exclusive) of the line starting at `start`.
    ///
    /// Breaks at the last break opportunity before the overflowing character.
    /// A word wider than the line overflows up to its next break opportunity
    /// unless breaking inside words is allowed.
    fn find_line_end(
        &self,
        chars: &[StyledChar],
        metrics: &mut [Metrics],
        layout: &ParagraphLayout,
        start: usize,
        available: i32,
        indent: i32,
    ) -> usize {
        let mut x = 0;
        let mut last_break: Option<usize> = None;
        let mut overflowed = false;

        for index in start..chars.len() {
            let c = &chars[index];
            if c.custom_item().is_some_and(CustomItem::own_line) {
                return if index == start { index + 1 } else { index };
            }
            if is_hard_break(c) {
                return index + 1;
            }
            if c.ch() == '\t' {
                metrics[index].width = self.tab_advance(chars, metrics, layout, index, indent + x);
            }

            let width = metrics[index].width;
            if !c.ch().is_whitespace() && !overflowed && index > start && x + width > available {
                if let Some(at) = last_break {
                    return at;
                }
                if self.allow_break_in_words {
                    return index;
                }
                overflowed = true;
            }
            x += width;

            if c.is_break_opportunity() {
                if overflowed {
                    return index + 1;
                }
                last_break = Some(index + 1);
            }
        }
        chars.len()
    }

    /// Advance of the tab at `index` whose left edge is at `x` (from the left margin).
    fn tab_advance(
        &self,
        chars: &[StyledChar],
        metrics: &[Metrics],
        layout: &ParagraphLayout,
        index: usize,
        x: i32,
    ) -> i32 {
        let interval = self.default_tab_width.max(1);
        let stop = layout.next_tab_stop(x).unwrap_or(TabStop {
            position: (x / interval + 1) * interval,
            kind: TabKind::Left,
        });

        // Text up to the next tab or line end (terminator excluded).
        let content_end = chars.len() - 1;
        let segment_end = (index + 1..content_end)
            .find(|&k| chars[k].ch() == '\t' || is_hard_break(&chars[k]))
            .unwrap_or(content_end);
        let segment = &metrics[(index + 1).min(segment_end)..segment_end];
        let segment_width: i32 = segment.iter().map(|m| m.width).sum();

        let advance = match stop.kind {
            TabKind::Left => stop.position - x,
            TabKind::Right => stop.position - x - segment_width,
            TabKind::Center => stop.position - x - segment_width / 2,
            TabKind::Decimal => {
                let before_separator: i32 = (index + 1..segment_end)
                    .take_while(|&k| !matches!(chars[k].ch(), '.' | ','))
                    .map(|k| metrics[k].width)
                    .sum();
                stop.position - x - before_separator
            }
        };
        advance.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_item::RuleItem;
    use crate::format::{Format, FormatCollection};
    use crate::measure::CellMeasurer;
    use crate::paragraph_layout::LineSpacing;

    fn paragraph(formats: &mut FormatCollection, text: &str, layout: ParagraphLayout) -> Paragraph {
        let f = formats.intern(&Format::new("Mono", 12));
        let mut p = Paragraph::new(0, &f, layout);
        p.insert_text(0, text, &f).unwrap();
        p
    }

    fn format_with(p: &Paragraph, width: i32, break_words: bool) -> LayoutResult {
        let measure = CellMeasurer::default();
        let mut widths = WidthCache::new();
        let mut formatter = Formatter {
            measure: &measure,
            widths: &mut widths,
            flow: None,
            relations: None,
            document_width: width,
            allow_break_in_words: break_words,
            default_tab_width: 48,
        };
        formatter.format(p, 0, 0)
    }

    fn starts(result: &LayoutResult) -> Vec<usize> {
        result.lines.iter().map(|l| l.char_index).collect()
    }

    #[test]
    fn test_breaks_at_word_boundaries() {
        let mut formats = FormatCollection::default();
        // 8 cells of 6px per line
        let p = paragraph(&mut formats, "hello world foo", ParagraphLayout::default());
        let result = format_with(&p, 48, false);
        assert_eq!(starts(&result), vec![0, 6, 12]);
        assert_eq!(result.height, 3 * 13);
        assert_eq!(result.lines[0].width, 30);
    }

    #[test]
    fn test_long_word_overflows_unless_allowed() {
        let mut formats = FormatCollection::default();
        let p = paragraph(&mut formats, "abcdefghijkl mn", ParagraphLayout::default());
        assert_eq!(starts(&format_with(&p, 36, false)), vec![0, 13]);
        assert_eq!(starts(&format_with(&p, 36, true)), vec![0, 6, 13]);
    }

    #[test]
    fn test_hard_line_break() {
        let mut formats = FormatCollection::default();
        let p = paragraph(&mut formats, "ab\ncd", ParagraphLayout::default());
        assert_eq!(starts(&format_with(&p, 600, false)), vec![0, 3]);
    }

    #[test]
    fn test_own_line_item_breaks_around_itself() {
        let mut formats = FormatCollection::default();
        let mut p = paragraph(&mut formats, "abcd", ParagraphLayout::default());
        let f = p.format_at(0).clone();
        p.insert_custom(
            2,
            CustomItem::Rule(RuleItem {
                thickness: 2,
                color: None,
            }),
            &f,
        )
        .unwrap();
        let result = format_with(&p, 600, false);
        assert_eq!(starts(&result), vec![0, 2, 3]);
        assert_eq!(result.lines[1].height, 2);
    }

    #[test]
    fn test_alignment_offsets() {
        let mut formats = FormatCollection::default();
        let right = paragraph(
            &mut formats,
            "abc",
            ParagraphLayout::default().with_alignment(Alignment::Right),
        );
        assert_eq!(format_with(&right, 60, false).chars[0].x, 60 - 18);

        let center = paragraph(
            &mut formats,
            "abc",
            ParagraphLayout::default().with_alignment(Alignment::Center),
        );
        assert_eq!(format_with(&center, 60, false).chars[0].x, 21);
    }

    #[test]
    fn test_justify_fills_all_but_last_line() {
        let mut formats = FormatCollection::default();
        let p = paragraph(
            &mut formats,
            "ab cd ef gh",
            ParagraphLayout::default().with_alignment(Alignment::Justify),
        );
        let result = format_with(&p, 42, false);
        assert_eq!(starts(&result), vec![0, 6]);
        // "ab cd" is 30px wide, the 12px of slack go to its one space
        assert_eq!(result.chars[3].x, 42 - 12);
        assert_eq!(result.chars[6].x, 0);
    }

    #[test]
    fn test_rtl_line_positions_in_visual_order() {
        let mut formats = FormatCollection::default();
        let p = paragraph(&mut formats, "\u{05D0}\u{05D1}", ParagraphLayout::default());
        let result = format_with(&p, 60, false);
        assert!(result.lines[0].bidi.is_rtl(0));
        assert!(result.chars[0].x > result.chars[1].x);
        // right aligned by default
        assert_eq!(result.chars[0].x + result.chars[0].width, 60);
    }

    #[test]
    fn test_line_spacing_and_margins() {
        let mut formats = FormatCollection::default();
        let mut layout = ParagraphLayout::default();
        layout.line_spacing = LineSpacing::Double;
        layout.margins.top = 5;
        layout.margins.bottom = 7;
        layout.margins.left = 12;
        let p = paragraph(&mut formats, "ab", layout);
        let result = format_with(&p, 600, false);
        assert_eq!(result.lines[0].y, 5);
        assert_eq!(result.height, 5 + 26 + 7);
        assert_eq!(result.chars[0].x, 12);
    }

    #[test]
    fn test_tab_advances_to_next_interval() {
        let mut formats = FormatCollection::default();
        let p = paragraph(&mut formats, "a\tb", ParagraphLayout::default());
        let result = format_with(&p, 600, false);
        assert_eq!(result.chars[1].width, 42);
        assert_eq!(result.chars[2].x, 48);
    }
}
