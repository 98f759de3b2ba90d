//! Paragraph nodes.
//!
//! A [`Paragraph`] owns its characters, its layout attributes and its cached
//! line layout. Paragraphs live in the document's arena and link to their
//! neighbours by [`ParagraphKey`].
//!
//! The character run always ends with a terminator space that carries the
//! format of an empty paragraph. It is not part of the editable content:
//! indices passed to the editing methods range over `0..=len()`.

use crate::bidi::{BidiContext, BidiLine};
use crate::custom_item::CustomItem;
use crate::error::{EngineError, Result};
use crate::format::FormatHandle;
use crate::paragraph_layout::ParagraphLayout;
use crate::run::{CharacterRun, StyledChar};

/// Arena slot of a paragraph.
///
/// Keys are stable while the paragraph exists but may be reused after it is
/// removed. Hosts address paragraphs by their chain position (`id`) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParagraphKey(pub(crate) usize);

/// Cached metadata of one visual line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStart {
    /// Index of the first character of the line.
    pub char_index: usize,
    /// Top of the line, relative to the paragraph top.
    pub y: i32,
    /// Baseline offset from the top of the line.
    pub baseline: i32,
    /// Line height including line spacing.
    pub height: i32,
    /// Width used by the line's content, trailing whitespace excluded.
    pub width: i32,
    /// Explicit embedding state at the start of the line.
    pub context: BidiContext,
    /// Resolved bidi levels and visual run order.
    pub bidi: BidiLine,
}

impl LineStart {
    /// Whether character `index` lies on this line, given the next line's start.
    pub fn contains(&self, index: usize, next_start: Option<usize>) -> bool {
        index >= self.char_index && next_start.is_none_or(|next| index < next)
    }
}

/// Horizontal placement of one character after formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharLayout {
    /// Left edge relative to the paragraph's left edge.
    pub x: i32,
    /// Advance width (including justification space).
    pub width: i32,
    /// Index of the line holding the character.
    pub line: usize,
}

/// Formatting state of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatState {
    /// Line cache is up to date.
    Valid,
    /// Line cache is stale from character `from` on.
    Invalid {
        /// Lowest character index affected.
        from: usize,
    },
}

/// Line layout computed by the formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LayoutResult {
    pub lines: Vec<LineStart>,
    pub chars: Vec<CharLayout>,
    pub height: i32,
    pub label_width: i32,
}

/// One node of the paragraph chain.
#[derive(Debug)]
pub struct Paragraph {
    pub(crate) id: usize,
    pub(crate) prev: Option<ParagraphKey>,
    pub(crate) next: Option<ParagraphKey>,
    run: CharacterRun,
    layout: ParagraphLayout,
    lines: Vec<LineStart>,
    char_layout: Vec<CharLayout>,
    state: FormatState,
    y: i32,
    height: i32,
    label_width: i32,
    changed: bool,
}

impl Paragraph {
    /// Create an empty paragraph whose terminator uses `terminator`.
    pub(crate) fn new(id: usize, terminator: &FormatHandle, layout: ParagraphLayout) -> Self {
        Self {
            id,
            prev: None,
            next: None,
            run: CharacterRun::from_text(" ", terminator),
            layout,
            lines: Vec::new(),
            char_layout: Vec::new(),
            state: FormatState::Invalid { from: 0 },
            y: 0,
            height: 0,
            label_width: 0,
            changed: true,
        }
    }

    /// Position of the paragraph in the chain (0-based).
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of editable characters (the terminator is not counted).
    pub fn len(&self) -> usize {
        self.run.len() - 1
    }

    /// Whether the paragraph has no editable characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full character run, terminator included.
    pub fn run(&self) -> &CharacterRun {
        &self.run
    }

    /// Editable character at `index`.
    pub fn char_at(&self, index: usize) -> Result<&StyledChar> {
        if index >= self.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        self.run.at(index)
    }

    /// Format of the terminator.
    pub fn terminator_format(&self) -> &FormatHandle {
        let last = self.run.len() - 1;
        self.run.as_slice()[last].format()
    }

    /// Format new text typed at `index` should take: that of the character
    /// before it, or the first character (terminator for empty paragraphs).
    pub fn format_at(&self, index: usize) -> &FormatHandle {
        let slice = self.run.as_slice();
        let at = index.saturating_sub(1).min(slice.len() - 1);
        slice[at].format()
    }

    /// Editable content as text; custom items appear as U+FFFC.
    pub fn text(&self) -> String {
        self.run.as_slice()[..self.len()]
            .iter()
            .map(StyledChar::ch)
            .collect()
    }

    /// Layout attributes.
    pub fn layout(&self) -> &ParagraphLayout {
        &self.layout
    }

    /// Cached lines; empty until the paragraph is formatted.
    pub fn lines(&self) -> &[LineStart] {
        &self.lines
    }

    /// Per-character placement (terminator included) from the last format.
    pub fn char_layout(&self) -> &[CharLayout] {
        &self.char_layout
    }

    /// Index of the line holding character `index`.
    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.char_layout.get(index).map(|c| c.line)
    }

    /// Range of characters `[start, end)` on line `line`.
    pub fn line_range(&self, line: usize) -> Option<(usize, usize)> {
        let start = self.lines.get(line)?.char_index;
        let end = self
            .lines
            .get(line + 1)
            .map_or(self.run.len(), |next| next.char_index);
        Some((start, end))
    }

    /// Formatting state.
    pub fn state(&self) -> FormatState {
        self.state
    }

    /// Whether the line cache is up to date.
    pub fn is_valid(&self) -> bool {
        self.state == FormatState::Valid
    }

    /// Top of the paragraph in document coordinates.
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Height from the last format.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bottom of the paragraph in document coordinates.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Width reserved for the counter label on the first line.
    pub fn label_width(&self) -> i32 {
        self.label_width
    }

    /// Whether the paragraph changed since the host last cleared the flag.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Clear the changed flag (after the host repainted).
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Mark the line cache stale from `from` on.
    pub fn invalidate(&mut self, from: usize) {
        self.state = match self.state {
            FormatState::Valid => FormatState::Invalid { from },
            FormatState::Invalid { from: existing } => FormatState::Invalid {
                from: existing.min(from),
            },
        };
        self.changed = true;
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index > self.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn check_range(&self, start: usize, length: usize) -> Result<()> {
        match start.checked_add(length) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(EngineError::RangeOutOfBounds {
                start,
                length,
                len: self.len(),
            }),
        }
    }

    pub(crate) fn insert_text(&mut self, index: usize, text: &str, format: &FormatHandle) -> Result<usize> {
        self.check_index(index)?;
        let inserted = self.run.insert(index, text, format)?;
        self.invalidate(index);
        Ok(inserted)
    }

    pub(crate) fn insert_custom(&mut self, index: usize, item: CustomItem, format: &FormatHandle) -> Result<()> {
        self.check_index(index)?;
        self.run.insert_custom(index, item, format)?;
        self.invalidate(index);
        Ok(())
    }

    pub(crate) fn insert_run(&mut self, index: usize, run: CharacterRun) -> Result<()> {
        self.check_index(index)?;
        self.run.insert_run(index, run)?;
        self.invalidate(index);
        Ok(())
    }

    pub(crate) fn remove(&mut self, index: usize, length: usize) -> Result<CharacterRun> {
        self.check_range(index, length)?;
        let removed = self.run.remove(index, length)?;
        self.invalidate(index);
        Ok(removed)
    }

    pub(crate) fn set_format(&mut self, index: usize, length: usize, format: &FormatHandle) -> Result<()> {
        self.check_range(index, length)?;
        self.run.set_format(index, length, format)?;
        self.invalidate(index);
        Ok(())
    }

    /// Replace per-character formats starting at `index` with `formats`.
    pub(crate) fn restore_formats(&mut self, index: usize, formats: &[FormatHandle]) -> Result<()> {
        self.check_range(index, formats.len())?;
        for (offset, format) in formats.iter().enumerate() {
            self.run.at_mut(index + offset)?.set_format(format.clone());
        }
        self.invalidate(index);
        Ok(())
    }

    /// Formats of `length` characters from `index`.
    pub(crate) fn formats(&self, index: usize, length: usize) -> Result<Vec<FormatHandle>> {
        self.check_range(index, length)?;
        Ok(self.run.as_slice()[index..index + length]
            .iter()
            .map(|c| c.format().clone())
            .collect())
    }

    pub(crate) fn set_terminator_format(&mut self, format: FormatHandle) {
        let last = self.run.len() - 1;
        if let Ok(terminator) = self.run.at_mut(last) {
            terminator.set_format(format);
        }
        self.invalidate(last);
    }

    /// Consume the paragraph, returning its editable content.
    pub(crate) fn into_content(self) -> Result<CharacterRun> {
        let len = self.len();
        let mut run = self.run;
        run.split_off(len)?;
        Ok(run)
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> Option<&mut CustomItem> {
        if index >= self.len() {
            return None;
        }
        self.run.at_mut(index).ok()?.custom_item_mut()
    }

    pub(crate) fn set_layout(&mut self, layout: ParagraphLayout) -> ParagraphLayout {
        let old = std::mem::replace(&mut self.layout, layout);
        self.invalidate(0);
        old
    }

    pub(crate) fn layout_mut(&mut self) -> &mut ParagraphLayout {
        self.invalidate(0);
        &mut self.layout
    }

    pub(crate) fn set_y(&mut self, y: i32) {
        self.y = y;
    }

    pub(crate) fn apply_layout(&mut self, y: i32, result: LayoutResult) {
        self.y = y;
        self.height = result.height;
        self.lines = result.lines;
        self.char_layout = result.chars;
        self.label_width = result.label_width;
        self.state = FormatState::Valid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, FormatCollection};

    #[test]
    fn test_terminator_is_not_content() {
        let formats = FormatCollection::default();
        let mut p = Paragraph::new(0, formats.default_format(), ParagraphLayout::default());
        assert_eq!(p.len(), 0);
        assert_eq!(p.run().len(), 1);
        assert!(p.remove(0, 1).is_err());
        p.insert_text(0, "ab", formats.default_format()).unwrap();
        assert_eq!(p.text(), "ab");
        assert!(p.insert_text(3, "x", formats.default_format()).is_err());
    }

    #[test]
    fn test_invalidate_narrows() {
        let formats = FormatCollection::default();
        let mut p = Paragraph::new(0, formats.default_format(), ParagraphLayout::default());
        p.apply_layout(0, LayoutResult::default());
        assert!(p.is_valid());
        p.invalidate(5);
        p.invalidate(7);
        assert_eq!(p.state(), FormatState::Invalid { from: 5 });
        p.invalidate(2);
        assert_eq!(p.state(), FormatState::Invalid { from: 2 });
    }

    #[test]
    fn test_format_at_uses_previous_char() {
        let mut formats = FormatCollection::default();
        let bold = formats.intern(&Format::default().bold());
        let mut p = Paragraph::new(0, formats.default_format(), ParagraphLayout::default());
        assert_eq!(p.format_at(0), formats.default_format());
        p.insert_text(0, "ab", &bold).unwrap();
        assert_eq!(p.format_at(2), &bold);
        assert_eq!(p.format_at(0), &bold);
    }
}
