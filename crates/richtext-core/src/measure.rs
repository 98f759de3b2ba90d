//! Text measurement capability.
//!
//! The engine does not shape or rasterize glyphs. It asks a [`TextMeasure`]
//! implementation for advance widths and vertical metrics, and caches advances
//! per (format, glyph) in a [`WidthCache`].

use crate::format::{Format, FormatHandle, VerticalAlign};
use std::collections::HashMap;
use unicode_width::UnicodeWidthChar;

/// Font metrics provider consumed by the formatter.
///
/// All values are in layout pixels.
pub trait TextMeasure {
    /// Advance width of `ch` rendered with `format`, or `None` if the glyph
    /// cannot be measured.
    fn advance_width(&self, format: &Format, ch: char) -> Option<i32>;

    /// Distance from the baseline to the top of the line box.
    fn ascent(&self, format: &Format) -> i32;

    /// Distance from the baseline to the bottom of the line box.
    fn descent(&self, format: &Format) -> i32;

    /// Total line-box height.
    fn height(&self, format: &Format) -> i32 {
        self.ascent(format) + self.descent(format)
    }
}

/// Monospace cell measurer.
///
/// Each character occupies `UAX #11` cells (via `unicode-width`); one cell is
/// `cell_ratio` of the effective point size wide. Sub/superscript shrink the
/// effective size to two thirds. Control characters are unmeasurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMeasurer {
    /// Width of one cell as a fraction of the point size.
    pub cell_ratio: f32,
    /// Ascent as a fraction of the point size.
    pub ascent_ratio: f32,
    /// Descent as a fraction of the point size.
    pub descent_ratio: f32,
}

impl Default for CellMeasurer {
    fn default() -> Self {
        Self {
            cell_ratio: 0.5,
            ascent_ratio: 0.8,
            descent_ratio: 0.25,
        }
    }
}

impl CellMeasurer {
    fn effective_size(format: &Format) -> f32 {
        let size = f32::from(format.point_size);
        match format.vertical_align {
            VerticalAlign::Normal => size,
            VerticalAlign::Subscript | VerticalAlign::Superscript => size * 2.0 / 3.0,
        }
    }
}

impl TextMeasure for CellMeasurer {
    fn advance_width(&self, format: &Format, ch: char) -> Option<i32> {
        let cells = UnicodeWidthChar::width(ch)?;
        let cell = (Self::effective_size(format) * self.cell_ratio).round() as i32;
        Some(cells as i32 * cell.max(1))
    }

    fn ascent(&self, format: &Format) -> i32 {
        (Self::effective_size(format) * self.ascent_ratio).round() as i32
    }

    fn descent(&self, format: &Format) -> i32 {
        (Self::effective_size(format) * self.descent_ratio).round() as i32
    }
}

/// Cache of advance widths keyed by format key and glyph.
#[derive(Debug, Default)]
pub struct WidthCache {
    widths: HashMap<String, HashMap<char, i32>>,
}

impl WidthCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance of `ch` in `format`, measuring on a cache miss.
    ///
    /// Unmeasurable glyphs are cached as zero width so a malformed character
    /// cannot stop formatting of the rest of the document.
    pub fn advance(&mut self, measure: &dyn TextMeasure, format: &FormatHandle, ch: char) -> i32 {
        if let Some(width) = self.widths.get(format.key()).and_then(|m| m.get(&ch)) {
            return *width;
        }
        let width = match measure.advance_width(format, ch) {
            Some(width) => width,
            None => {
                tracing::trace!(ch = ?ch, format = format.key(), "unmeasurable glyph, using zero width");
                0
            }
        };
        self.widths
            .entry(format.key().to_string())
            .or_default()
            .insert(ch, width);
        width
    }

    /// Number of formats with cached widths.
    pub fn format_count(&self) -> usize {
        self.widths.len()
    }

    /// Forget formats no longer referenced anywhere.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.widths.retain(|key, _| keep(key));
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.widths.clear();
    }
}

/// Sum of advances of `text` in `format`, without caching.
pub fn text_width(measure: &dyn TextMeasure, format: &Format, text: &str) -> i32 {
    text.chars()
        .map(|ch| measure.advance_width(format, ch).unwrap_or(0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatCollection;

    #[test]
    fn test_cell_widths() {
        let m = CellMeasurer::default();
        let f = Format::new("Mono", 12);
        assert_eq!(m.advance_width(&f, 'a'), Some(6));
        assert_eq!(m.advance_width(&f, '你'), Some(12));
        assert_eq!(m.advance_width(&f, '\u{0301}'), Some(0));
        assert_eq!(m.advance_width(&f, '\u{0007}'), None);
        assert_eq!(m.height(&f), 10 + 3);
    }

    #[test]
    fn test_cache_falls_back_to_zero() {
        let m = CellMeasurer::default();
        let formats = FormatCollection::default();
        let mut cache = WidthCache::new();
        let f = formats.default_format().clone();
        assert_eq!(cache.advance(&m, &f, '\u{0007}'), 0);
        assert_eq!(cache.advance(&m, &f, 'x'), 6);
        assert_eq!(cache.format_count(), 1);
    }
}
