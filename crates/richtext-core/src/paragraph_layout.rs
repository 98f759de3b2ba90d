//! Paragraph-level layout attributes.

use crate::counter::Counter;
use crate::format::{Color, LineStyle};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Horizontal alignment of the lines of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Alignment {
    /// Left for left-to-right paragraphs, right for right-to-left ones.
    #[default]
    Auto,
    /// Flush left.
    Left,
    /// Flush right.
    Right,
    /// Centered.
    Center,
    /// Extra space distributed between words, except on the last line.
    Justify,
}

/// Paragraph margins in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    /// Left margin.
    pub left: i32,
    /// Right margin.
    pub right: i32,
    /// Space above the paragraph.
    pub top: i32,
    /// Space below the paragraph.
    pub bottom: i32,
    /// Extra indent of the first line (may be negative for hanging indents).
    pub first_line: i32,
}

/// Line spacing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineSpacing {
    /// Natural line height.
    #[default]
    Single,
    /// One and a half times the natural height.
    OneAndHalf,
    /// Twice the natural height.
    Double,
    /// Natural height plus a fixed number of pixels.
    Custom(i32),
    /// Natural height, but never less than the given value.
    AtLeast(i32),
    /// Exactly the given height.
    Fixed(i32),
}

impl LineSpacing {
    /// Height of a line whose natural height is `natural`.
    pub fn apply(self, natural: i32) -> i32 {
        match self {
            LineSpacing::Single => natural,
            LineSpacing::OneAndHalf => natural * 3 / 2,
            LineSpacing::Double => natural * 2,
            LineSpacing::Custom(extra) => natural + extra,
            LineSpacing::AtLeast(min) => natural.max(min),
            LineSpacing::Fixed(height) => height,
        }
    }
}

/// One border line. A zero width means no border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Border {
    /// Line width.
    pub width: i32,
    /// Dash pattern.
    pub style: LineStyle,
    /// Colour; `None` follows the text colour.
    pub color: Option<Color>,
}

impl Border {
    /// A solid border of the given width.
    pub fn solid(width: i32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    /// Whether the border is drawn.
    pub fn is_visible(&self) -> bool {
        self.width > 0
    }
}

/// The four borders of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Borders {
    /// Left border.
    pub left: Border,
    /// Right border.
    pub right: Border,
    /// Top border.
    pub top: Border,
    /// Bottom border.
    pub bottom: Border,
}

/// How text aligns against a tab stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TabKind {
    /// Text starts at the stop.
    #[default]
    Left,
    /// Text is centered on the stop.
    Center,
    /// Text ends at the stop.
    Right,
    /// The first decimal separator sits on the stop.
    Decimal,
}

/// A tab stop, measured from the paragraph's left margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStop {
    /// Position in layout pixels.
    pub position: i32,
    /// Alignment kind.
    pub kind: TabKind,
}

/// Base direction of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextDirection {
    /// Taken from the first strong character.
    #[default]
    Auto,
    /// Left to right.
    Ltr,
    /// Right to left.
    Rtl,
}

/// Selects attribute groups of a [`ParagraphLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayoutFlags(pub u32);

impl LayoutFlags {
    /// Nothing.
    pub const NONE: Self = Self(0);
    /// Alignment.
    pub const ALIGNMENT: Self = Self(1);
    /// Margins and first-line indent.
    pub const MARGINS: Self = Self(2);
    /// Line spacing.
    pub const LINE_SPACING: Self = Self(4);
    /// Borders.
    pub const BORDERS: Self = Self(8);
    /// Tab stops.
    pub const TABS: Self = Self(16);
    /// Counter (paragraph type).
    pub const COUNTER: Self = Self(32);
    /// Style name.
    pub const STYLE: Self = Self(64);
    /// Base direction.
    pub const DIRECTION: Self = Self(128);
    /// Keep-together and page-break flags.
    pub const PAGE_BREAKING: Self = Self(256);
    /// Everything.
    pub const ALL: Self = Self(511);

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LayoutFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayoutFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Layout attributes of one paragraph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphLayout {
    /// Horizontal alignment.
    pub alignment: Alignment,
    /// Margins and first-line indent.
    pub margins: Margins,
    /// Line spacing.
    pub line_spacing: LineSpacing,
    /// Borders.
    pub borders: Borders,
    /// Tab stops, sorted by position.
    pub tabs: Vec<TabStop>,
    /// Optional numbering or bullet.
    pub counter: Option<Counter>,
    /// Name of the style this layout came from.
    pub style_name: Option<String>,
    /// Base direction.
    pub direction: TextDirection,
    /// Do not split the paragraph across frames.
    pub keep_lines_together: bool,
    /// Start the paragraph on a new page.
    pub page_break_before: bool,
}

impl ParagraphLayout {
    /// Builder: set the alignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Builder: set the counter.
    pub fn with_counter(mut self, counter: Counter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Builder: set the margins.
    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    /// Builder: set the base direction.
    pub fn with_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Replace the groups selected by `flags` with those of `other`.
    pub fn apply(&mut self, other: &ParagraphLayout, flags: LayoutFlags) {
        if flags.contains(LayoutFlags::ALIGNMENT) {
            self.alignment = other.alignment;
        }
        if flags.contains(LayoutFlags::MARGINS) {
            self.margins = other.margins;
        }
        if flags.contains(LayoutFlags::LINE_SPACING) {
            self.line_spacing = other.line_spacing;
        }
        if flags.contains(LayoutFlags::BORDERS) {
            self.borders = other.borders;
        }
        if flags.contains(LayoutFlags::TABS) {
            self.tabs.clone_from(&other.tabs);
            self.tabs.sort_by_key(|tab| tab.position);
        }
        if flags.contains(LayoutFlags::COUNTER) {
            self.counter.clone_from(&other.counter);
        }
        if flags.contains(LayoutFlags::STYLE) {
            self.style_name.clone_from(&other.style_name);
        }
        if flags.contains(LayoutFlags::DIRECTION) {
            self.direction = other.direction;
        }
        if flags.contains(LayoutFlags::PAGE_BREAKING) {
            self.keep_lines_together = other.keep_lines_together;
            self.page_break_before = other.page_break_before;
        }
    }

    /// Attribute groups in which `self` and `other` differ.
    pub fn compare(&self, other: &ParagraphLayout) -> LayoutFlags {
        let mut flags = LayoutFlags::NONE;
        if self.alignment != other.alignment {
            flags |= LayoutFlags::ALIGNMENT;
        }
        if self.margins != other.margins {
            flags |= LayoutFlags::MARGINS;
        }
        if self.line_spacing != other.line_spacing {
            flags |= LayoutFlags::LINE_SPACING;
        }
        if self.borders != other.borders {
            flags |= LayoutFlags::BORDERS;
        }
        if self.tabs != other.tabs {
            flags |= LayoutFlags::TABS;
        }
        if self.counter != other.counter {
            flags |= LayoutFlags::COUNTER;
        }
        if self.style_name != other.style_name {
            flags |= LayoutFlags::STYLE;
        }
        if self.direction != other.direction {
            flags |= LayoutFlags::DIRECTION;
        }
        if self.keep_lines_together != other.keep_lines_together
            || self.page_break_before != other.page_break_before
        {
            flags |= LayoutFlags::PAGE_BREAKING;
        }
        flags
    }

    /// Next tab stop strictly after `x`, if the paragraph defines one.
    pub fn next_tab_stop(&self, x: i32) -> Option<TabStop> {
        self.tabs.iter().copied().find(|tab| tab.position > x)
    }

    /// Extra horizontal space taken by margins and side borders.
    pub fn horizontal_insets(&self) -> (i32, i32) {
        (
            self.margins.left + self.borders.left.width,
            self.margins.right + self.borders.right.width,
        )
    }

    /// Extra vertical space taken by margins and top/bottom borders.
    pub fn vertical_insets(&self) -> (i32, i32) {
        (
            self.margins.top + self.borders.top.width,
            self.margins.bottom + self.borders.bottom.width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_spacing() {
        assert_eq!(LineSpacing::Single.apply(12), 12);
        assert_eq!(LineSpacing::OneAndHalf.apply(12), 18);
        assert_eq!(LineSpacing::Double.apply(12), 24);
        assert_eq!(LineSpacing::Custom(3).apply(12), 15);
        assert_eq!(LineSpacing::AtLeast(20).apply(12), 20);
        assert_eq!(LineSpacing::AtLeast(10).apply(12), 12);
        assert_eq!(LineSpacing::Fixed(9).apply(12), 9);
    }

    #[test]
    fn test_apply_and_compare() {
        let mut a = ParagraphLayout::default();
        let b = ParagraphLayout::default()
            .with_alignment(Alignment::Center)
            .with_direction(TextDirection::Rtl);
        assert_eq!(
            a.compare(&b),
            LayoutFlags::ALIGNMENT | LayoutFlags::DIRECTION
        );

        a.apply(&b, LayoutFlags::ALIGNMENT);
        assert_eq!(a.alignment, Alignment::Center);
        assert_eq!(a.direction, TextDirection::Auto);
        assert_eq!(a.compare(&b), LayoutFlags::DIRECTION);
    }

    #[test]
    fn test_next_tab_stop() {
        let mut layout = ParagraphLayout::default();
        layout.apply(
            &ParagraphLayout {
                tabs: vec![
                    TabStop {
                        position: 80,
                        kind: TabKind::Right,
                    },
                    TabStop {
                        position: 40,
                        kind: TabKind::Left,
                    },
                ],
                ..ParagraphLayout::default()
            },
            LayoutFlags::TABS,
        );
        assert_eq!(layout.next_tab_stop(0).map(|t| t.position), Some(40));
        assert_eq!(layout.next_tab_stop(40).map(|t| t.position), Some(80));
        assert_eq!(layout.next_tab_stop(80), None);
    }
}
