//! Character formats and the interning collection that owns them.
//!
//! A [`Format`] is a plain descriptor of character-level style. Documents never
//! store descriptors directly: every character holds a [`FormatHandle`] obtained
//! from a [`FormatCollection`], which guarantees that two descriptors with equal
//! attributes resolve to the same shared instance.
//!
//! ```rust
//! use richtext_core::{Format, FormatCollection, FormatFlags};
//!
//! let mut formats = FormatCollection::new(Format::default());
//! let a = formats.intern(&Format::default().bold());
//! let b = formats.intern(&Format::default().bold());
//! assert_eq!(a, b); // identity, not just equality
//!
//! // Partial change: only the colour is taken from the override.
//! let red = Format::default().with_color(richtext_core::Color::rgb(255, 0, 0));
//! let c = formats.merge(&a, &red, FormatFlags::COLOR);
//! assert!(c.is_bold());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Deref};
use std::rc::{Rc, Weak};

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Create an opaque colour.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Underline line type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnderlineKind {
    /// No underline.
    #[default]
    None,
    /// One thin line.
    Single,
    /// Two thin lines.
    Double,
    /// One thick line.
    SingleBold,
    /// A wavy line.
    Wave,
}

/// Strike-out line type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrikeoutKind {
    /// No strike-out.
    #[default]
    None,
    /// One thin line.
    Single,
    /// Two thin lines.
    Double,
    /// One thick line.
    SingleBold,
}

/// Dash pattern of a decoration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LineStyle {
    /// Continuous line.
    #[default]
    Solid,
    /// Dashes.
    Dash,
    /// Dots.
    Dot,
    /// Dash, dot.
    DashDot,
    /// Dash, dot, dot.
    DashDotDot,
}

/// Vertical alignment relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerticalAlign {
    /// On the baseline.
    #[default]
    Normal,
    /// Lowered, reduced size.
    Subscript,
    /// Raised, reduced size.
    Superscript,
}

/// Selects attribute groups of a [`Format`].
///
/// Used by [`FormatCollection::merge`] for partial style changes and returned by
/// [`Format::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FormatFlags(pub u32);

impl FormatFlags {
    /// No attributes.
    pub const NONE: Self = Self(0);
    /// Font weight.
    pub const WEIGHT: Self = Self(1);
    /// Italic flag.
    pub const ITALIC: Self = Self(2);
    /// Underline kind, style and colour.
    pub const UNDERLINE: Self = Self(4);
    /// Font family.
    pub const FAMILY: Self = Self(8);
    /// Point size.
    pub const SIZE: Self = Self(16);
    /// Foreground colour.
    pub const COLOR: Self = Self(32);
    /// Vertical alignment.
    pub const VERTICAL_ALIGN: Self = Self(128);
    /// Strike-out kind and style.
    pub const STRIKEOUT: Self = Self(512);
    /// Background colour.
    pub const BACKGROUND: Self = Self(1024);
    /// Every font-related attribute.
    pub const FONT: Self = Self(1 | 2 | 4 | 8 | 16);
    /// Every attribute.
    pub const ALL: Self = Self(1 | 2 | 4 | 8 | 16 | 32 | 128 | 512 | 1024);

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for FormatFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FormatFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Character format descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Format {
    /// Font family name.
    pub family: String,
    /// Size in points.
    pub point_size: u16,
    /// CSS-style weight (400 normal, 700 bold).
    pub weight: u16,
    /// Italic flag.
    pub italic: bool,
    /// Underline line type.
    pub underline: UnderlineKind,
    /// Underline dash pattern.
    pub underline_style: LineStyle,
    /// Underline colour; `None` follows the foreground colour.
    pub underline_color: Option<Color>,
    /// Strike-out line type.
    pub strikeout: StrikeoutKind,
    /// Strike-out dash pattern.
    pub strikeout_style: LineStyle,
    /// Foreground colour; `None` means the host's default text colour.
    pub color: Option<Color>,
    /// Background colour; `None` means transparent.
    pub background: Option<Color>,
    /// Vertical alignment.
    pub vertical_align: VerticalAlign,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            family: "Sans".to_string(),
            point_size: 12,
            weight: 400,
            italic: false,
            underline: UnderlineKind::None,
            underline_style: LineStyle::Solid,
            underline_color: None,
            strikeout: StrikeoutKind::None,
            strikeout_style: LineStyle::Solid,
            color: None,
            background: None,
            vertical_align: VerticalAlign::Normal,
        }
    }
}

fn color_key(color: Option<Color>) -> String {
    match color {
        Some(c) => format!("#{:02x}{:02x}{:02x}{:02x}", c.r, c.g, c.b, c.a),
        None => "-".to_string(),
    }
}

impl Format {
    /// Create a format with the given family and size, other attributes default.
    pub fn new(family: impl Into<String>, point_size: u16) -> Self {
        Self {
            family: family.into(),
            point_size,
            ..Self::default()
        }
    }

    /// Builder: set weight 700.
    pub fn bold(mut self) -> Self {
        self.weight = 700;
        self
    }

    /// Builder: set the italic flag.
    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    /// Builder: set the foreground colour.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Builder: set the background colour.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    /// Builder: set the underline kind.
    pub fn with_underline(mut self, kind: UnderlineKind) -> Self {
        self.underline = kind;
        self
    }

    /// Builder: set the strike-out kind.
    pub fn with_strikeout(mut self, kind: StrikeoutKind) -> Self {
        self.strikeout = kind;
        self
    }

    /// Builder: set the vertical alignment.
    pub fn with_vertical_align(mut self, align: VerticalAlign) -> Self {
        self.vertical_align = align;
        self
    }

    /// Builder: set the point size.
    pub fn with_point_size(mut self, point_size: u16) -> Self {
        self.point_size = point_size;
        self
    }

    /// Whether the weight is bold or heavier.
    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }

    /// Canonical key. Equal descriptors produce equal keys and vice versa.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{:?}:{:?}:{}/{:?}:{:?}/{}/{}/{:?}",
            self.family,
            self.point_size,
            self.weight,
            u8::from(self.italic),
            self.underline,
            self.underline_style,
            color_key(self.underline_color),
            self.strikeout,
            self.strikeout_style,
            color_key(self.color),
            color_key(self.background),
            self.vertical_align,
        )
    }

    /// Copy the attribute groups selected by `flags` from `other`.
    pub fn copy_attributes(&mut self, other: &Format, flags: FormatFlags) {
        if flags.contains(FormatFlags::WEIGHT) {
            self.weight = other.weight;
        }
        if flags.contains(FormatFlags::ITALIC) {
            self.italic = other.italic;
        }
        if flags.contains(FormatFlags::UNDERLINE) {
            self.underline = other.underline;
            self.underline_style = other.underline_style;
            self.underline_color = other.underline_color;
        }
        if flags.contains(FormatFlags::FAMILY) {
            self.family.clone_from(&other.family);
        }
        if flags.contains(FormatFlags::SIZE) {
            self.point_size = other.point_size;
        }
        if flags.contains(FormatFlags::COLOR) {
            self.color = other.color;
        }
        if flags.contains(FormatFlags::VERTICAL_ALIGN) {
            self.vertical_align = other.vertical_align;
        }
        if flags.contains(FormatFlags::STRIKEOUT) {
            self.strikeout = other.strikeout;
            self.strikeout_style = other.strikeout_style;
        }
        if flags.contains(FormatFlags::BACKGROUND) {
            self.background = other.background;
        }
    }

    /// Attribute groups in which `self` and `other` differ.
    pub fn compare(&self, other: &Format) -> FormatFlags {
        let mut flags = FormatFlags::NONE;
        if self.weight != other.weight {
            flags |= FormatFlags::WEIGHT;
        }
        if self.italic != other.italic {
            flags |= FormatFlags::ITALIC;
        }
        if self.underline != other.underline
            || self.underline_style != other.underline_style
            || self.underline_color != other.underline_color
        {
            flags |= FormatFlags::UNDERLINE;
        }
        if self.family != other.family {
            flags |= FormatFlags::FAMILY;
        }
        if self.point_size != other.point_size {
            flags |= FormatFlags::SIZE;
        }
        if self.color != other.color {
            flags |= FormatFlags::COLOR;
        }
        if self.vertical_align != other.vertical_align {
            flags |= FormatFlags::VERTICAL_ALIGN;
        }
        if self.strikeout != other.strikeout || self.strikeout_style != other.strikeout_style {
            flags |= FormatFlags::STRIKEOUT;
        }
        if self.background != other.background {
            flags |= FormatFlags::BACKGROUND;
        }
        flags
    }
}

#[derive(Debug)]
struct Interned {
    format: Format,
    key: String,
}

/// Shared reference to an interned [`Format`].
///
/// Equality is identity: two handles are equal iff they point at the same
/// interned instance. Dropping the last handle frees the descriptor.
#[derive(Clone)]
pub struct FormatHandle(Rc<Interned>);

impl FormatHandle {
    /// Canonical key of the referenced format.
    pub fn key(&self) -> &str {
        &self.0.key
    }

    /// The referenced descriptor.
    pub fn format(&self) -> &Format {
        &self.0.format
    }

    /// Number of live handles (including this one) to the same instance.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl Deref for FormatHandle {
    type Target = Format;

    fn deref(&self) -> &Format {
        &self.0.format
    }
}

impl PartialEq for FormatHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for FormatHandle {}

impl fmt::Debug for FormatHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormatHandle").field(&self.0.key).finish()
    }
}

const INITIAL_SWEEP_THRESHOLD: usize = 64;

/// Interning store for character formats.
///
/// The collection is the only place formats are created. It holds weak
/// references, so a format lives exactly as long as some character (or caller)
/// holds a handle to it, plus the collection's own default format.
pub struct FormatCollection {
    formats: HashMap<String, Weak<Interned>>,
    default_format: FormatHandle,
    sweep_threshold: usize,
}

impl FormatCollection {
    /// Create a collection whose default format is `default`.
    pub fn new(default: Format) -> Self {
        let key = default.key();
        let interned = Rc::new(Interned {
            format: default,
            key: key.clone(),
        });
        let mut formats = HashMap::new();
        formats.insert(key, Rc::downgrade(&interned));
        Self {
            formats,
            default_format: FormatHandle(interned),
            sweep_threshold: INITIAL_SWEEP_THRESHOLD,
        }
    }

    /// The default format (kept alive by the collection).
    pub fn default_format(&self) -> &FormatHandle {
        &self.default_format
    }

    /// Return the shared handle for `format`, creating it on first request.
    pub fn intern(&mut self, format: &Format) -> FormatHandle {
        let key = format.key();
        if let Some(existing) = self.formats.get(&key).and_then(Weak::upgrade) {
            return FormatHandle(existing);
        }

        if self.formats.len() >= self.sweep_threshold {
            self.collect_garbage();
            self.sweep_threshold = (self.formats.len() * 2).max(INITIAL_SWEEP_THRESHOLD);
        }

        let interned = Rc::new(Interned {
            format: format.clone(),
            key: key.clone(),
        });
        self.formats.insert(key, Rc::downgrade(&interned));
        FormatHandle(interned)
    }

    /// Combine the attribute groups of `overrides` selected by `flags` onto
    /// `base` and intern the result.
    pub fn merge(&mut self, base: &Format, overrides: &Format, flags: FormatFlags) -> FormatHandle {
        let mut merged = base.clone();
        merged.copy_attributes(overrides, flags);
        self.intern(&merged)
    }

    /// Release a handle. If it was the last one the descriptor is removed.
    pub fn release(&mut self, handle: FormatHandle) {
        let key = handle.key().to_string();
        drop(handle);
        if let Some(weak) = self.formats.get(&key)
            && weak.strong_count() == 0
        {
            self.formats.remove(&key);
        }
    }

    /// Drop bookkeeping for formats that are no longer referenced.
    pub fn collect_garbage(&mut self) {
        self.formats.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Whether a live format with this key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.formats
            .get(key)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live interned formats.
    pub fn len(&self) -> usize {
        self.formats
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether no format is live. Never true while the collection exists,
    /// since the default format is always held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FormatCollection {
    fn default() -> Self {
        Self::new(Format::default())
    }
}

impl fmt::Debug for FormatCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatCollection")
            .field("live", &self.len())
            .field("default", &self.default_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_identity() {
        let mut formats = FormatCollection::default();
        let a = formats.intern(&Format::new("Serif", 10).bold());
        let b = formats.intern(&Format::new("Serif", 10).bold());
        let c = formats.intern(&Format::new("Serif", 11).bold());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.ref_count(), 2);
    }

    #[test]
    fn test_default_is_interned() {
        let mut formats = FormatCollection::default();
        let d = formats.intern(&Format::default());
        assert_eq!(&d, formats.default_format());
    }

    #[test]
    fn test_release_frees_at_zero() {
        let mut formats = FormatCollection::default();
        let f = Format::default().with_italic(true);
        let a = formats.intern(&f);
        let b = a.clone();
        assert_eq!(formats.len(), 2);

        formats.release(a);
        assert!(formats.contains_key(&f.key()));
        formats.release(b);
        assert!(!formats.contains_key(&f.key()));
        assert_eq!(formats.len(), 1);
    }

    #[test]
    fn test_merge_only_touches_flagged_groups() {
        let mut formats = FormatCollection::default();
        let red = Color::rgb(200, 0, 0);
        let base = formats.intern(&Format::default().with_color(red));

        let bolded = formats.merge(&base, &Format::default().bold(), FormatFlags::WEIGHT);
        assert!(bolded.is_bold());
        assert_eq!(bolded.color, Some(red));

        let same = formats.merge(&base, &Format::default().bold(), FormatFlags::ITALIC);
        assert_eq!(same, base);
    }

    #[test]
    fn test_compare_reports_differences() {
        let a = Format::default();
        let b = Format::default().bold().with_underline(UnderlineKind::Wave);
        let diff = a.compare(&b);
        assert!(diff.contains(FormatFlags::WEIGHT));
        assert!(diff.contains(FormatFlags::UNDERLINE));
        assert!(!diff.contains(FormatFlags::COLOR));
        assert!(a.compare(&a).is_empty());
    }

    #[test]
    fn test_key_distinguishes_colors() {
        let a = Format::default().with_color(Color::rgb(1, 2, 3));
        let b = Format::default().with_background(Color::rgb(1, 2, 3));
        assert_ne!(a.key(), b.key());
    }
}
