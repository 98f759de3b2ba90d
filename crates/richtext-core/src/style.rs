//! Named paragraph styles.
//!
//! A [`ParagraphStyle`] bundles a paragraph layout with the character format
//! of the paragraph's text. Applying a style replaces both. A style may name a
//! *following* style: a paragraph split off a paragraph carrying the style
//! starts in the following one (a heading followed by body text).
//!
//! ```rust
//! use richtext_core::{Alignment, Format, ParagraphLayout, ParagraphStyle, StyleCollection};
//!
//! let mut styles = StyleCollection::new(Format::default());
//! let mut layout = ParagraphLayout::default();
//! layout.alignment = Alignment::Center;
//! styles.add(ParagraphStyle::new("Heading", layout, Format::default().bold()).with_following("Standard"));
//!
//! assert!(styles.find("Heading").is_some());
//! assert_eq!(styles.following("Heading").map(|s| s.name.as_str()), Some("Standard"));
//! ```

use crate::format::Format;
use crate::paragraph_layout::ParagraphLayout;
use serde::{Deserialize, Serialize};

/// Name of the style every collection starts with.
pub const STANDARD_STYLE: &str = "Standard";

/// A named paragraph layout plus text format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Unique name within a collection.
    pub name: String,
    /// Layout given to styled paragraphs.
    pub layout: ParagraphLayout,
    /// Format given to the text of styled paragraphs.
    pub format: Format,
    /// Style of a paragraph split off this one; `None` keeps this style.
    pub following: Option<String>,
}

impl ParagraphStyle {
    /// Create a style followed by itself.
    pub fn new(name: impl Into<String>, layout: ParagraphLayout, format: Format) -> Self {
        Self {
            name: name.into(),
            layout,
            format,
            following: None,
        }
    }

    /// Builder: set the following style.
    pub fn with_following(mut self, name: impl Into<String>) -> Self {
        self.following = Some(name.into());
        self
    }

    /// Layout a paragraph takes when the style is applied: the style's layout
    /// tagged with the style name.
    pub fn paragraph_layout(&self) -> ParagraphLayout {
        let mut layout = self.layout.clone();
        layout.style_name = Some(self.name.clone());
        layout
    }
}

/// Ordered set of paragraph styles, unique by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCollection {
    styles: Vec<ParagraphStyle>,
}

impl Default for StyleCollection {
    fn default() -> Self {
        Self::new(Format::default())
    }
}

impl StyleCollection {
    /// Create a collection holding the [`STANDARD_STYLE`] in `format`.
    pub fn new(format: Format) -> Self {
        Self {
            styles: vec![ParagraphStyle::new(
                STANDARD_STYLE,
                ParagraphLayout::default(),
                format,
            )],
        }
    }

    /// Add `style`, replacing (and returning) a style of the same name.
    pub fn add(&mut self, style: ParagraphStyle) -> Option<ParagraphStyle> {
        match self.styles.iter_mut().find(|s| s.name == style.name) {
            Some(existing) => Some(std::mem::replace(existing, style)),
            None => {
                self.styles.push(style);
                None
            }
        }
    }

    /// Style named `name`. The standard style falls back to the first style.
    pub fn find(&self, name: &str) -> Option<&ParagraphStyle> {
        let found = self.styles.iter().find(|s| s.name == name);
        if found.is_none() && name == STANDARD_STYLE {
            return self.styles.first();
        }
        found
    }

    /// Remove the style named `name`. Styles naming it as following style
    /// keep themselves from then on.
    pub fn remove(&mut self, name: &str) -> Option<ParagraphStyle> {
        let index = self.styles.iter().position(|s| s.name == name)?;
        Some(self.styles.remove(index))
    }

    /// Style a paragraph split off a `name` paragraph starts in, when it
    /// differs from `name` itself and exists.
    pub fn following(&self, name: &str) -> Option<&ParagraphStyle> {
        let following = self.find(name)?.following.as_deref()?;
        if following == name {
            return None;
        }
        self.find(following)
    }

    /// Styles in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParagraphStyle> {
        self.styles.iter()
    }

    /// Style names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.styles.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of styles.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> ParagraphStyle {
        ParagraphStyle::new("Body", ParagraphLayout::default(), Format::new("Serif", 11))
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut styles = StyleCollection::default();
        assert!(styles.add(body()).is_none());
        let replaced = styles.add(ParagraphStyle::new(
            "Body",
            ParagraphLayout::default(),
            Format::new("Sans", 10),
        ));
        assert_eq!(replaced.map(|s| s.format.family), Some("Serif".to_string()));
        assert_eq!(styles.names(), vec!["Standard", "Body"]);
        assert_eq!(styles.find("Body").unwrap().format.point_size, 10);
    }

    #[test]
    fn test_following_resolution() {
        let mut styles = StyleCollection::default();
        styles.add(body().with_following("Body"));
        styles.add(
            ParagraphStyle::new("Heading", ParagraphLayout::default(), Format::default())
                .with_following("Body"),
        );
        styles.add(
            ParagraphStyle::new("Quote", ParagraphLayout::default(), Format::default())
                .with_following("Missing"),
        );
        assert_eq!(styles.following("Heading").unwrap().name, "Body");
        assert!(styles.following("Body").is_none());
        assert!(styles.following("Quote").is_none());
        assert!(styles.following("Nope").is_none());

        styles.remove("Body");
        assert!(styles.following("Heading").is_none());
    }

    #[test]
    fn test_standard_falls_back_to_first() {
        let mut styles = StyleCollection::default();
        styles.add(body());
        styles.remove(STANDARD_STYLE);
        assert_eq!(styles.find(STANDARD_STYLE).unwrap().name, "Body");
        assert!(styles.find("Heading").is_none());
    }

    #[test]
    fn test_paragraph_layout_carries_name() {
        assert_eq!(body().paragraph_layout().style_name.as_deref(), Some("Body"));
    }
}
