//! Character storage: [`StyledChar`] and [`CharacterRun`].

use crate::custom_item::{CustomItem, OBJECT_REPLACEMENT_CHAR};
use crate::error::{EngineError, Result};
use crate::format::FormatHandle;

/// One character slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StyledChar {
    /// A glyph with its shared format.
    Regular {
        /// The character.
        ch: char,
        /// Interned format.
        format: FormatHandle,
    },
    /// An inline item; `format` is the style of the surrounding text.
    Custom {
        /// The owned item.
        item: Box<CustomItem>,
        /// Interned format.
        format: FormatHandle,
    },
}

impl StyledChar {
    /// The stored glyph; custom items report U+FFFC.
    pub fn ch(&self) -> char {
        match self {
            StyledChar::Regular { ch, .. } => *ch,
            StyledChar::Custom { .. } => OBJECT_REPLACEMENT_CHAR,
        }
    }

    /// The character's format.
    pub fn format(&self) -> &FormatHandle {
        match self {
            StyledChar::Regular { format, .. } | StyledChar::Custom { format, .. } => format,
        }
    }

    /// Replace the character's format.
    pub fn set_format(&mut self, new_format: FormatHandle) {
        match self {
            StyledChar::Regular { format, .. } | StyledChar::Custom { format, .. } => {
                *format = new_format;
            }
        }
    }

    /// The inline item, if this is a custom slot.
    pub fn custom_item(&self) -> Option<&CustomItem> {
        match self {
            StyledChar::Custom { item, .. } => Some(item.as_ref()),
            StyledChar::Regular { .. } => None,
        }
    }

    /// Mutable access to the inline item.
    pub fn custom_item_mut(&mut self) -> Option<&mut CustomItem> {
        match self {
            StyledChar::Custom { item, .. } => Some(item.as_mut()),
            StyledChar::Regular { .. } => None,
        }
    }

    /// Whether this slot holds a custom item.
    pub fn is_custom(&self) -> bool {
        matches!(self, StyledChar::Custom { .. })
    }

    /// Whether a line may break after this character.
    pub fn is_break_opportunity(&self) -> bool {
        match self {
            StyledChar::Regular { ch, .. } => ch.is_whitespace() || *ch == '\u{00AD}',
            StyledChar::Custom { item, .. } => item.is_breakable(),
        }
    }
}

/// Ordered, mutable sequence of styled characters.
///
/// Every index argument is checked; out-of-range arguments are errors, never
/// clamped. Custom item positions are implicit in the sequence, so callers
/// must re-resolve positions after any mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterRun {
    chars: Vec<StyledChar>,
}

impl CharacterRun {
    /// Create an empty run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a run from `text` in a single format.
    pub fn from_text(text: &str, format: &FormatHandle) -> Self {
        Self {
            chars: text
                .chars()
                .map(|ch| StyledChar::Regular {
                    ch,
                    format: format.clone(),
                })
                .collect(),
        }
    }

    /// Create a run from existing slots.
    pub fn from_chars(chars: Vec<StyledChar>) -> Self {
        Self { chars }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether the run is empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Slot at `index`.
    pub fn at(&self, index: usize) -> Result<&StyledChar> {
        self.chars.get(index).ok_or(EngineError::IndexOutOfRange {
            index,
            len: self.chars.len(),
        })
    }

    /// Mutable slot at `index`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut StyledChar> {
        let len = self.chars.len();
        self.chars
            .get_mut(index)
            .ok_or(EngineError::IndexOutOfRange { index, len })
    }

    /// Iterate slots in logical order.
    pub fn iter(&self) -> std::slice::Iter<'_, StyledChar> {
        self.chars.iter()
    }

    /// Slots as a slice.
    pub fn as_slice(&self) -> &[StyledChar] {
        &self.chars
    }

    fn check_insert(&self, index: usize) -> Result<()> {
        if index > self.chars.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.chars.len(),
            });
        }
        Ok(())
    }

    fn check_range(&self, start: usize, length: usize) -> Result<()> {
        match start.checked_add(length) {
            Some(end) if end <= self.chars.len() => Ok(()),
            _ => Err(EngineError::RangeOutOfBounds {
                start,
                length,
                len: self.chars.len(),
            }),
        }
    }

    /// Insert `text` at `index` in `format`. Returns the number of inserted chars.
    pub fn insert(&mut self, index: usize, text: &str, format: &FormatHandle) -> Result<usize> {
        self.check_insert(index)?;
        let before = self.chars.len();
        self.chars.splice(
            index..index,
            text.chars().map(|ch| StyledChar::Regular {
                ch,
                format: format.clone(),
            }),
        );
        Ok(self.chars.len() - before)
    }

    /// Insert a custom item at `index`.
    pub fn insert_custom(
        &mut self,
        index: usize,
        item: CustomItem,
        format: &FormatHandle,
    ) -> Result<()> {
        self.check_insert(index)?;
        self.chars.insert(
            index,
            StyledChar::Custom {
                item: Box::new(item),
                format: format.clone(),
            },
        );
        Ok(())
    }

    /// Insert the slots of `other` at `index`.
    pub fn insert_run(&mut self, index: usize, other: CharacterRun) -> Result<()> {
        self.check_insert(index)?;
        self.chars.splice(index..index, other.chars);
        Ok(())
    }

    /// Remove `length` slots starting at `index`, returning them.
    pub fn remove(&mut self, index: usize, length: usize) -> Result<CharacterRun> {
        self.check_range(index, length)?;
        Ok(CharacterRun {
            chars: self.chars.drain(index..index + length).collect(),
        })
    }

    /// Set the format of `length` slots starting at `index`.
    pub fn set_format(&mut self, index: usize, length: usize, format: &FormatHandle) -> Result<()> {
        self.check_range(index, length)?;
        for ch in &mut self.chars[index..index + length] {
            ch.set_format(format.clone());
        }
        Ok(())
    }

    /// Copy of `length` slots starting at `start`.
    pub fn sub_range(&self, start: usize, length: usize) -> Result<CharacterRun> {
        self.check_range(start, length)?;
        Ok(CharacterRun {
            chars: self.chars[start..start + length].to_vec(),
        })
    }

    /// Move every slot from `index` on into a new run.
    pub fn split_off(&mut self, index: usize) -> Result<CharacterRun> {
        self.check_insert(index)?;
        Ok(CharacterRun {
            chars: self.chars.split_off(index),
        })
    }

    /// Append all slots of `other`.
    pub fn append(&mut self, other: CharacterRun) {
        self.chars.extend(other.chars);
    }

    /// Glyphs as a string; custom items appear as U+FFFC.
    pub fn to_plain_string(&self) -> String {
        self.chars.iter().map(StyledChar::ch).collect()
    }

    /// Glyphs as `char`s.
    pub fn glyphs(&self) -> Vec<char> {
        self.chars.iter().map(StyledChar::ch).collect()
    }
}

impl<'a> IntoIterator for &'a CharacterRun {
    type Item = &'a StyledChar;
    type IntoIter = std::slice::Iter<'a, StyledChar>;

    fn into_iter(self) -> Self::IntoIter {
        self.chars.iter()
    }
}

impl IntoIterator for CharacterRun {
    type Item = StyledChar;
    type IntoIter = std::vec::IntoIter<StyledChar>;

    fn into_iter(self) -> Self::IntoIter {
        self.chars.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_item::ExternalId;
    use crate::format::{Format, FormatCollection};

    #[test]
    fn test_insert_remove() {
        let mut formats = FormatCollection::default();
        let f = formats.intern(&Format::default());
        let mut run = CharacterRun::new();
        assert_eq!(run.insert(0, "Hello", &f).unwrap(), 5);
        run.insert(5, " World", &f).unwrap();
        assert_eq!(run.to_plain_string(), "Hello World");

        let removed = run.remove(0, 6).unwrap();
        assert_eq!(removed.to_plain_string(), "Hello ");
        assert_eq!(run.to_plain_string(), "World");
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let f = FormatCollection::default().default_format().clone();
        let mut run = CharacterRun::from_text("abc", &f);
        assert_eq!(
            run.insert(4, "x", &f),
            Err(EngineError::IndexOutOfRange { index: 4, len: 3 })
        );
        assert!(run.remove(2, 2).is_err());
        assert!(run.set_format(usize::MAX, 2, &f).is_err());
        assert!(run.at(3).is_err());
        assert_eq!(run.to_plain_string(), "abc");
    }

    #[test]
    fn test_custom_items_shift_with_edits() {
        let f = FormatCollection::default().default_format().clone();
        let mut run = CharacterRun::from_text("ab", &f);
        run.insert_custom(1, CustomItem::anchor(ExternalId(9)), &f)
            .unwrap();
        run.insert(0, "xyz", &f).unwrap();
        assert!(run.at(4).unwrap().is_custom());
        assert_eq!(run.to_plain_string(), "xyza\u{FFFC}b");
    }

    #[test]
    fn test_split_and_append() {
        let f = FormatCollection::default().default_format().clone();
        let mut run = CharacterRun::from_text("Hello", &f);
        let tail = run.split_off(2).unwrap();
        assert_eq!(run.to_plain_string(), "He");
        assert_eq!(tail.to_plain_string(), "llo");
        run.append(tail);
        assert_eq!(run.to_plain_string(), "Hello");
    }
}
