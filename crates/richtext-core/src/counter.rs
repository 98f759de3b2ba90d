//! Paragraph numbering and bullets.
//!
//! A [`Counter`] is attached to a paragraph through its
//! [`ParagraphLayout`](crate::ParagraphLayout). Its number depends on the
//! counters of preceding paragraphs, so every query takes the paragraph's key
//! and a [`ParagraphChain`] to walk backwards through.
//!
//! Results are cached inside the counter. Setters clear the counter's own
//! cache only; the document clears the caches of all following paragraphs
//! whenever numbering might have shifted.

use crate::format::{Format, VerticalAlign};
use crate::measure::{TextMeasure, text_width};
use crate::paragraph::ParagraphKey;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Read access to the paragraph chain needed for counter lookups.
pub trait ParagraphChain {
    /// The paragraph before `key`.
    fn prev(&self, key: ParagraphKey) -> Option<ParagraphKey>;

    /// The counter of `key`, if it has one.
    fn counter(&self, key: ParagraphKey) -> Option<&Counter>;

    /// Whether `key` is laid out right to left.
    fn is_rtl(&self, key: ParagraphKey) -> bool;

    /// Whether `key` is the only paragraph of its document.
    fn is_only_paragraph(&self, key: ParagraphKey) -> bool;
}

/// Numbering scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Numbering {
    /// Not numbered.
    None,
    /// List item.
    #[default]
    List,
    /// Heading (chapter) number.
    Chapter,
}

/// How the number or bullet is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CounterStyle {
    /// No label text for this level.
    None,
    /// 1, 2, 3
    #[default]
    Arabic,
    /// a, b, c
    AlphaLower,
    /// A, B, C
    AlphaUpper,
    /// i, ii, iii
    RomanLower,
    /// I, II, III
    RomanUpper,
    /// Filled round bullet.
    Disc,
    /// Filled square bullet.
    Square,
    /// Hollow square bullet.
    Box,
    /// Hollow round bullet.
    Circle,
    /// The counter's custom bullet glyph.
    CustomBullet,
    /// Host-defined style (rendered as arabic).
    Custom,
}

impl CounterStyle {
    /// Whether the style is a bullet rather than a number.
    pub fn is_bullet(self) -> bool {
        matches!(
            self,
            CounterStyle::Disc
                | CounterStyle::Square
                | CounterStyle::Box
                | CounterStyle::Circle
                | CounterStyle::CustomBullet
        )
    }
}

#[derive(Debug, Default)]
struct CounterCache {
    number: Cell<Option<i32>>,
    text: RefCell<Option<String>>,
    width: Cell<Option<i32>>,
    width_key: RefCell<Option<String>>,
    parent: Cell<Option<Option<ParagraphKey>>>,
}

/// Numbering or bullet descriptor of a paragraph.
///
/// ```rust
/// use richtext_core::{Counter, CounterStyle};
///
/// let heading = Counter::chapter(0).with_style(CounterStyle::RomanUpper);
/// assert!(!heading.is_bullet());
/// assert_eq!(Counter::bullet(CounterStyle::Disc).suffix(), "");
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Counter {
    numbering: Numbering,
    style: CounterStyle,
    depth: u32,
    start_number: i32,
    display_levels: u32,
    restart: bool,
    prefix: String,
    suffix: String,
    custom_bullet: char,
    custom_bullet_font: Option<String>,
    #[serde(skip)]
    cache: CounterCache,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            numbering: Numbering::List,
            style: CounterStyle::Arabic,
            depth: 0,
            start_number: 1,
            display_levels: 1,
            restart: false,
            prefix: String::new(),
            suffix: ".".to_string(),
            custom_bullet: '\u{2022}',
            custom_bullet_font: None,
            cache: CounterCache::default(),
        }
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Self {
            numbering: self.numbering,
            style: self.style,
            depth: self.depth,
            start_number: self.start_number,
            display_levels: self.display_levels,
            restart: self.restart,
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            custom_bullet: self.custom_bullet,
            custom_bullet_font: self.custom_bullet_font.clone(),
            cache: CounterCache::default(),
        }
    }
}

impl PartialEq for Counter {
    fn eq(&self, other: &Self) -> bool {
        self.numbering == other.numbering
            && self.style == other.style
            && self.depth == other.depth
            && self.start_number == other.start_number
            && self.display_levels == other.display_levels
            && self.restart == other.restart
            && self.prefix == other.prefix
            && self.suffix == other.suffix
            && self.custom_bullet == other.custom_bullet
            && self.custom_bullet_font == other.custom_bullet_font
    }
}

impl Counter {
    /// A list counter with the given style.
    pub fn list(style: CounterStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// An arabic chapter counter at `depth`, showing every level above it.
    pub fn chapter(depth: u32) -> Self {
        Self {
            numbering: Numbering::Chapter,
            depth,
            display_levels: depth + 1,
            ..Self::default()
        }
    }

    /// A bullet list counter without suffix.
    pub fn bullet(style: CounterStyle) -> Self {
        Self {
            style,
            suffix: String::new(),
            ..Self::default()
        }
    }

    /// Builder: set the style.
    pub fn with_style(mut self, style: CounterStyle) -> Self {
        self.set_style(style);
        self
    }

    /// Builder: set the depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.set_depth(depth);
        self
    }

    /// Builder: set the start number.
    pub fn with_start(mut self, start: i32) -> Self {
        self.set_start_number(start);
        self
    }

    /// Builder: set how many levels the label shows.
    pub fn with_display_levels(mut self, levels: u32) -> Self {
        self.set_display_levels(levels);
        self
    }

    /// Builder: restart numbering at this paragraph.
    pub fn with_restart(mut self, restart: bool) -> Self {
        self.set_restart(restart);
        self
    }

    /// Builder: set the prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.set_prefix(prefix);
        self
    }

    /// Builder: set the suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.set_suffix(suffix);
        self
    }

    /// Builder: use a custom bullet glyph.
    pub fn with_custom_bullet(mut self, glyph: char, font: Option<String>) -> Self {
        self.set_custom_bullet(glyph, font);
        self
    }

    /// Numbering scope.
    pub fn numbering(&self) -> Numbering {
        self.numbering
    }

    /// Render style.
    pub fn style(&self) -> CounterStyle {
        self.style
    }

    /// Nesting depth (0 = top level).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// First number of a sequence.
    pub fn start_number(&self) -> i32 {
        self.start_number
    }

    /// Number of levels shown in the label.
    pub fn display_levels(&self) -> u32 {
        self.display_levels
    }

    /// Whether numbering restarts here.
    pub fn restart(&self) -> bool {
        self.restart
    }

    /// Text before the number.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Text after the number.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Custom bullet glyph.
    pub fn custom_bullet(&self) -> char {
        self.custom_bullet
    }

    /// Font family of the custom bullet.
    pub fn custom_bullet_font(&self) -> Option<&str> {
        self.custom_bullet_font.as_deref()
    }

    /// Whether this counter renders a bullet.
    pub fn is_bullet(&self) -> bool {
        self.style.is_bullet()
    }

    /// Set the numbering scope.
    pub fn set_numbering(&mut self, numbering: Numbering) {
        self.numbering = numbering;
        self.invalidate();
    }

    /// Set the render style.
    pub fn set_style(&mut self, style: CounterStyle) {
        self.style = style;
        self.invalidate();
    }

    /// Set the depth.
    pub fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.invalidate();
    }

    /// Set the start number.
    pub fn set_start_number(&mut self, start: i32) {
        self.start_number = start;
        self.invalidate();
    }

    /// Set the number of displayed levels.
    pub fn set_display_levels(&mut self, levels: u32) {
        self.display_levels = levels;
        self.invalidate();
    }

    /// Set the restart flag.
    pub fn set_restart(&mut self, restart: bool) {
        self.restart = restart;
        self.invalidate();
    }

    /// Set the prefix.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
        self.invalidate();
    }

    /// Set the suffix.
    pub fn set_suffix(&mut self, suffix: impl Into<String>) {
        self.suffix = suffix.into();
        self.invalidate();
    }

    /// Set the custom bullet glyph and its font.
    pub fn set_custom_bullet(&mut self, glyph: char, font: Option<String>) {
        self.custom_bullet = glyph;
        self.custom_bullet_font = font;
        self.invalidate();
    }

    /// Forget cached number, text, width and parent.
    pub fn invalidate(&self) {
        self.cache.number.set(None);
        self.cache.text.replace(None);
        self.cache.width.set(None);
        self.cache.width_key.replace(None);
        self.cache.parent.set(None);
    }

    /// Nearest preceding counter this one continues from, or `None` if the
    /// sequence starts here.
    fn predecessor<'a>(
        &self,
        key: ParagraphKey,
        chain: &'a dyn ParagraphChain,
    ) -> Option<(ParagraphKey, &'a Counter)> {
        if self.restart {
            return None;
        }
        let mut other = chain.prev(key);
        while let Some(other_key) = other {
            if let Some(counter) = chain.counter(other_key) {
                let same_type = counter.depth == self.depth && counter.style == self.style;
                match self.numbering {
                    Numbering::None => return None,
                    Numbering::Chapter => {
                        if counter.numbering == Numbering::Chapter && counter.depth <= self.depth {
                            return same_type.then_some((other_key, counter));
                        }
                    }
                    Numbering::List => {
                        if counter.numbering == Numbering::List
                            && !counter.is_bullet()
                            && counter.depth <= self.depth
                        {
                            return same_type.then_some((other_key, counter));
                        }
                        if counter.numbering == Numbering::Chapter {
                            return None;
                        }
                    }
                }
            }
            other = chain.prev(other_key);
        }
        None
    }

    /// Sequence number of the paragraph `key`.
    pub fn number(&self, key: ParagraphKey, chain: &dyn ParagraphChain) -> i32 {
        if let Some(number) = self.cache.number.get() {
            return number;
        }
        if self.numbering == Numbering::None {
            self.cache.number.set(Some(0));
            return 0;
        }

        // Resolve uncached predecessors oldest first, so long lists never recurse.
        let mut pending = vec![(key, self)];
        while let Some(&(last_key, last)) = pending.last() {
            match last.predecessor(last_key, chain) {
                Some((prev_key, prev)) if prev.cache.number.get().is_none() => {
                    pending.push((prev_key, prev));
                }
                _ => break,
            }
        }

        let mut number = self.start_number;
        while let Some((current_key, current)) = pending.pop() {
            number = match current.predecessor(current_key, chain) {
                Some((_, prev)) => prev.cache.number.get().unwrap_or(prev.start_number) + 1,
                None => current.start_number,
            };
            current.cache.number.set(Some(number));
        }
        number
    }

    /// Nearest preceding paragraph whose counter is one level up, if any.
    pub fn parent(&self, key: ParagraphKey, chain: &dyn ParagraphChain) -> Option<ParagraphKey> {
        if let Some(parent) = self.cache.parent.get() {
            return parent;
        }
        let mut found = None;
        if self.numbering != Numbering::None {
            let mut other = chain.prev(key);
            while let Some(other_key) = other {
                if let Some(counter) = chain.counter(other_key) {
                    if self.numbering == Numbering::Chapter {
                        if counter.numbering == Numbering::Chapter && counter.depth < self.depth {
                            found = Some(other_key);
                            break;
                        }
                    } else if counter.numbering == Numbering::List
                        && !counter.is_bullet()
                        && counter.depth < self.depth
                    {
                        found = Some(other_key);
                        break;
                    } else if counter.numbering == Numbering::Chapter {
                        break;
                    }
                }
                other = chain.prev(other_key);
            }
        }
        self.cache.parent.set(Some(found));
        found
    }

    /// Label text of this level alone, without prefix, suffix or parents.
    pub fn level_text(&self, key: ParagraphKey, chain: &dyn ParagraphChain) -> String {
        match self.style {
            // Unnumbered list items keep a blank so their indent stays.
            CounterStyle::None if self.numbering == Numbering::List => " ".to_string(),
            CounterStyle::None => String::new(),
            CounterStyle::Arabic | CounterStyle::Custom => self.number(key, chain).to_string(),
            CounterStyle::AlphaLower => to_alpha(self.number(key, chain), false),
            CounterStyle::AlphaUpper => to_alpha(self.number(key, chain), true),
            CounterStyle::RomanLower => to_roman(self.number(key, chain)),
            CounterStyle::RomanUpper => to_roman(self.number(key, chain)).to_uppercase(),
            CounterStyle::Disc => '\u{2022}'.to_string(),
            CounterStyle::Square => '\u{25AA}'.to_string(),
            CounterStyle::Box => '\u{25A1}'.to_string(),
            CounterStyle::Circle => '\u{25E6}'.to_string(),
            CounterStyle::CustomBullet => self.custom_bullet.to_string(),
        }
    }

    /// Full label: prefix, parent levels, this level and suffix.
    ///
    /// Skipped intermediate levels render as `0.`; a missing top-level parent
    /// renders as `0.` (or `1.` when the paragraph is alone in its document).
    pub fn text(&self, key: ParagraphKey, chain: &dyn ParagraphChain) -> String {
        if let Some(text) = self.cache.text.borrow().as_ref() {
            return text.clone();
        }
        if self.numbering == Numbering::None {
            self.cache.text.replace(Some(String::new()));
            return String::new();
        }

        let mut levels = String::new();
        let display_levels = self.display_levels.min(self.depth + 1) as i64;
        if display_levels > 1 {
            let mut parent = self.parent(key, chain);
            let mut level: i64 = 1;
            while level < display_levels {
                let found = parent.and_then(|p| chain.counter(p).map(|counter| (p, counter)));
                match found {
                    Some((parent_key, counter)) => {
                        let mut segment = counter.level_text(parent_key, chain);
                        if counter.is_bullet() {
                            segment = " ".repeat(segment.chars().count());
                        }
                        segment.push('.');
                        let missing = i64::from(self.depth) - level - i64::from(counter.depth);
                        for _ in 0..missing.max(0) {
                            segment.push_str("0.");
                        }
                        level += missing.max(0);
                        levels.insert_str(0, &segment);
                        level += 1;
                        if level < display_levels {
                            parent = counter.parent(parent_key, chain);
                        }
                    }
                    None => {
                        let placeholder = if chain.is_only_paragraph(key) {
                            "1."
                        } else {
                            "0."
                        };
                        levels.insert_str(0, placeholder);
                        level += 1;
                    }
                }
            }
        }
        levels.push_str(&self.level_text(key, chain));

        let (before, after) = if chain.is_rtl(key) {
            (&self.suffix, &self.prefix)
        } else {
            (&self.prefix, &self.suffix)
        };
        let text = format!("{before}{levels}{after}");
        self.cache.text.replace(Some(text.clone()));
        text
    }

    /// Width of the label plus its trailing gap, measured in `format`.
    ///
    /// Cached until the counter is invalidated or `format` changes.
    pub fn width(
        &self,
        key: ParagraphKey,
        chain: &dyn ParagraphChain,
        measure: &dyn TextMeasure,
        format: &Format,
    ) -> i32 {
        let format_key = format.key();
        if let Some(width) = self.cache.width.get()
            && self.cache.width_key.borrow().as_deref() == Some(format_key.as_str())
        {
            return width;
        }

        let mut label = self.text(key, chain);
        if !label.is_empty() {
            label.push_str(if self.style == CounterStyle::CustomBullet {
                "  "
            } else {
                " "
            });
        }
        let width = match (&self.custom_bullet_font, self.style) {
            (Some(family), CounterStyle::CustomBullet) => {
                let mut bullet_format = format.clone();
                bullet_format.family.clone_from(family);
                text_width(measure, &bullet_format, &label)
            }
            _ => text_width(measure, format, &label),
        };
        self.cache.width.set(Some(width));
        self.cache.width_key.replace(Some(format_key));
        width
    }
}

/// Format a counter label is measured in: the paragraph's first character
/// format, on the baseline.
pub fn label_format(reference: &Format) -> Format {
    let mut format = reference.clone();
    format.vertical_align = VerticalAlign::Normal;
    format
}

const ROMAN_UNITS: [&str; 10] = ["", "i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix"];
const ROMAN_TENS: [&str; 10] = ["", "x", "xx", "xxx", "xl", "l", "lx", "lxx", "lxxx", "xc"];
const ROMAN_HUNDREDS: [&str; 10] = ["", "c", "cc", "ccc", "cd", "d", "dc", "dcc", "dccc", "cm"];

/// Lower-case roman numeral. Non-positive values render in arabic.
pub fn to_roman(n: i32) -> String {
    if n <= 0 {
        return n.to_string();
    }
    let n = n as usize;
    let mut out = "m".repeat(n / 1000);
    out.push_str(ROMAN_HUNDREDS[(n / 100) % 10]);
    out.push_str(ROMAN_TENS[(n / 10) % 10]);
    out.push_str(ROMAN_UNITS[n % 10]);
    out
}

/// Bijective base-26 letters (a..z, aa..). Non-positive values render in arabic.
pub fn to_alpha(n: i32, upper: bool) -> String {
    if n <= 0 {
        return n.to_string();
    }
    let base = if upper { b'A' } else { b'a' };
    let mut n = n as u32;
    let mut letters = Vec::new();
    while n > 0 {
        let digit = (n - 1) % 26;
        letters.push(char::from(base + digit as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parse a roman numeral (either case).
pub fn from_roman(text: &str) -> Option<i32> {
    let lower = text.to_lowercase();
    let mut rest = lower.as_str();
    let mut value = 0;
    let thousands = rest.chars().take_while(|&c| c == 'm').count();
    rest = &rest[thousands..];
    value += thousands * 1000;
    for (table, base) in [(&ROMAN_HUNDREDS, 100), (&ROMAN_TENS, 10), (&ROMAN_UNITS, 1)] {
        if let Some((digit, symbol)) = table
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, symbol)| rest.starts_with(**symbol))
        {
            value += digit * base;
            rest = &rest[symbol.len()..];
        }
    }
    if value == 0 || !rest.is_empty() {
        return None;
    }
    i32::try_from(value).ok()
}

/// Parse bijective base-26 letters (either case).
pub fn from_alpha(text: &str) -> Option<i32> {
    if text.is_empty() {
        return None;
    }
    let mut value: i32 = 0;
    for c in text.chars() {
        let digit = match c {
            'a'..='z' => c as i32 - 'a' as i32 + 1,
            'A'..='Z' => c as i32 - 'A' as i32 + 1,
            _ => return None,
        };
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecChain(Vec<Option<Counter>>);

    impl ParagraphChain for VecChain {
        fn prev(&self, key: ParagraphKey) -> Option<ParagraphKey> {
            key.0.checked_sub(1).map(ParagraphKey)
        }

        fn counter(&self, key: ParagraphKey) -> Option<&Counter> {
            self.0.get(key.0).and_then(Option::as_ref)
        }

        fn is_rtl(&self, _key: ParagraphKey) -> bool {
            false
        }

        fn is_only_paragraph(&self, _key: ParagraphKey) -> bool {
            self.0.len() == 1
        }
    }

    fn label(chain: &VecChain, index: usize) -> String {
        let key = ParagraphKey(index);
        chain.counter(key).map(|c| c.text(key, chain)).unwrap_or_default()
    }

    #[test]
    fn test_numerals() {
        assert_eq!(to_roman(1), "i");
        assert_eq!(to_roman(4), "iv");
        assert_eq!(to_roman(1994), "mcmxciv");
        assert_eq!(to_alpha(1, false), "a");
        assert_eq!(to_alpha(26, false), "z");
        assert_eq!(to_alpha(27, true), "AA");
        assert_eq!(to_alpha(702, false), "zz");
        assert_eq!(from_roman("MCMXCIV"), Some(1994));
        assert_eq!(from_roman("iiii"), None);
        assert_eq!(from_alpha("aa"), Some(27));
        assert_eq!(from_alpha("a1"), None);
    }

    #[test]
    fn test_simple_list() {
        let chain = VecChain(vec![
            Some(Counter::default()),
            Some(Counter::default()),
            Some(Counter::default()),
        ]);
        assert_eq!(label(&chain, 0), "1.");
        assert_eq!(label(&chain, 1), "2.");
        assert_eq!(label(&chain, 2), "3.");
    }

    #[test]
    fn test_gap_without_counter_continues() {
        let chain = VecChain(vec![
            Some(Counter::default()),
            None,
            Some(Counter::default()),
        ]);
        assert_eq!(label(&chain, 2), "2.");
    }

    #[test]
    fn test_bullets_do_not_interrupt_numbering() {
        let chain = VecChain(vec![
            Some(Counter::default()),
            Some(Counter::bullet(CounterStyle::Disc).with_depth(0)),
            Some(Counter::default()),
        ]);
        assert_eq!(label(&chain, 1), "\u{2022}");
        assert_eq!(label(&chain, 2), "2.");
    }

    #[test]
    fn test_chapter_resets_list() {
        let chain = VecChain(vec![
            Some(Counter::default()),
            Some(Counter::chapter(0)),
            Some(Counter::default()),
        ]);
        assert_eq!(label(&chain, 2), "1.");
    }

    #[test]
    fn test_restart_and_start_number() {
        let chain = VecChain(vec![
            Some(Counter::default()),
            Some(Counter::default().with_start(5).with_restart(true)),
            Some(Counter::default()),
        ]);
        assert_eq!(label(&chain, 1), "5.");
        assert_eq!(label(&chain, 2), "6.");
    }

    #[test]
    fn test_chapter_levels() {
        let chain = VecChain(vec![
            Some(Counter::chapter(0)),
            Some(Counter::chapter(1)),
            Some(Counter::chapter(1)),
            Some(Counter::chapter(0)),
            Some(Counter::chapter(1).with_style(CounterStyle::AlphaLower)),
        ]);
        assert_eq!(label(&chain, 0), "1.");
        assert_eq!(label(&chain, 1), "1.1.");
        assert_eq!(label(&chain, 2), "1.2.");
        assert_eq!(label(&chain, 3), "2.");
        assert_eq!(label(&chain, 4), "2.a.");
    }

    #[test]
    fn test_skipped_levels_render_zero() {
        let chain = VecChain(vec![Some(Counter::chapter(0)), Some(Counter::chapter(2))]);
        assert_eq!(label(&chain, 1), "1.0.1.");
    }

    #[test]
    fn test_missing_top_level_parent() {
        let alone = VecChain(vec![Some(Counter::chapter(1))]);
        assert_eq!(label(&alone, 0), "1.1.");

        let chain = VecChain(vec![None, Some(Counter::chapter(1))]);
        assert_eq!(label(&chain, 1), "0.1.");
    }

    #[test]
    fn test_long_list_does_not_recurse() {
        let chain = VecChain((0..50_000).map(|_| Some(Counter::default())).collect());
        let key = ParagraphKey(49_999);
        let counter = chain.counter(key).unwrap();
        assert_eq!(counter.number(key, &chain), 50_000);
    }

    #[test]
    fn test_setters_invalidate_cache() {
        let mut chain = VecChain(vec![Some(Counter::default())]);
        assert_eq!(label(&chain, 0), "1.");
        chain.0[0].as_mut().unwrap().set_style(CounterStyle::RomanUpper);
        chain.0[0].as_mut().unwrap().set_start_number(4);
        assert_eq!(label(&chain, 0), "IV.");
    }

    #[test]
    fn test_width_includes_trailing_space() {
        let chain = VecChain(vec![Some(Counter::default())]);
        let key = ParagraphKey(0);
        let measure = crate::measure::CellMeasurer::default();
        let format = Format::new("Mono", 12);
        let counter = chain.counter(key).unwrap();
        // "1." + " " = 3 cells of 6px
        assert_eq!(counter.width(key, &chain, &measure, &format), 18);

        let bigger = format.clone().with_point_size(24);
        assert_eq!(counter.width(key, &chain, &measure, &bigger), 36);
    }

    #[test]
    fn test_equality_ignores_cache() {
        let chain = VecChain(vec![Some(Counter::default())]);
        label(&chain, 0);
        assert_eq!(chain.0[0].as_ref().unwrap(), &Counter::default());
    }
}
