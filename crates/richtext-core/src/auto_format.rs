//! Typing-time corrections: typographic quotes and list detection.
//!
//! Both rules are off by default and run inside
//! [`CommandExecutor`](crate::CommandExecutor), so their effects undo together
//! with the edit that triggered them.

use crate::counter::{Counter, CounterStyle};
use serde::{Deserialize, Serialize};

/// Opening and closing glyph of one quote kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypographicQuotes {
    /// Glyph that opens a quotation.
    pub begin: char,
    /// Glyph that closes a quotation.
    pub end: char,
}

impl TypographicQuotes {
    /// Pick the glyph for a quote typed after `previous`: opening at the start
    /// of a paragraph or after whitespace, closing otherwise.
    pub fn pick(self, previous: Option<char>) -> char {
        match previous {
            Some(ch) if !ch.is_whitespace() => self.end,
            _ => self.begin,
        }
    }
}

/// Which corrections run while typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFormatConfig {
    /// Replace typed `"` and `'` with typographic quotes.
    pub typographic_quotes: bool,
    /// Glyphs replacing `"`.
    pub double_quotes: TypographicQuotes,
    /// Glyphs replacing `'`.
    pub single_quotes: TypographicQuotes,
    /// Turn a paragraph starting with `* `, `- ` or `+ ` into a bullet item
    /// when it is ended.
    pub bullet_lists: bool,
    /// Bullet used for `* `; `None` uses a disc.
    pub bullet_char: Option<char>,
    /// Turn a paragraph starting with `<number><punctuation> ` into a
    /// numbered item when it is ended.
    pub numbered_lists: bool,
}

impl Default for AutoFormatConfig {
    fn default() -> Self {
        Self {
            typographic_quotes: false,
            double_quotes: TypographicQuotes {
                begin: '\u{201C}',
                end: '\u{201D}',
            },
            single_quotes: TypographicQuotes {
                begin: '\u{2018}',
                end: '\u{2019}',
            },
            bullet_lists: false,
            bullet_char: None,
            numbered_lists: false,
        }
    }
}

/// A list marker found at the start of a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMarker {
    /// Characters to remove from the paragraph start (marker and space).
    pub len: usize,
    /// Counter replacing the marker.
    pub counter: Counter,
}

impl AutoFormatConfig {
    /// Whether any rule is enabled.
    pub fn is_active(&self) -> bool {
        self.typographic_quotes || self.bullet_lists || self.numbered_lists
    }

    /// Replacement for `typed` when it is a single straight quote.
    pub fn quote_for(&self, typed: &str, previous: Option<char>) -> Option<char> {
        if !self.typographic_quotes {
            return None;
        }
        match typed {
            "\"" => Some(self.double_quotes.pick(previous)),
            "'" => Some(self.single_quotes.pick(previous)),
            _ => None,
        }
    }

    /// List marker at the start of `text`, the content of a paragraph that
    /// was just ended. Short paragraphs are left alone.
    pub fn detect_list(&self, text: &str) -> Option<ListMarker> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= 3 {
            return None;
        }
        if self.bullet_lists
            && let Some(marker) = self.bullet_marker(&chars)
        {
            return Some(marker);
        }
        if self.numbered_lists {
            return number_marker(&chars);
        }
        None
    }

    fn bullet_marker(&self, chars: &[char]) -> Option<ListMarker> {
        if !matches!(chars[0], '*' | '-' | '+') || !chars[1].is_whitespace() {
            return None;
        }
        let counter = match (chars[0], self.bullet_char) {
            ('*', None) => Counter::bullet(CounterStyle::Disc),
            ('*', Some(glyph)) | (glyph, _) => {
                Counter::bullet(CounterStyle::CustomBullet).with_custom_bullet(glyph, None)
            }
        };
        Some(ListMarker { len: 2, counter })
    }
}

fn number_marker(chars: &[char]) -> Option<ListMarker> {
    let word_len = chars.iter().position(|c| c.is_whitespace())?;
    if word_len < 2 {
        return None;
    }
    let punct = chars[word_len - 1];
    if !punct.is_ascii_punctuation() {
        return None;
    }
    let digits: String = chars[..word_len - 1].iter().collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let start: i32 = digits.parse().ok()?;
    let counter = Counter::list(CounterStyle::Arabic)
        .with_suffix(punct.to_string())
        .with_start(start);
    Some(ListMarker {
        len: word_len + 1,
        counter,
    })
}
