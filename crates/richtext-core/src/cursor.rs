//! Caret movement.
//!
//! Logical moves walk character indices and cross paragraph boundaries.
//! Visual moves (`Left`/`Right`) follow the direction of the text under the
//! caret: in right-to-left text, moving right goes logically backward.

use crate::bidi::{BidiContext, BidiResolver};
use crate::document::{Document, Position};
use crate::error::{EngineError, Result};
use crate::formatter::base_level;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A caret movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorMove {
    /// One character to the left on screen.
    Left,
    /// One character to the right on screen.
    Right,
    /// One character forward in logical order.
    Forward,
    /// One character backward in logical order.
    Backward,
    /// To the next word boundary.
    WordForward,
    /// To the previous word boundary.
    WordBackward,
    /// To the start of the visual line.
    LineStart,
    /// To the end of the visual line.
    LineEnd,
}

impl Document {
    /// Position reached from `pos` by `movement`. Positions at the document
    /// edges stay put.
    pub fn move_cursor(&mut self, pos: Position, movement: CursorMove) -> Result<Position> {
        let len = self.paragraph(pos.paragraph)?.len();
        if pos.index > len {
            return Err(EngineError::IndexOutOfRange {
                index: pos.index,
                len,
            });
        }
        match movement {
            CursorMove::Forward => self.step_forward(pos),
            CursorMove::Backward => self.step_backward(pos),
            CursorMove::Right => {
                if self.is_rtl_at(pos)? {
                    self.step_backward(pos)
                } else {
                    self.step_forward(pos)
                }
            }
            CursorMove::Left => {
                if self.is_rtl_at(pos)? {
                    self.step_forward(pos)
                } else {
                    self.step_backward(pos)
                }
            }
            CursorMove::WordForward => {
                if pos.index == len {
                    return self.step_forward(pos);
                }
                let next = self
                    .word_boundaries(pos.paragraph)?
                    .into_iter()
                    .find(|&b| b > pos.index)
                    .unwrap_or(len);
                Ok(Position::new(pos.paragraph, next))
            }
            CursorMove::WordBackward => {
                if pos.index == 0 {
                    return self.step_backward(pos);
                }
                let prev = self
                    .word_boundaries(pos.paragraph)?
                    .into_iter()
                    .rev()
                    .find(|&b| b < pos.index)
                    .unwrap_or(0);
                Ok(Position::new(pos.paragraph, prev))
            }
            CursorMove::LineStart | CursorMove::LineEnd => {
                self.ensure_formatted(pos.paragraph)?;
                let paragraph = self.paragraph(pos.paragraph)?;
                let Some((start, end)) = paragraph
                    .line_of(pos.index)
                    .and_then(|line| paragraph.line_range(line))
                else {
                    return Ok(pos);
                };
                if movement == CursorMove::LineStart {
                    return Ok(Position::new(pos.paragraph, start));
                }
                if end > len {
                    return Ok(Position::new(pos.paragraph, len));
                }
                let ends_in_space = paragraph
                    .run()
                    .at(end - 1)
                    .is_ok_and(|c| c.ch().is_whitespace());
                let index = if ends_in_space && end > start {
                    end - 1
                } else {
                    end
                };
                Ok(Position::new(pos.paragraph, index))
            }
        }
    }

    fn step_forward(&self, pos: Position) -> Result<Position> {
        let len = self.paragraph(pos.paragraph)?.len();
        if pos.index < len {
            Ok(Position::new(pos.paragraph, pos.index + 1))
        } else if pos.paragraph + 1 < self.paragraph_count() {
            Ok(Position::new(pos.paragraph + 1, 0))
        } else {
            Ok(pos)
        }
    }

    fn step_backward(&self, pos: Position) -> Result<Position> {
        if pos.index > 0 {
            Ok(Position::new(pos.paragraph, pos.index - 1))
        } else if pos.paragraph > 0 {
            let prev = pos.paragraph - 1;
            Ok(Position::new(prev, self.paragraph(prev)?.len()))
        } else {
            Ok(pos)
        }
    }

    /// Whether the text under the caret runs right to left: the character
    /// after the caret, or before it at the paragraph end, or the paragraph
    /// direction when it is empty.
    fn is_rtl_at(&self, pos: Position) -> Result<bool> {
        let paragraph = self.paragraph(pos.paragraph)?;
        let glyphs = paragraph.run().glyphs();
        let content = &glyphs[..paragraph.len()];
        let base = base_level(paragraph.layout(), content);
        if content.is_empty() {
            return Ok(base % 2 == 1);
        }
        let line = BidiResolver::resolve(content, base, &BidiContext::new());
        let at = pos.index.min(content.len() - 1);
        Ok(line.is_rtl(at))
    }

    /// Character indices where words (and the gaps between them) start,
    /// plus the paragraph length.
    fn word_boundaries(&self, id: usize) -> Result<Vec<usize>> {
        let paragraph = self.paragraph(id)?;
        let text = paragraph.text();
        let mut boundaries = Vec::new();
        let mut chars = 0;
        let mut bytes = 0;
        for (offset, _) in text.split_word_bound_indices() {
            chars += text[bytes..offset].chars().count();
            bytes = offset;
            boundaries.push(chars);
        }
        boundaries.push(paragraph.len());
        Ok(boundaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_moves_cross_paragraphs() {
        let mut doc = Document::from_text("ab\ncd").unwrap();
        let end_of_first = Position::new(0, 2);
        assert_eq!(
            doc.move_cursor(end_of_first, CursorMove::Forward).unwrap(),
            Position::new(1, 0)
        );
        assert_eq!(
            doc.move_cursor(Position::new(1, 0), CursorMove::Backward).unwrap(),
            end_of_first
        );
        assert_eq!(
            doc.move_cursor(Position::new(0, 0), CursorMove::Backward).unwrap(),
            Position::new(0, 0)
        );
        assert_eq!(
            doc.move_cursor(Position::new(1, 2), CursorMove::Forward).unwrap(),
            Position::new(1, 2)
        );
    }

    #[test]
    fn test_word_moves() {
        let mut doc = Document::from_text("hello world").unwrap();
        let mut pos = Position::new(0, 0);
        let mut stops = Vec::new();
        for _ in 0..3 {
            pos = doc.move_cursor(pos, CursorMove::WordForward).unwrap();
            stops.push(pos.index);
        }
        assert_eq!(stops, vec![5, 6, 11]);
        pos = doc.move_cursor(pos, CursorMove::WordBackward).unwrap();
        assert_eq!(pos.index, 6);
    }

    #[test]
    fn test_right_moves_backward_in_rtl_text() {
        let mut doc = Document::from_text("\u{05E9}\u{05DC}\u{05D5}\u{05DD}").unwrap();
        let pos = Position::new(0, 2);
        assert_eq!(
            doc.move_cursor(pos, CursorMove::Right).unwrap(),
            Position::new(0, 1)
        );
        assert_eq!(
            doc.move_cursor(pos, CursorMove::Left).unwrap(),
            Position::new(0, 3)
        );
    }

    #[test]
    fn test_line_start_and_end() {
        let mut doc = Document::from_text("hello world foo").unwrap();
        doc.set_width(48).unwrap();
        let pos = Position::new(0, 8);
        assert_eq!(
            doc.move_cursor(pos, CursorMove::LineStart).unwrap(),
            Position::new(0, 6)
        );
        assert_eq!(
            doc.move_cursor(pos, CursorMove::LineEnd).unwrap(),
            Position::new(0, 11)
        );
        assert_eq!(
            doc.move_cursor(Position::new(0, 13), CursorMove::LineEnd).unwrap(),
            Position::new(0, 15)
        );
    }
}
