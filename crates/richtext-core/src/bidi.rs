//! Bidirectional text resolution for one visual line.
//!
//! Implements the explicit and implicit parts of the Unicode Bidirectional
//! Algorithm (UAX #9) used by the line formatter:
//!
//! - explicit embeddings and overrides (`LRE`, `RLE`, `LRO`, `RLO`, `PDF`),
//!   carried from line to line through a [`BidiContext`]
//! - weak type resolution (W1-W7)
//! - neutral resolution (N1-N2)
//! - implicit levels (I1-I2)
//! - trailing whitespace reset (L1)
//! - visual reordering of level runs (L2) and bracket mirroring (L4)
//!
//! Isolate controls (`LRI`, `RLI`, `FSI`, `PDI`) are treated as neutrals.
//! Character classes come from the `unicode-bidi` tables.

use unicode_bidi::{BidiClass, bidi_class};

/// Maximum explicit embedding depth.
pub const MAX_EMBEDDING_DEPTH: u8 = 61;

/// Resolved direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Left to right (even level).
    Ltr,
    /// Right to left (odd level).
    Rtl,
}

impl Direction {
    /// Direction of an embedding level.
    pub fn from_level(level: u8) -> Self {
        if level % 2 == 0 {
            Direction::Ltr
        } else {
            Direction::Rtl
        }
    }

    /// Base embedding level of a paragraph with this direction.
    pub fn base_level(self) -> u8 {
        match self {
            Direction::Ltr => 0,
            Direction::Rtl => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Embedding {
    level: u8,
    override_direction: Option<Direction>,
}

/// Explicit embedding state at a line boundary.
///
/// A fresh context is used at each paragraph start; within a paragraph the
/// context at the end of one line is the start context of the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidiContext {
    stack: Vec<Embedding>,
    overflow: usize,
}

impl BidiContext {
    /// Empty context (paragraph start).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open explicit embeddings.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Current embedding level given the paragraph base level.
    pub fn level(&self, base_level: u8) -> u8 {
        self.stack.last().map_or(base_level, |e| e.level)
    }

    fn override_direction(&self) -> Option<Direction> {
        self.stack.last().and_then(|e| e.override_direction)
    }
}

/// A maximal logical range of characters at one embedding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRun {
    /// First character (line-relative, inclusive).
    pub start: usize,
    /// End (line-relative, exclusive).
    pub end: usize,
    /// Embedding level.
    pub level: u8,
}

impl LevelRun {
    /// Resolved direction.
    pub fn direction(&self) -> Direction {
        Direction::from_level(self.level)
    }

    /// Number of characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the run is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Resolution result for one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidiLine {
    /// Resolved level per character.
    pub levels: Vec<u8>,
    /// Level runs in logical order.
    pub runs: Vec<LevelRun>,
    /// Indices into `runs`, in visual (left to right) order.
    pub visual_runs: Vec<usize>,
    /// Context to start the next line of the same paragraph with.
    pub end_context: BidiContext,
    mirrored: Vec<Option<char>>,
}

impl BidiLine {
    /// Line-relative character indices in visual order.
    pub fn visual_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.levels.len());
        for &run_index in &self.visual_runs {
            let run = self.runs[run_index];
            match run.direction() {
                Direction::Ltr => order.extend(run.start..run.end),
                Direction::Rtl => order.extend((run.start..run.end).rev()),
            }
        }
        order
    }

    /// Level runs in visual order.
    pub fn runs_in_visual_order(&self) -> impl Iterator<Item = &LevelRun> {
        self.visual_runs.iter().map(|&i| &self.runs[i])
    }

    /// Whether the character at `index` is displayed right to left.
    pub fn is_rtl(&self, index: usize) -> bool {
        self.levels
            .get(index)
            .is_some_and(|&level| Direction::from_level(level) == Direction::Rtl)
    }

    /// Mirrored glyph to display for `index`, if the character is mirrored.
    pub fn mirrored(&self, index: usize) -> Option<char> {
        self.mirrored.get(index).copied().flatten()
    }

    /// Whether every character is at an even level and the order is logical.
    pub fn is_pure_ltr(&self) -> bool {
        self.levels.iter().all(|level| level % 2 == 0)
    }
}

/// Mirror image of a paired glyph (Bidi_Mirroring_Glyph subset).
pub fn mirror_char(ch: char) -> Option<char> {
    const PAIRS: &[(char, char)] = &[
        ('(', ')'),
        ('[', ']'),
        ('{', '}'),
        ('<', '>'),
        ('\u{00AB}', '\u{00BB}'),
        ('\u{2039}', '\u{203A}'),
        ('\u{2045}', '\u{2046}'),
        ('\u{207D}', '\u{207E}'),
        ('\u{208D}', '\u{208E}'),
        ('\u{2264}', '\u{2265}'),
        ('\u{2208}', '\u{220B}'),
        ('\u{3008}', '\u{3009}'),
        ('\u{300A}', '\u{300B}'),
        ('\u{300C}', '\u{300D}'),
        ('\u{FF08}', '\u{FF09}'),
    ];
    PAIRS.iter().find_map(|&(open, close)| {
        if ch == open {
            Some(close)
        } else if ch == close {
            Some(open)
        } else {
            None
        }
    })
}

/// Direction of the first strong character (rules P2/P3), if any.
pub fn paragraph_direction(chars: &[char]) -> Option<Direction> {
    chars.iter().find_map(|&ch| match bidi_class(ch) {
        BidiClass::L => Some(Direction::Ltr),
        BidiClass::R | BidiClass::AL => Some(Direction::Rtl),
        _ => None,
    })
}

fn is_removed_by_x9(class: BidiClass) -> bool {
    matches!(
        class,
        BidiClass::RLE
            | BidiClass::LRE
            | BidiClass::RLO
            | BidiClass::LRO
            | BidiClass::PDF
            | BidiClass::BN
    )
}

fn is_neutral(class: BidiClass) -> bool {
    matches!(
        class,
        BidiClass::B | BidiClass::S | BidiClass::WS | BidiClass::ON
    )
}

/// Strong direction of a resolved class for rule N1 (numbers count as R).
fn strong_for_neutrals(class: BidiClass) -> Option<Direction> {
    match class {
        BidiClass::L => Some(Direction::Ltr),
        BidiClass::R | BidiClass::AL | BidiClass::EN | BidiClass::AN => Some(Direction::Rtl),
        _ => None,
    }
}

fn strong_class(direction: Direction) -> BidiClass {
    match direction {
        Direction::Ltr => BidiClass::L,
        Direction::Rtl => BidiClass::R,
    }
}

/// Stateless resolver for lines of text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BidiResolver;

impl BidiResolver {
    /// Resolve one line.
    ///
    /// `base_level` is the paragraph embedding level (0 or 1); `context` is the
    /// explicit embedding state inherited from the previous line.
    pub fn resolve(chars: &[char], base_level: u8, context: &BidiContext) -> BidiLine {
        let len = chars.len();
        let original: Vec<BidiClass> = chars
            .iter()
            .map(|&ch| match bidi_class(ch) {
                BidiClass::LRI | BidiClass::RLI | BidiClass::FSI | BidiClass::PDI => BidiClass::ON,
                class => class,
            })
            .collect();

        let mut ctx = context.clone();
        let mut levels = vec![base_level; len];
        let mut classes = original.clone();
        Self::resolve_explicit(&original, base_level, &mut ctx, &mut levels, &mut classes);

        let sequences = Self::level_sequences(&classes, &levels);
        for (index, seq) in sequences.iter().enumerate() {
            let level = levels[seq[0]];
            let prev_level = if index == 0 {
                base_level
            } else {
                levels[sequences[index - 1][0]]
            };
            let next_level = sequences
                .get(index + 1)
                .map_or(base_level, |next| levels[next[0]]);
            let sos = Direction::from_level(level.max(prev_level));
            let eos = Direction::from_level(level.max(next_level));
            Self::resolve_weak(seq, &mut classes, sos);
            Self::resolve_neutral(seq, &mut classes, level, sos, eos);
            Self::resolve_implicit(seq, &classes, &mut levels);
        }

        Self::fill_removed_levels(&original, base_level, &mut levels);
        Self::reset_whitespace(&original, base_level, &mut levels);

        let runs = Self::level_runs(&levels);
        let visual_runs = Self::reorder(&runs);
        let mirrored = chars
            .iter()
            .zip(&levels)
            .map(|(&ch, &level)| {
                if level % 2 == 1 {
                    mirror_char(ch)
                } else {
                    None
                }
            })
            .collect();

        BidiLine {
            levels,
            runs,
            visual_runs,
            end_context: ctx,
            mirrored,
        }
    }

    fn resolve_explicit(
        original: &[BidiClass],
        base_level: u8,
        ctx: &mut BidiContext,
        levels: &mut [u8],
        classes: &mut [BidiClass],
    ) {
        for (i, &class) in original.iter().enumerate() {
            let current = ctx.level(base_level);
            match class {
                BidiClass::RLE | BidiClass::LRE | BidiClass::RLO | BidiClass::LRO => {
                    let rtl = matches!(class, BidiClass::RLE | BidiClass::RLO);
                    let next = if rtl {
                        (current + 1) | 1
                    } else {
                        (current + 2) & !1
                    };
                    if next <= MAX_EMBEDDING_DEPTH && ctx.overflow == 0 {
                        let override_direction = match class {
                            BidiClass::RLO => Some(Direction::Rtl),
                            BidiClass::LRO => Some(Direction::Ltr),
                            _ => None,
                        };
                        ctx.stack.push(Embedding {
                            level: next,
                            override_direction,
                        });
                    } else {
                        ctx.overflow += 1;
                    }
                    levels[i] = current;
                    classes[i] = BidiClass::BN;
                }
                BidiClass::PDF => {
                    if ctx.overflow > 0 {
                        ctx.overflow -= 1;
                    } else {
                        ctx.stack.pop();
                    }
                    levels[i] = current;
                    classes[i] = BidiClass::BN;
                }
                BidiClass::B => {
                    levels[i] = base_level;
                }
                BidiClass::BN => {
                    levels[i] = current;
                }
                _ => {
                    levels[i] = current;
                    if let Some(direction) = ctx.override_direction() {
                        classes[i] = strong_class(direction);
                    }
                }
            }
        }
    }

    /// Maximal same-level sequences of characters that survive rule X9.
    fn level_sequences(classes: &[BidiClass], levels: &[u8]) -> Vec<Vec<usize>> {
        let mut sequences: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for i in 0..classes.len() {
            if is_removed_by_x9(classes[i]) {
                continue;
            }
            if let Some(&last) = current.last()
                && levels[last] != levels[i]
            {
                sequences.push(std::mem::take(&mut current));
            }
            current.push(i);
        }
        if !current.is_empty() {
            sequences.push(current);
        }
        sequences
    }

    fn resolve_weak(seq: &[usize], classes: &mut [BidiClass], sos: Direction) {
        // W1
        let mut prev = strong_class(sos);
        for &i in seq {
            if classes[i] == BidiClass::NSM {
                classes[i] = prev;
            }
            prev = classes[i];
        }

        // W2
        let mut last_strong = strong_class(sos);
        for &i in seq {
            match classes[i] {
                BidiClass::L | BidiClass::R | BidiClass::AL => last_strong = classes[i],
                BidiClass::EN if last_strong == BidiClass::AL => classes[i] = BidiClass::AN,
                _ => {}
            }
        }

        // W3
        for &i in seq {
            if classes[i] == BidiClass::AL {
                classes[i] = BidiClass::R;
            }
        }

        // W4
        for k in 1..seq.len().saturating_sub(1) {
            let (before, here, after) = (classes[seq[k - 1]], classes[seq[k]], classes[seq[k + 1]]);
            match here {
                BidiClass::ES if before == BidiClass::EN && after == BidiClass::EN => {
                    classes[seq[k]] = BidiClass::EN;
                }
                BidiClass::CS
                    if before == after && matches!(before, BidiClass::EN | BidiClass::AN) =>
                {
                    classes[seq[k]] = before;
                }
                _ => {}
            }
        }

        // W5
        let mut k = 0;
        while k < seq.len() {
            if classes[seq[k]] != BidiClass::ET {
                k += 1;
                continue;
            }
            let start = k;
            while k < seq.len() && classes[seq[k]] == BidiClass::ET {
                k += 1;
            }
            let before_is_en = start > 0 && classes[seq[start - 1]] == BidiClass::EN;
            let after_is_en = k < seq.len() && classes[seq[k]] == BidiClass::EN;
            if before_is_en || after_is_en {
                for &i in &seq[start..k] {
                    classes[i] = BidiClass::EN;
                }
            }
        }

        // W6
        for &i in seq {
            if matches!(classes[i], BidiClass::ES | BidiClass::ET | BidiClass::CS) {
                classes[i] = BidiClass::ON;
            }
        }

        // W7
        let mut last_strong = strong_class(sos);
        for &i in seq {
            match classes[i] {
                BidiClass::L | BidiClass::R => last_strong = classes[i],
                BidiClass::EN if last_strong == BidiClass::L => classes[i] = BidiClass::L,
                _ => {}
            }
        }
    }

    fn resolve_neutral(
        seq: &[usize],
        classes: &mut [BidiClass],
        level: u8,
        sos: Direction,
        eos: Direction,
    ) {
        let embedding = Direction::from_level(level);
        let mut k = 0;
        while k < seq.len() {
            if !is_neutral(classes[seq[k]]) {
                k += 1;
                continue;
            }
            let start = k;
            while k < seq.len() && is_neutral(classes[seq[k]]) {
                k += 1;
            }
            let before = if start == 0 {
                Some(sos)
            } else {
                strong_for_neutrals(classes[seq[start - 1]])
            };
            let after = if k == seq.len() {
                Some(eos)
            } else {
                strong_for_neutrals(classes[seq[k]])
            };
            let resolved = match (before, after) {
                (Some(b), Some(a)) if b == a => b,
                _ => embedding,
            };
            for &i in &seq[start..k] {
                classes[i] = strong_class(resolved);
            }
        }
    }

    fn resolve_implicit(seq: &[usize], classes: &[BidiClass], levels: &mut [u8]) {
        for &i in seq {
            let level = levels[i];
            let raise = if level % 2 == 0 {
                match classes[i] {
                    BidiClass::R => 1,
                    BidiClass::AN | BidiClass::EN => 2,
                    _ => 0,
                }
            } else {
                match classes[i] {
                    BidiClass::L | BidiClass::EN | BidiClass::AN => 1,
                    _ => 0,
                }
            };
            levels[i] = level + raise;
        }
    }

    /// Characters removed by X9 take the level of the preceding character.
    fn fill_removed_levels(original: &[BidiClass], base_level: u8, levels: &mut [u8]) {
        let mut prev = base_level;
        for i in 0..original.len() {
            if is_removed_by_x9(original[i]) {
                levels[i] = prev;
            } else {
                prev = levels[i];
            }
        }
    }

    /// Rule L1: separators and trailing whitespace return to the base level.
    fn reset_whitespace(original: &[BidiClass], base_level: u8, levels: &mut [u8]) {
        let is_whitespace_like =
            |class: BidiClass| class == BidiClass::WS || is_removed_by_x9(class);
        let mut trailing = true;
        for i in (0..original.len()).rev() {
            let class = original[i];
            if matches!(class, BidiClass::S | BidiClass::B) {
                levels[i] = base_level;
                trailing = true;
            } else if trailing && is_whitespace_like(class) {
                levels[i] = base_level;
            } else {
                trailing = false;
            }
        }
    }

    fn level_runs(levels: &[u8]) -> Vec<LevelRun> {
        let mut runs: Vec<LevelRun> = Vec::new();
        for (i, &level) in levels.iter().enumerate() {
            match runs.last_mut() {
                Some(run) if run.level == level => run.end = i + 1,
                _ => runs.push(LevelRun {
                    start: i,
                    end: i + 1,
                    level,
                }),
            }
        }
        runs
    }

    /// Rule L2: from the highest level down to the lowest odd level, reverse
    /// every maximal sequence of runs at that level or higher.
    fn reorder(runs: &[LevelRun]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..runs.len()).collect();
        let Some(max_level) = runs.iter().map(|r| r.level).max() else {
            return order;
        };
        let Some(min_odd) = runs.iter().map(|r| r.level).filter(|l| l % 2 == 1).min() else {
            return order;
        };
        let mut level = max_level;
        while level >= min_odd {
            let mut k = 0;
            while k < order.len() {
                if runs[order[k]].level < level {
                    k += 1;
                    continue;
                }
                let start = k;
                while k < order.len() && runs[order[k]].level >= level {
                    k += 1;
                }
                order[start..k].reverse();
            }
            if level == 0 {
                break;
            }
            level -= 1;
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str, base: u8) -> BidiLine {
        let chars: Vec<char> = text.chars().collect();
        BidiResolver::resolve(&chars, base, &BidiContext::new())
    }

    #[test]
    fn test_pure_ltr_is_logical() {
        let line = resolve("hello world", 0);
        assert!(line.is_pure_ltr());
        assert_eq!(line.visual_order(), (0..11).collect::<Vec<_>>());
        assert_eq!(line.runs.len(), 1);
    }

    #[test]
    fn test_rtl_word_between_ltr() {
        // A + hebrew "shalom" + B
        let line = resolve("A\u{05E9}\u{05DC}\u{05D5}\u{05DD}B", 0);
        assert_eq!(line.levels, vec![0, 1, 1, 1, 1, 0]);
        assert_eq!(line.visual_order(), vec![0, 4, 3, 2, 1, 5]);
    }

    #[test]
    fn test_numbers_in_rtl_paragraph() {
        let line = resolve("\u{05E9}\u{05DC} 12", 1);
        assert_eq!(line.levels, vec![1, 1, 1, 2, 2]);
        assert_eq!(line.visual_order(), vec![3, 4, 2, 1, 0]);
    }

    #[test]
    fn test_trailing_whitespace_resets() {
        let line = resolve("\u{05E9}\u{05DC}  ", 0);
        assert_eq!(line.levels, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_mirroring_in_rtl_run() {
        let line = resolve("\u{05E9}(\u{05DC})", 1);
        assert_eq!(line.mirrored(1), Some(')'));
        assert_eq!(line.mirrored(3), Some('('));
        let ltr = resolve("a(b)", 0);
        assert_eq!(ltr.mirrored(1), None);
    }

    #[test]
    fn test_embedding_carries_across_lines() {
        let first: Vec<char> = "ab\u{202B}cd".chars().collect();
        let line1 = BidiResolver::resolve(&first, 0, &BidiContext::new());
        assert_eq!(line1.end_context.depth(), 1);
        assert_eq!(line1.levels[3], 2);

        let second: Vec<char> = "ef\u{202C}gh".chars().collect();
        let line2 = BidiResolver::resolve(&second, 0, &line1.end_context);
        assert_eq!(line2.levels[0], 2);
        assert_eq!(line2.levels[4], 0);
        assert_eq!(line2.end_context.depth(), 0);
    }

    #[test]
    fn test_override_forces_direction() {
        let line = resolve("\u{202E}abc\u{202C}", 0);
        assert_eq!(&line.levels[1..4], &[1, 1, 1]);
        let order = line.visual_order();
        assert_eq!(&order[1..4], &[3, 2, 1]);
    }

    #[test]
    fn test_paragraph_direction() {
        let hebrew: Vec<char> = "123 \u{05D0}bc".chars().collect();
        assert_eq!(paragraph_direction(&hebrew), Some(Direction::Rtl));
        let none: Vec<char> = "123 ...".chars().collect();
        assert_eq!(paragraph_direction(&none), None);
    }
}
