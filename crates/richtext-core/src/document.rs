//! The document: an ordered chain of paragraphs plus the services they share.
//!
//! Paragraphs live in an arena and link to their neighbours by
//! [`ParagraphKey`]. Hosts address them by chain position (the paragraph
//! `id`), which is renumbered after every structural edit.
//!
//! Every edit invalidates the affected paragraphs and records the lowest one
//! touched; [`Document::format_more`] picks up from there.

use crate::config::EngineConfig;
use crate::counter::{Counter, ParagraphChain, label_format};
use crate::custom_item::{
    CustomItem, ExternalId, ExternalRelations, OBJECT_REPLACEMENT_CHAR, VariableContext,
    VariableKind,
};
use crate::error::{EngineError, Result};
use crate::format::{Format, FormatCollection, FormatFlags, FormatHandle};
use crate::formatter::{Flow, Formatter, base_level};
use crate::measure::{CellMeasurer, TextMeasure, WidthCache};
use crate::paragraph::{Paragraph, ParagraphKey};
use crate::paragraph_layout::{Alignment, LayoutFlags, ParagraphLayout};
use crate::rich_text::RichText;
use crate::run::{CharacterRun, StyledChar};
use crate::style::{ParagraphStyle, StyleCollection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// A caret position: paragraph id and character index (`0..=len`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Paragraph id (chain position).
    pub paragraph: usize,
    /// Character index inside the paragraph.
    pub index: usize,
}

impl Position {
    /// Create a position.
    pub const fn new(paragraph: usize, index: usize) -> Self {
        Self { paragraph, index }
    }
}

/// A range between two positions. `end` must not precede `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    /// First position (inclusive).
    pub start: Position,
    /// Last position (exclusive).
    pub end: Position,
}

impl TextRange {
    /// Create a range.
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A range inside one paragraph.
    pub const fn within(paragraph: usize, start: usize, end: usize) -> Self {
        Self {
            start: Position::new(paragraph, start),
            end: Position::new(paragraph, end),
        }
    }

    /// Whether the range covers nothing.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FragmentPiece {
    pub(crate) run: CharacterRun,
    pub(crate) layout: ParagraphLayout,
    pub(crate) terminator: FormatHandle,
}

/// Content removed from or copied out of a document.
///
/// Holds one piece per paragraph the range touched. Every piece after the
/// first begins a new paragraph when the fragment is inserted, and carries
/// the layout and terminator format that paragraph had.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub(crate) pieces: Vec<FragmentPiece>,
}

impl Fragment {
    /// Number of characters, counting each paragraph break as one.
    pub fn len(&self) -> usize {
        let chars: usize = self.pieces.iter().map(|piece| piece.run.len()).sum();
        chars + self.pieces.len().saturating_sub(1)
    }

    /// Whether the fragment holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of paragraphs touched.
    pub fn paragraph_count(&self) -> usize {
        self.pieces.len()
    }

    /// The character runs, one per paragraph.
    pub fn runs(&self) -> impl Iterator<Item = &CharacterRun> + '_ {
        self.pieces.iter().map(|piece| &piece.run)
    }

    /// Plain text with paragraphs joined by `'\n'`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (i, piece) in self.pieces.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_plain(piece.run.as_slice(), &mut out);
        }
        out
    }

    /// Ids of every anchored entity in the fragment.
    pub fn external_ids(&self) -> Vec<ExternalId> {
        self.pieces
            .iter()
            .flat_map(|piece| piece.run.iter())
            .filter_map(|c| c.custom_item().and_then(CustomItem::external_id))
            .collect()
    }

    /// Position right after the fragment once inserted at `start`.
    pub(crate) fn end_after(&self, start: Position) -> Position {
        match self.pieces.as_slice() {
            [] => start,
            [only] => Position::new(start.paragraph, start.index + only.run.len()),
            [.., last] => Position::new(start.paragraph + self.pieces.len() - 1, last.run.len()),
        }
    }
}

/// Append the plain-text rendering of `chars` to `out`.
pub(crate) fn render_plain(chars: &[StyledChar], out: &mut String) {
    for c in chars {
        match c {
            StyledChar::Regular { ch, .. } => out.push(*ch),
            StyledChar::Custom { item, .. } => match item.display_text() {
                Some(text) => out.push_str(text),
                None => out.push(OBJECT_REPLACEMENT_CHAR),
            },
        }
    }
}

/// Prior formats of one paragraph slice, captured by [`Document::set_format`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSnapshot {
    pub(crate) paragraph: usize,
    pub(crate) start: usize,
    pub(crate) formats: Vec<FormatHandle>,
    pub(crate) terminator: Option<FormatHandle>,
}

/// Prior state of one paragraph, captured by [`Document::apply_paragraph_style`].
#[derive(Debug, Clone, PartialEq)]
pub struct StyleChange {
    pub(crate) paragraph: usize,
    pub(crate) layout: ParagraphLayout,
    pub(crate) formats: Vec<FormatSnapshot>,
}

/// A rich-text document.
///
/// Holds `Rc` format handles and is therefore neither `Send` nor `Sync`:
/// one thread drives it at a time.
pub struct Document {
    nodes: Vec<Option<Paragraph>>,
    free: Vec<usize>,
    head: ParagraphKey,
    tail: ParagraphKey,
    order: Vec<ParagraphKey>,
    formats: FormatCollection,
    styles: StyleCollection,
    measure: Box<dyn TextMeasure>,
    widths: WidthCache,
    flow: Option<Box<dyn Flow>>,
    relations: Option<Box<dyn ExternalRelations>>,
    config: EngineConfig,
    pub(crate) reflow_from: Option<usize>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("paragraphs", &self.order.len())
            .field("formats", &self.formats)
            .field("config", &self.config)
            .field("reflow_from", &self.reflow_from)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Create a document with the default configuration: one empty paragraph.
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Create a document with a validated configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a document holding `text` in the default format. Each `'\n'`
    /// starts a new paragraph.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut document = Self::new();
        let format = document.config.default_format.clone();
        document.insert_text(Position::default(), text, &format)?;
        Ok(document)
    }

    fn build(config: EngineConfig) -> Self {
        let formats = FormatCollection::new(config.default_format.clone());
        let first = Paragraph::new(0, formats.default_format(), ParagraphLayout::default());
        Self {
            nodes: vec![Some(first)],
            free: Vec::new(),
            head: ParagraphKey(0),
            tail: ParagraphKey(0),
            order: vec![ParagraphKey(0)],
            styles: StyleCollection::new(config.default_format.clone()),
            formats,
            measure: Box::new(CellMeasurer::default()),
            widths: WidthCache::new(),
            flow: None,
            relations: None,
            config,
            reflow_from: Some(0),
        }
    }

    // ---- collaborators -------------------------------------------------

    /// Replace the text measurement capability. Invalidates every paragraph.
    pub fn set_measure(&mut self, measure: Box<dyn TextMeasure>) {
        self.measure = measure;
        self.widths.clear();
        self.invalidate_all();
    }

    /// Install or remove the flow collaborator. Invalidates every paragraph.
    pub fn set_flow(&mut self, flow: Option<Box<dyn Flow>>) {
        self.flow = flow;
        self.invalidate_all();
    }

    /// Install or remove the host side of the anchor relation, returning the
    /// previous one.
    pub fn set_relations(
        &mut self,
        relations: Option<Box<dyn ExternalRelations>>,
    ) -> Option<Box<dyn ExternalRelations>> {
        let old = std::mem::replace(&mut self.relations, relations);
        self.invalidate_all();
        old
    }

    /// Change the layout width. Invalidates every paragraph.
    pub fn set_width(&mut self, width: i32) -> Result<()> {
        if width <= 0 {
            return Err(EngineError::Config(format!(
                "document_width must be positive, got {width}"
            )));
        }
        if width != self.config.document_width {
            self.config.document_width = width;
            self.invalidate_all();
        }
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mark every paragraph stale.
    pub fn invalidate_all(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            if let Some(counter) = &node.layout().counter {
                counter.invalidate();
            }
            for item in node.run().iter().filter_map(StyledChar::custom_item) {
                item.invalidate();
            }
            node.invalidate(0);
        }
        self.reflow_from = Some(0);
    }

    // ---- access ----------------------------------------------------------

    /// Number of paragraphs (never zero).
    pub fn paragraph_count(&self) -> usize {
        self.order.len()
    }

    /// Paragraph with chain position `id`.
    pub fn paragraph(&self, id: usize) -> Result<&Paragraph> {
        self.node(self.key_of(id)?)
    }

    /// Paragraphs in chain order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.nodes.get(key.0).and_then(Option::as_ref))
    }

    /// The format collection.
    pub fn formats(&self) -> &FormatCollection {
        &self.formats
    }

    /// Intern `format` in the document's collection.
    pub fn intern(&mut self, format: &Format) -> FormatHandle {
        self.formats.intern(format)
    }

    /// Drop formats no character references any more.
    pub fn collect_garbage(&mut self) {
        self.formats.collect_garbage();
        let formats = &self.formats;
        self.widths.retain_keys(|key| formats.contains_key(key));
    }

    /// Position after the last character.
    pub fn end_position(&self) -> Position {
        let last = self.order.len() - 1;
        let len = self.paragraph(last).map_or(0, Paragraph::len);
        Position::new(last, len)
    }

    /// Range covering the whole document.
    pub fn full_range(&self) -> TextRange {
        TextRange::new(Position::default(), self.end_position())
    }

    /// Bottom of the last paragraph as of the last format.
    pub fn height(&self) -> i32 {
        self.node(self.tail).map_or(0, Paragraph::bottom)
    }

    /// Format text typed at `pos` would take.
    pub fn format_at(&self, pos: Position) -> Result<Format> {
        self.check_position(pos)?;
        Ok(self.paragraph(pos.paragraph)?.format_at(pos.index).format().clone())
    }

    /// Ids of paragraphs changed since the last call, clearing their flags.
    pub fn take_changed(&mut self) -> Vec<usize> {
        let mut changed = Vec::new();
        for key in &self.order {
            if let Some(Some(paragraph)) = self.nodes.get_mut(key.0)
                && paragraph.is_changed()
            {
                paragraph.clear_changed();
                changed.push(paragraph.id());
            }
        }
        changed
    }

    // ---- arena -----------------------------------------------------------

    pub(crate) fn key_of(&self, id: usize) -> Result<ParagraphKey> {
        self.order
            .get(id)
            .copied()
            .ok_or(EngineError::UnknownParagraph(id))
    }

    pub(crate) fn node(&self, key: ParagraphKey) -> Result<&Paragraph> {
        self.nodes
            .get(key.0)
            .and_then(Option::as_ref)
            .ok_or(EngineError::UnknownParagraph(key.0))
    }

    pub(crate) fn node_mut(&mut self, key: ParagraphKey) -> Result<&mut Paragraph> {
        self.nodes
            .get_mut(key.0)
            .and_then(Option::as_mut)
            .ok_or(EngineError::UnknownParagraph(key.0))
    }

    fn alloc(&mut self, paragraph: Paragraph) -> ParagraphKey {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(paragraph);
                ParagraphKey(slot)
            }
            None => {
                self.nodes.push(Some(paragraph));
                ParagraphKey(self.nodes.len() - 1)
            }
        }
    }

    fn link_after(&mut self, prev: ParagraphKey, key: ParagraphKey) -> Result<()> {
        let next = self.node(prev)?.next;
        {
            let node = self.node_mut(key)?;
            node.prev = Some(prev);
            node.next = next;
        }
        self.node_mut(prev)?.next = Some(key);
        match next {
            Some(next) => self.node_mut(next)?.prev = Some(key),
            None => self.tail = key,
        }
        Ok(())
    }

    /// Detach `key` from the chain and return it. The head is never unlinked.
    fn unlink(&mut self, key: ParagraphKey) -> Result<Paragraph> {
        let (prev, next) = {
            let node = self.node(key)?;
            (node.prev, node.next)
        };
        let Some(prev) = prev else {
            return Err(EngineError::UnknownParagraph(key.0));
        };
        self.node_mut(prev)?.next = next;
        match next {
            Some(next) => self.node_mut(next)?.prev = Some(prev),
            None => self.tail = prev,
        }
        let paragraph = self.nodes[key.0]
            .take()
            .ok_or(EngineError::UnknownParagraph(key.0))?;
        self.free.push(key.0);
        Ok(paragraph)
    }

    /// Rebuild the id index by walking the chain from the head.
    fn renumber(&mut self) {
        self.order.clear();
        let mut cursor = Some(self.head);
        while let Some(key) = cursor {
            let id = self.order.len();
            let Some(Some(node)) = self.nodes.get_mut(key.0) else {
                break;
            };
            node.id = id;
            cursor = node.next;
            self.order.push(key);
        }
    }

    // ---- validation and invalidation ------------------------------------

    pub(crate) fn check_position(&self, pos: Position) -> Result<()> {
        let len = self.paragraph(pos.paragraph)?.len();
        if pos.index > len {
            return Err(EngineError::IndexOutOfRange {
                index: pos.index,
                len,
            });
        }
        Ok(())
    }

    fn check_range(&self, range: TextRange) -> Result<()> {
        if range.end < range.start {
            return Err(EngineError::InvalidRange);
        }
        self.check_position(range.start)?;
        self.check_position(range.end)
    }

    pub(crate) fn mark_dirty(&mut self, id: usize) {
        self.reflow_from = Some(self.reflow_from.map_or(id, |from| from.min(id)));
    }

    /// Bookkeeping after the content of paragraph `id` changed.
    fn touched(&mut self, id: usize) -> Result<()> {
        if let Some(counter) = &self.paragraph(id)?.layout().counter {
            counter.invalidate();
        }
        self.mark_dirty(id);
        Ok(())
    }

    /// Clear every counter cache from paragraph `id` on. Numbers there may
    /// have shifted.
    fn invalidate_counters_from(&mut self, id: usize) {
        for position in id..self.order.len() {
            let key = self.order[position];
            if let Some(Some(node)) = self.nodes.get_mut(key.0)
                && let Some(counter) = &node.layout().counter
            {
                counter.invalidate();
                node.invalidate(0);
            }
        }
        self.mark_dirty(id);
    }

    // ---- text edits --------------------------------------------------------

    /// Insert `text` at `pos` in `format`. Each `'\n'` splits the paragraph.
    /// Returns the position after the inserted text.
    pub fn insert_text(&mut self, pos: Position, text: &str, format: &Format) -> Result<Position> {
        self.check_position(pos)?;
        let handle = self.formats.intern(format);
        let mut cursor = pos;
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.split_paragraph(cursor)?;
                cursor = Position::new(cursor.paragraph + 1, 0);
            }
            if !line.is_empty() {
                let key = self.key_of(cursor.paragraph)?;
                cursor.index += self.node_mut(key)?.insert_text(cursor.index, line, &handle)?;
                self.touched(cursor.paragraph)?;
            }
        }
        Ok(cursor)
    }

    /// Insert a custom item at `pos`. Returns the position after it.
    pub fn insert_custom_item(
        &mut self,
        pos: Position,
        item: CustomItem,
        format: &Format,
    ) -> Result<Position> {
        self.check_position(pos)?;
        let handle = self.formats.intern(format);
        let key = self.key_of(pos.paragraph)?;
        self.node_mut(key)?.insert_custom(pos.index, item, &handle)?;
        self.touched(pos.paragraph)?;
        Ok(Position::new(pos.paragraph, pos.index + 1))
    }

    /// Split the paragraph at `pos`. The new paragraph copies the layout and
    /// terminator format of the original, unless the original's style names a
    /// different following style: then it starts in that style.
    pub fn split_paragraph(&mut self, pos: Position) -> Result<()> {
        let following = self
            .paragraph(pos.paragraph)?
            .layout()
            .style_name
            .as_deref()
            .and_then(|name| self.styles.following(name))
            .cloned();
        let (layout, terminator) = match following {
            Some(style) => {
                debug!(style = %style.name, "split continues in following style");
                (style.paragraph_layout(), self.formats.intern(&style.format))
            }
            None => {
                let paragraph = self.paragraph(pos.paragraph)?;
                (paragraph.layout().clone(), paragraph.terminator_format().clone())
            }
        };
        self.split_with(pos, layout, terminator)
    }

    fn split_with(
        &mut self,
        pos: Position,
        layout: ParagraphLayout,
        terminator: FormatHandle,
    ) -> Result<()> {
        self.check_position(pos)?;
        let key = self.key_of(pos.paragraph)?;
        let node = self.node_mut(key)?;
        let len = node.len();
        let tail = node.remove(pos.index, len - pos.index)?;
        let mut paragraph = Paragraph::new(pos.paragraph + 1, &terminator, layout);
        paragraph.insert_run(0, tail)?;
        let new_key = self.alloc(paragraph);
        self.link_after(key, new_key)?;
        self.renumber();
        self.invalidate_counters_from(pos.paragraph);
        Ok(())
    }

    /// Append paragraph `id + 1` to paragraph `id`. The joined paragraph
    /// keeps the layout of `id`.
    pub fn join_with_next(&mut self, id: usize) -> Result<()> {
        let key = self.key_of(id)?;
        let next = self.node(key)?.next.ok_or(EngineError::CannotJoinLast)?;
        let content = self.unlink(next)?.into_content()?;
        let node = self.node_mut(key)?;
        let len = node.len();
        node.insert_run(len, content)?;
        self.renumber();
        self.invalidate_counters_from(id);
        Ok(())
    }

    /// Remove `range`, joining the paragraphs at its ends. Anchored entities
    /// in the range are reported to the host.
    pub fn remove_range(&mut self, range: TextRange) -> Result<Fragment> {
        self.remove_range_with(range, true)
    }

    pub(crate) fn remove_range_with(&mut self, range: TextRange, notify: bool) -> Result<Fragment> {
        self.check_range(range)?;
        let TextRange { start, end } = range;
        let start_key = self.key_of(start.paragraph)?;
        let mut pieces = Vec::with_capacity(end.paragraph - start.paragraph + 1);

        if start.paragraph == end.paragraph {
            let node = self.node_mut(start_key)?;
            let run = node.remove(start.index, end.index - start.index)?;
            pieces.push(FragmentPiece {
                run,
                layout: node.layout().clone(),
                terminator: node.terminator_format().clone(),
            });
            self.touched(start.paragraph)?;
        } else {
            let node = self.node_mut(start_key)?;
            let len = node.len();
            let run = node.remove(start.index, len - start.index)?;
            pieces.push(FragmentPiece {
                run,
                layout: node.layout().clone(),
                terminator: node.terminator_format().clone(),
            });
            for _ in start.paragraph + 1..end.paragraph {
                let next = self
                    .node(start_key)?
                    .next
                    .ok_or(EngineError::UnknownParagraph(start.paragraph + 1))?;
                let paragraph = self.unlink(next)?;
                let layout = paragraph.layout().clone();
                let terminator = paragraph.terminator_format().clone();
                pieces.push(FragmentPiece {
                    run: paragraph.into_content()?,
                    layout,
                    terminator,
                });
            }
            let next = self
                .node(start_key)?
                .next
                .ok_or(EngineError::UnknownParagraph(end.paragraph))?;
            let mut last = self.unlink(next)?;
            let head = last.remove(0, end.index)?;
            pieces.push(FragmentPiece {
                run: head,
                layout: last.layout().clone(),
                terminator: last.terminator_format().clone(),
            });
            let rest = last.into_content()?;
            self.node_mut(start_key)?.insert_run(start.index, rest)?;
            self.renumber();
            self.invalidate_counters_from(start.paragraph);
        }

        let fragment = Fragment { pieces };
        if notify {
            for id in fragment.external_ids() {
                self.notify_deleted(id);
            }
        }
        debug!(
            paragraph = start.paragraph,
            removed = fragment.len(),
            "removed range"
        );
        Ok(fragment)
    }

    fn notify_deleted(&mut self, id: ExternalId) {
        match self.relations.as_mut() {
            Some(relations) => {
                if !relations.request_delete_external(id) {
                    warn!(id = id.0, "external owner missing for deleted anchor");
                }
            }
            None => warn!(id = id.0, "anchor deleted with no external relations installed"),
        }
    }

    /// Copy `range` without changing the document.
    pub fn copy_fragment(&self, range: TextRange) -> Result<Fragment> {
        self.check_range(range)?;
        let TextRange { start, end } = range;
        let mut pieces = Vec::with_capacity(end.paragraph - start.paragraph + 1);
        for id in start.paragraph..=end.paragraph {
            let paragraph = self.paragraph(id)?;
            let from = if id == start.paragraph { start.index } else { 0 };
            let to = if id == end.paragraph {
                end.index
            } else {
                paragraph.len()
            };
            pieces.push(FragmentPiece {
                run: paragraph.run().sub_range(from, to - from)?,
                layout: paragraph.layout().clone(),
                terminator: paragraph.terminator_format().clone(),
            });
        }
        Ok(Fragment { pieces })
    }

    /// Insert `fragment` at `pos`, recreating its paragraph breaks. Returns
    /// the position after the inserted content.
    pub fn insert_fragment(&mut self, pos: Position, fragment: &Fragment) -> Result<Position> {
        self.check_position(pos)?;
        let mut cursor = pos;
        for (i, piece) in fragment.pieces.iter().enumerate() {
            if i > 0 {
                self.split_with(cursor, piece.layout.clone(), piece.terminator.clone())?;
                cursor = Position::new(cursor.paragraph + 1, 0);
            }
            if !piece.run.is_empty() {
                let key = self.key_of(cursor.paragraph)?;
                self.node_mut(key)?.insert_run(cursor.index, piece.run.clone())?;
                cursor.index += piece.run.len();
                self.touched(cursor.paragraph)?;
            }
        }
        for id in fragment.external_ids() {
            let restored = self
                .relations
                .as_mut()
                .is_some_and(|relations| relations.request_restore_external(id));
            if !restored {
                warn!(id = id.0, "re-inserted anchor has no external owner");
            }
        }
        Ok(cursor)
    }

    // ---- character formats ------------------------------------------------

    /// Apply the attribute groups of `format` selected by `flags` to `range`.
    ///
    /// The terminator of a paragraph takes the change when the range reaches
    /// the paragraph end. Returns the prior formats.
    pub fn set_format(
        &mut self,
        range: TextRange,
        format: &Format,
        flags: FormatFlags,
    ) -> Result<Vec<FormatSnapshot>> {
        self.check_range(range)?;
        let mut merged: HashMap<String, FormatHandle> = HashMap::new();
        let mut snapshots = Vec::new();

        for id in range.start.paragraph..=range.end.paragraph {
            let key = self.key_of(id)?;
            let paragraph = self.node(key)?;
            let from = if id == range.start.paragraph {
                range.start.index
            } else {
                0
            };
            let to = if id == range.end.paragraph {
                range.end.index
            } else {
                paragraph.len()
            };
            let old = paragraph.formats(from, to - from)?;
            let old_terminator =
                (to == paragraph.len()).then(|| paragraph.terminator_format().clone());

            let formats = &mut self.formats;
            let mut apply = |base: &FormatHandle| {
                merged
                    .entry(base.key().to_string())
                    .or_insert_with(|| formats.merge(base, format, flags))
                    .clone()
            };
            let new: Vec<FormatHandle> = old.iter().map(&mut apply).collect();
            let new_terminator = old_terminator.as_ref().map(&mut apply);

            let node = self.node_mut(key)?;
            node.restore_formats(from, &new)?;
            if let Some(terminator) = new_terminator {
                node.set_terminator_format(terminator);
            }
            self.touched(id)?;
            snapshots.push(FormatSnapshot {
                paragraph: id,
                start: from,
                formats: old,
                terminator: old_terminator,
            });
        }
        Ok(snapshots)
    }

    /// Put back formats captured by [`Document::set_format`].
    pub fn restore_formats(&mut self, snapshots: &[FormatSnapshot]) -> Result<()> {
        for snapshot in snapshots {
            let key = self.key_of(snapshot.paragraph)?;
            let node = self.node_mut(key)?;
            node.restore_formats(snapshot.start, &snapshot.formats)?;
            if let Some(terminator) = &snapshot.terminator {
                node.set_terminator_format(terminator.clone());
            }
            self.touched(snapshot.paragraph)?;
        }
        Ok(())
    }

    // ---- paragraph layout ---------------------------------------------

    /// Apply the attribute groups of `layout` selected by `flags` to
    /// paragraph `id`. Returns the previous layout.
    pub fn set_paragraph_layout(
        &mut self,
        id: usize,
        layout: &ParagraphLayout,
        flags: LayoutFlags,
    ) -> Result<ParagraphLayout> {
        let mut new = self.paragraph(id)?.layout().clone();
        new.apply(layout, flags);
        self.replace_layout(id, new)
    }

    /// Replace the whole layout of paragraph `id`. Returns the previous one.
    pub fn replace_layout(&mut self, id: usize, layout: ParagraphLayout) -> Result<ParagraphLayout> {
        let key = self.key_of(id)?;
        let old = self.node_mut(key)?.set_layout(layout);
        let new = self.node(key)?.layout();
        let ripple = old.counter != new.counter || old.direction != new.direction;
        if ripple {
            self.invalidate_counters_from(id);
        } else {
            self.mark_dirty(id);
        }
        Ok(old)
    }

    /// Set the alignment of paragraph `id`. Returns the previous one.
    pub fn set_alignment(&mut self, id: usize, alignment: Alignment) -> Result<Alignment> {
        let key = self.key_of(id)?;
        let node = self.node_mut(key)?;
        let old = node.layout().alignment;
        if old != alignment {
            node.layout_mut().alignment = alignment;
            self.mark_dirty(id);
        }
        Ok(old)
    }

    /// Set or clear the counter of paragraph `id`. Returns the previous one.
    pub fn set_counter(&mut self, id: usize, counter: Option<Counter>) -> Result<Option<Counter>> {
        let key = self.key_of(id)?;
        let old = std::mem::replace(&mut self.node_mut(key)?.layout_mut().counter, counter);
        self.invalidate_counters_from(id);
        Ok(old)
    }

    // ---- paragraph styles ---------------------------------------------

    /// Named paragraph styles of this document.
    pub fn styles(&self) -> &StyleCollection {
        &self.styles
    }

    /// Mutable access to the styles. Paragraphs already styled keep their
    /// layout and formats until a style is applied again.
    pub fn styles_mut(&mut self) -> &mut StyleCollection {
        &mut self.styles
    }

    /// Apply the style named `name` to paragraph `id`.
    pub fn apply_style(&mut self, id: usize, name: &str) -> Result<StyleChange> {
        let style = self
            .styles
            .find(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownStyle(name.to_string()))?;
        self.apply_paragraph_style(id, &style)
    }

    /// Give paragraph `id` the layout of `style` and its text (terminator
    /// included) the style's format. Returns the prior state.
    pub fn apply_paragraph_style(
        &mut self,
        id: usize,
        style: &ParagraphStyle,
    ) -> Result<StyleChange> {
        let len = self.paragraph(id)?.len();
        let formats = self.set_format(TextRange::within(id, 0, len), &style.format, FormatFlags::ALL)?;
        let layout = self.replace_layout(id, style.paragraph_layout())?;
        Ok(StyleChange {
            paragraph: id,
            layout,
            formats,
        })
    }

    /// Put back the state captured by [`Document::apply_paragraph_style`].
    pub fn revert_style(&mut self, change: &StyleChange) -> Result<()> {
        self.replace_layout(change.paragraph, change.layout.clone())?;
        self.restore_formats(&change.formats)
    }

    /// Label of paragraph `id`'s counter, if it has one.
    pub fn counter_text(&self, id: usize) -> Result<Option<String>> {
        let key = self.key_of(id)?;
        Ok(self
            .node(key)?
            .layout()
            .counter
            .as_ref()
            .map(|counter| counter.text(key, self)))
    }

    /// Number of paragraph `id`'s counter, if it has one.
    pub fn counter_number(&self, id: usize) -> Result<Option<i32>> {
        let key = self.key_of(id)?;
        Ok(self
            .node(key)?
            .layout()
            .counter
            .as_ref()
            .map(|counter| counter.number(key, self)))
    }

    // ---- queries ------------------------------------------------------------

    /// Plain text of `range`. Variables render their display text, other
    /// custom items U+FFFC, paragraph breaks `'\n'`.
    pub fn plain_text(&self, range: TextRange) -> Result<String> {
        self.check_range(range)?;
        let mut out = String::new();
        for id in range.start.paragraph..=range.end.paragraph {
            let paragraph = self.paragraph(id)?;
            let from = if id == range.start.paragraph {
                range.start.index
            } else {
                0
            };
            let to = if id == range.end.paragraph {
                range.end.index
            } else {
                paragraph.len()
            };
            if id > range.start.paragraph {
                out.push('\n');
            }
            render_plain(&paragraph.run().as_slice()[from..to], &mut out);
        }
        Ok(out)
    }

    /// Plain text of the whole document.
    pub fn text(&self) -> String {
        self.plain_text(self.full_range()).unwrap_or_default()
    }

    /// Structured, format-annotated export of `range`.
    pub fn rich_text(&self, range: TextRange) -> Result<RichText> {
        Ok(RichText::from_fragment(&self.copy_fragment(range)?))
    }

    /// Insert structured content at `pos`. Returns the position after it.
    pub fn insert_rich_text(&mut self, pos: Position, rich: &RichText) -> Result<Position> {
        let fragment = rich.to_fragment(&mut self.formats);
        self.insert_fragment(pos, &fragment)
    }

    /// Caret position nearest to the document point `(x, y)`.
    ///
    /// Formats paragraphs up to `y` first.
    pub fn locate(&mut self, x: i32, y: i32) -> Result<Position> {
        let mut target = self.order.len() - 1;
        for id in 0..self.order.len() {
            self.format_if_needed(id)?;
            if y < self.paragraph(id)?.bottom() {
                target = id;
                break;
            }
        }

        let paragraph = self.paragraph(target)?;
        let relative = y - paragraph.y();
        let line = paragraph
            .lines()
            .iter()
            .rposition(|l| relative >= l.y)
            .unwrap_or(0);
        let Some(line_start) = paragraph.lines().get(line) else {
            return Ok(Position::new(target, 0));
        };
        let start = line_start.char_index;
        let placed = paragraph.char_layout();
        let visual = line_start.bidi.visual_order();

        let mut hit = None;
        for &v in &visual {
            let Some(c) = placed.get(start + v) else {
                continue;
            };
            if x < c.x + c.width {
                hit = Some((v, x >= c.x + c.width / 2));
                break;
            }
        }
        let (v, after) = match hit {
            Some(hit) => hit,
            None => match visual.last() {
                Some(&v) => (v, true),
                None => return Ok(Position::new(target, start)),
            },
        };
        let logical = start + v;
        let hard_break = matches!(
            paragraph.run().as_slice().get(logical),
            Some(StyledChar::Regular {
                ch: '\n' | '\u{2028}',
                ..
            })
        );
        let index = if after != line_start.bidi.is_rtl(v) && !hard_break {
            logical + 1
        } else {
            logical
        };
        Ok(Position::new(target, index.min(paragraph.len())))
    }

    // ---- host protocol -----------------------------------------------

    /// Position of the placeholder for `id`, if the document holds one.
    pub fn find_placeholder(&self, id: ExternalId) -> Option<Position> {
        self.paragraphs().find_map(|paragraph| {
            paragraph.run().as_slice()[..paragraph.len()]
                .iter()
                .position(|c| c.custom_item().and_then(CustomItem::external_id) == Some(id))
                .map(|index| Position::new(paragraph.id(), index))
        })
    }

    /// The host deleted entity `id`; drop its placeholder without calling
    /// back. Returns whether a placeholder was found.
    pub fn request_remove_placeholder(&mut self, id: ExternalId) -> bool {
        let Some(pos) = self.find_placeholder(id) else {
            debug!(id = id.0, "no placeholder for removed entity");
            return false;
        };
        let range = TextRange::within(pos.paragraph, pos.index, pos.index + 1);
        self.remove_range_with(range, false).is_ok()
    }

    /// Recompute every variable and renumber footnotes in document order.
    /// Returns how many variables changed their text.
    pub fn recalc_variables(&mut self, ctx: &dyn VariableContext) -> Result<usize> {
        let mut footnote = 0;
        let mut changed = 0;
        for id in 0..self.order.len() {
            let key = self.order[id];
            let node = self.node_mut(key)?;
            let mut first_changed = None;
            for index in 0..node.len() {
                let Some(CustomItem::Variable(variable)) = node.item_mut(index) else {
                    continue;
                };
                if let VariableKind::Footnote { number } = &mut variable.kind {
                    footnote += 1;
                    *number = footnote;
                }
                if variable.recalc(ctx, id) {
                    changed += 1;
                    first_changed.get_or_insert(index);
                }
            }
            if let Some(index) = first_changed {
                node.invalidate(index);
                self.mark_dirty(id);
            }
        }
        debug!(changed, footnotes = footnote, "recalculated variables");
        Ok(changed)
    }

    // ---- formatting -----------------------------------------------------

    /// Top of paragraph `id` given the current geometry of its predecessor.
    pub(crate) fn top_of(&self, id: usize) -> Result<i32> {
        if id == 0 {
            return Ok(0);
        }
        Ok(self.paragraph(id - 1)?.bottom())
    }

    /// Whether paragraph `id` must be formatted, assuming its predecessors
    /// are up to date.
    pub(crate) fn needs_format(&self, id: usize) -> Result<bool> {
        let paragraph = self.paragraph(id)?;
        Ok(!paragraph.is_valid() || paragraph.y() != self.top_of(id)?)
    }

    pub(crate) fn format_if_needed(&mut self, id: usize) -> Result<()> {
        if self.needs_format(id)? {
            let y = self.top_of(id)?;
            self.format_paragraph(self.key_of(id)?, y)?;
        }
        Ok(())
    }

    /// Lay out one paragraph at `y`. Invalidates the next paragraph when the
    /// geometry changed.
    pub(crate) fn format_paragraph(&mut self, key: ParagraphKey, y: i32) -> Result<()> {
        let paragraph = self.node(key)?;
        let label_width = match &paragraph.layout().counter {
            Some(counter) => {
                let format = label_format(paragraph.format_at(0));
                counter.width(key, self, self.measure.as_ref(), &format)
            }
            None => 0,
        };

        let paragraph = self
            .nodes
            .get(key.0)
            .and_then(Option::as_ref)
            .ok_or(EngineError::UnknownParagraph(key.0))?;
        let mut formatter = Formatter {
            measure: self.measure.as_ref(),
            widths: &mut self.widths,
            flow: self.flow.as_deref(),
            relations: self.relations.as_deref(),
            document_width: self.config.document_width,
            allow_break_in_words: self.config.allow_break_in_words,
            default_tab_width: self.config.default_tab_width,
        };
        let result = formatter.format(paragraph, y, label_width);

        let node = self.node_mut(key)?;
        let moved = node.y() != y || node.height() != result.height;
        node.apply_layout(y, result);
        let next = node.next;
        if moved && let Some(next) = next {
            self.node_mut(next)?.invalidate(0);
        }
        Ok(())
    }
}

impl ParagraphChain for Document {
    fn prev(&self, key: ParagraphKey) -> Option<ParagraphKey> {
        self.node(key).ok()?.prev
    }

    fn counter(&self, key: ParagraphKey) -> Option<&Counter> {
        self.node(key).ok()?.layout().counter.as_ref()
    }

    fn is_rtl(&self, key: ParagraphKey) -> bool {
        self.node(key).is_ok_and(|paragraph| {
            let glyphs = paragraph.run().glyphs();
            base_level(paragraph.layout(), &glyphs[..paragraph.len()]) % 2 == 1
        })
    }

    fn is_only_paragraph(&self, _key: ParagraphKey) -> bool {
        self.order.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterStyle;

    fn plain() -> Format {
        Format::default()
    }

    #[test]
    fn test_new_document_has_one_empty_paragraph() {
        let doc = Document::new();
        assert_eq!(doc.paragraph_count(), 1);
        assert_eq!(doc.text(), "");
        assert_eq!(doc.end_position(), Position::new(0, 0));
    }

    #[test]
    fn test_insert_splits_on_newline() {
        let mut doc = Document::new();
        let end = doc.insert_text(Position::new(0, 0), "ab\ncd\ne", &plain()).unwrap();
        assert_eq!(end, Position::new(2, 1));
        assert_eq!(doc.paragraph_count(), 3);
        assert_eq!(doc.text(), "ab\ncd\ne");
        let ids: Vec<usize> = doc.paragraphs().map(Paragraph::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_positions_are_errors() {
        let mut doc = Document::from_text("abc").unwrap();
        assert!(matches!(
            doc.insert_text(Position::new(0, 4), "x", &plain()),
            Err(EngineError::IndexOutOfRange { index: 4, len: 3 })
        ));
        assert!(matches!(
            doc.insert_text(Position::new(1, 0), "x", &plain()),
            Err(EngineError::UnknownParagraph(1))
        ));
        assert!(matches!(
            doc.remove_range(TextRange::within(0, 2, 1)),
            Err(EngineError::InvalidRange)
        ));
        assert!(matches!(doc.join_with_next(0), Err(EngineError::CannotJoinLast)));
    }

    #[test]
    fn test_remove_across_paragraphs_and_reinsert() {
        let mut doc = Document::from_text("one\ntwo\nthree").unwrap();
        let range = TextRange::new(Position::new(0, 1), Position::new(2, 2));
        let fragment = doc.remove_range(range).unwrap();
        assert_eq!(fragment.plain_text(), "ne\ntwo\nth");
        assert_eq!(fragment.len(), 9);
        assert_eq!(doc.text(), "oree");
        assert_eq!(doc.paragraph_count(), 1);

        let end = doc.insert_fragment(Position::new(0, 1), &fragment).unwrap();
        assert_eq!(end, Position::new(2, 2));
        assert_eq!(doc.text(), "one\ntwo\nthree");
    }

    #[test]
    fn test_arena_slots_are_reused() {
        let mut doc = Document::from_text("a\nb").unwrap();
        doc.join_with_next(0).unwrap();
        doc.split_paragraph(Position::new(0, 1)).unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.text(), "a\nb");
    }

    #[test]
    fn test_set_format_merges_and_restores() {
        let mut doc = Document::from_text("hello").unwrap();
        let red = Format::default().with_color(crate::format::Color::rgb(255, 0, 0));
        let snapshots = doc
            .set_format(TextRange::within(0, 1, 3), &red, FormatFlags::COLOR)
            .unwrap();
        let p = doc.paragraph(0).unwrap();
        assert_eq!(p.run().at(1).unwrap().format().color, Some(crate::format::Color::rgb(255, 0, 0)));
        assert!(p.run().at(0).unwrap().format().color.is_none());
        assert_eq!(p.run().at(1).unwrap().format(), p.run().at(2).unwrap().format());

        doc.restore_formats(&snapshots).unwrap();
        let p = doc.paragraph(0).unwrap();
        assert!(p.run().at(1).unwrap().format().color.is_none());
    }

    #[test]
    fn test_counter_ripples_after_split() {
        let mut doc = Document::from_text("a\nb").unwrap();
        doc.set_counter(0, Some(Counter::list(CounterStyle::Arabic))).unwrap();
        doc.set_counter(1, Some(Counter::list(CounterStyle::Arabic))).unwrap();
        assert_eq!(doc.counter_text(1).unwrap().as_deref(), Some("2."));

        doc.split_paragraph(Position::new(0, 1)).unwrap();
        assert_eq!(doc.counter_text(1).unwrap().as_deref(), Some("2."));
        assert_eq!(doc.counter_text(2).unwrap().as_deref(), Some("3."));
    }

    #[test]
    fn test_take_changed_clears_flags() {
        let mut doc = Document::from_text("a\nb").unwrap();
        assert_eq!(doc.take_changed(), vec![0, 1]);
        assert!(doc.take_changed().is_empty());
        doc.insert_text(Position::new(1, 1), "c", &plain()).unwrap();
        assert_eq!(doc.take_changed(), vec![1]);
    }
}
