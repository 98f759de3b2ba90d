//! Command interface and undo/redo.
//!
//! # Overview
//!
//! [`CommandExecutor`] wraps a [`Document`] and records every edit made
//! through it as a reversible command. Hosts drive it with [`Command`]
//! values:
//!
//! - **Edits**: insert text or items, delete, backspace, split paragraphs
//! - **Formats**: change character attributes over a range
//! - **Paragraphs**: change layout, alignment or counter, apply named styles
//!
//! Consecutive typing at an advancing caret, and consecutive backspace or
//! delete-forward presses, coalesce into one undo step per [`SessionId`]
//! until a different kind of edit, another session, or [`EditCommand::Flush`].
//! Corrections enabled in [`AutoFormatConfig`](crate::AutoFormatConfig) run
//! inside the edit that triggers them and undo with it.
//!
//! # Example
//!
//! ```rust
//! use richtext_core::{Command, CommandExecutor, EditCommand, Position};
//!
//! let mut executor = CommandExecutor::default();
//! for (i, ch) in "Hi!".chars().enumerate() {
//!     executor
//!         .execute(Command::Edit(EditCommand::InsertText {
//!             position: Position::new(0, i),
//!             text: ch.to_string(),
//!             format: None,
//!         }))
//!         .unwrap();
//! }
//! assert_eq!(executor.document().text(), "Hi!");
//!
//! // One undo reverses the whole typing burst.
//! executor.undo().unwrap();
//! assert_eq!(executor.document().text(), "");
//! ```

use crate::counter::Counter;
use crate::custom_item::{CustomItem, ExternalId};
use crate::document::{Document, FormatSnapshot, Fragment, Position, StyleChange, TextRange};
use crate::error::{EngineError, Result};
use crate::format::{Format, FormatFlags};
use crate::paragraph_layout::{Alignment, LayoutFlags, ParagraphLayout};
use crate::rich_text::RichText;
use crate::style::ParagraphStyle;
use std::collections::VecDeque;
use std::ops::Range;
use tracing::{debug, trace};

/// Identity of an editing caller, used to keep coalescing per caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId(pub u32);

/// Text editing commands
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Insert text; `'\n'` starts a new paragraph.
    InsertText {
        /// Insertion point.
        position: Position,
        /// Text to insert.
        text: String,
        /// Format; `None` continues the format at the insertion point.
        format: Option<Format>,
    },
    /// Insert a custom item.
    InsertItem {
        /// Insertion point.
        position: Position,
        /// The item.
        item: CustomItem,
        /// Format; `None` continues the format at the insertion point.
        format: Option<Format>,
    },
    /// Insert structured content.
    InsertRichText {
        /// Insertion point.
        position: Position,
        /// Content to insert.
        rich: RichText,
    },
    /// Delete a range.
    Delete {
        /// Range to delete.
        range: TextRange,
    },
    /// Delete the character before the caret, joining paragraphs at index 0.
    Backspace {
        /// Caret.
        position: Position,
    },
    /// Delete the character after the caret, joining paragraphs at the end.
    DeleteForward {
        /// Caret.
        position: Position,
    },
    /// Split a paragraph at the caret.
    SplitParagraph {
        /// Caret.
        position: Position,
    },
    /// Undo the last command.
    Undo,
    /// Redo the last undone command.
    Redo,
    /// Close the pending coalesced command.
    Flush,
}

/// Character format commands
#[derive(Debug, Clone, PartialEq)]
pub enum FormatCommand {
    /// Apply the attribute groups of `format` selected by `flags`.
    SetFormat {
        /// Range to format.
        range: TextRange,
        /// Attribute values.
        format: Format,
        /// Attribute groups to apply.
        flags: FormatFlags,
    },
}

/// Paragraph commands
#[derive(Debug, Clone, PartialEq)]
pub enum ParagraphCommand {
    /// Apply the attribute groups of `layout` selected by `flags`.
    SetLayout {
        /// Paragraph id.
        paragraph: usize,
        /// Attribute values.
        layout: ParagraphLayout,
        /// Attribute groups to apply.
        flags: LayoutFlags,
    },
    /// Change the alignment.
    SetAlignment {
        /// Paragraph id.
        paragraph: usize,
        /// New alignment.
        alignment: Alignment,
    },
    /// Set or clear the counter (paragraph type).
    SetCounter {
        /// Paragraph id.
        paragraph: usize,
        /// New counter.
        counter: Option<Counter>,
    },
    /// Apply a named style to a run of paragraphs.
    ApplyStyle {
        /// Paragraph ids.
        paragraphs: Range<usize>,
        /// Style name.
        style: String,
    },
}

/// Unified command enum
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Text editing commands
    Edit(EditCommand),
    /// Character format commands
    Format(FormatCommand),
    /// Paragraph commands
    Paragraph(ParagraphCommand),
}

/// Command execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Success, no return value
    Success,
    /// Success, returns the caret position after the edit
    Position(Position),
}

/// Kind of a recorded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Inserted content.
    Insert,
    /// Deleted content.
    Delete,
    /// Character format change.
    Format,
    /// Alignment change.
    Alignment,
    /// Paragraph layout change.
    Layout,
    /// Counter change.
    Counter,
    /// Paragraph style application.
    Style,
    /// Several edits undone as one step.
    Group,
}

/// A reversible edit with the prior state needed to invert it.
#[derive(Debug, Clone)]
enum TextCommand {
    Insert {
        start: Position,
        fragment: Fragment,
    },
    Delete {
        start: Position,
        fragment: Fragment,
        notify: bool,
    },
    Format {
        range: TextRange,
        format: Format,
        flags: FormatFlags,
        snapshots: Vec<FormatSnapshot>,
    },
    Alignment {
        paragraph: usize,
        old: Alignment,
        new: Alignment,
    },
    Layout {
        paragraph: usize,
        old: ParagraphLayout,
        new: ParagraphLayout,
    },
    Counter {
        paragraph: usize,
        old: Option<Counter>,
        new: Option<Counter>,
    },
    Style {
        paragraphs: Range<usize>,
        style: ParagraphStyle,
        changes: Vec<StyleChange>,
    },
    Group(Vec<TextCommand>),
}

impl TextCommand {
    fn kind(&self) -> CommandKind {
        match self {
            TextCommand::Insert { .. } => CommandKind::Insert,
            TextCommand::Delete { .. } => CommandKind::Delete,
            TextCommand::Format { .. } => CommandKind::Format,
            TextCommand::Alignment { .. } => CommandKind::Alignment,
            TextCommand::Layout { .. } => CommandKind::Layout,
            TextCommand::Counter { .. } => CommandKind::Counter,
            TextCommand::Style { .. } => CommandKind::Style,
            TextCommand::Group(_) => CommandKind::Group,
        }
    }

    /// Apply (or re-apply) the command.
    fn execute(&mut self, document: &mut Document) -> Result<()> {
        match self {
            TextCommand::Insert { start, fragment } => {
                document.insert_fragment(*start, fragment)?;
            }
            TextCommand::Delete {
                start,
                fragment,
                notify,
            } => {
                let range = TextRange::new(*start, fragment.end_after(*start));
                document.remove_range_with(range, *notify)?;
            }
            TextCommand::Format {
                range,
                format,
                flags,
                snapshots,
            } => {
                *snapshots = document.set_format(*range, format, *flags)?;
            }
            TextCommand::Alignment { paragraph, new, .. } => {
                document.set_alignment(*paragraph, *new)?;
            }
            TextCommand::Layout { paragraph, new, .. } => {
                document.replace_layout(*paragraph, new.clone())?;
            }
            TextCommand::Counter { paragraph, new, .. } => {
                document.set_counter(*paragraph, new.clone())?;
            }
            TextCommand::Style {
                paragraphs,
                style,
                changes,
            } => {
                *changes = paragraphs
                    .clone()
                    .map(|id| document.apply_paragraph_style(id, style))
                    .collect::<Result<_>>()?;
            }
            TextCommand::Group(steps) => {
                for step in steps.iter_mut() {
                    step.execute(document)?;
                }
            }
        }
        Ok(())
    }

    /// Revert the command.
    fn unexecute(&mut self, document: &mut Document) -> Result<()> {
        match self {
            TextCommand::Insert { start, fragment } => {
                let range = TextRange::new(*start, fragment.end_after(*start));
                document.remove_range(range)?;
            }
            TextCommand::Delete {
                start, fragment, ..
            } => {
                document.insert_fragment(*start, fragment)?;
            }
            TextCommand::Format { snapshots, .. } => {
                document.restore_formats(snapshots)?;
            }
            TextCommand::Alignment { paragraph, old, .. } => {
                document.set_alignment(*paragraph, *old)?;
            }
            TextCommand::Layout { paragraph, old, .. } => {
                document.replace_layout(*paragraph, old.clone())?;
            }
            TextCommand::Counter { paragraph, old, .. } => {
                document.set_counter(*paragraph, old.clone())?;
            }
            TextCommand::Style { changes, .. } => {
                for change in changes.iter().rev() {
                    document.revert_style(change)?;
                }
            }
            TextCommand::Group(steps) => {
                for step in steps.iter_mut().rev() {
                    step.unexecute(document)?;
                }
            }
        }
        Ok(())
    }
}

/// What an open coalesced command accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Typing,
    Backspace,
    DeleteForward,
}

#[derive(Debug, Clone)]
struct Pending {
    session: SessionId,
    kind: PendingKind,
    command: TextCommand,
    /// Caret position the next coalescible edit must start at.
    caret: Position,
}

/// Bounded undo/redo stacks with clean-point tracking.
#[derive(Debug)]
pub struct CommandHistory {
    undo_stack: VecDeque<TextCommand>,
    redo_stack: Vec<TextCommand>,
    max_undo: usize,
    /// Clean point tracking. Uses `undo_stack.len()` as the saved position in the linear history.
    /// When `redo_stack` is non-empty, `clean_index` may be greater than `undo_stack.len()`.
    clean_index: Option<usize>,
    pending: Option<Pending>,
}

impl CommandHistory {
    /// Create an empty history keeping at most `max_undo` commands.
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo: max_undo.max(1),
            clean_index: Some(0),
            pending: None,
        }
    }

    /// Whether there is something to undo (the pending command included).
    pub fn can_undo(&self) -> bool {
        self.pending.is_some() || !self.undo_stack.is_empty()
    }

    /// Whether there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undoable commands (the pending command included).
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len() + usize::from(self.pending.is_some())
    }

    /// Number of redoable commands.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum number of commands kept.
    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Kind of the most recent undoable command.
    pub fn last_kind(&self) -> Option<CommandKind> {
        match &self.pending {
            Some(pending) => Some(pending.command.kind()),
            None => self.undo_stack.back().map(TextCommand::kind),
        }
    }

    /// Session whose coalesced command is open, if any.
    pub fn pending_session(&self) -> Option<SessionId> {
        self.pending.as_ref().map(|pending| pending.session)
    }

    /// Whether the document is at the clean point.
    pub fn is_clean(&self) -> bool {
        self.pending.is_none() && self.clean_index == Some(self.undo_stack.len())
    }

    /// Mark the current state as the clean point (after saving).
    pub fn mark_clean(&mut self) {
        self.flush();
        self.clean_index = Some(self.undo_stack.len());
    }

    /// Close the pending coalesced command.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!(kind = ?pending.kind, "flushed coalesced command");
            self.push_step(pending.command);
        }
    }

    /// Drop every recorded command.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.pending = None;
        self.clean_index = None;
    }

    fn clear_redo_and_adjust_clean(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }

        // A clean point in the redo area becomes unreachable.
        if let Some(clean_index) = self.clean_index
            && clean_index > self.undo_stack.len()
        {
            self.clean_index = None;
        }

        self.redo_stack.clear();
    }

    fn push_step(&mut self, command: TextCommand) {
        if self.undo_stack.len() >= self.max_undo {
            self.undo_stack.pop_front();
            if let Some(clean_index) = self.clean_index {
                self.clean_index = clean_index.checked_sub(1);
            }
            trace!(max = self.max_undo, "undo depth reached, dropped oldest command");
        }
        self.undo_stack.push_back(command);
    }

    /// Record a completed, non-coalescible command.
    fn record(&mut self, command: TextCommand) {
        self.flush();
        self.clear_redo_and_adjust_clean();
        self.push_step(command);
    }

    /// Whether an edit of `kind` at `caret` by `session` extends the pending command.
    fn continues(&self, session: SessionId, kind: PendingKind, caret: Position) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            pending.session == session && pending.kind == kind && pending.caret == caret
        })
    }

    fn take_pending(&mut self, session: SessionId, kind: PendingKind) -> Option<TextCommand> {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.session == session && pending.kind == kind);
        if !matches {
            return None;
        }
        self.pending.take().map(|pending| pending.command)
    }

    fn set_pending(&mut self, session: SessionId, kind: PendingKind, command: TextCommand, caret: Position) {
        self.clear_redo_and_adjust_clean();
        self.pending = Some(Pending {
            session,
            kind,
            command,
            caret,
        });
    }
}

/// Owns a document and its command history.
///
/// # Example
///
/// ```rust
/// use richtext_core::{Command, CommandExecutor, EditCommand, Position};
///
/// let mut executor = CommandExecutor::from_text("Hello").unwrap();
/// executor
///     .execute(Command::Edit(EditCommand::SplitParagraph {
///         position: Position::new(0, 2),
///     }))
///     .unwrap();
/// assert_eq!(executor.document().paragraph_count(), 2);
///
/// executor.undo().unwrap();
/// assert_eq!(executor.document().text(), "Hello");
/// ```
#[derive(Debug)]
pub struct CommandExecutor {
    document: Document,
    history: CommandHistory,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl CommandExecutor {
    /// Wrap `document`. The history depth comes from its configuration.
    pub fn new(document: Document) -> Self {
        let history = CommandHistory::new(document.config().undo_depth);
        Self { document, history }
    }

    /// Create an executor over a document holding `text`.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(Self::new(Document::from_text(text)?))
    }

    /// Execute a command as the default session.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult> {
        self.execute_as(SessionId::default(), command)
    }

    /// Execute a command on behalf of `session`.
    pub fn execute_as(&mut self, session: SessionId, command: Command) -> Result<CommandResult> {
        match command {
            Command::Edit(edit) => self.execute_edit(session, edit),
            Command::Format(format) => self.execute_format(format),
            Command::Paragraph(paragraph) => self.execute_paragraph(paragraph),
        }
    }

    /// Execute commands in order, stopping at the first error.
    pub fn execute_batch(&mut self, commands: Vec<Command>) -> Result<Vec<CommandResult>> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.execute(command)?);
        }
        Ok(results)
    }

    /// Undo the last command.
    pub fn undo(&mut self) -> Result<()> {
        self.history.flush();
        let mut command = self
            .history
            .undo_stack
            .pop_back()
            .ok_or(EngineError::NothingToUndo)?;
        if let Err(err) = command.unexecute(&mut self.document) {
            self.history.undo_stack.push_back(command);
            return Err(err);
        }
        debug!(kind = ?command.kind(), "undo");
        self.history.redo_stack.push(command);
        Ok(())
    }

    /// Redo the last undone command.
    pub fn redo(&mut self) -> Result<()> {
        self.history.flush();
        let mut command = self
            .history
            .redo_stack
            .pop()
            .ok_or(EngineError::NothingToRedo)?;
        if let Err(err) = command.execute(&mut self.document) {
            self.history.redo_stack.push(command);
            return Err(err);
        }
        debug!(kind = ?command.kind(), "redo");
        self.history.push_step(command);
        Ok(())
    }

    /// Close the pending coalesced command.
    pub fn flush(&mut self) {
        self.history.flush();
    }

    /// Whether a command (including a pending coalesced one) can be undone.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether an undone command can be redone.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of undoable commands, the pending one included.
    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    /// Number of redoable commands.
    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Whether the document matches the last [`CommandExecutor::mark_clean`] point.
    pub fn is_clean(&self) -> bool {
        self.history.is_clean()
    }

    /// Record the current state as saved. Flushes the pending command.
    pub fn mark_clean(&mut self) {
        self.history.mark_clean();
    }

    /// The command history.
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    /// The edited document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the edited document.
    ///
    /// Edits made through it are not recorded. Positions held by the history
    /// may no longer match afterwards; call [`CommandExecutor::clear_history`]
    /// after structural edits.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Forget all recorded commands.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// The host deleted entity `id`: remove its placeholder without calling
    /// back, as an undoable deletion. Returns whether a placeholder was found.
    pub fn request_remove_placeholder(&mut self, id: ExternalId) -> Result<bool> {
        let Some(start) = self.document.find_placeholder(id) else {
            return Ok(false);
        };
        let range = TextRange::within(start.paragraph, start.index, start.index + 1);
        let fragment = self.document.remove_range_with(range, false)?;
        self.history.record(TextCommand::Delete {
            start,
            fragment,
            notify: false,
        });
        Ok(true)
    }

    // Private method: execute edit command
    fn execute_edit(&mut self, session: SessionId, command: EditCommand) -> Result<CommandResult> {
        match command {
            EditCommand::InsertText {
                position,
                text,
                format,
            } => self.insert_text(session, position, &text, format),
            EditCommand::InsertItem {
                position,
                item,
                format,
            } => {
                let format = match format {
                    Some(format) => format,
                    None => self.document.format_at(position)?,
                };
                self.history.flush();
                let end = self.document.insert_custom_item(position, item, &format)?;
                self.record_insert(position, end)
            }
            EditCommand::InsertRichText { position, rich } => {
                self.history.flush();
                let end = self.document.insert_rich_text(position, &rich)?;
                self.record_insert(position, end)
            }
            EditCommand::Delete { range } => {
                self.history.flush();
                let fragment = self.document.remove_range(range)?;
                self.history.record(TextCommand::Delete {
                    start: range.start,
                    fragment,
                    notify: true,
                });
                Ok(CommandResult::Position(range.start))
            }
            EditCommand::Backspace { position } => self.backspace(session, position),
            EditCommand::DeleteForward { position } => self.delete_forward(session, position),
            EditCommand::SplitParagraph { position } => self.split_paragraph(position),
            EditCommand::Undo => {
                self.undo()?;
                Ok(CommandResult::Success)
            }
            EditCommand::Redo => {
                self.redo()?;
                Ok(CommandResult::Success)
            }
            EditCommand::Flush => {
                self.history.flush();
                Ok(CommandResult::Success)
            }
        }
    }

    fn execute_format(&mut self, command: FormatCommand) -> Result<CommandResult> {
        match command {
            FormatCommand::SetFormat {
                range,
                format,
                flags,
            } => {
                self.history.flush();
                let snapshots = self.document.set_format(range, &format, flags)?;
                self.history.record(TextCommand::Format {
                    range,
                    format,
                    flags,
                    snapshots,
                });
                Ok(CommandResult::Success)
            }
        }
    }

    fn execute_paragraph(&mut self, command: ParagraphCommand) -> Result<CommandResult> {
        self.history.flush();
        let recorded = match command {
            ParagraphCommand::SetLayout {
                paragraph,
                layout,
                flags,
            } => {
                let old = self.document.set_paragraph_layout(paragraph, &layout, flags)?;
                let new = self.document.paragraph(paragraph)?.layout().clone();
                TextCommand::Layout {
                    paragraph,
                    old,
                    new,
                }
            }
            ParagraphCommand::SetAlignment {
                paragraph,
                alignment,
            } => {
                let old = self.document.set_alignment(paragraph, alignment)?;
                TextCommand::Alignment {
                    paragraph,
                    old,
                    new: alignment,
                }
            }
            ParagraphCommand::SetCounter { paragraph, counter } => {
                let old = self.document.set_counter(paragraph, counter.clone())?;
                TextCommand::Counter {
                    paragraph,
                    old,
                    new: counter,
                }
            }
            ParagraphCommand::ApplyStyle { paragraphs, style } => {
                if paragraphs.is_empty() {
                    return Err(EngineError::InvalidRange);
                }
                self.document.paragraph(paragraphs.end - 1)?;
                let style = self
                    .document
                    .styles()
                    .find(&style)
                    .cloned()
                    .ok_or(EngineError::UnknownStyle(style))?;
                let mut command = TextCommand::Style {
                    paragraphs,
                    style,
                    changes: Vec::new(),
                };
                command.execute(&mut self.document)?;
                command
            }
        };
        self.history.record(recorded);
        Ok(CommandResult::Success)
    }

    fn record_insert(&mut self, start: Position, end: Position) -> Result<CommandResult> {
        let fragment = self.document.copy_fragment(TextRange::new(start, end))?;
        self.history.record(TextCommand::Insert { start, fragment });
        Ok(CommandResult::Position(end))
    }

    fn insert_text(
        &mut self,
        session: SessionId,
        position: Position,
        text: &str,
        format: Option<Format>,
    ) -> Result<CommandResult> {
        if text.is_empty() {
            self.document.format_at(position)?;
            return Ok(CommandResult::Position(position));
        }
        if text == "\n" {
            return self.split_paragraph(position);
        }
        let format = match format {
            Some(format) => format,
            None => self.document.format_at(position)?,
        };
        let quote = self.typographic_quote(position, text)?;
        let text = quote.as_deref().unwrap_or(text);
        let typing = !text.contains('\n');
        if !typing || !self.history.continues(session, PendingKind::Typing, position) {
            self.history.flush();
        }

        let end = self.document.insert_text(position, text, &format)?;
        if !typing {
            return self.record_insert(position, end);
        }

        let start = match self.history.take_pending(session, PendingKind::Typing) {
            Some(TextCommand::Insert { start, .. }) => start,
            _ => position,
        };
        let fragment = self.document.copy_fragment(TextRange::new(start, end))?;
        trace!(len = fragment.len(), "coalescing insert");
        self.history.set_pending(
            session,
            PendingKind::Typing,
            TextCommand::Insert { start, fragment },
            end,
        );
        Ok(CommandResult::Position(end))
    }

    /// Typographic replacement for a straight quote typed at `position`.
    fn typographic_quote(&self, position: Position, text: &str) -> Result<Option<String>> {
        let auto_format = &self.document.config().auto_format;
        if auto_format.quote_for(text, None).is_none() {
            return Ok(None);
        }
        self.document.check_position(position)?;
        let previous = match position.index {
            0 => None,
            index => Some(self.document.paragraph(position.paragraph)?.char_at(index - 1)?.ch()),
        };
        Ok(auto_format.quote_for(text, previous).map(String::from))
    }

    /// Split at `position`; an ended paragraph starting with a list marker
    /// becomes a list item, together with the new paragraph.
    fn split_paragraph(&mut self, position: Position) -> Result<CommandResult> {
        self.history.flush();
        self.document.split_paragraph(position)?;
        let end = Position::new(position.paragraph + 1, 0);
        let fragment = self.document.copy_fragment(TextRange::new(position, end))?;
        let split = TextCommand::Insert {
            start: position,
            fragment,
        };

        let ended = self.document.paragraph(position.paragraph)?;
        let marker = if ended.layout().counter.is_none() {
            self.document.config().auto_format.detect_list(&ended.text())
        } else {
            None
        };
        let Some(marker) = marker else {
            self.history.record(split);
            return Ok(CommandResult::Position(end));
        };

        debug!(paragraph = position.paragraph, "list marker turned into a counter");
        let mut steps = vec![split];
        let range = TextRange::within(position.paragraph, 0, marker.len);
        let fragment = self.document.remove_range(range)?;
        steps.push(TextCommand::Delete {
            start: range.start,
            fragment,
            notify: true,
        });
        for paragraph in [position.paragraph, end.paragraph] {
            let old = self.document.set_counter(paragraph, Some(marker.counter.clone()))?;
            steps.push(TextCommand::Counter {
                paragraph,
                old,
                new: Some(marker.counter.clone()),
            });
        }
        self.history.record(TextCommand::Group(steps));
        Ok(CommandResult::Position(end))
    }

    fn backspace(&mut self, session: SessionId, position: Position) -> Result<CommandResult> {
        if position.index == 0 {
            if position.paragraph == 0 {
                return Ok(CommandResult::Position(position));
            }
            self.history.flush();
            let prev = position.paragraph - 1;
            let start = Position::new(prev, self.document.paragraph(prev)?.len());
            let fragment = self.document.remove_range(TextRange::new(start, position))?;
            self.history.record(TextCommand::Delete {
                start,
                fragment,
                notify: true,
            });
            return Ok(CommandResult::Position(start));
        }

        if !self.history.continues(session, PendingKind::Backspace, position) {
            self.history.flush();
        }
        let start = Position::new(position.paragraph, position.index - 1);
        let removed = self.document.remove_range(TextRange::new(start, position))?;
        let fragment = match self.history.take_pending(session, PendingKind::Backspace) {
            Some(TextCommand::Delete { fragment, .. }) => concat(removed, fragment),
            _ => removed,
        };
        self.history.set_pending(
            session,
            PendingKind::Backspace,
            TextCommand::Delete {
                start,
                fragment,
                notify: true,
            },
            start,
        );
        Ok(CommandResult::Position(start))
    }

    fn delete_forward(&mut self, session: SessionId, position: Position) -> Result<CommandResult> {
        let len = self.document.paragraph(position.paragraph)?.len();
        if position.index == len {
            if position.paragraph + 1 == self.document.paragraph_count() {
                return Ok(CommandResult::Position(position));
            }
            self.history.flush();
            let end = Position::new(position.paragraph + 1, 0);
            let fragment = self.document.remove_range(TextRange::new(position, end))?;
            self.history.record(TextCommand::Delete {
                start: position,
                fragment,
                notify: true,
            });
            return Ok(CommandResult::Position(position));
        }

        if !self
            .history
            .continues(session, PendingKind::DeleteForward, position)
        {
            self.history.flush();
        }
        let end = Position::new(position.paragraph, position.index + 1);
        let removed = self.document.remove_range(TextRange::new(position, end))?;
        let fragment = match self.history.take_pending(session, PendingKind::DeleteForward) {
            Some(TextCommand::Delete { fragment, .. }) => concat(fragment, removed),
            _ => removed,
        };
        self.history.set_pending(
            session,
            PendingKind::DeleteForward,
            TextCommand::Delete {
                start: position,
                fragment,
                notify: true,
            },
            position,
        );
        Ok(CommandResult::Position(position))
    }
}

/// Join two single-paragraph fragments.
fn concat(mut front: Fragment, back: Fragment) -> Fragment {
    if let (Some(first), Some(other)) = (front.pieces.first_mut(), back.pieces.into_iter().next()) {
        first.run.append(other.run);
    }
    front
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(executor: &mut CommandExecutor, session: SessionId, at: Position, text: &str) {
        let mut pos = at;
        for ch in text.chars() {
            let result = executor
                .execute_as(
                    session,
                    Command::Edit(EditCommand::InsertText {
                        position: pos,
                        text: ch.to_string(),
                        format: None,
                    }),
                )
                .unwrap();
            let CommandResult::Position(next) = result else {
                panic!("insert returns a position");
            };
            pos = next;
        }
    }

    #[test]
    fn test_typing_coalesces_per_session() {
        let mut executor = CommandExecutor::default();
        type_text(&mut executor, SessionId(1), Position::new(0, 0), "abc");
        assert_eq!(executor.undo_depth(), 1);

        type_text(&mut executor, SessionId(2), Position::new(0, 3), "de");
        assert_eq!(executor.undo_depth(), 2);
        assert_eq!(executor.history().pending_session(), Some(SessionId(2)));

        executor.undo().unwrap();
        assert_eq!(executor.document().text(), "abc");
        executor.undo().unwrap();
        assert_eq!(executor.document().text(), "");
        assert!(matches!(executor.undo(), Err(EngineError::NothingToUndo)));
    }

    #[test]
    fn test_non_adjacent_typing_starts_new_step() {
        let mut executor = CommandExecutor::default();
        type_text(&mut executor, SessionId(0), Position::new(0, 0), "ab");
        type_text(&mut executor, SessionId(0), Position::new(0, 0), "x");
        assert_eq!(executor.undo_depth(), 2);
        assert_eq!(executor.document().text(), "xab");
    }

    #[test]
    fn test_backspace_and_delete_forward_coalesce() {
        let mut executor = CommandExecutor::from_text("abcdef").unwrap();
        for index in [6, 5, 4] {
            executor
                .execute(Command::Edit(EditCommand::Backspace {
                    position: Position::new(0, index),
                }))
                .unwrap();
        }
        for _ in 0..2 {
            executor
                .execute(Command::Edit(EditCommand::DeleteForward {
                    position: Position::new(0, 0),
                }))
                .unwrap();
        }
        assert_eq!(executor.document().text(), "c");
        assert_eq!(executor.undo_depth(), 2);

        executor.undo().unwrap();
        assert_eq!(executor.document().text(), "abc");
        executor.undo().unwrap();
        assert_eq!(executor.document().text(), "abcdef");
    }

    #[test]
    fn test_depth_overflow_drops_oldest() {
        let mut document = Document::new();
        document.set_width(300).unwrap();
        let mut executor = CommandExecutor {
            document,
            history: CommandHistory::new(3),
        };
        for i in 0..5 {
            executor
                .execute(Command::Edit(EditCommand::InsertText {
                    position: Position::new(0, i),
                    text: "x".to_string(),
                    format: None,
                }))
                .unwrap();
            executor.flush();
        }
        assert_eq!(executor.undo_depth(), 3);
        for _ in 0..3 {
            executor.undo().unwrap();
        }
        assert_eq!(executor.document().text(), "xx");
        assert!(!executor.can_undo());
    }

    #[test]
    fn test_clean_point() {
        let mut executor = CommandExecutor::default();
        assert!(executor.is_clean());
        type_text(&mut executor, SessionId(0), Position::new(0, 0), "ab");
        assert!(!executor.is_clean());
        executor.mark_clean();
        assert!(executor.is_clean());
        executor.undo().unwrap();
        assert!(!executor.is_clean());
        executor.redo().unwrap();
        assert!(executor.is_clean());
    }

    #[test]
    fn test_redo_cleared_by_new_edit() {
        let mut executor = CommandExecutor::default();
        type_text(&mut executor, SessionId(0), Position::new(0, 0), "ab");
        executor.undo().unwrap();
        assert!(executor.can_redo());
        type_text(&mut executor, SessionId(0), Position::new(0, 0), "c");
        assert!(!executor.can_redo());
        assert!(matches!(executor.redo(), Err(EngineError::NothingToRedo)));
    }
}
