#![warn(missing_docs)]
//! Richtext Core - Headless Rich-Text Document Engine
//!
//! # Overview
//!
//! `richtext-core` models a styled document as a chain of paragraphs, each
//! holding formatted characters and inline items. It breaks paragraphs into
//! lines, resolves bidirectional text, numbers lists and records every edit
//! for undo. It does not draw: hosts supply a [`TextMeasure`] for glyph
//! metrics and paint from the per-character layout the engine computes.
//!
//! # Core Features
//!
//! - **Interned Formats**: equal character formats share one handle
//! - **Inline Items**: images, anchors, variables, tables and rules occupy one character slot
//! - **Bidi Layout**: explicit embeddings and overrides, visual reordering per line
//! - **Numbering**: list, chapter and bullet counters with cached, lazily recomputed labels
//! - **Incremental Reflow**: edits mark paragraphs stale; the host formats in idle slices
//! - **Undo/Redo**: reversible commands with typing coalescing and a clean point
//! - **Paragraph Styles**: named layout and format pairs with a following style
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Commands & Undo History                    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Document (paragraph chain, reflow, cursor) │  ← Editing
//! ├─────────────────────────────────────────────┤
//! │  Formatter (line breaking, bidi, counters)  │  ← Layout
//! ├─────────────────────────────────────────────┤
//! │  Paragraph (runs, layout, cached lines)     │  ← Structure
//! ├─────────────────────────────────────────────┤
//! │  Formats, Characters, Custom Items          │  ← Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Using the Document directly
//!
//! ```rust
//! use richtext_core::{Document, Format, FormatFlags, Position, TextRange};
//!
//! let mut doc = Document::from_text("Hello world").unwrap();
//! doc.set_format(
//!     TextRange::within(0, 6, 11),
//!     &Format::default().bold(),
//!     FormatFlags::WEIGHT,
//! )
//! .unwrap();
//! doc.format_all().unwrap();
//!
//! assert!(doc.format_at(Position::new(0, 7)).unwrap().is_bold());
//! assert_eq!(doc.paragraph(0).unwrap().lines().len(), 1);
//! ```
//!
//! ## Using the Command Interface
//!
//! ```rust
//! use richtext_core::{Command, CommandExecutor, EditCommand, Position};
//!
//! let mut executor = CommandExecutor::from_text("Hello").unwrap();
//! executor
//!     .execute(Command::Edit(EditCommand::InsertText {
//!         position: Position::new(0, 5),
//!         text: ", world".to_string(),
//!         format: None,
//!     }))
//!     .unwrap();
//! assert_eq!(executor.document().text(), "Hello, world");
//!
//! executor.undo().unwrap();
//! assert_eq!(executor.document().text(), "Hello");
//! ```
//!
//! # Module Description
//!
//! - [`format`] - Character formats and the interning collection
//! - [`run`] - Styled characters and character runs
//! - [`custom_item`] - Inline items and the host entity protocol
//! - [`bidi`] - Bidirectional level resolution and visual order
//! - [`counter`] - Paragraph numbering and bullets
//! - [`paragraph_layout`] - Paragraph-level layout attributes
//! - [`style`] - Named paragraph styles
//! - [`paragraph`] - Paragraph nodes and their cached layout
//! - [`formatter`] - Line breaking for one paragraph
//! - [`document`] - The paragraph chain and its edit operations
//! - [`reflow`] - Incremental, budgeted formatting
//! - [`cursor`] - Caret movement
//! - [`rich_text`] - Serializable structured content
//! - [`commands`] - Command interface and undo/redo
//! - [`auto_format`] - Typographic quotes and list detection while typing
//!
//! # Threading
//!
//! Formats are shared through `Rc` handles, so a [`Document`] is neither
//! `Send` nor `Sync`. Drive each document from one thread.

pub mod auto_format;
pub mod bidi;
pub mod commands;
pub mod config;
pub mod counter;
pub mod cursor;
pub mod custom_item;
pub mod document;
pub mod error;
pub mod format;
pub mod formatter;
pub mod measure;
pub mod paragraph;
pub mod paragraph_layout;
pub mod reflow;
pub mod rich_text;
pub mod run;
pub mod style;

pub use auto_format::{AutoFormatConfig, ListMarker, TypographicQuotes};
pub use bidi::{BidiContext, BidiLine, BidiResolver, Direction, LevelRun};
pub use commands::{
    Command, CommandExecutor, CommandHistory, CommandKind, CommandResult, EditCommand,
    FormatCommand, ParagraphCommand, SessionId,
};
pub use config::{DEFAULT_UNDO_DEPTH, EngineConfig};
pub use counter::{Counter, CounterStyle, Numbering, ParagraphChain};
pub use cursor::CursorMove;
pub use custom_item::{
    AnchorItem, CustomItem, ExternalId, ExternalRelations, ImageItem, OBJECT_REPLACEMENT_CHAR,
    Placement, RuleItem, Size, StaticVariables, TableItem, VariableContext, VariableItem,
    VariableKind,
};
pub use document::{Document, FormatSnapshot, Fragment, Position, StyleChange, TextRange};
pub use error::{EngineError, Result};
pub use format::{
    Color, Format, FormatCollection, FormatFlags, FormatHandle, LineStyle, StrikeoutKind,
    UnderlineKind, VerticalAlign,
};
pub use formatter::{Band, Flow};
pub use measure::{CellMeasurer, TextMeasure, WidthCache};
pub use paragraph::{CharLayout, FormatState, LineStart, Paragraph};
pub use paragraph_layout::{
    Alignment, Border, Borders, LayoutFlags, LineSpacing, Margins, ParagraphLayout, TabKind,
    TabStop, TextDirection,
};
pub use reflow::ReflowStatus;
pub use rich_text::{RichParagraph, RichSpan, RichText};
pub use run::{CharacterRun, StyledChar};
pub use style::{ParagraphStyle, STANDARD_STYLE, StyleCollection};
