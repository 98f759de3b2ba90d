//! Inline non-text items.
//!
//! A [`CustomItem`] occupies exactly one character slot in a run. Its position
//! is implicit (the slot index), so items never store their own index.
//!
//! Anchors refer to entities owned by the host through an opaque
//! [`ExternalId`]; the document never owns them. The two sides talk through
//! [`ExternalRelations`] (engine to host) and
//! [`Document::request_remove_placeholder`](crate::Document::request_remove_placeholder)
//! (host to engine).

use crate::format::{Color, Format};
use crate::measure::{TextMeasure, text_width};
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

/// Placeholder glyph stored for every custom item (U+FFFC OBJECT REPLACEMENT CHARACTER).
pub const OBJECT_REPLACEMENT_CHAR: char = '\u{FFFC}';

/// Opaque identifier of a host-owned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId(pub u64);

/// Width and height in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

impl Size {
    /// Create a size.
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Where an item is placed relative to the text flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    /// In the line, like a glyph.
    #[default]
    Inline,
    /// Floated to the left margin.
    Left,
    /// Floated to the right margin.
    Right,
}

/// Host side of the anchor relation.
pub trait ExternalRelations {
    /// The placeholder for `id` was removed; the host should delete the entity.
    ///
    /// Returns `false` if the host no longer knows the entity.
    fn request_delete_external(&mut self, id: ExternalId) -> bool;

    /// A removed placeholder was re-inserted (undo); the host may resurrect the
    /// entity. Returns `false` if it cannot.
    fn request_restore_external(&mut self, id: ExternalId) -> bool {
        let _ = id;
        false
    }

    /// Current size of the anchored entity, if it still exists.
    fn anchored_size(&self, id: ExternalId) -> Option<Size>;
}

/// Source of values for [`VariableItem`]s.
pub trait VariableContext {
    /// Date used by date variables.
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    /// Page on which paragraph `paragraph` starts, if known.
    fn page_number(&self, paragraph: usize) -> Option<u32> {
        let _ = paragraph;
        None
    }

    /// Value of a user-defined variable.
    fn custom_value(&self, name: &str) -> Option<String>;

    /// Value of a document-information field (title, author, ...).
    fn field_value(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }
}

/// A [`VariableContext`] backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct StaticVariables {
    /// Fixed date; `None` uses the local clock.
    pub date: Option<NaiveDate>,
    /// Page number reported for every paragraph.
    pub page: Option<u32>,
    /// User-defined variables.
    pub custom: HashMap<String, String>,
    /// Document-information fields.
    pub fields: HashMap<String, String>,
}

impl VariableContext for StaticVariables {
    fn today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }

    fn page_number(&self, _paragraph: usize) -> Option<u32> {
        self.page
    }

    fn custom_value(&self, name: &str) -> Option<String> {
        self.custom.get(name).cloned()
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

/// An inline picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    /// Host-resolvable image source.
    pub source: String,
    /// Intrinsic width.
    pub width: i32,
    /// Intrinsic height.
    pub height: i32,
    /// Flow placement.
    pub placement: Placement,
}

/// Placeholder for a host-owned entity such as a floating frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorItem {
    /// Entity this placeholder stands for.
    pub external: ExternalId,
}

/// A small embedded table of plain-text cells.
///
/// The measured size is cached per format key; equality ignores the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableItem {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub columns: usize,
    /// Cell texts in row-major order; missing cells are empty.
    pub cells: Vec<String>,
    /// Padding around each cell.
    pub padding: i32,
    #[serde(skip)]
    size: RefCell<Option<(String, Size)>>,
}

impl PartialEq for TableItem {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.columns == other.columns
            && self.cells == other.cells
            && self.padding == other.padding
    }
}

impl TableItem {
    /// Create a table with empty cells.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            cells: vec![String::new(); rows * columns],
            padding: 2,
            size: RefCell::new(None),
        }
    }

    /// Text of a cell.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells.get(row * self.columns + column).map(String::as_str)
    }

    /// Replace the text of a cell. Returns `false` if the cell does not exist.
    pub fn set_cell(&mut self, row: usize, column: usize, text: impl Into<String>) -> bool {
        if row >= self.rows || column >= self.columns {
            return false;
        }
        let index = row * self.columns + column;
        if self.cells.len() <= index {
            self.cells.resize(self.rows * self.columns, String::new());
        }
        self.cells[index] = text.into();
        self.size.replace(None);
        true
    }

    /// Whether a measured size is cached.
    pub fn is_measured(&self) -> bool {
        self.size.borrow().is_some()
    }

    fn measure(&self, measure: &dyn TextMeasure, format: &Format) -> Size {
        let key = format.key();
        if let Some((cached_key, size)) = self.size.borrow().as_ref()
            && *cached_key == key
        {
            return *size;
        }
        let row_height = measure.height(format) + 2 * self.padding;
        let mut width = 0;
        for column in 0..self.columns {
            let column_width = (0..self.rows)
                .filter_map(|row| self.cell(row, column))
                .map(|text| text_width(measure, format, text))
                .max()
                .unwrap_or(0);
            width += column_width + 2 * self.padding;
        }
        let size = Size::new(width, row_height * self.rows as i32);
        self.size.replace(Some((key, size)));
        size
    }
}

/// What a variable displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    /// Current date rendered with a `strftime` pattern.
    Date {
        /// `strftime` pattern; invalid patterns fall back to ISO 8601.
        format: String,
    },
    /// Number of the page the variable is on.
    PageNumber,
    /// Footnote reference, renumbered in document order.
    Footnote {
        /// Assigned number (1-based).
        number: u32,
    },
    /// User-defined variable.
    Custom {
        /// Variable name.
        name: String,
    },
    /// Document-information field.
    Field {
        /// Field name.
        name: String,
    },
}

/// An auto-updating text field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableItem {
    /// Variable kind.
    pub kind: VariableKind,
    /// Last computed display text.
    pub text: String,
}

impl VariableItem {
    /// Create a variable with placeholder text. Call
    /// [`Document::recalc_variables`](crate::Document::recalc_variables) to fill it.
    pub fn new(kind: VariableKind) -> Self {
        let text = match &kind {
            VariableKind::Footnote { number } => number.to_string(),
            VariableKind::Custom { name } | VariableKind::Field { name } => format!("<{name}>"),
            VariableKind::Date { .. } | VariableKind::PageNumber => String::from("#"),
        };
        Self { kind, text }
    }

    /// Recompute the display text. Returns whether it changed.
    pub fn recalc(&mut self, ctx: &dyn VariableContext, paragraph: usize) -> bool {
        let text = match &self.kind {
            VariableKind::Date { format } => format_date(ctx.today(), format),
            VariableKind::PageNumber => ctx
                .page_number(paragraph)
                .map(|page| page.to_string())
                .unwrap_or_else(|| "#".to_string()),
            VariableKind::Footnote { number } => number.to_string(),
            VariableKind::Custom { name } => ctx
                .custom_value(name)
                .unwrap_or_else(|| format!("<{name}>")),
            VariableKind::Field { name } => ctx.field_value(name).unwrap_or_default(),
        };
        if text == self.text {
            return false;
        }
        self.text = text;
        true
    }
}

fn format_date(date: NaiveDate, pattern: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return date.format("%Y-%m-%d").to_string();
    }
    date.format_with_items(items.into_iter()).to_string()
}

/// A horizontal rule. Always occupies a line of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleItem {
    /// Line thickness.
    pub thickness: i32,
    /// Line colour; `None` follows the text colour.
    pub color: Option<Color>,
}

/// Inline non-text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CustomItem {
    /// A picture.
    Image(ImageItem),
    /// A placeholder for a host-owned entity.
    Anchor(AnchorItem),
    /// An embedded table.
    Table(TableItem),
    /// An auto-updating field.
    Variable(VariableItem),
    /// A horizontal rule.
    Rule(RuleItem),
}

impl CustomItem {
    /// Convenience constructor for an anchor.
    pub fn anchor(id: ExternalId) -> Self {
        CustomItem::Anchor(AnchorItem { external: id })
    }

    /// Convenience constructor for an inline image.
    pub fn image(source: impl Into<String>, width: i32, height: i32) -> Self {
        CustomItem::Image(ImageItem {
            source: source.into(),
            width,
            height,
            placement: Placement::Inline,
        })
    }

    /// Short name of the item kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CustomItem::Image(_) => "image",
            CustomItem::Anchor(_) => "anchor",
            CustomItem::Table(_) => "table",
            CustomItem::Variable(_) => "variable",
            CustomItem::Rule(_) => "rule",
        }
    }

    /// Whether the item forces a line break before and after itself.
    pub fn own_line(&self) -> bool {
        match self {
            CustomItem::Rule(_) => true,
            CustomItem::Image(_)
            | CustomItem::Anchor(_)
            | CustomItem::Table(_)
            | CustomItem::Variable(_) => false,
        }
    }

    /// Whether a line may break right after this item.
    pub fn is_breakable(&self) -> bool {
        match self {
            CustomItem::Table(_) | CustomItem::Rule(_) => true,
            CustomItem::Image(_) | CustomItem::Anchor(_) | CustomItem::Variable(_) => false,
        }
    }

    /// Flow placement.
    pub fn placement(&self) -> Placement {
        match self {
            CustomItem::Image(image) => image.placement,
            CustomItem::Anchor(_)
            | CustomItem::Table(_)
            | CustomItem::Variable(_)
            | CustomItem::Rule(_) => Placement::Inline,
        }
    }

    /// External entity this item references, if any.
    pub fn external_id(&self) -> Option<ExternalId> {
        match self {
            CustomItem::Anchor(anchor) => Some(anchor.external),
            CustomItem::Image(_)
            | CustomItem::Table(_)
            | CustomItem::Variable(_)
            | CustomItem::Rule(_) => None,
        }
    }

    /// Text shown in place of the item by plain-text consumers.
    pub fn display_text(&self) -> Option<&str> {
        match self {
            CustomItem::Variable(variable) => Some(&variable.text),
            CustomItem::Image(_)
            | CustomItem::Anchor(_)
            | CustomItem::Table(_)
            | CustomItem::Rule(_) => None,
        }
    }

    /// Compute the item's size.
    ///
    /// `line_width` is the width available to the line the item sits on (used
    /// by rules). A missing anchored entity measures as zero.
    pub fn size(
        &self,
        format: &Format,
        measure: &dyn TextMeasure,
        relations: Option<&dyn ExternalRelations>,
        line_width: i32,
    ) -> Size {
        match self {
            CustomItem::Image(image) => Size::new(image.width, image.height),
            CustomItem::Anchor(anchor) => {
                match relations.and_then(|r| r.anchored_size(anchor.external)) {
                    Some(size) => size,
                    None => {
                        tracing::warn!(id = anchor.external.0, "anchored entity missing, measuring as empty");
                        Size::default()
                    }
                }
            }
            CustomItem::Table(table) => table.measure(measure, format),
            CustomItem::Variable(variable) => Size::new(
                text_width(measure, format, &variable.text),
                measure.height(format),
            ),
            CustomItem::Rule(rule) => Size::new(line_width.max(0), rule.thickness.max(1)),
        }
    }

    /// Drop cached measurements. Called when the measurer changes.
    pub fn invalidate(&self) {
        if let CustomItem::Table(table) = self {
            table.size.replace(None);
        }
    }
}
