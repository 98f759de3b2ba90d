//! Incremental reflow.
//!
//! Edits only mark paragraphs stale. The host drives formatting from an idle
//! point by calling [`Document::format_more`] with a small budget until it
//! reports [`ReflowStatus::Done`]. The reflow cursor (lowest paragraph that
//! may need work) is the only progress state, so stopping between calls is
//! always safe.
//!
//! ```rust
//! use richtext_core::{Document, ReflowStatus};
//!
//! let mut doc = Document::from_text("one\ntwo\nthree").unwrap();
//! assert_eq!(doc.format_more(2).unwrap(), ReflowStatus::MoreWork);
//! assert_eq!(doc.format_more(2).unwrap(), ReflowStatus::Done);
//! assert!(doc.is_formatted());
//! ```

use crate::document::Document;
use crate::error::Result;

/// Outcome of one reflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowStatus {
    /// Every paragraph is formatted.
    Done,
    /// The budget ran out; call again.
    MoreWork,
}

impl Document {
    /// Format up to `budget` stale paragraphs, resuming where the previous
    /// call stopped.
    ///
    /// Paragraphs whose cache is valid and whose top still matches the
    /// bottom of their predecessor are skipped without counting against the
    /// budget.
    pub fn format_more(&mut self, budget: usize) -> Result<ReflowStatus> {
        let Some(from) = self.reflow_from else {
            return Ok(ReflowStatus::Done);
        };
        let mut formatted = 0;
        let mut id = from.min(self.paragraph_count());
        while id < self.paragraph_count() {
            if !self.needs_format(id)? {
                id += 1;
                continue;
            }
            if formatted == budget {
                self.reflow_from = Some(id);
                tracing::debug!(formatted, resume = id, "reflow budget exhausted");
                return Ok(ReflowStatus::MoreWork);
            }
            let y = self.top_of(id)?;
            self.format_paragraph(self.key_of(id)?, y)?;
            formatted += 1;
            id += 1;
        }
        self.reflow_from = None;
        tracing::debug!(formatted, "reflow complete");
        Ok(ReflowStatus::Done)
    }

    /// Format everything that is stale.
    pub fn format_all(&mut self) -> Result<()> {
        while self.format_more(self.config().reflow_budget)? == ReflowStatus::MoreWork {}
        Ok(())
    }

    /// Whether no reflow is pending.
    pub fn is_formatted(&self) -> bool {
        self.reflow_from.is_none()
    }

    /// Format paragraph `id` and everything before it that is stale.
    pub fn ensure_formatted(&mut self, id: usize) -> Result<()> {
        self.key_of(id)?;
        for k in 0..=id {
            self.format_if_needed(k)?;
        }
        Ok(())
    }
}
