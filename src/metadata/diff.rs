// SPDX-License-Identifier: Apache-2.0

//! Pending-edit tracker.
//!
//! Maintains the sparse maps of column and table-description edits whose
//! working value differs from the last fetched server value. Invariant:
//! an entry exists if and only if the entity currently differs from server
//! state — an edit reverted to the server value removes its entry rather
//! than marking it unmodified.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::types::TableDetail;
use crate::error::{ConsoleError, ConsoleResult};

use super::comment::{self, ColumnAnnotation, DecodedComment};

/// Key of a pending column edit: `table.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Working value of a modified column annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingColumnEdit {
    pub table: String,
    pub column: String,
    pub description: String,
    pub foreign_keys: Vec<String>,
    pub is_modified: bool,
}

impl PendingColumnEdit {
    pub fn annotation(&self) -> ColumnAnnotation {
        ColumnAnnotation::new(self.description.clone(), self.foreign_keys.clone())
    }
}

/// Working value of a modified table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDescriptionEdit {
    pub table: String,
    pub description: String,
    pub is_modified: bool,
}

/// Partial update applied to a column's working annotation
#[derive(Debug, Clone, Default)]
pub struct ColumnPatch {
    pub description: Option<String>,
    pub foreign_keys: Option<Vec<String>>,
}

impl ColumnPatch {
    pub fn description(value: impl Into<String>) -> Self {
        Self {
            description: Some(value.into()),
            foreign_keys: None,
        }
    }

    pub fn foreign_keys(values: Vec<String>) -> Self {
        Self {
            description: None,
            foreign_keys: Some(values),
        }
    }
}

/// The sparse maps of genuinely modified entities
#[derive(Debug, Clone, Default)]
pub struct PendingEdits {
    columns: HashMap<ColumnKey, PendingColumnEdit>,
    descriptions: HashMap<String, PendingDescriptionEdit>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a patch to a column's working annotation.
    ///
    /// `detail` must be the cached server detail of `table` — the entity
    /// must already be loaded before it can be edited. Comparison against
    /// the decoded original decides whether the entry is written or
    /// removed. Idempotent: applying the same patch twice yields the same
    /// map.
    pub fn update_column(
        &mut self,
        detail: &TableDetail,
        table: &str,
        column: &str,
        patch: ColumnPatch,
    ) -> ConsoleResult<()> {
        let original = detail
            .column(column)
            .ok_or_else(|| ConsoleError::edit_target_missing(table, column))?;

        let original_annotation = match comment::decode(original.comment.as_deref()) {
            DecodedComment::Annotation(annotation) => annotation,
            DecodedComment::Invalid { .. } => {
                return Err(ConsoleError::annotation_unreadable(table, column))
            }
        };

        let key = ColumnKey::new(table, column);
        let mut working = self
            .columns
            .get(&key)
            .map(PendingColumnEdit::annotation)
            .unwrap_or_else(|| original_annotation.clone());

        if let Some(description) = patch.description {
            working.description = description;
        }
        if let Some(foreign_keys) = patch.foreign_keys {
            working.foreign_keys = foreign_keys;
        }

        if working.matches(&original_annotation) {
            self.columns.remove(&key);
        } else {
            self.columns.insert(
                key,
                PendingColumnEdit {
                    table: table.to_string(),
                    column: column.to_string(),
                    description: working.description,
                    foreign_keys: working.foreign_keys,
                    is_modified: true,
                },
            );
        }
        Ok(())
    }

    /// Apply a new table-level description; same insert-or-remove pattern
    /// at table granularity.
    pub fn update_description(&mut self, detail: &TableDetail, table: &str, new_description: &str) {
        if detail.description == new_description {
            self.descriptions.remove(table);
        } else {
            self.descriptions.insert(
                table.to_string(),
                PendingDescriptionEdit {
                    table: table.to_string(),
                    description: new_description.to_string(),
                    is_modified: true,
                },
            );
        }
    }

    /// Distinct table names appearing in either pending map
    pub fn touched_tables(&self) -> BTreeSet<String> {
        self.columns
            .keys()
            .map(|key| key.table.clone())
            .chain(self.descriptions.keys().cloned())
            .collect()
    }

    pub fn column_edit(&self, table: &str, column: &str) -> Option<&PendingColumnEdit> {
        self.columns.get(&ColumnKey::new(table, column))
    }

    pub fn description_edit(&self, table: &str) -> Option<&PendingDescriptionEdit> {
        self.descriptions.get(table)
    }

    pub fn column_edits(&self) -> impl Iterator<Item = &PendingColumnEdit> {
        self.columns.values()
    }

    pub fn description_edits(&self) -> impl Iterator<Item = &PendingDescriptionEdit> {
        self.descriptions.values()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn description_count(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.descriptions.is_empty()
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.descriptions.clear();
    }
}
