// SPDX-License-Identifier: Apache-2.0

//! Column annotation codec.
//!
//! A column's `comment` is an opaque text field that carries a structured
//! annotation: a free-text description plus a list of foreign-key
//! references (`otherTable.otherColumn`). This module is the single place
//! in the crate that reads or writes that text.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Structured value stored inside a column comment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnnotation {
    pub description: String,
    pub foreign_keys: Vec<String>,
}

impl ColumnAnnotation {
    pub fn new(description: impl Into<String>, foreign_keys: Vec<String>) -> Self {
        Self {
            description: description.into(),
            foreign_keys,
        }
    }

    /// Value equality: descriptions compared as strings, foreign keys as
    /// sets (order-independent, duplicate-insensitive).
    pub fn matches(&self, other: &ColumnAnnotation) -> bool {
        if self.description != other.description {
            return false;
        }
        let ours: BTreeSet<&str> = self.foreign_keys.iter().map(|s| s.as_str()).collect();
        let theirs: BTreeSet<&str> = other.foreign_keys.iter().map(|s| s.as_str()).collect();
        ours == theirs
    }
}

/// Decoded form of the raw comment text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodedComment {
    Annotation(ColumnAnnotation),
    /// The stored text was not valid structured data. The original is
    /// preserved untouched; such a column is read-only until its comment
    /// is replaced wholesale.
    Invalid { original: String },
}

impl DecodedComment {
    pub fn annotation(&self) -> Option<&ColumnAnnotation> {
        match self {
            DecodedComment::Annotation(annotation) => Some(annotation),
            DecodedComment::Invalid { .. } => None,
        }
    }
}

/// Decode a raw comment. Absent or blank input is the empty annotation;
/// unparseable input yields [`DecodedComment::Invalid`] carrying the
/// original text, never a partial parse.
pub fn decode(raw: Option<&str>) -> DecodedComment {
    let raw = match raw {
        Some(text) if !text.trim().is_empty() => text,
        _ => return DecodedComment::Annotation(ColumnAnnotation::default()),
    };

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return DecodedComment::Invalid {
                original: raw.to_string(),
            }
        }
    };

    // Missing or mistyped fields degrade to their defaults; only a text
    // that fails to parse at all is treated as unreadable.
    let description = parsed["description"].as_str().unwrap_or("").to_string();
    let foreign_keys = parsed["foreignKeys"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    DecodedComment::Annotation(ColumnAnnotation {
        description,
        foreign_keys,
    })
}

/// Encode an annotation into the wire text. Always produces valid
/// structured data.
pub fn encode(description: &str, foreign_keys: &[String]) -> String {
    json!({
        "description": description,
        "foreignKeys": foreign_keys,
    })
    .to_string()
}
