// SPDX-License-Identifier: Apache-2.0

//! Wire types for the bot-manager backend.
//!
//! These mirror the REST payloads exactly; everything the engine derives
//! from them (pending edits, decoded annotations, cost figures) lives in
//! the modules that own those concerns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A result row from SQL execution: column name → JSON value
pub type Row = serde_json::Map<String, Value>;

// ─── Table metadata ──────────────────────────────────────────

/// One column of a table as reported by the backend.
///
/// `comment` is opaque text here; only the annotation codec may interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Detail payload for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDetail {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableDetail {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One table entry of the batched update payload. Carries only the fields
/// that actually changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdate {
    pub name: String,
    /// Re-encoded structured annotation text
    pub comment: String,
}

/// Mapping table name → ordered column names, used to populate
/// foreign-key pickers
pub type ColumnsIndex = BTreeMap<String, Vec<String>>;

// ─── Bots ────────────────────────────────────────────────────

/// Lightweight bot reference returned by the affected-bot lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A bot: a named configuration pairing a prompt, a description, and a set
/// of referenced data tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub metadata: BotMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Partial bot payload for create/update; only set fields are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Result summary of a multi-bot vector-store refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreSyncReport {
    #[serde(default)]
    pub updated: Vec<String>,
    #[serde(default)]
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub bot_id: String,
    pub message: String,
}

// ─── Chat ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One turn of a chat history as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Status pill attached to a two-step chat reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TwoStepsStatus {
    Ok,
    Error,
    Pending,
    Warning,
    #[serde(other)]
    Unknown,
}

impl TwoStepsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoStepsStatus::Ok => "OK",
            TwoStepsStatus::Error => "ERROR",
            TwoStepsStatus::Pending => "PENDING",
            TwoStepsStatus::Warning => "WARNING",
            TwoStepsStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Reply from the two-step NL→SQL endpoint: a natural-language message,
/// the generated SQL, the tables the first pass selected, optionally the
/// already-executed result rows, and token accounting for both passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoStepsReply {
    pub status: TwoStepsStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default, rename = "tableList")]
    pub table_list: Vec<String>,
    #[serde(default)]
    pub result: Option<Vec<Row>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "tokenUsage")]
    pub token_usage: Option<TokenUsage>,
}

/// Token accounting for the two passes of a two-step reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, rename = "tablePass")]
    pub table_pass: Option<PassUsage>,
    #[serde(default, rename = "sqlPass")]
    pub sql_pass: Option<PassUsage>,
}

/// Usage report for a single completion pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

impl PassUsage {
    pub fn cached_tokens(&self) -> u64 {
        self.prompt_tokens_details
            .as_ref()
            .map(|d| d.cached_tokens)
            .unwrap_or(0)
    }

    pub fn uncached_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_sub(self.cached_tokens())
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_update_omits_unchanged_fields() {
        let update = TableUpdate {
            name: "orders".to_string(),
            description: None,
            columns: vec![ColumnUpdate {
                name: "id".to_string(),
                comment: "{\"description\":\"pk\",\"foreignKeys\":[]}".to_string(),
            }],
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["columns"][0]["name"], "id");

        let desc_only = TableUpdate {
            name: "orders".to_string(),
            description: Some("order headers".to_string()),
            columns: Vec::new(),
        };
        let json = serde_json::to_value(&desc_only).unwrap();
        assert!(json.get("columns").is_none());
    }

    #[test]
    fn two_steps_reply_tolerates_sparse_payloads() {
        let reply: TwoStepsReply = serde_json::from_str(r#"{"status":"OK"}"#).unwrap();
        assert_eq!(reply.status, TwoStepsStatus::Ok);
        assert!(reply.sql.is_none());
        assert!(reply.table_list.is_empty());

        let reply: TwoStepsReply =
            serde_json::from_str(r#"{"status":"SOMETHING_NEW","message":"m"}"#).unwrap();
        assert_eq!(reply.status, TwoStepsStatus::Unknown);
    }

    #[test]
    fn pass_usage_token_split() {
        let usage: PassUsage = serde_json::from_str(
            r#"{"prompt_tokens":1000,"completion_tokens":50,"prompt_tokens_details":{"cached_tokens":600}}"#,
        )
        .unwrap();
        assert_eq!(usage.cached_tokens(), 600);
        assert_eq!(usage.uncached_tokens(), 400);
        assert_eq!(usage.total_tokens(), 1050);
    }

    #[test]
    fn bot_metadata_round_trips_unknown_keys() {
        let json = r#"{"vector_store_id":"vs1","custom":"x"}"#;
        let meta: BotMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.vector_store_id.as_deref(), Some("vs1"));
        assert_eq!(meta.extra["custom"], "x");
    }
}
