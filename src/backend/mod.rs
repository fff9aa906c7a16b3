// SPDX-License-Identifier: Apache-2.0

//! Backend abstraction for the bot-manager REST API.
//!
//! The actual backend (SQL execution, vector-store indexing, completions)
//! is an external collaborator; everything in this crate reaches it through
//! the [`BotBackend`] trait so that stores and flows can be exercised
//! against the in-memory [`MockBackend`].

pub mod http;
pub mod mock;
pub mod types;

pub use http::HttpBackend;
pub use mock::MockBackend;

use async_trait::async_trait;

use crate::error::ConsoleResult;
use types::{
    Bot, BotPatch, BotSummary, ColumnsIndex, CommandInfo, PromptInfo, Row, TableDetail,
    TableUpdate, TwoStepsReply, VectorStore, VectorStoreSyncReport, WireChatMessage,
};

/// Unified interface to the bot-manager backend
#[async_trait]
pub trait BotBackend: Send + Sync {
    // ─── Table metadata ──────────────────────────────────────

    /// Ordered list of table names visible to the console
    async fn list_tables(&self) -> ConsoleResult<Vec<String>>;

    /// Description + columns for one table; `comment` is opaque text
    async fn table_detail(&self, name: &str) -> ConsoleResult<TableDetail>;

    /// Full table → column-names index
    async fn tables_and_columns(&self) -> ConsoleResult<ColumnsIndex>;

    /// Commit a batched metadata update, one entry per touched table
    async fn update_tables(&self, updates: &[TableUpdate]) -> ConsoleResult<()>;

    /// Which bots reference any of the given tables. Callers must
    /// short-circuit the empty set client-side; this is a network call.
    async fn find_bots_by_tables(&self, tables: &[String]) -> ConsoleResult<Vec<BotSummary>>;

    /// Refresh the vector stores of the given bots
    async fn update_vector_stores(&self, bot_ids: &[String])
        -> ConsoleResult<VectorStoreSyncReport>;

    // ─── Bot directory ───────────────────────────────────────

    async fn list_bots(&self) -> ConsoleResult<Vec<Bot>>;

    async fn create_bot(&self, bot: &BotPatch) -> ConsoleResult<Bot>;

    async fn update_bot(&self, bot_id: &str, patch: &BotPatch) -> ConsoleResult<()>;

    async fn delete_bot(&self, bot_id: &str) -> ConsoleResult<()>;

    /// Build (or rebuild) the vector store for one bot; returns the store id
    async fn create_vector_store(&self, bot_id: &str) -> ConsoleResult<String>;

    async fn delete_vector_store(&self, store_id: &str) -> ConsoleResult<()>;

    async fn list_vector_stores(&self) -> ConsoleResult<Vec<VectorStore>>;

    async fn list_commands(&self) -> ConsoleResult<Vec<CommandInfo>>;

    async fn list_prompts(&self) -> ConsoleResult<Vec<PromptInfo>>;

    /// Send a chat history to one bot; returns the assistant reply text
    async fn chat_with_bot(
        &self,
        bot_id: &str,
        messages: &[WireChatMessage],
    ) -> ConsoleResult<String>;

    // ─── Two-step chat ───────────────────────────────────────

    /// One round of the two-step NL→SQL flow against a client database
    async fn two_steps_chat(&self, message: &str, client_name: &str)
        -> ConsoleResult<TwoStepsReply>;

    /// Execute SQL against a client database
    async fn execute_sql(&self, sql: &str, client_name: &str) -> ConsoleResult<Vec<Row>>;

    async fn list_models(&self) -> ConsoleResult<Vec<String>>;

    /// Ask the two-step service to re-read the database schema
    async fn reload_schema(&self) -> ConsoleResult<()>;
}
