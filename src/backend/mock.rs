// SPDX-License-Identifier: Apache-2.0

//! In-memory [`BotBackend`] used by unit and integration tests.
//!
//! Records every call, lets tests script per-operation failures, and
//! applies table updates to its own state so post-commit refetches observe
//! the committed values.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ConsoleError, ConsoleResult};

use super::types::{
    Bot, BotPatch, BotSummary, ColumnsIndex, CommandInfo, PromptInfo, Row, TableDetail,
    TableUpdate, TwoStepsReply, TwoStepsStatus, VectorStore, VectorStoreSyncReport,
    WireChatMessage,
};
use super::BotBackend;

#[derive(Default)]
struct MockState {
    tables: BTreeMap<String, TableDetail>,
    bots: Vec<Bot>,
    bots_by_table: BTreeMap<String, Vec<BotSummary>>,
    commands: Vec<CommandInfo>,
    prompts: Vec<PromptInfo>,
    vector_stores: Vec<VectorStore>,
    models: Vec<String>,
    chat_reply: String,
    two_steps_reply: Option<TwoStepsReply>,
    sql_rows: Vec<Row>,
    failures: HashMap<String, ConsoleError>,
    calls: Vec<String>,
    last_table_update: Option<Vec<TableUpdate>>,
    last_vector_sync: Option<Vec<String>>,
    detail_delay: Duration,
    find_bots_delay: Duration,
    update_tables_delay: Duration,
    sync_report: Option<VectorStoreSyncReport>,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Test setup ──────────────────────────────────────────

    pub fn insert_table(&self, name: impl Into<String>, detail: TableDetail) {
        self.state.lock().tables.insert(name.into(), detail);
    }

    pub fn insert_bot(&self, bot: Bot) {
        self.state.lock().bots.push(bot);
    }

    pub fn associate_bot(&self, table: impl Into<String>, bot: BotSummary) {
        self.state
            .lock()
            .bots_by_table
            .entry(table.into())
            .or_default()
            .push(bot);
    }

    pub fn script_two_steps_reply(&self, reply: TwoStepsReply) {
        self.state.lock().two_steps_reply = Some(reply);
    }

    pub fn script_sql_rows(&self, rows: Vec<Row>) {
        self.state.lock().sql_rows = rows;
    }

    pub fn script_chat_reply(&self, reply: impl Into<String>) {
        self.state.lock().chat_reply = reply.into();
    }

    pub fn script_models(&self, models: Vec<String>) {
        self.state.lock().models = models;
    }

    pub fn insert_command(&self, command: CommandInfo) {
        self.state.lock().commands.push(command);
    }

    pub fn insert_prompt(&self, prompt: PromptInfo) {
        self.state.lock().prompts.push(prompt);
    }

    pub fn insert_vector_store(&self, store: VectorStore) {
        self.state.lock().vector_stores.push(store);
    }

    /// Make the named operation fail until [`clear_failure`] is called
    pub fn fail(&self, op: &str, error: ConsoleError) {
        self.state.lock().failures.insert(op.to_string(), error);
    }

    pub fn clear_failure(&self, op: &str) {
        self.state.lock().failures.remove(op);
    }

    /// Artificial latency for `table_detail`, for in-flight overlap tests
    pub fn set_detail_delay(&self, delay: Duration) {
        self.state.lock().detail_delay = delay;
    }

    /// Artificial latency for `find_bots_by_tables`, for stale-response tests
    pub fn set_find_bots_delay(&self, delay: Duration) {
        self.state.lock().find_bots_delay = delay;
    }

    /// Artificial latency for `update_tables`, for in-flight guard tests
    pub fn set_update_tables_delay(&self, delay: Duration) {
        self.state.lock().update_tables_delay = delay;
    }

    /// Override the report returned by `update_vector_stores`
    pub fn script_sync_report(&self, report: VectorStoreSyncReport) {
        self.state.lock().sync_report = Some(report);
    }

    // ─── Assertions ──────────────────────────────────────────

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == op).count()
    }

    pub fn last_table_update(&self) -> Option<Vec<TableUpdate>> {
        self.state.lock().last_table_update.clone()
    }

    pub fn last_vector_sync(&self) -> Option<Vec<String>> {
        self.state.lock().last_vector_sync.clone()
    }

    // ─── Internals ───────────────────────────────────────────

    fn enter(&self, op: &str) -> ConsoleResult<()> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        if let Some(error) = state.failures.get(op) {
            return Err(error.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl BotBackend for MockBackend {
    async fn list_tables(&self) -> ConsoleResult<Vec<String>> {
        self.enter("list_tables")?;
        Ok(self.state.lock().tables.keys().cloned().collect())
    }

    async fn table_detail(&self, name: &str) -> ConsoleResult<TableDetail> {
        self.enter("table_detail")?;
        let delay = self.state.lock().detail_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| ConsoleError::backend(404, format!("table {} not found", name)))
    }

    async fn tables_and_columns(&self) -> ConsoleResult<ColumnsIndex> {
        self.enter("tables_and_columns")?;
        Ok(self
            .state
            .lock()
            .tables
            .iter()
            .map(|(name, detail)| {
                (
                    name.clone(),
                    detail.columns.iter().map(|c| c.name.clone()).collect(),
                )
            })
            .collect())
    }

    async fn update_tables(&self, updates: &[TableUpdate]) -> ConsoleResult<()> {
        self.enter("update_tables")?;
        let delay = self.state.lock().update_tables_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        for update in updates {
            if let Some(detail) = state.tables.get_mut(&update.name) {
                if let Some(ref description) = update.description {
                    detail.description = description.clone();
                }
                for column_update in &update.columns {
                    if let Some(column) = detail
                        .columns
                        .iter_mut()
                        .find(|c| c.name == column_update.name)
                    {
                        column.comment = Some(column_update.comment.clone());
                    }
                }
            }
        }
        state.last_table_update = Some(updates.to_vec());
        Ok(())
    }

    async fn find_bots_by_tables(&self, tables: &[String]) -> ConsoleResult<Vec<BotSummary>> {
        self.enter("find_bots_by_tables")?;
        let delay = self.state.lock().find_bots_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        let mut seen = Vec::new();
        let mut bots: Vec<BotSummary> = Vec::new();
        for table in tables {
            if let Some(associated) = state.bots_by_table.get(table) {
                for bot in associated {
                    if !seen.contains(&bot.id) {
                        seen.push(bot.id.clone());
                        bots.push(bot.clone());
                    }
                }
            }
        }
        Ok(bots)
    }

    async fn update_vector_stores(
        &self,
        bot_ids: &[String],
    ) -> ConsoleResult<VectorStoreSyncReport> {
        self.enter("update_vector_stores")?;
        let mut state = self.state.lock();
        state.last_vector_sync = Some(bot_ids.to_vec());
        if let Some(report) = state.sync_report.clone() {
            return Ok(report);
        }
        Ok(VectorStoreSyncReport {
            updated: bot_ids.to_vec(),
            failed: Vec::new(),
        })
    }

    async fn list_bots(&self) -> ConsoleResult<Vec<Bot>> {
        self.enter("list_bots")?;
        Ok(self.state.lock().bots.clone())
    }

    async fn create_bot(&self, bot: &BotPatch) -> ConsoleResult<Bot> {
        self.enter("create_bot")?;
        let mut state = self.state.lock();
        let created = Bot {
            id: format!("bot-{}", state.bots.len() + 1),
            name: bot.name.clone().unwrap_or_else(|| "unnamed".to_string()),
            description: bot.description.clone(),
            prompt: bot.prompt.clone(),
            tables: bot.tables.clone().unwrap_or_default(),
            metadata: Default::default(),
        };
        state.bots.push(created.clone());
        Ok(created)
    }

    async fn update_bot(&self, bot_id: &str, patch: &BotPatch) -> ConsoleResult<()> {
        self.enter("update_bot")?;
        let mut state = self.state.lock();
        let bot = state
            .bots
            .iter_mut()
            .find(|b| b.id == bot_id)
            .ok_or_else(|| ConsoleError::backend(404, format!("bot {} not found", bot_id)))?;
        if let Some(ref name) = patch.name {
            bot.name = name.clone();
        }
        if let Some(ref description) = patch.description {
            bot.description = Some(description.clone());
        }
        if let Some(ref prompt) = patch.prompt {
            bot.prompt = Some(prompt.clone());
        }
        if let Some(ref tables) = patch.tables {
            bot.tables = tables.clone();
        }
        Ok(())
    }

    async fn delete_bot(&self, bot_id: &str) -> ConsoleResult<()> {
        self.enter("delete_bot")?;
        let mut state = self.state.lock();
        let before = state.bots.len();
        state.bots.retain(|b| b.id != bot_id);
        if state.bots.len() == before {
            return Err(ConsoleError::backend(404, format!("bot {} not found", bot_id)));
        }
        Ok(())
    }

    async fn create_vector_store(&self, bot_id: &str) -> ConsoleResult<String> {
        self.enter("create_vector_store")?;
        Ok(format!("vs-{}", bot_id))
    }

    async fn delete_vector_store(&self, store_id: &str) -> ConsoleResult<()> {
        self.enter("delete_vector_store")?;
        self.state.lock().vector_stores.retain(|v| v.id != store_id);
        Ok(())
    }

    async fn list_vector_stores(&self) -> ConsoleResult<Vec<VectorStore>> {
        self.enter("list_vector_stores")?;
        Ok(self.state.lock().vector_stores.clone())
    }

    async fn list_commands(&self) -> ConsoleResult<Vec<CommandInfo>> {
        self.enter("list_commands")?;
        Ok(self.state.lock().commands.clone())
    }

    async fn list_prompts(&self) -> ConsoleResult<Vec<PromptInfo>> {
        self.enter("list_prompts")?;
        Ok(self.state.lock().prompts.clone())
    }

    async fn chat_with_bot(
        &self,
        _bot_id: &str,
        _messages: &[WireChatMessage],
    ) -> ConsoleResult<String> {
        self.enter("chat_with_bot")?;
        Ok(self.state.lock().chat_reply.clone())
    }

    async fn two_steps_chat(
        &self,
        _message: &str,
        _client_name: &str,
    ) -> ConsoleResult<TwoStepsReply> {
        self.enter("two_steps_chat")?;
        Ok(self
            .state
            .lock()
            .two_steps_reply
            .clone()
            .unwrap_or(TwoStepsReply {
                status: TwoStepsStatus::Ok,
                message: Some("done".to_string()),
                sql: None,
                table_list: Vec::new(),
                result: None,
                error: None,
                token_usage: None,
            }))
    }

    async fn execute_sql(&self, _sql: &str, _client_name: &str) -> ConsoleResult<Vec<Row>> {
        self.enter("execute_sql")?;
        Ok(self.state.lock().sql_rows.clone())
    }

    async fn list_models(&self) -> ConsoleResult<Vec<String>> {
        self.enter("list_models")?;
        Ok(self.state.lock().models.clone())
    }

    async fn reload_schema(&self) -> ConsoleResult<()> {
        self.enter("reload_schema")?;
        Ok(())
    }
}
