// SPDX-License-Identifier: Apache-2.0

//! Bot directory.
//!
//! Session-long store for the dashboard surface: the bot list with
//! multi-select, commands, prompts, and vector stores. Reads are served
//! from the cached lists; writes go through the backend first and patch
//! the cached entry on success.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::backend::types::{
    Bot, BotPatch, CommandInfo, PromptInfo, VectorStore, VectorStoreSyncReport,
};
use crate::backend::BotBackend;
use crate::error::{ConsoleError, ConsoleResult};

pub struct BotDirectory {
    backend: Arc<dyn BotBackend>,
    bots: RwLock<Vec<Bot>>,
    commands: RwLock<Vec<CommandInfo>>,
    prompts: RwLock<Vec<PromptInfo>>,
    vector_stores: RwLock<Vec<VectorStore>>,
    selection: parking_lot::Mutex<BTreeSet<String>>,
}

impl BotDirectory {
    pub fn new(backend: Arc<dyn BotBackend>) -> Self {
        Self {
            backend,
            bots: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            prompts: RwLock::new(Vec::new()),
            vector_stores: RwLock::new(Vec::new()),
            selection: parking_lot::Mutex::new(BTreeSet::new()),
        }
    }

    // ─── Fetching ────────────────────────────────────────────

    pub async fn refresh_bots(&self) -> ConsoleResult<Vec<Bot>> {
        let bots = self.backend.list_bots().await?;
        *self.bots.write().await = bots.clone();
        Ok(bots)
    }

    pub async fn bots(&self) -> Vec<Bot> {
        self.bots.read().await.clone()
    }

    pub async fn refresh_commands(&self) -> ConsoleResult<Vec<CommandInfo>> {
        let commands = self.backend.list_commands().await?;
        *self.commands.write().await = commands.clone();
        Ok(commands)
    }

    pub async fn refresh_prompts(&self) -> ConsoleResult<Vec<PromptInfo>> {
        let prompts = self.backend.list_prompts().await?;
        *self.prompts.write().await = prompts.clone();
        Ok(prompts)
    }

    pub async fn refresh_vector_stores(&self) -> ConsoleResult<Vec<VectorStore>> {
        let stores = self.backend.list_vector_stores().await?;
        *self.vector_stores.write().await = stores.clone();
        Ok(stores)
    }

    // ─── Bot lifecycle ───────────────────────────────────────

    #[instrument(skip(self, patch))]
    pub async fn create_bot(&self, patch: BotPatch) -> ConsoleResult<Bot> {
        let created = self.backend.create_bot(&patch).await?;
        self.bots.write().await.push(created.clone());
        Ok(created)
    }

    /// Write the patch through the backend, then apply it to the cached
    /// entry so readers see the update without a refetch.
    #[instrument(skip(self, patch))]
    pub async fn update_bot(&self, bot_id: &str, patch: BotPatch) -> ConsoleResult<()> {
        self.backend.update_bot(bot_id, &patch).await?;
        let mut bots = self.bots.write().await;
        if let Some(bot) = bots.iter_mut().find(|b| b.id == bot_id) {
            if let Some(name) = patch.name {
                bot.name = name;
            }
            if let Some(description) = patch.description {
                bot.description = Some(description);
            }
            if let Some(prompt) = patch.prompt {
                bot.prompt = Some(prompt);
            }
            if let Some(tables) = patch.tables {
                bot.tables = tables;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_bot(&self, bot_id: &str) -> ConsoleResult<()> {
        self.backend.delete_bot(bot_id).await?;
        self.bots.write().await.retain(|b| b.id != bot_id);
        self.selection.lock().remove(bot_id);
        Ok(())
    }

    // ─── Vector stores ───────────────────────────────────────

    /// Build the vector store for one bot and stamp the cached bot with
    /// the new store id and update time.
    #[instrument(skip(self))]
    pub async fn create_vector_store(&self, bot_id: &str) -> ConsoleResult<String> {
        let store_id = self.backend.create_vector_store(bot_id).await?;
        let mut bots = self.bots.write().await;
        if let Some(bot) = bots.iter_mut().find(|b| b.id == bot_id) {
            bot.metadata.vector_store_id = Some(store_id.clone());
            bot.metadata.vector_store_updated = Some(Utc::now());
        }
        info!(bot_id, store_id = %store_id, "vector store created");
        Ok(store_id)
    }

    /// Delete a vector store and detach any bot still pointing at it.
    #[instrument(skip(self))]
    pub async fn delete_vector_store(&self, store_id: &str) -> ConsoleResult<()> {
        self.backend.delete_vector_store(store_id).await?;
        self.vector_stores.write().await.retain(|v| v.id != store_id);
        let mut bots = self.bots.write().await;
        for bot in bots.iter_mut() {
            if bot.metadata.vector_store_id.as_deref() == Some(store_id) {
                bot.metadata.vector_store_id = None;
                bot.metadata.vector_store_updated = None;
            }
        }
        Ok(())
    }

    /// Refresh the vector stores of every selected bot, then re-fetch the
    /// bot list so the stamped metadata is server truth.
    #[instrument(skip(self))]
    pub async fn update_selected_vector_stores(&self) -> ConsoleResult<VectorStoreSyncReport> {
        let selected: Vec<String> = self.selection.lock().iter().cloned().collect();
        if selected.is_empty() {
            return Err(ConsoleError::internal("no bots selected"));
        }
        let report = self.backend.update_vector_stores(&selected).await?;
        self.refresh_bots().await?;
        Ok(report)
    }

    // ─── Selection ───────────────────────────────────────────

    pub fn toggle_selection(&self, bot_id: &str) {
        let mut selection = self.selection.lock();
        if !selection.remove(bot_id) {
            selection.insert(bot_id.to_string());
        }
    }

    pub async fn select_all(&self) {
        let ids: BTreeSet<String> = self.bots.read().await.iter().map(|b| b.id.clone()).collect();
        *self.selection.lock() = ids;
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    pub fn selection(&self) -> BTreeSet<String> {
        self.selection.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn bot(id: &str) -> Bot {
        Bot {
            id: id.to_string(),
            name: format!("bot {}", id),
            description: None,
            prompt: None,
            tables: Vec::new(),
            metadata: Default::default(),
        }
    }

    fn directory_with(bots: &[&str]) -> (Arc<MockBackend>, BotDirectory) {
        let backend = Arc::new(MockBackend::new());
        for id in bots {
            backend.insert_bot(bot(id));
        }
        let directory = BotDirectory::new(backend.clone());
        (backend, directory)
    }

    #[tokio::test]
    async fn refresh_and_update_patch_the_cache() {
        let (_backend, directory) = directory_with(&["a", "b"]);
        directory.refresh_bots().await.unwrap();

        directory
            .update_bot(
                "a",
                BotPatch {
                    description: Some("billing assistant".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let bots = directory.bots().await;
        let updated = bots.iter().find(|b| b.id == "a").unwrap();
        assert_eq!(updated.description.as_deref(), Some("billing assistant"));
    }

    #[tokio::test]
    async fn delete_removes_from_cache_and_selection() {
        let (_backend, directory) = directory_with(&["a", "b"]);
        directory.refresh_bots().await.unwrap();
        directory.toggle_selection("a");
        directory.toggle_selection("b");

        directory.delete_bot("a").await.unwrap();

        assert_eq!(directory.bots().await.len(), 1);
        assert_eq!(
            directory.selection().into_iter().collect::<Vec<_>>(),
            vec!["b".to_string()]
        );
    }

    #[tokio::test]
    async fn vector_store_creation_stamps_metadata() {
        let (_backend, directory) = directory_with(&["a"]);
        directory.refresh_bots().await.unwrap();

        let store_id = directory.create_vector_store("a").await.unwrap();
        let bots = directory.bots().await;
        assert_eq!(bots[0].metadata.vector_store_id.as_deref(), Some(store_id.as_str()));
        assert!(bots[0].metadata.vector_store_updated.is_some());
    }

    #[tokio::test]
    async fn vector_store_deletion_detaches_bots() {
        let (_backend, directory) = directory_with(&["a"]);
        directory.refresh_bots().await.unwrap();
        let store_id = directory.create_vector_store("a").await.unwrap();

        directory.delete_vector_store(&store_id).await.unwrap();
        let bots = directory.bots().await;
        assert!(bots[0].metadata.vector_store_id.is_none());
        assert!(bots[0].metadata.vector_store_updated.is_none());
    }

    #[tokio::test]
    async fn batched_sync_uses_the_selection_and_refreshes() {
        let (backend, directory) = directory_with(&["a", "b", "c"]);
        directory.refresh_bots().await.unwrap();
        directory.toggle_selection("a");
        directory.toggle_selection("c");

        let report = directory.update_selected_vector_stores().await.unwrap();
        assert_eq!(report.updated, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(
            backend.last_vector_sync(),
            Some(vec!["a".to_string(), "c".to_string()])
        );
        // One refresh at setup, one after the sync.
        assert_eq!(backend.call_count("list_bots"), 2);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let (_backend, directory) = directory_with(&["a"]);
        directory.refresh_bots().await.unwrap();
        assert!(directory.update_selected_vector_stores().await.is_err());
    }

    #[tokio::test]
    async fn select_all_and_clear() {
        let (_backend, directory) = directory_with(&["a", "b"]);
        directory.refresh_bots().await.unwrap();

        directory.select_all().await;
        assert_eq!(directory.selection().len(), 2);

        directory.clear_selection();
        assert!(directory.selection().is_empty());
    }
}
