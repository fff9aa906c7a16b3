// SPDX-License-Identifier: Apache-2.0

//! Presentation cache for server-fetched read models.
//!
//! Three resources with independent load/error behavior: the table-name
//! list, per-table detail payloads (fetched on first expand), and the full
//! table→columns index. Errors are returned to the caller and never
//! cached, so a failed resource is retryable without affecting the others.
//! After a successful batch submission the whole cache is invalidated —
//! client-held copies of just-written data are never trusted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::backend::types::{ColumnsIndex, TableDetail};
use crate::backend::BotBackend;
use crate::error::ConsoleResult;

pub struct PresentationCache {
    backend: Arc<dyn BotBackend>,
    tables: RwLock<Option<Vec<String>>>,
    details: parking_lot::Mutex<HashMap<String, Arc<OnceCell<TableDetail>>>>,
    index: RwLock<Option<ColumnsIndex>>,
}

impl PresentationCache {
    pub fn new(backend: Arc<dyn BotBackend>) -> Self {
        Self {
            backend,
            tables: RwLock::new(None),
            details: parking_lot::Mutex::new(HashMap::new()),
            index: RwLock::new(None),
        }
    }

    /// The table-name list, fetched once per session
    pub async fn tables(&self) -> ConsoleResult<Vec<String>> {
        if let Some(tables) = self.tables.read().await.as_ref() {
            return Ok(tables.clone());
        }
        let mut slot = self.tables.write().await;
        // Another caller may have filled the slot while we waited.
        if let Some(tables) = slot.as_ref() {
            return Ok(tables.clone());
        }
        let tables = self.backend.list_tables().await?;
        *slot = Some(tables.clone());
        Ok(tables)
    }

    /// Detail for one table. Concurrent callers for the same name during
    /// an in-flight fetch share a single request.
    pub async fn table_detail(&self, name: &str) -> ConsoleResult<TableDetail> {
        let cell = {
            let mut details = self.details.lock();
            Arc::clone(details.entry(name.to_string()).or_default())
        };
        let detail = cell
            .get_or_try_init(|| async { self.backend.table_detail(name).await })
            .await?;
        Ok(detail.clone())
    }

    /// Already-fetched detail, if any. Edits are only legal on loaded
    /// tables, so the diff tracker reads originals through this.
    pub fn cached_detail(&self, name: &str) -> Option<TableDetail> {
        let details = self.details.lock();
        details.get(name).and_then(|cell| cell.get().cloned())
    }

    /// The full table→columns index, fetched once and treated as immutable
    /// for the session unless explicitly invalidated.
    pub async fn columns_index(&self) -> ConsoleResult<ColumnsIndex> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(index.clone());
        }
        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let index = self.backend.tables_and_columns().await?;
        *slot = Some(index.clone());
        Ok(index)
    }

    /// All `table.column` options selectable as a foreign-key target from
    /// `current_table` (a column never references its own table).
    pub async fn foreign_key_options(&self, current_table: &str) -> ConsoleResult<Vec<String>> {
        let index = self.columns_index().await?;
        let mut options = Vec::new();
        for (table, columns) in &index {
            if table == current_table {
                continue;
            }
            for column in columns {
                options.push(format!("{}.{}", table, column));
            }
        }
        Ok(options)
    }

    /// Wholesale eviction after a successful batch submission.
    pub async fn invalidate_all(&self) {
        debug!("invalidating presentation cache");
        self.details.lock().clear();
        *self.tables.write().await = None;
        *self.index.write().await = None;
    }
}
