// SPDX-License-Identifier: Apache-2.0

//! Table metadata reconciliation.
//!
//! Tracks user edits to table/column descriptions and foreign-key
//! annotations, diffs them against the cached server truth, keeps an
//! asynchronously resolved view of which bots a commit would impact, and
//! submits everything as one batched update followed by a vector-store
//! refresh for the affected bots.

pub mod cache;
pub mod comment;
pub mod diff;
pub mod resolver;
pub mod submit;

pub use cache::PresentationCache;
pub use comment::{ColumnAnnotation, DecodedComment};
pub use diff::{ColumnKey, ColumnPatch, PendingColumnEdit, PendingDescriptionEdit, PendingEdits};
pub use resolver::{AffectedBotsState, AffectedBotsTracker};
pub use submit::{SubmissionCoordinator, SubmitPhase};

use std::sync::Arc;

use crate::backend::types::{ColumnsIndex, TableDetail};
use crate::backend::BotBackend;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};

/// Facade over the reconciliation engine. All mutations of the pending
/// state go through the named operations here; readers observe the latest
/// committed state only.
pub struct MetadataStore {
    cache: Arc<PresentationCache>,
    pending: Arc<parking_lot::RwLock<PendingEdits>>,
    tracker: Arc<AffectedBotsTracker>,
    coordinator: Arc<SubmissionCoordinator>,
}

impl MetadataStore {
    pub fn new(backend: Arc<dyn BotBackend>, config: &ConsoleConfig) -> Self {
        let cache = Arc::new(PresentationCache::new(Arc::clone(&backend)));
        let pending = Arc::new(parking_lot::RwLock::new(PendingEdits::new()));
        let tracker = Arc::new(AffectedBotsTracker::new(
            Arc::clone(&backend),
            config.resolver_quiet_period(),
        ));
        let coordinator = Arc::new(SubmissionCoordinator::new(
            backend,
            Arc::clone(&cache),
            Arc::clone(&pending),
            Arc::clone(&tracker),
            config.settle_delay(),
            config.status_display(),
        ));
        Self {
            cache,
            pending,
            tracker,
            coordinator,
        }
    }

    // ─── Read models ─────────────────────────────────────────

    pub async fn tables(&self) -> ConsoleResult<Vec<String>> {
        self.cache.tables().await
    }

    pub async fn table_detail(&self, name: &str) -> ConsoleResult<TableDetail> {
        self.cache.table_detail(name).await
    }

    pub async fn columns_index(&self) -> ConsoleResult<ColumnsIndex> {
        self.cache.columns_index().await
    }

    pub async fn foreign_key_options(&self, current_table: &str) -> ConsoleResult<Vec<String>> {
        self.cache.foreign_key_options(current_table).await
    }

    // ─── Edits ───────────────────────────────────────────────

    /// Apply a patch to a column's working annotation. The table must have
    /// been loaded through [`table_detail`](Self::table_detail) first.
    pub fn edit_column(&self, table: &str, column: &str, patch: ColumnPatch) -> ConsoleResult<()> {
        let detail = self
            .cache
            .cached_detail(table)
            .ok_or_else(|| ConsoleError::table_not_loaded(table))?;
        let touched = {
            let mut pending = self.pending.write();
            pending.update_column(&detail, table, column, patch)?;
            pending.touched_tables()
        };
        self.tracker.schedule(touched);
        Ok(())
    }

    /// Replace a table's working description.
    pub fn edit_description(&self, table: &str, new_description: &str) -> ConsoleResult<()> {
        let detail = self
            .cache
            .cached_detail(table)
            .ok_or_else(|| ConsoleError::table_not_loaded(table))?;
        let touched = {
            let mut pending = self.pending.write();
            pending.update_description(&detail, table, new_description);
            pending.touched_tables()
        };
        self.tracker.schedule(touched);
        Ok(())
    }

    /// Snapshot of the current pending maps (for UI binding)
    pub fn pending(&self) -> PendingEdits {
        self.pending.read().clone()
    }

    pub fn has_modifications(&self) -> bool {
        !self.pending.read().is_empty()
    }

    // ─── Affected bots & submission ──────────────────────────

    pub fn affected_bots(&self) -> AffectedBotsState {
        self.tracker.state()
    }

    pub fn submit_phase(&self) -> SubmitPhase {
        self.coordinator.phase()
    }

    pub fn is_submitting(&self) -> bool {
        self.coordinator.is_busy()
    }

    /// Commit all pending edits; see [`SubmissionCoordinator::submit`].
    pub async fn submit(&self) -> ConsoleResult<SubmitPhase> {
        self.coordinator.submit().await
    }
}
