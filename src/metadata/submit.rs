// SPDX-License-Identifier: Apache-2.0

//! Batch submission coordinator.
//!
//! Commits all pending edits as one transaction-like sequence of two
//! dependent network effects: the batched table update, then — after a
//! settling delay — the vector-store refresh for the bots that were
//! affected at commit time. The two effects are strictly sequential and
//! the second is skipped when the affected-bot snapshot is empty.
//!
//! Failure semantics are asymmetric on purpose: a failed table update
//! leaves every pending edit in place for retry, while a failed
//! vector-store sync after a committed update is a distinct, lower-severity
//! terminal state (the table data is already correct, only derived indices
//! are stale).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::types::{ColumnUpdate, TableUpdate};
use crate::backend::BotBackend;
use crate::error::{ConsoleError, ConsoleResult};

use super::cache::PresentationCache;
use super::comment;
use super::diff::PendingEdits;
use super::resolver::AffectedBotsTracker;

/// Phase of the submission state machine.
///
/// The moment between the committed table update and the start of the
/// vector-store sync is internal to [`SubmissionCoordinator::submit`]; the
/// observable phase during the settling delay is still `Submitting`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SubmitPhase {
    Idle,
    Submitting,
    VectorStoreSyncing,
    Success,
    Failed { message: String },
    VectorStoreSyncFailed { message: String },
}

struct PhaseSlot {
    epoch: u64,
    phase: SubmitPhase,
}

/// Group all pending modifications into one update entry per distinct
/// table. Column edits are re-encoded into wire annotation text; a table
/// with both column and description edits gets a single merged entry.
pub fn build_payload(pending: &PendingEdits) -> Vec<TableUpdate> {
    let mut grouped: BTreeMap<String, TableUpdate> = BTreeMap::new();

    for edit in pending.column_edits() {
        let entry = grouped
            .entry(edit.table.clone())
            .or_insert_with(|| TableUpdate {
                name: edit.table.clone(),
                description: None,
                columns: Vec::new(),
            });
        entry.columns.push(ColumnUpdate {
            name: edit.column.clone(),
            comment: comment::encode(&edit.description, &edit.foreign_keys),
        });
    }

    for edit in pending.description_edits() {
        let entry = grouped
            .entry(edit.table.clone())
            .or_insert_with(|| TableUpdate {
                name: edit.table.clone(),
                description: None,
                columns: Vec::new(),
            });
        entry.description = Some(edit.description.clone());
    }

    let mut updates: Vec<TableUpdate> = grouped.into_values().collect();
    for update in &mut updates {
        update.columns.sort_by(|a, b| a.name.cmp(&b.name));
    }
    updates
}

pub struct SubmissionCoordinator {
    backend: Arc<dyn BotBackend>,
    cache: Arc<PresentationCache>,
    pending: Arc<parking_lot::RwLock<PendingEdits>>,
    tracker: Arc<AffectedBotsTracker>,
    settle_delay: Duration,
    status_display: Duration,
    slot: parking_lot::Mutex<PhaseSlot>,
}

impl SubmissionCoordinator {
    pub fn new(
        backend: Arc<dyn BotBackend>,
        cache: Arc<PresentationCache>,
        pending: Arc<parking_lot::RwLock<PendingEdits>>,
        tracker: Arc<AffectedBotsTracker>,
        settle_delay: Duration,
        status_display: Duration,
    ) -> Self {
        Self {
            backend,
            cache,
            pending,
            tracker,
            settle_delay,
            status_display,
            slot: parking_lot::Mutex::new(PhaseSlot {
                epoch: 0,
                phase: SubmitPhase::Idle,
            }),
        }
    }

    pub fn phase(&self) -> SubmitPhase {
        self.slot.lock().phase.clone()
    }

    /// A submission is in flight; the commit action must stay disabled.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.slot.lock().phase,
            SubmitPhase::Submitting | SubmitPhase::VectorStoreSyncing
        )
    }

    /// Run the full submission sequence. Returns the terminal phase on
    /// success; a concurrent call while one is in flight is rejected.
    pub async fn submit(self: &Arc<Self>) -> ConsoleResult<SubmitPhase> {
        self.begin()?;

        // Snapshot the affected bots before the pending maps are cleared;
        // they cannot be re-derived afterwards.
        let affected: Vec<String> = self
            .tracker
            .snapshot()
            .into_iter()
            .map(|bot| bot.id)
            .collect();

        let updates = build_payload(&self.pending.read());
        if updates.is_empty() {
            self.set_phase(SubmitPhase::Idle);
            return Ok(SubmitPhase::Idle);
        }

        info!(tables = updates.len(), bots = affected.len(), "committing pending edits");

        if let Err(e) = self.backend.update_tables(&updates).await {
            // The whole commit is treated as not-happened; every pending
            // edit stays in place for retry.
            warn!(error = %e, "batch table update failed");
            let message = e.to_string();
            self.enter_terminal(SubmitPhase::Failed {
                message: message.clone(),
            });
            return Err(ConsoleError::submission(message));
        }

        // Tables committed: the edits are server truth now. Clear the
        // pending maps and drop every client-held copy of the written data.
        self.pending.write().clear();
        self.tracker.clear();
        self.cache.invalidate_all().await;

        if affected.is_empty() {
            self.enter_terminal(SubmitPhase::Success);
            return Ok(SubmitPhase::Success);
        }

        // Give the backend time to settle before touching derived indices.
        tokio::time::sleep(self.settle_delay).await;
        self.set_phase(SubmitPhase::VectorStoreSyncing);

        match self.backend.update_vector_stores(&affected).await {
            Ok(report) if report.failed.is_empty() => {
                info!(bots = report.updated.len(), "vector stores refreshed");
                self.enter_terminal(SubmitPhase::Success);
                Ok(SubmitPhase::Success)
            }
            Ok(report) => {
                let message = report
                    .failed
                    .iter()
                    .map(|f| format!("{}: {}", f.bot_id, f.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(failed = report.failed.len(), "vector-store refresh partially failed");
                self.enter_terminal(SubmitPhase::VectorStoreSyncFailed {
                    message: message.clone(),
                });
                Err(ConsoleError::vector_store_sync(message))
            }
            Err(e) => {
                warn!(error = %e, "vector-store refresh failed");
                let message = e.to_string();
                self.enter_terminal(SubmitPhase::VectorStoreSyncFailed {
                    message: message.clone(),
                });
                Err(ConsoleError::vector_store_sync(message))
            }
        }
    }

    fn begin(&self) -> ConsoleResult<()> {
        let mut slot = self.slot.lock();
        if matches!(
            slot.phase,
            SubmitPhase::Submitting | SubmitPhase::VectorStoreSyncing
        ) {
            return Err(ConsoleError::SubmissionInProgress);
        }
        slot.epoch += 1;
        slot.phase = SubmitPhase::Submitting;
        Ok(())
    }

    fn set_phase(&self, phase: SubmitPhase) {
        let mut slot = self.slot.lock();
        slot.epoch += 1;
        slot.phase = phase;
    }

    /// Enter a terminal phase and schedule its reset to `Idle` after the
    /// display duration. The reset is epoch-guarded so a newer
    /// submission's state is never clobbered by an old timer.
    fn enter_terminal(self: &Arc<Self>, phase: SubmitPhase) {
        let epoch = {
            let mut slot = self.slot.lock();
            slot.epoch += 1;
            slot.phase = phase;
            slot.epoch
        };

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.status_display).await;
            let mut slot = coordinator.slot.lock();
            if slot.epoch == epoch {
                slot.epoch += 1;
                slot.phase = SubmitPhase::Idle;
            }
        });
    }
}
