// SPDX-License-Identifier: Apache-2.0

//! Affected-bot resolver.
//!
//! Answers "which bots would be impacted if the pending edits were
//! committed?" without blocking editing. Resolution itself is a pure async
//! function of the touched-table set; [`AffectedBotsTracker`] adds the
//! debounce policy on top so the two can be tested independently.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::types::BotSummary;
use crate::backend::BotBackend;
use crate::error::{ConsoleError, ConsoleResult};

/// Resolve the bot set for the given tables. The empty set resolves
/// immediately with no network call.
pub async fn resolve_affected(
    backend: &dyn BotBackend,
    tables: &BTreeSet<String>,
) -> ConsoleResult<Vec<BotSummary>> {
    if tables.is_empty() {
        return Ok(Vec::new());
    }
    let names: Vec<String> = tables.iter().cloned().collect();
    backend
        .find_bots_by_tables(&names)
        .await
        .map_err(|e| ConsoleError::resolver(e.to_string()))
}

/// Observable resolver state
#[derive(Debug, Clone, Default, Serialize)]
pub struct AffectedBotsState {
    pub bots: Vec<BotSummary>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Debounced wrapper around [`resolve_affected`].
///
/// Every call to [`schedule`](Self::schedule) supersedes the previous one;
/// only the last invocation within a quiet window actually fires. An
/// in-flight lookup is not cancelled when inputs change again — instead
/// each invocation carries a sequence number and a response is discarded
/// unless its sequence is still the latest issued, so a stale response can
/// never overwrite a newer one.
pub struct AffectedBotsTracker {
    backend: Arc<dyn BotBackend>,
    quiet_period: Duration,
    seq: AtomicU64,
    state: parking_lot::RwLock<AffectedBotsState>,
}

impl AffectedBotsTracker {
    pub fn new(backend: Arc<dyn BotBackend>, quiet_period: Duration) -> Self {
        Self {
            backend,
            quiet_period,
            seq: AtomicU64::new(0),
            state: parking_lot::RwLock::new(AffectedBotsState::default()),
        }
    }

    /// Schedule a lookup for the given touched-table set.
    ///
    /// Empty input is terminal: bots, error, and loading clear immediately
    /// and nothing is dispatched.
    pub fn schedule(self: &Arc<Self>, tables: BTreeSet<String>) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;

        if tables.is_empty() {
            let mut state = self.state.write();
            state.bots.clear();
            state.loading = false;
            state.error = None;
            return;
        }

        {
            let mut state = self.state.write();
            state.loading = true;
        }

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(tracker.quiet_period).await;

            // Superseded while waiting out the quiet period: do not fire.
            if tracker.seq.load(Ordering::SeqCst) != seq {
                return;
            }

            debug!(tables = tables.len(), "resolving affected bots");
            let result = resolve_affected(tracker.backend.as_ref(), &tables).await;

            // Superseded while in flight: discard the response.
            if tracker.seq.load(Ordering::SeqCst) != seq {
                debug!("discarding stale affected-bot response");
                return;
            }

            let mut state = tracker.state.write();
            state.loading = false;
            match result {
                Ok(bots) => {
                    state.bots = bots;
                    state.error = None;
                }
                Err(e) => {
                    // Previous results stay in place; pending edits are
                    // untouched by resolver failures.
                    warn!(error = %e, "affected-bot lookup failed");
                    state.error = Some(e.to_string());
                }
            }
        });
    }

    pub fn state(&self) -> AffectedBotsState {
        self.state.read().clone()
    }

    /// The bot list as currently resolved (the submission coordinator
    /// snapshots this before pending maps are cleared).
    pub fn snapshot(&self) -> Vec<BotSummary> {
        self.state.read().bots.clone()
    }

    /// Reset after a completed submission cycle.
    pub fn clear(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        state.bots.clear();
        state.loading = false;
        state.error = None;
    }
}
