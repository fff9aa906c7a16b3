// botdeck - headless engine for a bot-administration console
// Core library

pub mod backend;
pub mod bots;
pub mod chat;
pub mod config;
pub mod error;
pub mod metadata;
pub mod observability;

use std::sync::Arc;

use backend::{BotBackend, HttpBackend};
use bots::BotDirectory;
use chat::{BotChatSession, TwoStepsSession};
use config::ConsoleConfig;
use error::ConsoleResult;
use metadata::MetadataStore;

pub type SharedState = Arc<ConsoleState>;

/// Process-wide console state. Everything a front end binds to hangs off
/// this one injected object; there is no ambient global store.
pub struct ConsoleState {
    pub config: ConsoleConfig,
    pub backend: Arc<dyn BotBackend>,
    pub metadata: Arc<MetadataStore>,
    pub bots: Arc<BotDirectory>,
}

impl ConsoleState {
    /// Wire the state against the HTTP backend from the config.
    pub fn new(config: ConsoleConfig) -> ConsoleResult<Self> {
        let backend: Arc<dyn BotBackend> = Arc::new(HttpBackend::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    /// Wire the state against any backend implementation (tests use the
    /// in-memory mock).
    pub fn with_backend(config: ConsoleConfig, backend: Arc<dyn BotBackend>) -> Self {
        let metadata = Arc::new(MetadataStore::new(Arc::clone(&backend), &config));
        let bots = Arc::new(BotDirectory::new(Arc::clone(&backend)));
        Self {
            config,
            backend,
            metadata,
            bots,
        }
    }

    /// A fresh two-step chat session over this state's backend.
    pub fn two_steps_session(&self) -> TwoStepsSession {
        TwoStepsSession::new(Arc::clone(&self.backend))
    }

    /// A fresh chat session with one bot.
    pub fn bot_chat(&self, bot_id: impl Into<String>) -> BotChatSession {
        BotChatSession::new(Arc::clone(&self.backend), bot_id)
    }
}
