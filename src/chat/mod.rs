// SPDX-License-Identifier: Apache-2.0

//! Chat flows.
//!
//! Two transcripts live here: [`TwoStepsSession`], the natural-language →
//! SQL flow against a selected client database with per-message SQL
//! results, and [`BotChatSession`], a plain conversation with one bot.
//! Backend failures never abort a transcript; they are rendered as
//! assistant turns so the conversation stays usable.

pub mod usage;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::backend::types::{
    ChatRole, Row, TokenUsage, TwoStepsReply, TwoStepsStatus, WireChatMessage,
};
use crate::backend::BotBackend;
use crate::error::{ConsoleError, ConsoleResult};

const WELCOME_MESSAGE: &str = "Welcome to 2Steps Chat. How can I help you today?";
const DEFAULT_CLIENT: &str = "designcheck";

/// Unique identifier for a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// One turn of a transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub status: Option<TwoStepsStatus>,
    pub token_usage: Option<TokenUsage>,
}

impl ChatMessage {
    fn user(content: String) -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::User,
            content,
            status: None,
            token_usage: None,
        }
    }

    fn assistant(content: String) -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::Assistant,
            content,
            status: None,
            token_usage: None,
        }
    }
}

/// Rows or execution error cached for one assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlOutcome {
    pub sql: String,
    pub rows: Option<Vec<Row>>,
    pub error: Option<String>,
}

/// Fenced ```sql blocks inside assistant content; the execute affordance
/// binds to these.
pub fn sql_blocks(content: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)```sql\s*(.*?)```").expect("static regex"));
    re.captures_iter(content)
        .filter_map(|captures| {
            let block = captures[1].trim();
            if block.is_empty() {
                None
            } else {
                Some(block.to_string())
            }
        })
        .collect()
}

/// Shape one two-step reply into assistant-turn text: message plus fenced
/// SQL when present, relevant tables appended, non-OK statuses still
/// showing the SQL they produced.
fn format_reply(reply: &TwoStepsReply) -> String {
    if reply.status == TwoStepsStatus::Ok {
        let mut content = match reply.sql {
            Some(ref sql) => format!(
                "{}\n\n```sql\n{}\n```",
                reply
                    .message
                    .as_deref()
                    .unwrap_or("I found this information for you:"),
                sql
            ),
            None => reply
                .message
                .clone()
                .unwrap_or_else(|| {
                    "I processed your request, but no SQL query was generated.".to_string()
                }),
        };
        if !reply.table_list.is_empty() {
            content.push_str(&format!(
                "\n\nRelevant tables: {}",
                reply.table_list.join(", ")
            ));
        }
        content
    } else {
        let mut content = reply.message.clone().unwrap_or_else(|| {
            format!(
                "Status: {}. {}",
                reply.status.as_str(),
                reply
                    .error
                    .as_deref()
                    .unwrap_or("No additional information available.")
            )
        });
        if let Some(ref sql) = reply.sql {
            content.push_str(&format!("\n\n```sql\n{}\n```", sql));
        }
        content
    }
}

/// The two-step NL→SQL chat flow against one client database.
pub struct TwoStepsSession {
    backend: Arc<dyn BotBackend>,
    client_name: parking_lot::RwLock<String>,
    transcript: parking_lot::RwLock<Vec<ChatMessage>>,
    results: parking_lot::RwLock<HashMap<MessageId, SqlOutcome>>,
    reloading: AtomicBool,
}

impl TwoStepsSession {
    pub fn new(backend: Arc<dyn BotBackend>) -> Self {
        Self {
            backend,
            client_name: parking_lot::RwLock::new(DEFAULT_CLIENT.to_string()),
            transcript: parking_lot::RwLock::new(vec![ChatMessage::assistant(
                WELCOME_MESSAGE.to_string(),
            )]),
            results: parking_lot::RwLock::new(HashMap::new()),
            reloading: AtomicBool::new(false),
        }
    }

    pub fn set_client_name(&self, name: impl Into<String>) {
        *self.client_name.write() = name.into();
    }

    pub fn client_name(&self) -> String {
        self.client_name.read().clone()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().clone()
    }

    pub fn result(&self, message_id: MessageId) -> Option<SqlOutcome> {
        self.results.read().get(&message_id).cloned()
    }

    /// Send one user turn through the two-step flow. Returns the id of the
    /// assistant turn; backend failures become an error-status turn.
    #[instrument(skip(self, text))]
    pub async fn send(&self, text: &str) -> ConsoleResult<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConsoleError::internal("empty chat message"));
        }

        self.transcript
            .write()
            .push(ChatMessage::user(text.to_string()));

        let client = self.client_name();
        let message = match self.backend.two_steps_chat(text, &client).await {
            Ok(reply) => {
                let mut message = ChatMessage::assistant(format_reply(&reply));
                message.status = Some(reply.status);
                message.token_usage = reply.token_usage.clone();

                // A reply that already executed its SQL pre-populates the
                // result panel for this message.
                if reply.status == TwoStepsStatus::Ok {
                    if let (Some(sql), Some(rows)) = (reply.sql, reply.result) {
                        self.results.write().insert(
                            message.id,
                            SqlOutcome {
                                sql,
                                rows: Some(rows),
                                error: None,
                            },
                        );
                    }
                }
                message
            }
            Err(e) => {
                let mut message =
                    ChatMessage::assistant(format!("Sorry, I encountered an error: {}", e));
                message.status = Some(TwoStepsStatus::Error);
                message
            }
        };

        let id = message.id;
        self.transcript.write().push(message);
        Ok(id)
    }

    /// Execute SQL for one assistant message; rows or the execution error
    /// land in that message's result slot.
    #[instrument(skip(self, sql))]
    pub async fn execute(&self, message_id: MessageId, sql: &str) -> ConsoleResult<()> {
        let client = self.client_name();
        if client.trim().is_empty() {
            return Err(ConsoleError::sql_execution(
                "a client name is required to execute SQL",
            ));
        }

        let outcome = match self.backend.execute_sql(sql, &client).await {
            Ok(rows) => SqlOutcome {
                sql: sql.to_string(),
                rows: Some(rows),
                error: None,
            },
            Err(e) => SqlOutcome {
                sql: sql.to_string(),
                rows: None,
                error: Some(e.to_string()),
            },
        };
        self.results.write().insert(message_id, outcome);
        Ok(())
    }

    pub fn dismiss(&self, message_id: MessageId) {
        self.results.write().remove(&message_id);
    }

    pub async fn models(&self) -> ConsoleResult<Vec<String>> {
        self.backend.list_models().await
    }

    /// Ask the backend to re-read the database schema. Chat is disabled
    /// while a reload is in flight.
    pub async fn reload_schema(&self) -> ConsoleResult<()> {
        if self
            .reloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConsoleError::internal("schema reload already in progress"));
        }
        let result = self.backend.reload_schema().await;
        self.reloading.store(false, Ordering::SeqCst);
        result
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading.load(Ordering::SeqCst)
    }
}

/// Plain conversation with one bot.
pub struct BotChatSession {
    backend: Arc<dyn BotBackend>,
    bot_id: String,
    transcript: parking_lot::RwLock<Vec<ChatMessage>>,
}

impl BotChatSession {
    pub fn new(backend: Arc<dyn BotBackend>, bot_id: impl Into<String>) -> Self {
        Self {
            backend,
            bot_id: bot_id.into(),
            transcript: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().clone()
    }

    /// Send one user turn with the full history; the reply (or an error
    /// rendered as a reply) is appended and returned.
    #[instrument(skip(self, text), fields(bot_id = %self.bot_id))]
    pub async fn send(&self, text: &str) -> ConsoleResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConsoleError::internal("empty chat message"));
        }

        self.transcript
            .write()
            .push(ChatMessage::user(text.to_string()));

        let history: Vec<WireChatMessage> = self
            .transcript
            .read()
            .iter()
            .map(|m| WireChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let reply = match self.backend.chat_with_bot(&self.bot_id, &history).await {
            Ok(reply) => reply,
            Err(e) => format!("Error: {}", e),
        };
        self.transcript
            .write()
            .push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}
