// SPDX-License-Identifier: Apache-2.0

//! HTTP implementation of [`BotBackend`] over the bot-manager REST API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ConsoleConfig, BOTMANAGER_PREFIX, TWOSTEPS_PREFIX};
use crate::error::{ConsoleError, ConsoleResult};

use super::types::{
    Bot, BotPatch, BotSummary, ColumnsIndex, CommandInfo, PromptInfo, Row, TableDetail,
    TableUpdate, TwoStepsReply, VectorStore, VectorStoreSyncReport, WireChatMessage,
};
use super::BotBackend;

/// Characters escaped in a path segment (matches URI component encoding)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ConsoleConfig) -> ConsoleResult<Self> {
        let base_url = config.validated_base_url()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConsoleError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    fn botmanager_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, BOTMANAGER_PREFIX, path)
    }

    fn twosteps_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, TWOSTEPS_PREFIX, path)
    }

    fn encode_segment(raw: &str) -> String {
        utf8_percent_encode(raw, SEGMENT).to_string()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ConsoleResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConsoleError::transport(e.to_string()))?;
        Self::parse(response).await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConsoleResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ConsoleError::transport(e.to_string()))?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> ConsoleResult<T> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ConsoleError::internal(format!("unexpected response shape: {}", e)))
    }

    async fn check_status(response: Response) -> ConsoleResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_backend_message(&body)
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
        Err(ConsoleError::backend(status.as_u16(), message))
    }
}

/// Extract a user-facing message from a structured error body
fn extract_backend_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["message"].as_str().map(|s| s.to_string())
}

/// Pull the assistant text out of a completions-style `output` array
fn extract_assistant_text(body: &Value) -> Option<String> {
    let output = body["output"].as_array()?;
    let message = output
        .iter()
        .find(|item| item["type"] == "message" && item["role"] == "assistant")?;
    message["content"][0]["text"].as_str().map(|s| s.to_string())
}

// Response envelopes the backend wraps collections in

#[derive(Deserialize)]
struct TablesEnvelope {
    tables: Vec<String>,
}

#[derive(Deserialize)]
struct ColumnsEnvelope {
    tables: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct BotsEnvelope {
    bots: Vec<Bot>,
}

#[derive(Deserialize)]
struct BotEnvelope {
    bot: Bot,
}

#[derive(Deserialize)]
struct CommandsEnvelope {
    commands: Vec<CommandInfo>,
}

#[derive(Deserialize)]
struct PromptsEnvelope {
    prompts: Vec<PromptInfo>,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
}

#[async_trait]
impl BotBackend for HttpBackend {
    async fn list_tables(&self) -> ConsoleResult<Vec<String>> {
        let envelope: TablesEnvelope = self.get_json(&self.botmanager_url("/tables")).await?;
        Ok(envelope.tables)
    }

    async fn table_detail(&self, name: &str) -> ConsoleResult<TableDetail> {
        let url = self.botmanager_url(&format!("/tables/{}", Self::encode_segment(name)));
        self.get_json(&url).await
    }

    async fn tables_and_columns(&self) -> ConsoleResult<ColumnsIndex> {
        let envelope: ColumnsEnvelope =
            self.get_json(&self.botmanager_url("/table-columns")).await?;
        Ok(envelope.tables)
    }

    async fn update_tables(&self, updates: &[TableUpdate]) -> ConsoleResult<()> {
        debug!(tables = updates.len(), "submitting batched table update");
        let request = self
            .client
            .put(self.botmanager_url("/tables"))
            .json(&json!({ "tables": updates }));
        let _: Value = self.send_json(request).await?;
        Ok(())
    }

    async fn find_bots_by_tables(&self, tables: &[String]) -> ConsoleResult<Vec<BotSummary>> {
        let request = self
            .client
            .post(self.botmanager_url("/find-bots-by-table-names"))
            .json(&json!({ "tables": tables }));
        // The backend answers either `{bots: [...]}` or a bare array.
        let body: Value = self.send_json(request).await?;
        let bots = match body {
            Value::Array(_) => body,
            Value::Object(ref map) if map.contains_key("bots") => body["bots"].clone(),
            _ => Value::Array(Vec::new()),
        };
        serde_json::from_value(bots)
            .map_err(|e| ConsoleError::internal(format!("unexpected bot list shape: {}", e)))
    }

    async fn update_vector_stores(
        &self,
        bot_ids: &[String],
    ) -> ConsoleResult<VectorStoreSyncReport> {
        let request = self
            .client
            .post(self.botmanager_url("/bots/update-multiple"))
            .json(&json!({ "botIds": bot_ids }));
        self.send_json(request).await
    }

    async fn list_bots(&self) -> ConsoleResult<Vec<Bot>> {
        let envelope: BotsEnvelope = self.get_json(&self.botmanager_url("/bots")).await?;
        Ok(envelope.bots)
    }

    async fn create_bot(&self, bot: &BotPatch) -> ConsoleResult<Bot> {
        let request = self.client.post(self.botmanager_url("/bots")).json(bot);
        let envelope: BotEnvelope = self.send_json(request).await?;
        Ok(envelope.bot)
    }

    async fn update_bot(&self, bot_id: &str, patch: &BotPatch) -> ConsoleResult<()> {
        let url = self.botmanager_url(&format!("/bots/{}", Self::encode_segment(bot_id)));
        let request = self.client.put(url).json(patch);
        let _: Value = self.send_json(request).await?;
        Ok(())
    }

    async fn delete_bot(&self, bot_id: &str) -> ConsoleResult<()> {
        let url = self.botmanager_url(&format!("/bots/{}", Self::encode_segment(bot_id)));
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| ConsoleError::transport(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn create_vector_store(&self, bot_id: &str) -> ConsoleResult<String> {
        let url = self.botmanager_url(&format!("/bots/{}/update", Self::encode_segment(bot_id)));
        let body: Value = self.send_json(self.client.post(url)).await?;
        body["vector_store_id"]
            .as_str()
            .or_else(|| body["id"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ConsoleError::internal("vector store id missing from response"))
    }

    async fn delete_vector_store(&self, store_id: &str) -> ConsoleResult<()> {
        let url =
            self.botmanager_url(&format!("/vector-stores/{}", Self::encode_segment(store_id)));
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| ConsoleError::transport(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn list_vector_stores(&self) -> ConsoleResult<Vec<VectorStore>> {
        let envelope: DataEnvelope<Vec<VectorStore>> =
            self.get_json(&self.botmanager_url("/vector-stores")).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn list_commands(&self) -> ConsoleResult<Vec<CommandInfo>> {
        let envelope: CommandsEnvelope = self.get_json(&self.botmanager_url("/commands")).await?;
        Ok(envelope.commands)
    }

    async fn list_prompts(&self) -> ConsoleResult<Vec<PromptInfo>> {
        let envelope: PromptsEnvelope = self.get_json(&self.botmanager_url("/prompts")).await?;
        Ok(envelope.prompts)
    }

    async fn chat_with_bot(
        &self,
        bot_id: &str,
        messages: &[WireChatMessage],
    ) -> ConsoleResult<String> {
        let url = self.botmanager_url(&format!("/bots/{}/chat", Self::encode_segment(bot_id)));
        let request = self.client.post(url).json(&json!({ "messages": messages }));
        let body: Value = self.send_json(request).await?;
        extract_assistant_text(&body)
            .ok_or_else(|| ConsoleError::internal("assistant reply missing from response"))
    }

    async fn two_steps_chat(
        &self,
        message: &str,
        client_name: &str,
    ) -> ConsoleResult<TwoStepsReply> {
        let request = self
            .client
            .post(self.twosteps_url(""))
            .json(&json!({ "message": message, "clientName": client_name }));
        self.send_json(request).await
    }

    async fn execute_sql(&self, sql: &str, client_name: &str) -> ConsoleResult<Vec<Row>> {
        let request = self
            .client
            .post(self.botmanager_url("/execute"))
            .json(&json!({ "sql": sql, "clientName": client_name }));
        let response = request
            .send()
            .await
            .map_err(|e| ConsoleError::transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = extract_backend_message(&body)
                .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
            // Execution failures arrive as structured backend errors; keep
            // them distinct from transport problems so the UI can render
            // them inside the result panel.
            if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
                return Err(ConsoleError::sql_execution(message));
            }
            return Err(ConsoleError::backend(status.as_u16(), message));
        }

        let envelope: DataEnvelope<Vec<Row>> = serde_json::from_str(&body)
            .map_err(|e| ConsoleError::internal(format!("unexpected result shape: {}", e)))?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn list_models(&self) -> ConsoleResult<Vec<String>> {
        let envelope: DataEnvelope<Vec<String>> =
            self.get_json(&self.twosteps_url("/models")).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn reload_schema(&self) -> ConsoleResult<()> {
        let request = self.client.post(self.twosteps_url("/refetch-schema"));
        let _: Value = self.send_json(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_encoding_preserves_safe_chars() {
        assert_eq!(HttpBackend::encode_segment("my_table"), "my_table");
        assert_eq!(HttpBackend::encode_segment("admin.orders"), "admin.orders");
        assert_eq!(HttpBackend::encode_segment("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn backend_message_extraction() {
        assert_eq!(
            extract_backend_message(r#"{"message":"table not found"}"#),
            Some("table not found".to_string())
        );
        assert_eq!(extract_backend_message("not json"), None);
    }

    #[test]
    fn assistant_text_extraction() {
        let body: Value = serde_json::from_str(
            r#"{"output":[
                {"type":"reasoning"},
                {"type":"message","role":"assistant","content":[{"text":"hello"}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(extract_assistant_text(&body).as_deref(), Some("hello"));

        let empty: Value = serde_json::from_str(r#"{"output":[]}"#).unwrap();
        assert!(extract_assistant_text(&empty).is_none());
    }
}
