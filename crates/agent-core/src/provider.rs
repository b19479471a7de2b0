//! Anthropic Messages API client with tool use support

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AnthropicConfig;
use crate::screenshot::ImageTransport;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Image source: a reachable URL or inline base64 bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

impl From<ImageTransport> for ImageSource {
    fn from(transport: ImageTransport) -> Self {
        match transport {
            ImageTransport::Reference(url) => ImageSource::Url { url },
            ImageTransport::Inline { data, media_type } => {
                ImageSource::Base64 { media_type, data }
            }
        }
    }
}

/// One content block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Result of a tool invocation; content is either a plain string or
    /// an array of nested blocks (text/image), matching the wire format.
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(source: ImageSource) -> Self {
        ContentBlock::Image { source }
    }

    pub fn tool_result_text(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Value::String(content.into()),
        }
    }

    pub fn tool_result_image(tool_use_id: impl Into<String>, source: ImageSource) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: json!([{ "type": "image", "source": source }]),
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

/// Tool declaration sent to the provider (JSON-Schema shaped input)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Response from the Messages API
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
}

impl MessagesResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool use blocks, in the order the model issued them.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSchema],
    messages: &'a [Message],
}

/// A language-model provider capable of one tool-use conversation turn.
///
/// The agent loop talks to this trait so tests can script responses
/// without a network.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn create_message(
        &self,
        system: &str,
        tools: &[ToolSchema],
        messages: &[Message],
    ) -> Result<MessagesResponse>;
}

/// Anthropic Messages API client
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    async fn create_message(
        &self,
        system: &str,
        tools: &[ToolSchema],
        messages: &[Message],
    ) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            tools,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to reach model provider")?
            .error_for_status()
            .context("Model provider returned an error")?
            .json::<MessagesResponse>()
            .await
            .context("Failed to parse model response")?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_block_serialization() {
        let block = ContentBlock::text("hello");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");

        let block = ContentBlock::image(ImageSource::Url {
            url: "https://example.com/shot.png".to_string(),
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["source"]["type"], "url");
    }

    #[test]
    fn test_tool_result_image_wraps_in_blocks() {
        let block = ContentBlock::tool_result_image(
            "toolu_1",
            ImageSource::Base64 {
                media_type: "image/png".to_string(),
                data: "abcd".to_string(),
            },
        );
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["content"][0]["type"], "image");
        assert_eq!(value["content"][0]["source"]["type"], "base64");
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "I'll check."},
                {"type": "tool_use", "id": "toolu_1", "name": "bash", "input": {"command": "ls"}}
            ],
            "stop_reason": "tool_use"
        }"#;

        let response: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.text(), "I'll check.");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].1, "bash");
    }

    #[test]
    fn test_unknown_stop_reason_is_other() {
        let raw = r#"{"content": [], "stop_reason": "pause_turn"}"#;
        let response: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::Other));
    }

    #[test]
    fn test_transport_to_image_source() {
        let source: ImageSource =
            ImageTransport::Reference("https://example.com/a.png".to_string()).into();
        assert!(matches!(source, ImageSource::Url { .. }));

        let source: ImageSource = ImageTransport::Inline {
            data: "abcd".to_string(),
            media_type: "image/jpeg".to_string(),
        }
        .into();
        assert!(matches!(source, ImageSource::Base64 { .. }));
    }
}
