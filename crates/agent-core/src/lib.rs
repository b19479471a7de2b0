//! agent-core: Shared library for the vault task executor
//!
//! Provides:
//! - Configuration loading (agent.toml + environment overrides)
//! - Anthropic Messages API client (tool use support)
//! - Remote desktop action client
//! - Screenshot transport resolution (reference vs. inline payloads)

pub mod config;
pub mod provider;
pub mod remote;
pub mod screenshot;

pub use config::Config;
pub use provider::{
    AnthropicClient, ContentBlock, ImageSource, Message, MessagesResponse, ModelProvider, Role,
    StopReason, ToolSchema,
};
pub use remote::{RemoteClient, RemoteResponse};
pub use screenshot::{ImageTransport, ScreenshotResolver, MIN_ENCODED_LEN};
