//! Completion-service seam.
//!
//! The classifier and both responders depend on exactly one capability:
//! `complete(system, history, user) -> text`. Everything provider-specific
//! (wire format, auth, retries) lives behind [`CompletionProvider`].

pub mod fallback;
pub mod http;

pub use fallback::FallbackCompletion;
pub use http::HttpCompletionProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// One chat turn exchanged with a provider (and persisted in the transcript).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Errors reported by a completion attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    /// Timeout, 5xx, connection refused. Worth trying the fallback provider.
    #[error("transient provider error: {0}")]
    Transient(String),
    /// Auth failure, 4xx, malformed response. The fallback is tried, but the
    /// provider itself is not retried.
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

/// External text-completion capability.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable provider identifier for logs (e.g. `groq`, `cohere`).
    fn id(&self) -> &str;

    /// Run one completion: system prompt, prior turns, current user message.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, CompletionError>;
}
