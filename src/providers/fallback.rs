//! Primary/secondary completion fallback.
//!
//! Wraps two providers of the same shape. Every request goes to the primary
//! first; any failure there (transient or permanent) falls through to the
//! secondary. Only when both fail does the caller see an error, carrying the
//! secondary's failure (the primary's is logged).

use crate::providers::{ChatMessage, CompletionError, CompletionProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Completion provider that falls back from a primary to a secondary.
pub struct FallbackCompletion {
    primary: Arc<dyn CompletionProvider>,
    secondary: Arc<dyn CompletionProvider>,
}

impl FallbackCompletion {
    /// Create a fallback pair.
    pub fn new(primary: Arc<dyn CompletionProvider>, secondary: Arc<dyn CompletionProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl CompletionProvider for FallbackCompletion {
    fn id(&self) -> &str {
        "fallback"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, CompletionError> {
        match self
            .primary
            .complete(system_prompt, history, user_message)
            .await
        {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                warn!(
                    provider = self.primary.id(),
                    error = %primary_err,
                    "primary provider failed, trying secondary"
                );
                let result = self
                    .secondary
                    .complete(system_prompt, history, user_message)
                    .await;
                if result.is_ok() {
                    info!(provider = self.secondary.id(), "secondary provider answered");
                }
                result
            }
        }
    }
}
