//! Persisted chat transcript.
//!
//! Append-only ordered sequence of `{role, content}` pairs stored as JSON,
//! capped at a configured length, written after every conversational turn
//! and read at startup to seed the in-memory history.

use crate::error::{AssistantError, Result};
use crate::providers::{ChatMessage, Role};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable transcript store backed by a JSON file.
pub struct TranscriptStore {
    path: PathBuf,
    max_turns: usize,
}

impl TranscriptStore {
    /// Create a store at the given path. The file is created lazily on the
    /// first append.
    pub fn new(path: impl Into<PathBuf>, max_turns: usize) -> Self {
        Self {
            path: path.into(),
            max_turns: max_turns.max(2),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted transcript. A missing or unreadable file yields an
    /// empty transcript rather than an error: losing history must never
    /// prevent startup.
    pub fn load(&self) -> Vec<ChatMessage> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ChatMessage>>(&content) {
            Ok(turns) => turns,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring corrupt transcript");
                Vec::new()
            }
        }
    }

    /// Append one user/assistant exchange and persist, trimming the oldest
    /// turns beyond the cap.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn append_exchange(&self, user: &str, assistant: &str) -> Result<()> {
        let mut turns = self.load();
        turns.push(ChatMessage::user(user));
        turns.push(ChatMessage::assistant(assistant));
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        self.write(&turns)
    }

    /// Seed an empty transcript with a canned greeting exchange so the GUI
    /// has something to show on first launch.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed cannot be written.
    pub fn ensure_greeting(&self, username: &str, assistant_name: &str) -> Result<()> {
        if !self.load().is_empty() {
            return Ok(());
        }
        let turns = vec![
            ChatMessage::user(format!("Hello {assistant_name}, how are you?")),
            ChatMessage::assistant(format!(
                "Greetings {username}. I am {assistant_name}, your assistant. How may I help you today?"
            )),
        ];
        self.write(&turns)
    }

    fn write(&self, turns: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(turns)
            .map_err(|e| AssistantError::Transcript(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Render transcript turns as `Name : text` lines for display.
pub fn render_lines(turns: &[ChatMessage], username: &str, assistant_name: &str) -> String {
    turns
        .iter()
        .map(|t| match t.role {
            Role::User => format!("{username} : {}", t.content),
            Role::Assistant => format!("{assistant_name} : {}", t.content),
            Role::System => t.content.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
