//! Process-wide session state shared between the dispatch loop and the GUI.
//!
//! The status string is the only channel the GUI polls, so every state
//! transition of the dispatch cycle and the emergency machine must be
//! observable through it. Status is published over a `watch` channel:
//! readers tolerate stale values of at most one poll interval, writers never
//! block.

use crate::providers::ChatMessage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// What the assistant is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssistantStatus {
    /// Waiting for speech input.
    #[default]
    Listening,
    /// Classifying or generating a conversational answer.
    Thinking,
    /// Resolving a realtime query.
    Searching,
    /// Speaking an answer.
    Answering,
    /// Running automation directives.
    Executing,
    /// Emergency escalation in progress.
    Emergency,
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Exact strings the GUI renders.
        let s = match self {
            AssistantStatus::Listening => "Listening...",
            AssistantStatus::Thinking => "Thinking...",
            AssistantStatus::Searching => "Searching...",
            AssistantStatus::Answering => "Answering...",
            AssistantStatus::Executing => "Executing...",
            AssistantStatus::Emergency => "Emergency Detected!",
        };
        f.write_str(s)
    }
}

/// Shared session context.
///
/// Each field has exactly one writer in practice (dispatch loop for status
/// and history, UI for the mic flag); concurrent readers see atomically
/// updated scalars.
pub struct SessionContext {
    status_tx: watch::Sender<AssistantStatus>,
    mic_armed: AtomicBool,
    history: Mutex<VecDeque<ChatMessage>>,
    history_limit: usize,
}

impl SessionContext {
    /// Create a session with an empty history ring of the given capacity.
    pub fn new(history_limit: usize) -> Self {
        let (status_tx, _) = watch::channel(AssistantStatus::default());
        Self {
            status_tx,
            mic_armed: AtomicBool::new(false),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit: history_limit.max(1),
        }
    }

    /// Publish a new assistant status.
    pub fn set_status(&self, status: AssistantStatus) {
        // send_replace never fails even with no subscribers.
        self.status_tx.send_replace(status);
    }

    /// Current status snapshot.
    pub fn status(&self) -> AssistantStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status updates (GUI polling seam).
    pub fn subscribe_status(&self) -> watch::Receiver<AssistantStatus> {
        self.status_tx.subscribe()
    }

    /// Arm or disarm the microphone. Disarming never cancels an in-flight
    /// dispatch; it only prevents the next capture cycle from starting.
    pub fn set_mic_armed(&self, armed: bool) {
        self.mic_armed.store(armed, Ordering::SeqCst);
    }

    /// Whether the microphone is armed.
    pub fn mic_armed(&self) -> bool {
        self.mic_armed.load(Ordering::SeqCst)
    }

    /// Append a chat turn to the rolling history, evicting the oldest when
    /// at capacity.
    pub fn push_turn(&self, turn: ChatMessage) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(turn);
    }

    /// Snapshot of the most recent `n` turns, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<ChatMessage> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().rev().take(n).rev().cloned().collect()
    }

    /// Seed the history ring from a persisted transcript.
    pub fn seed_history(&self, turns: impl IntoIterator<Item = ChatMessage>) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        for turn in turns {
            if history.len() >= self.history_limit {
                history.pop_front();
            }
            history.push_back(turn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_the_gui_contract() {
        assert_eq!(AssistantStatus::Listening.to_string(), "Listening...");
        assert_eq!(AssistantStatus::Thinking.to_string(), "Thinking...");
        assert_eq!(AssistantStatus::Searching.to_string(), "Searching...");
        assert_eq!(AssistantStatus::Answering.to_string(), "Answering...");
        assert_eq!(AssistantStatus::Executing.to_string(), "Executing...");
        assert_eq!(AssistantStatus::Emergency.to_string(), "Emergency Detected!");
    }

    #[test]
    fn status_updates_are_observable_through_subscription() {
        let session = SessionContext::new(10);
        let rx = session.subscribe_status();
        session.set_status(AssistantStatus::Executing);
        assert_eq!(*rx.borrow(), AssistantStatus::Executing);
        assert_eq!(session.status(), AssistantStatus::Executing);
    }

    #[test]
    fn mic_flag_round_trips() {
        let session = SessionContext::new(10);
        assert!(!session.mic_armed());
        session.set_mic_armed(true);
        assert!(session.mic_armed());
    }

    #[test]
    fn history_ring_evicts_oldest() {
        let session = SessionContext::new(3);
        for i in 0..5 {
            session.push_turn(ChatMessage::user(format!("turn {i}")));
        }
        let recent = session.recent_turns(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "turn 2");
        assert_eq!(recent[2].content, "turn 4");
    }

    #[test]
    fn recent_turns_returns_oldest_first() {
        let session = SessionContext::new(10);
        session.push_turn(ChatMessage::user("first"));
        session.push_turn(ChatMessage::assistant("second"));
        let recent = session.recent_turns(2);
        assert_eq!(recent[0].content, "first");
        assert_eq!(recent[1].content, "second");
    }

    #[test]
    fn seed_history_respects_capacity() {
        let session = SessionContext::new(2);
        session.seed_history(vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
        ]);
        let recent = session.recent_turns(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].content, "c");
    }
}
