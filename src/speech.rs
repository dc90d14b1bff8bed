//! Speech I/O seams.
//!
//! Capture and synthesis are both traits so the runtime loop can be driven
//! from a terminal in tests and development. The default synthesizer stack
//! tries an online-quality engine first and degrades to an offline engine,
//! mirroring how the provider stack degrades across completion backends.

use crate::error::{AssistantError, Result};
use crate::normalize::{Utterance, UtteranceSource};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Spoken answers longer than this are truncated before synthesis; the full
/// text still reaches the transcript.
const MAX_SPOKEN_CHARS: usize = 250;

/// One capture attempt's outcome.
#[derive(Debug, Clone)]
pub enum ListenOutcome {
    /// A recognized utterance.
    Heard(Utterance),
    /// The window elapsed without speech.
    Silence,
    /// The input source is gone; the runtime should shut down.
    Closed,
}

/// Source of user utterances.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Block until speech is recognized, the window times out, or the
    /// source closes.
    async fn listen(&self) -> Result<ListenOutcome>;
}

/// Text-to-speech engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn id(&self) -> &str;

    /// Speak `text`, returning once playback finishes.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Line-oriented capture from standard input, used when no microphone
/// pipeline is wired up.
pub struct StdinCapture {
    lines: Mutex<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
}

impl StdinCapture {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechCapture for StdinCapture {
    async fn listen(&self) -> Result<ListenOutcome> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => {
                let utterance = Utterance::new(&line, UtteranceSource::Typed);
                if utterance.text.is_empty() {
                    Ok(ListenOutcome::Silence)
                } else {
                    Ok(ListenOutcome::Heard(utterance))
                }
            }
            Ok(None) => Ok(ListenOutcome::Closed),
            Err(e) => Err(AssistantError::Speech(format!("stdin capture: {e}"))),
        }
    }
}

/// Synthesizer that shells out to a TTS command taking the text as its
/// final argument (`say` on macOS, `espeak` elsewhere).
pub struct CommandSynthesizer {
    command: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn id(&self) -> &str {
        &self.command
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let status = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .status()
            .await
            .map_err(|e| AssistantError::Speech(format!("{}: {e}", self.command)))?;
        if status.success() {
            Ok(())
        } else {
            Err(AssistantError::Speech(format!(
                "{} exited with {status}",
                self.command
            )))
        }
    }
}

/// Primary-then-offline synthesizer stack.
pub struct SpeakerStack {
    primary: Arc<dyn SpeechSynthesizer>,
    offline: Arc<dyn SpeechSynthesizer>,
}

impl SpeakerStack {
    pub fn new(primary: Arc<dyn SpeechSynthesizer>, offline: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { primary, offline }
    }

    /// Speak a response, truncating long answers for the ear while the full
    /// text goes to the transcript.
    pub async fn speak_response(&self, text: &str) -> Result<()> {
        let spoken = spoken_portion(text);
        self.speak(&spoken).await
    }

    /// Speak text verbatim, falling back to the offline engine if the
    /// primary fails.
    pub async fn speak(&self, text: &str) -> Result<()> {
        match self.primary.speak(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(engine = self.primary.id(), error = %e, "primary TTS failed, using offline engine");
                self.offline.speak(text).await
            }
        }
    }
}

/// First sentences of a long answer plus a pointer to the chat screen.
fn spoken_portion(text: &str) -> String {
    if text.len() <= MAX_SPOKEN_CHARS {
        return text.to_owned();
    }
    let head: String = text
        .split_inclusive(['.', '?', '!'])
        .take(2)
        .collect::<String>()
        .trim()
        .to_owned();
    debug!(full = text.len(), spoken = head.len(), "truncating spoken answer");
    format!("{head} The rest of the answer is on the chat screen.")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySynth {
        id: &'static str,
        fail: bool,
        calls: AtomicUsize,
        last: std::sync::Mutex<String>,
    }

    impl FlakySynth {
        fn new(id: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                fail,
                calls: AtomicUsize::new(0),
                last: std::sync::Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySynth {
        fn id(&self) -> &str {
            self.id
        }

        async fn speak(&self, text: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = text.to_owned();
            if self.fail {
                Err(AssistantError::Speech("engine down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn primary_success_never_touches_offline() {
        let primary = FlakySynth::new("primary", false);
        let offline = FlakySynth::new("offline", false);
        let stack = SpeakerStack::new(primary.clone(), offline.clone());
        stack.speak("hello").await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(offline.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_failure_falls_back_to_offline() {
        let primary = FlakySynth::new("primary", true);
        let offline = FlakySynth::new("offline", false);
        let stack = SpeakerStack::new(primary.clone(), offline.clone());
        stack.speak("hello").await.unwrap();
        assert_eq!(offline.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_engines_failing_is_an_error() {
        let primary = FlakySynth::new("primary", true);
        let offline = FlakySynth::new("offline", true);
        let stack = SpeakerStack::new(primary, offline);
        assert!(stack.speak("hello").await.is_err());
    }

    #[tokio::test]
    async fn long_answer_is_truncated_for_the_ear() {
        let primary = FlakySynth::new("primary", false);
        let offline = FlakySynth::new("offline", false);
        let stack = SpeakerStack::new(primary.clone(), offline);

        let long = "First sentence here. Second sentence here. ".repeat(20);
        stack.speak_response(&long).await.unwrap();
        let spoken = primary.last.lock().unwrap().clone();
        assert!(spoken.len() < long.len());
        assert!(spoken.contains("chat screen"));
    }

    #[test]
    fn short_answer_is_spoken_verbatim() {
        assert_eq!(spoken_portion("Sure thing."), "Sure thing.");
    }
}
