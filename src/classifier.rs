//! Intent classification: free-text utterance to typed directives.
//!
//! The classifier asks the completion provider to label an utterance with
//! one or more directive keywords, then whitelists the reply through
//! [`crate::directive::parse_response`]. The model is unreliable by nature,
//! so classification retries inside an explicit bounded loop and always
//! degrades to a single `general` directive rather than failing.

use crate::directive::{parse_response, Directive};
use crate::providers::CompletionProvider;
use std::sync::Arc;
use tracing::{debug, warn};

/// One prior classification shown to the model as a few-shot exemplar.
#[derive(Debug, Clone)]
pub struct Exemplar {
    /// The utterance.
    pub input: String,
    /// The directive list the model should have produced, comma-separated.
    pub output: String,
}

impl Exemplar {
    /// Convenience constructor.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Instruction preamble sent with every classification request.
const PREAMBLE: &str = "\
You are a decision-making model for a voice assistant. Classify the user's \
utterance into one or more directives from this fixed vocabulary, in the \
order the user mentioned them, comma-separated, with nothing else:\n\
- 'general (query)' for questions answerable from general knowledge\n\
- 'realtime (query)' for questions needing up-to-date information\n\
- 'open (application name)' / 'close (application name)'\n\
- 'play (song or video name)'\n\
- 'system (command)' for mute, unmute, volume up, volume down\n\
- 'content (topic)' to write content about a topic\n\
- 'google search (topic)' / 'youtube search (topic)'\n\
- 'reminder (datetime with message)'\n\
- 'exit' when the user says goodbye\n\
Replace the parenthesized placeholder with the actual payload. A multi-task \
utterance yields multiple directives. Respond with the directive list only.";

/// Built-in exemplars covering each directive family.
fn builtin_exemplars() -> Vec<Exemplar> {
    vec![
        Exemplar::new("how are you", "general how are you"),
        Exemplar::new("what's the latest news on the election", "realtime latest news on the election"),
        Exemplar::new("open chrome and firefox", "open chrome, open firefox"),
        Exemplar::new("open chrome and tell me about mahatma gandhi", "open chrome, general tell me about mahatma gandhi"),
        Exemplar::new("play afsanay by ys", "play afsanay by ys"),
        Exemplar::new("mute the volume", "system mute"),
        Exemplar::new("write an application for sick leave", "content application for sick leave"),
        Exemplar::new("set a reminder at 9pm on 25th june for my business meeting", "reminder 9:00pm 25th june business meeting"),
        Exemplar::new("bye jarvis", "exit"),
    ]
}

/// Intent classifier over a completion provider.
pub struct IntentClassifier {
    provider: Arc<dyn CompletionProvider>,
    max_attempts: u32,
}

impl IntentClassifier {
    /// Create a classifier. `max_attempts` bounds the retry loop.
    pub fn new(provider: Arc<dyn CompletionProvider>, max_attempts: u32) -> Self {
        Self {
            provider,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Classify an utterance into an ordered directive list.
    ///
    /// Never fails: a provider transport error or an exhausted retry budget
    /// yields `[General(utterance)]`.
    pub async fn classify(&self, utterance: &str, history: &[Exemplar]) -> Vec<Directive> {
        let prompt = self.build_prompt(utterance, history);

        for attempt in 1..=self.max_attempts {
            let reply = match self.provider.complete(PREAMBLE, &[], &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    // Transport failure: no point burning the retry budget.
                    warn!(error = %e, "classifier provider unreachable, using fallback");
                    return vec![Directive::General(utterance.to_owned())];
                }
            };

            debug!(attempt, reply = reply.as_str(), "classifier raw reply");

            // An unresolved placeholder means the model echoed the template
            // instead of filling it in.
            if reply.contains("(query)") {
                debug!(attempt, "classifier left placeholder unresolved, retrying");
                continue;
            }

            let directives = parse_response(&reply);
            if !directives.is_empty() {
                return directives;
            }

            debug!(attempt, "classifier reply had no recognized directives, retrying");
        }

        warn!(max_attempts = self.max_attempts, "classifier retries exhausted, using fallback");
        vec![Directive::General(utterance.to_owned())]
    }

    fn build_prompt(&self, utterance: &str, history: &[Exemplar]) -> String {
        let mut prompt = String::new();
        for exemplar in builtin_exemplars().iter().chain(history) {
            prompt.push_str(&format!("user: {}\nassistant: {}\n", exemplar.input, exemplar.output));
        }
        prompt.push_str(&format!("user: {utterance}\nassistant:"));
        prompt
    }
}
