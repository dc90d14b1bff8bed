//! Directive dispatch.
//!
//! One utterance classifies into a batch of directives. The dispatcher
//! partitions the batch into four buckets and runs exactly one cycle:
//!
//! 1. Session end wins over everything in the batch.
//! 2. Automation directives all run, sequentially, with a fixed pause
//!    between them. One failure is logged and the rest still run.
//! 3. At most one spoken answer per cycle: the first realtime query if any,
//!    otherwise the first general query. Later queries in the batch are
//!    dropped with a log line.
//!
//! Status for the UI is published through the session at every stage change.

use crate::automation::AutomationExecutor;
use crate::directive::Directive;
use crate::error::Result;
use crate::normalize::Utterance;
use crate::providers::ChatMessage;
use crate::responder::{GeneralResponder, RealtimeResponder};
use crate::session::{AssistantStatus, SessionContext};
use crate::speech::SpeakerStack;
use crate::transcript::TranscriptStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether the runtime loop should keep going after this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Exit,
}

/// Runs one dispatch cycle per classified utterance.
pub struct Dispatcher {
    automation: AutomationExecutor,
    general: GeneralResponder,
    realtime: RealtimeResponder,
    speaker: SpeakerStack,
    session: Arc<SessionContext>,
    transcript: TranscriptStore,
    automation_delay: Duration,
    history_turns: usize,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        automation: AutomationExecutor,
        general: GeneralResponder,
        realtime: RealtimeResponder,
        speaker: SpeakerStack,
        session: Arc<SessionContext>,
        transcript: TranscriptStore,
        automation_delay: Duration,
        history_turns: usize,
    ) -> Self {
        Self {
            automation,
            general,
            realtime,
            speaker,
            session,
            transcript,
            automation_delay,
            history_turns,
        }
    }

    /// Run one cycle over a classified batch.
    ///
    /// # Errors
    ///
    /// Only transcript persistence errors propagate; automation, answer
    /// generation, and speech failures are contained within the cycle.
    pub async fn dispatch(
        &self,
        utterance: &Utterance,
        directives: Vec<Directive>,
    ) -> Result<DispatchOutcome> {
        // Session end discards the rest of the batch outright.
        if directives.iter().any(|d| matches!(d, Directive::Exit)) {
            info!(dropped = directives.len() - 1, "session end requested");
            self.session.set_status(AssistantStatus::Answering);
            if let Err(e) = self.speaker.speak("Okay, goodbye.").await {
                warn!(error = %e, "goodbye speech failed");
            }
            return Ok(DispatchOutcome::Exit);
        }

        let (automation, queries): (Vec<_>, Vec<_>) =
            directives.into_iter().partition(Directive::is_automation);

        self.run_automation(&automation).await;

        if let Some(query) = pick_query(queries) {
            self.answer(utterance, query).await?;
        }

        self.session.set_status(AssistantStatus::Listening);
        Ok(DispatchOutcome::Continue)
    }

    /// Run every automation directive in batch order, pausing between them
    /// so consecutive desktop actions do not race each other.
    async fn run_automation(&self, directives: &[Directive]) {
        for (i, directive) in directives.iter().enumerate() {
            self.session.set_status(AssistantStatus::Executing);
            if i > 0 {
                tokio::time::sleep(self.automation_delay).await;
            }
            match self.automation.execute(directive).await {
                Ok(message) => info!(directive = %directive, %message, "automation done"),
                Err(e) => warn!(directive = %directive, error = %e, "automation failed"),
            }
        }
    }

    /// Generate, speak, and persist one answer.
    async fn answer(&self, utterance: &Utterance, query: AnswerQuery) -> Result<()> {
        let history = self.session.recent_turns(self.history_turns);
        let result = match &query {
            AnswerQuery::Realtime(q) => {
                self.session.set_status(AssistantStatus::Searching);
                self.realtime.respond(q, &history).await
            }
            AnswerQuery::General(q) => {
                self.session.set_status(AssistantStatus::Thinking);
                self.general.respond(q, &history).await
            }
        };

        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                "I couldn't get an answer for that just now.".to_owned()
            }
        };

        self.session.set_status(AssistantStatus::Answering);
        if let Err(e) = self.speaker.speak_response(&answer).await {
            warn!(error = %e, "speech output failed");
        }

        self.session.push_turn(ChatMessage::user(&utterance.text));
        self.session.push_turn(ChatMessage::assistant(&answer));
        self.transcript.append_exchange(&utterance.text, &answer)?;
        Ok(())
    }
}

enum AnswerQuery {
    Realtime(String),
    General(String),
}

/// First realtime query wins; otherwise the first general query. Reminders
/// are recognized by the parser but have no executor yet, so they are
/// dropped here with a warning.
fn pick_query(queries: Vec<Directive>) -> Option<AnswerQuery> {
    let mut chosen: Option<AnswerQuery> = None;
    for directive in queries {
        match directive {
            Directive::Realtime(q) => {
                if matches!(&chosen, None | Some(AnswerQuery::General(_))) {
                    chosen = Some(AnswerQuery::Realtime(q));
                } else {
                    debug!(query = %q, "extra realtime query dropped");
                }
            }
            Directive::General(q) => {
                if chosen.is_none() {
                    chosen = Some(AnswerQuery::General(q));
                } else {
                    debug!(query = %q, "extra general query dropped");
                }
            }
            Directive::Reminder { when, message } => {
                warn!(%when, %message, "reminder directives are not executed");
            }
            other => debug!(directive = %other, "unhandled directive in query bucket"),
        }
    }
    chosen
}
