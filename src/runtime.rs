//! Runtime loop.
//!
//! One serial cycle: listen, scan for distress keywords, classify, dispatch.
//! The acoustic distress monitor runs as a separate task feeding the same
//! emergency machine, whose cooldown gate keeps the two trigger paths from
//! double-alerting.

use crate::classifier::{Exemplar, IntentClassifier};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::emergency::monitor::DistressMonitor;
use crate::emergency::{EmergencyMachine, TriggerReason};
use crate::error::Result;
use crate::session::{AssistantStatus, SessionContext};
use crate::speech::{ListenOutcome, SpeechCapture};
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Classification exemplars remembered from earlier cycles.
const CLASSIFIER_HISTORY_LIMIT: usize = 20;

/// Wires the capture source, classifier, dispatcher, and emergency machine
/// into the serial assistant loop.
pub struct Runtime {
    capture: Arc<dyn SpeechCapture>,
    classifier: IntentClassifier,
    dispatcher: Dispatcher,
    emergency: Arc<EmergencyMachine>,
    session: Arc<SessionContext>,
    cancel: CancellationToken,
    classifier_history: Mutex<Vec<Exemplar>>,
}

impl Runtime {
    pub fn new(
        capture: Arc<dyn SpeechCapture>,
        classifier: IntentClassifier,
        dispatcher: Dispatcher,
        emergency: Arc<EmergencyMachine>,
        session: Arc<SessionContext>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            capture,
            classifier,
            dispatcher,
            emergency,
            session,
            cancel,
            classifier_history: Mutex::new(Vec::new()),
        }
    }

    /// Drive the loop until the session ends or the token is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!("assistant loop started");
        loop {
            self.session.set_status(AssistantStatus::Listening);

            let outcome = tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("runtime cancelled");
                    return Ok(());
                }
                outcome = self.capture.listen() => outcome?,
            };

            let utterance = match outcome {
                ListenOutcome::Heard(u) => u,
                ListenOutcome::Silence => continue,
                ListenOutcome::Closed => {
                    info!("input source closed");
                    return Ok(());
                }
            };

            if !self.session.mic_armed() {
                debug!(text = %utterance.text, "mic disarmed, utterance dropped");
                continue;
            }

            // Distress keywords preempt classification entirely.
            if let Some(word) = self.emergency.keyword_in(&utterance.text) {
                self.session.set_status(AssistantStatus::Emergency);
                let result = self.emergency.trigger(TriggerReason::Keyword(word)).await;
                debug!(?result, "keyword escalation finished");
                continue;
            }

            self.session.set_status(AssistantStatus::Thinking);
            let directives = {
                let history = match self.classifier_history.lock() {
                    Ok(g) => g.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                };
                self.classifier.classify(&utterance.text, &history).await
            };
            self.remember_exemplar(&utterance.text, &directives);

            match self.dispatcher.dispatch(&utterance, directives).await? {
                DispatchOutcome::Continue => {}
                DispatchOutcome::Exit => {
                    self.cancel.cancel();
                    return Ok(());
                }
            }
        }
    }

    fn remember_exemplar(&self, utterance: &str, directives: &[crate::directive::Directive]) {
        if directives.is_empty() {
            return;
        }
        let output = directives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut history = match self.classifier_history.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.push(Exemplar::new(utterance, output));
        if history.len() > CLASSIFIER_HISTORY_LIMIT {
            let excess = history.len() - CLASSIFIER_HISTORY_LIMIT;
            history.drain(..excess);
        }
    }
}

/// Run the acoustic distress monitor over a stream of sample windows.
/// Triggers feed the shared emergency machine; its cooldown gate decides
/// whether anything actually happens.
pub async fn run_monitor(
    mut windows: mpsc::Receiver<Vec<f32>>,
    mut monitor: DistressMonitor,
    emergency: Arc<EmergencyMachine>,
    session: Arc<SessionContext>,
    cancel: CancellationToken,
) {
    info!("distress monitor started");
    loop {
        let window = tokio::select! {
            () = cancel.cancelled() => {
                info!("distress monitor stopped");
                return;
            }
            window = windows.recv() => match window {
                Some(w) => w,
                None => {
                    warn!("audio window stream ended");
                    return;
                }
            },
        };

        if monitor.push_window(&window) {
            session.set_status(AssistantStatus::Emergency);
            let result = emergency.trigger(TriggerReason::AcousticDistress).await;
            debug!(?result, "acoustic escalation finished");
            session.set_status(AssistantStatus::Listening);
        }
    }
}
