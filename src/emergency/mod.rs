//! Emergency escalation.
//!
//! Both triggers (a distress keyword in an utterance, or the acoustic
//! monitor) converge on one [`EmergencyMachine`]. The machine walks
//! Idle -> Recording -> Locating -> Alerting -> Cooldown -> Idle, publishing
//! each transition on a watch channel so the UI can show both the phase and
//! its deadline. A failed capture or location lookup drops straight back to
//! Idle so a later trigger can retry; a completed alert enters cooldown, and
//! triggers during cooldown are suppressed.

pub mod alert;
pub mod monitor;

use crate::audio;
use crate::config::{AudioConfig, EmergencyConfig};
use crate::error::{AssistantError, Result};
use crate::geo::{Geolocator, Location};
use alert::AlertDispatcher;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

/// Escalation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyPhase {
    Idle,
    Recording,
    Locating,
    Alerting,
    Cooldown,
}

/// One published transition: the phase plus, for timed phases, when it ends.
#[derive(Debug, Clone, Copy)]
pub struct PhaseUpdate {
    pub phase: EmergencyPhase,
    pub deadline: Option<Instant>,
}

impl PhaseUpdate {
    fn idle() -> Self {
        Self {
            phase: EmergencyPhase::Idle,
            deadline: None,
        }
    }
}

/// What set the machine off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    /// A distress keyword matched in an utterance.
    Keyword(String),
    /// The acoustic monitor tripped.
    AcousticDistress,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(word) => write!(f, "distress keyword '{word}'"),
            Self::AcousticDistress => write!(f, "sustained loud high-frequency audio"),
        }
    }
}

/// Result of one trigger attempt.
#[derive(Debug)]
pub enum EscalationOutcome {
    /// At least one contact was reached.
    Alerted { contacts_reached: usize },
    /// The machine was busy or cooling down; the trigger was dropped.
    Suppressed,
    /// Capture, location, or every delivery failed; the machine is Idle again.
    Aborted(String),
}

/// Fixed-duration evidence capture seam.
#[async_trait]
pub trait ClipRecorder: Send + Sync {
    async fn record(&self, duration: Duration) -> Result<PathBuf>;
}

/// [`ClipRecorder`] using the microphone via [`audio::record_clip`].
pub struct MicClipRecorder {
    cfg: AudioConfig,
    dir: PathBuf,
}

impl MicClipRecorder {
    pub fn new(cfg: AudioConfig, dir: impl Into<PathBuf>) -> Self {
        Self {
            cfg,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl ClipRecorder for MicClipRecorder {
    async fn record(&self, duration: Duration) -> Result<PathBuf> {
        let cfg = self.cfg.clone();
        let path = self.dir.join(format!("emergency-{}.wav", uuid::Uuid::new_v4()));
        tokio::task::spawn_blocking(move || audio::record_clip(&cfg, duration, &path))
            .await
            .map_err(|e| AssistantError::Audio(format!("recorder task: {e}")))?
    }
}

/// The escalation state machine.
pub struct EmergencyMachine {
    cfg: EmergencyConfig,
    recorder: Arc<dyn ClipRecorder>,
    geolocator: Arc<dyn Geolocator>,
    dispatcher: AlertDispatcher,
    phase_tx: watch::Sender<PhaseUpdate>,
    // Serializes trigger handling; holds the cooldown expiry.
    state: Mutex<Option<Instant>>,
}

impl EmergencyMachine {
    pub fn new(
        cfg: EmergencyConfig,
        recorder: Arc<dyn ClipRecorder>,
        geolocator: Arc<dyn Geolocator>,
        dispatcher: AlertDispatcher,
    ) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(PhaseUpdate::idle());
        Arc::new(Self {
            cfg,
            recorder,
            geolocator,
            dispatcher,
            phase_tx,
            state: Mutex::new(None),
        })
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<PhaseUpdate> {
        self.phase_tx.subscribe()
    }

    pub fn phase(&self) -> EmergencyPhase {
        self.phase_tx.borrow().phase
    }

    /// Whole-word scan of an utterance for distress keywords.
    pub fn keyword_in(&self, text: &str) -> Option<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .find(|word| {
                !word.is_empty() && self.cfg.keywords.iter().any(|k| k.eq_ignore_ascii_case(word))
            })
            .map(|w| w.to_lowercase())
    }

    /// Run one escalation. Concurrent or cooled-down triggers are suppressed;
    /// the lock below is what makes the machine single-flight.
    pub async fn trigger(self: &Arc<Self>, reason: TriggerReason) -> EscalationOutcome {
        let mut cooldown_until = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!(%reason, "escalation already in flight, trigger suppressed");
                return EscalationOutcome::Suppressed;
            }
        };
        if let Some(until) = *cooldown_until {
            if Instant::now() < until {
                info!(%reason, "in cooldown, trigger suppressed");
                return EscalationOutcome::Suppressed;
            }
            *cooldown_until = None;
        }

        warn!(%reason, "emergency escalation started");

        let clip = match self.record_phase().await {
            Ok(clip) => clip,
            Err(e) => {
                error!(error = %e, "evidence capture failed, returning to idle");
                self.publish(PhaseUpdate::idle());
                return EscalationOutcome::Aborted(format!("capture: {e}"));
            }
        };

        let location = match self.locate_phase().await {
            Ok(loc) => loc,
            Err(e) => {
                error!(error = %e, "location lookup failed, returning to idle");
                self.publish(PhaseUpdate::idle());
                return EscalationOutcome::Aborted(format!("location: {e}"));
            }
        };

        self.publish(PhaseUpdate {
            phase: EmergencyPhase::Alerting,
            deadline: None,
        });
        let reached = self
            .dispatcher
            .dispatch(&reason.to_string(), &location, &clip)
            .await;

        if reached == 0 {
            error!(
                contacts = self.dispatcher.contact_count(),
                "no contact reached, returning to idle for retry"
            );
            self.publish(PhaseUpdate::idle());
            return EscalationOutcome::Aborted("no contact reached".into());
        }

        info!(reached, "escalation complete, entering cooldown");
        let cooldown = Duration::from_secs(self.cfg.cooldown_secs);
        *cooldown_until = Some(Instant::now() + cooldown);
        self.publish(PhaseUpdate {
            phase: EmergencyPhase::Cooldown,
            deadline: Some(Instant::now() + cooldown),
        });

        // Flip the published phase back to Idle when the cooldown lapses.
        let machine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if machine.phase() == EmergencyPhase::Cooldown {
                machine.publish(PhaseUpdate::idle());
            }
        });

        EscalationOutcome::Alerted {
            contacts_reached: reached,
        }
    }

    async fn record_phase(&self) -> Result<PathBuf> {
        let duration = Duration::from_secs(self.cfg.record_secs);
        self.publish(PhaseUpdate {
            phase: EmergencyPhase::Recording,
            deadline: Some(Instant::now() + duration),
        });
        self.recorder.record(duration).await
    }

    async fn locate_phase(&self) -> Result<Location> {
        self.publish(PhaseUpdate {
            phase: EmergencyPhase::Locating,
            deadline: None,
        });
        self.geolocator.locate().await
    }

    fn publish(&self, update: PhaseUpdate) {
        // send_replace never fails even with no subscribers.
        self.phase_tx.send_replace(update);
    }
}
