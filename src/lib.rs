//! Vigil: a voice-driven personal assistant with emergency escalation.
//!
//! One utterance flows through a fixed cycle:
//! Capture → normalize → distress scan → intent classification → dispatch
//!
//! # Architecture
//!
//! - **Capture**: microphone audio via `cpal`, or a line-oriented source
//! - **Classification**: a completion provider maps each utterance to a
//!   batch of directives, with a bounded retry loop and a deterministic
//!   chat fallback
//! - **Dispatch**: automation directives run against the desktop; at most
//!   one spoken answer is produced per cycle
//! - **Emergency**: distress keywords and a continuous acoustic monitor
//!   both feed one escalation state machine (record, locate, alert,
//!   cool down)
//!
//! The binary in `src/bin/vigil.rs` wires these together; every external
//! surface (completion providers, search, messaging, geolocation, desktop
//! control, speech I/O) sits behind a trait so the cycle is testable
//! without a desktop or network.

pub mod audio;
pub mod automation;
pub mod classifier;
pub mod config;
pub mod directive;
pub mod dispatch;
pub mod emergency;
pub mod error;
pub mod geo;
pub mod normalize;
pub mod providers;
pub mod responder;
pub mod runtime;
pub mod session;
pub mod speech;
pub mod transcript;

pub use config::AssistantConfig;
pub use directive::Directive;
pub use error::{AssistantError, Result};
pub use runtime::Runtime;
pub use session::{AssistantStatus, SessionContext};
