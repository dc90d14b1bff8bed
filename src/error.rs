//! Error types for the assistant core.

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Intent classification error.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Completion provider error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Desktop automation error.
    #[error("automation error: {0}")]
    Automation(String),

    /// Emergency escalation error.
    #[error("emergency error: {0}")]
    Emergency(String),

    /// Speech capture or synthesis error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Geolocation lookup error.
    #[error("geolocation error: {0}")]
    Geolocation(String),

    /// Messaging channel error.
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted transcript error.
    #[error("transcript error: {0}")]
    Transcript(String),

    /// Dispatch loop coordination error.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
