//! Configuration types for the assistant core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// User/assistant identity settings.
    pub identity: IdentityConfig,
    /// Completion provider settings (primary + secondary).
    pub providers: ProvidersConfig,
    /// Intent classifier settings.
    pub classifier: ClassifierConfig,
    /// Directive dispatch settings.
    pub dispatch: DispatchConfig,
    /// Emergency escalation settings.
    pub emergency: EmergencyConfig,
    /// Audio capture settings for emergency recording and monitoring.
    pub audio: AudioConfig,
    /// Speech synthesis settings.
    pub speech: SpeechConfig,
    /// Persisted chat transcript settings.
    pub transcript: TranscriptConfig,
    /// Realtime search settings.
    pub search: SearchConfig,
}

/// Names used in prompts and spoken replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name of the primary user.
    pub username: String,
    /// Name the assistant answers to.
    pub assistant_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username: "User".to_owned(),
            assistant_name: "Vigil".to_owned(),
        }
    }
}

/// Connection details for one OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoint {
    /// Base URL including `/v1` (e.g. `https://api.groq.com/openai/v1`).
    pub base_url: String,
    /// API key. Empty means read from the environment at startup.
    pub api_key: String,
    /// Model identifier sent in requests.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            api_key: String::new(),
            model: "llama-3.3-70b-versatile".to_owned(),
            timeout_secs: 30,
        }
    }
}

/// Primary and secondary completion providers.
///
/// Both classifier and conversational responders go through the same pair:
/// the secondary is only consulted when the primary fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// First provider tried for every request.
    pub primary: ProviderEndpoint,
    /// Fallback provider of the same shape.
    pub secondary: ProviderEndpoint,
    /// Number of recent chat turns sent as context.
    pub history_turns: usize,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: ProviderEndpoint::default(),
            secondary: ProviderEndpoint {
                base_url: "https://api.cohere.ai/compatibility/v1".to_owned(),
                api_key: String::new(),
                model: "command-r-plus".to_owned(),
                timeout_secs: 30,
            },
            history_turns: 5,
        }
    }
}

/// Intent classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Maximum classification attempts before the General fallback.
    pub max_attempts: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Directive dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Delay between consecutive automation directives in milliseconds.
    ///
    /// Gives the desktop time to settle between OS-level side effects
    /// (window focus, media keys) so they do not race each other.
    pub automation_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            automation_delay_ms: 500,
        }
    }
}

/// Emergency escalation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    /// Keywords that trigger escalation from an utterance.
    pub keywords: Vec<String>,
    /// Duration of the emergency audio capture in seconds.
    pub record_secs: u64,
    /// Cooldown after a completed alert, in seconds. No second alert may be
    /// sent inside this window regardless of trigger frequency.
    pub cooldown_secs: u64,
    /// Destination identifiers for alert delivery (e.g. phone numbers).
    pub contacts: Vec<String>,
    /// Webhook endpoint the messaging channel posts alerts to.
    pub webhook_url: String,
    /// RMS volume threshold for the continuous distress monitor.
    ///
    /// Samples are f32 in \[-1, 1\]. 0.01 matches normal speech at
    /// conversational distance; raise it in noisy environments.
    pub volume_threshold: f32,
    /// One-sided spectral power threshold for the band above
    /// `high_freq_cutoff_hz` (a full-scale sine in the band measures 0.5).
    pub high_freq_energy_threshold: f32,
    /// Frequency cutoff in Hz for the high-frequency energy band.
    pub high_freq_cutoff_hz: f32,
    /// Consecutive positive windows required before the monitor triggers.
    pub consecutive_windows: u32,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            keywords: ["help", "save", "emergency", "danger", "scared", "unsafe"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            record_secs: 10,
            cooldown_secs: 60,
            contacts: Vec::new(),
            webhook_url: String::new(),
            volume_threshold: 0.01,
            high_freq_energy_threshold: 0.005,
            high_freq_cutoff_hz: 1000.0,
            consecutive_windows: 3,
        }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of input channels (1 = mono).
    pub channels: u16,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Directory where emergency recordings are written.
    pub recording_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            input_device: None,
            recording_dir: None,
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Primary synthesizer command (text passed as the last argument).
    pub tts_command: String,
    /// Extra arguments for the primary synthesizer.
    pub tts_args: Vec<String>,
    /// Offline fallback synthesizer command.
    pub offline_tts_command: String,
    /// Extra arguments for the offline fallback.
    pub offline_tts_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            tts_command: "say".to_owned(),
            tts_args: Vec::new(),
            offline_tts_command: "espeak".to_owned(),
            offline_tts_args: Vec::new(),
        }
    }
}

/// Persisted transcript configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Path to the transcript file (None = `<data dir>/vigil/transcript.json`).
    pub path: Option<PathBuf>,
    /// Maximum number of retained turns.
    pub max_turns: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_turns: 200,
        }
    }
}

/// Realtime search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// JSON search endpoint queried by the realtime responder.
    pub endpoint: String,
    /// Maximum number of result snippets used to ground an answer.
    pub max_results: usize,
    /// Per-search timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.duckduckgo.com/".to_owned(),
            max_results: 2,
            timeout_secs: 10,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/vigil/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("vigil").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("vigil")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/vigil-config/config.toml")
        }
    }

    /// Directory where runtime artifacts (recordings, generated content) live.
    pub fn data_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("vigil")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AssistantConfig::default();
        assert!(config.audio.sample_rate > 0);
        assert!(config.audio.channels > 0);
        assert_eq!(config.classifier.max_attempts, 5);
        assert_eq!(config.emergency.cooldown_secs, 60);
        assert_eq!(config.emergency.record_secs, 10);
        assert_eq!(config.emergency.consecutive_windows, 3);
        assert!(config.emergency.keywords.contains(&"help".to_owned()));
        assert!(config.providers.history_turns > 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AssistantConfig::default();
        config.emergency.cooldown_secs = 120;
        config.emergency.contacts = vec!["+15550001111".to_owned()];
        config.dispatch.automation_delay_ms = 250;

        config.save_to_file(&path).unwrap();
        assert!(path.exists());

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.emergency.cooldown_secs, 120);
        assert_eq!(loaded.emergency.contacts.len(), 1);
        assert_eq!(loaded.dispatch.automation_delay_ms, 250);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result =
            AssistantConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(AssistantConfig::from_file(&path).is_err());
    }

    #[test]
    fn partial_file_fills_missing_sections_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[emergency]\ncooldown_secs = 90\n").unwrap();

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.emergency.cooldown_secs, 90);
        // Untouched sections come from Default.
        assert_eq!(loaded.classifier.max_attempts, 5);
        assert_eq!(loaded.dispatch.automation_delay_ms, 500);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = AssistantConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("vigil"));
    }
}
