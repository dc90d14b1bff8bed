//! Automation executor: one directive in, one concrete desktop side effect out.
//!
//! Every OS interaction goes through the [`DesktopControl`] trait so the
//! executor's decision logic (notably the three-tier open fallback) stays
//! testable without a desktop. Each `execute` call returns a human-readable
//! status string on success and a typed reason on failure; the dispatcher
//! only looks at success/failure.

use crate::directive::Directive;
use crate::providers::CompletionProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Media key events the system command vocabulary maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    /// Mute audio output.
    Mute,
    /// Unmute audio output.
    Unmute,
    /// Raise output volume one step.
    VolumeUp,
    /// Lower output volume one step.
    VolumeDown,
}

/// Desktop side-effect seam.
///
/// Implementations launch and close applications by fuzzy name match, open
/// URLs in the default browser, emit media key events, start media playback
/// on the video platform, and open text files in a viewer.
pub trait DesktopControl: Send + Sync {
    /// Launch a native application by (fuzzy) name.
    fn launch_app(&self, name: &str) -> anyhow::Result<()>;
    /// Close a native application by (fuzzy) name.
    fn close_app(&self, name: &str) -> anyhow::Result<()>;
    /// Open a URL in the default browser.
    fn open_url(&self, url: &str) -> anyhow::Result<()>;
    /// Emit a media key event.
    fn media_key(&self, key: MediaKey) -> anyhow::Result<()>;
    /// Play a query on the video platform.
    fn play_media(&self, query: &str) -> anyhow::Result<()>;
    /// Open a text file in a viewer.
    fn open_text_file(&self, path: &Path) -> anyhow::Result<()>;
}

/// Typed failure reason for an automation directive.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// All three open tiers failed.
    #[error("could not open '{0}': {1}")]
    Open(String, String),
    /// Native close failed.
    #[error("couldn't close {0}")]
    Close(String),
    /// Video platform playback failed.
    #[error("playback failed for '{0}': {1}")]
    Play(String, String),
    /// Content generation or persistence failed.
    #[error("content generation failed: {0}")]
    Content(String),
    /// Search URL could not be opened.
    #[error("search failed for '{0}': {1}")]
    Search(String, String),
    /// Media key emission failed.
    #[error("system command failed: {0}")]
    System(String),
    /// The directive is not automation-class.
    #[error("not an automation directive: {0}")]
    NotAutomation(String),
}

/// Curated mapping of well-known service names to their web URLs, used as
/// the second open tier when no native application matches.
const WEB_APPS: &[(&str, &str)] = &[
    ("whatsapp", "https://web.whatsapp.com"),
    ("spotify", "https://open.spotify.com"),
    ("netflix", "https://www.netflix.com"),
    ("gmail", "https://mail.google.com"),
    ("maps", "https://maps.google.com"),
    ("drive", "https://drive.google.com"),
    ("amazon", "https://www.amazon.com"),
    ("facebook", "https://www.facebook.com"),
    ("instagram", "https://www.instagram.com"),
    ("twitter", "https://twitter.com"),
    ("linkedin", "https://www.linkedin.com"),
    ("discord", "https://discord.com/app"),
];

/// Executes automation-class directives against a [`DesktopControl`].
pub struct AutomationExecutor {
    control: Arc<dyn DesktopControl>,
    provider: Arc<dyn CompletionProvider>,
    content_dir: PathBuf,
    content_prompt: String,
}

impl AutomationExecutor {
    /// Create an executor. `content_dir` receives generated text artifacts.
    pub fn new(
        control: Arc<dyn DesktopControl>,
        provider: Arc<dyn CompletionProvider>,
        content_dir: impl Into<PathBuf>,
        assistant_name: &str,
    ) -> Self {
        Self {
            control,
            provider,
            content_dir: content_dir.into(),
            content_prompt: format!(
                "You are {assistant_name}, a professional writing assistant. \
                 Write well-structured content on the requested topic. \
                 Use proper grammar and punctuation."
            ),
        }
    }

    /// Execute one automation directive.
    ///
    /// # Errors
    ///
    /// Returns a typed [`AutomationError`]; never panics and never
    /// propagates a raw OS error.
    pub async fn execute(&self, directive: &Directive) -> Result<String, AutomationError> {
        match directive {
            Directive::Open(name) => self.open(name),
            Directive::Close(name) => self.close(name),
            Directive::Play(query) => self.play(query),
            Directive::System(command) => self.system(command),
            Directive::Content(topic) => self.content(topic).await,
            Directive::GoogleSearch(topic) => self.google_search(topic),
            Directive::YoutubeSearch(topic) => self.youtube_search(topic),
            other => Err(AutomationError::NotAutomation(other.to_string())),
        }
    }

    /// Three-tier open: native launch, then curated web mapping, then a
    /// generic web search for the literal name. Each tier's failure selects
    /// the next tier; only a tier-three failure is an error.
    fn open(&self, name: &str) -> Result<String, AutomationError> {
        // "open youtube cats" opens a video search rather than the site root.
        if let Some(query) = name.strip_prefix("youtube ") {
            let url = youtube_search_url(query);
            return self
                .control
                .open_url(&url)
                .map(|()| format!("Opened YouTube and searching for {query}"))
                .map_err(|e| AutomationError::Open(name.to_owned(), e.to_string()));
        }

        match self.control.launch_app(name) {
            Ok(()) => return Ok(format!("Opened {name}")),
            Err(e) => info!(app = name, error = %e, "native launch failed, trying web tier"),
        }

        if let Some((_, url)) = WEB_APPS.iter().find(|(app, _)| *app == name) {
            match self.control.open_url(url) {
                Ok(()) => return Ok(format!("Opened {name} in web browser")),
                Err(e) => info!(app = name, error = %e, "web tier failed, trying search tier"),
            }
        }

        let search_url = google_search_url(name);
        self.control
            .open_url(&search_url)
            .map(|()| format!("Searching for {name} on Google"))
            .map_err(|e| AutomationError::Open(name.to_owned(), e.to_string()))
    }

    fn close(&self, name: &str) -> Result<String, AutomationError> {
        self.control
            .close_app(name)
            .map(|()| format!("Closed {name}"))
            .map_err(|e| {
                warn!(app = name, error = %e, "close failed");
                AutomationError::Close(name.to_owned())
            })
    }

    fn play(&self, query: &str) -> Result<String, AutomationError> {
        self.control
            .play_media(query)
            .map(|()| format!("Playing {query} on YouTube"))
            .map_err(|e| AutomationError::Play(query.to_owned(), e.to_string()))
    }

    /// Fixed system command vocabulary. Unrecognized commands are a normal
    /// outcome, not an error.
    fn system(&self, command: &str) -> Result<String, AutomationError> {
        let key = match command {
            "mute" => MediaKey::Mute,
            "unmute" => MediaKey::Unmute,
            "volume up" => MediaKey::VolumeUp,
            "volume down" => MediaKey::VolumeDown,
            other => return Ok(format!("Unknown system command: {other}")),
        };
        self.control
            .media_key(key)
            .map(|()| format!("Executed: {command}"))
            .map_err(|e| AutomationError::System(e.to_string()))
    }

    async fn content(&self, topic: &str) -> Result<String, AutomationError> {
        let text = self
            .provider
            .complete(&self.content_prompt, &[], topic)
            .await
            .map_err(|e| AutomationError::Content(e.to_string()))?;

        let filename = format!("{}.txt", slugify(topic));
        let path = self.content_dir.join(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AutomationError::Content(e.to_string()))?;
        }
        std::fs::write(&path, &text).map_err(|e| AutomationError::Content(e.to_string()))?;

        self.control
            .open_text_file(&path)
            .map_err(|e| AutomationError::Content(e.to_string()))?;

        Ok(format!("Content on {topic} written and opened"))
    }

    fn google_search(&self, topic: &str) -> Result<String, AutomationError> {
        self.control
            .open_url(&google_search_url(topic))
            .map(|()| format!("Searching Google for {topic}"))
            .map_err(|e| AutomationError::Search(topic.to_owned(), e.to_string()))
    }

    fn youtube_search(&self, topic: &str) -> Result<String, AutomationError> {
        self.control
            .open_url(&youtube_search_url(topic))
            .map(|()| format!("Searching YouTube for {topic}"))
            .map_err(|e| AutomationError::Search(topic.to_owned(), e.to_string()))
    }
}

fn google_search_url(query: &str) -> String {
    format!("https://www.google.com/search?q={}", urlencoding::encode(query))
}

fn youtube_search_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

fn slugify(topic: &str) -> String {
    topic
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Process-spawning [`DesktopControl`] for the host desktop.
pub struct NativeDesktop;

impl NativeDesktop {
    fn spawn_detached(program: &str, args: &[&str]) -> anyhow::Result<()> {
        std::process::Command::new(program)
            .args(args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{program}: {e}"))
    }

    fn opener() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl DesktopControl for NativeDesktop {
    fn launch_app(&self, name: &str) -> anyhow::Result<()> {
        if cfg!(target_os = "macos") {
            Self::spawn_detached("open", &["-a", name])
        } else {
            // gtk-launch resolves .desktop entries by (case-insensitive) name.
            Self::spawn_detached("gtk-launch", &[name])
        }
    }

    fn close_app(&self, name: &str) -> anyhow::Result<()> {
        let status = std::process::Command::new("pkill")
            .args(["-f", "-i", name])
            .status()
            .map_err(|e| anyhow::anyhow!("pkill: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("no matching process for '{name}'"))
        }
    }

    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        Self::spawn_detached(Self::opener(), &[url])
    }

    fn media_key(&self, key: MediaKey) -> anyhow::Result<()> {
        #[cfg(target_os = "macos")]
        {
            let script = match key {
                MediaKey::Mute => "set volume with output muted",
                MediaKey::Unmute => "set volume without output muted",
                MediaKey::VolumeUp => "set volume output volume ((output volume of (get volume settings)) + 10)",
                MediaKey::VolumeDown => "set volume output volume ((output volume of (get volume settings)) - 10)",
            };
            Self::spawn_detached("osascript", &["-e", script])
        }
        #[cfg(not(target_os = "macos"))]
        {
            let xf86 = match key {
                MediaKey::Mute | MediaKey::Unmute => "XF86AudioMute",
                MediaKey::VolumeUp => "XF86AudioRaiseVolume",
                MediaKey::VolumeDown => "XF86AudioLowerVolume",
            };
            Self::spawn_detached("xdotool", &["key", xf86])
        }
    }

    fn play_media(&self, query: &str) -> anyhow::Result<()> {
        self.open_url(&youtube_search_url(query))
    }

    fn open_text_file(&self, path: &Path) -> anyhow::Result<()> {
        Self::spawn_detached(Self::opener(), &[&path.to_string_lossy()])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::providers::{ChatMessage, CompletionError, CompletionProvider};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every control call; launches/URL opens can be scripted to fail.
    #[derive(Default)]
    struct RecordingDesktop {
        calls: Mutex<Vec<String>>,
        fail_launch: bool,
        fail_url: bool,
    }

    impl RecordingDesktop {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl DesktopControl for RecordingDesktop {
        fn launch_app(&self, name: &str) -> anyhow::Result<()> {
            self.record(format!("launch:{name}"));
            if self.fail_launch {
                anyhow::bail!("no such app")
            }
            Ok(())
        }

        fn close_app(&self, name: &str) -> anyhow::Result<()> {
            self.record(format!("close:{name}"));
            Ok(())
        }

        fn open_url(&self, url: &str) -> anyhow::Result<()> {
            self.record(format!("url:{url}"));
            if self.fail_url {
                anyhow::bail!("no browser")
            }
            Ok(())
        }

        fn media_key(&self, key: MediaKey) -> anyhow::Result<()> {
            self.record(format!("key:{key:?}"));
            Ok(())
        }

        fn play_media(&self, query: &str) -> anyhow::Result<()> {
            self.record(format!("play:{query}"));
            Ok(())
        }

        fn open_text_file(&self, path: &Path) -> anyhow::Result<()> {
            self.record(format!("view:{}", path.display()));
            Ok(())
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        fn id(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            _system: &str,
            _history: &[ChatMessage],
            user: &str,
        ) -> Result<String, CompletionError> {
            Ok(format!("generated content about {user}"))
        }
    }

    fn executor(control: Arc<RecordingDesktop>, dir: &Path) -> AutomationExecutor {
        AutomationExecutor::new(control, Arc::new(EchoProvider), dir, "Vigil")
    }

    #[tokio::test]
    async fn open_tier_one_native_launch() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::Open("chrome".into())).await.unwrap();
        assert_eq!(msg, "Opened chrome");
        assert_eq!(control.calls(), vec!["launch:chrome"]);
    }

    #[tokio::test]
    async fn open_tier_two_falls_back_to_web_mapping() {
        let control = Arc::new(RecordingDesktop {
            fail_launch: true,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::Open("spotify".into())).await.unwrap();
        assert_eq!(msg, "Opened spotify in web browser");
        assert_eq!(
            control.calls(),
            vec!["launch:spotify", "url:https://open.spotify.com"]
        );
    }

    #[tokio::test]
    async fn open_tier_three_falls_back_to_search() {
        let control = Arc::new(RecordingDesktop {
            fail_launch: true,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        // Not in the web-app map, so tier two is skipped.
        let msg = exec.execute(&Directive::Open("frobnicator".into())).await.unwrap();
        assert_eq!(msg, "Searching for frobnicator on Google");
        let calls = control.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].starts_with("url:https://www.google.com/search?q="));
    }

    #[tokio::test]
    async fn open_all_tiers_failing_is_an_error() {
        let control = Arc::new(RecordingDesktop {
            fail_launch: true,
            fail_url: true,
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control, dir.path());

        let err = exec.execute(&Directive::Open("spotify".into())).await.unwrap_err();
        assert!(matches!(err, AutomationError::Open(_, _)));
    }

    #[tokio::test]
    async fn open_youtube_with_query_goes_straight_to_search() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::Open("youtube cat videos".into())).await.unwrap();
        assert!(msg.contains("searching for cat videos"));
        assert!(control.calls()[0].contains("youtube.com/results"));
    }

    #[tokio::test]
    async fn system_mute_emits_one_key_event() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::System("mute".into())).await.unwrap();
        assert_eq!(msg, "Executed: mute");
        assert_eq!(control.calls(), vec!["key:Mute"]);
    }

    #[tokio::test]
    async fn unknown_system_command_is_a_result_not_an_error() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::System("defenestrate".into())).await.unwrap();
        assert!(msg.contains("Unknown system command"));
        assert!(control.calls().is_empty());
    }

    #[tokio::test]
    async fn content_writes_artifact_and_opens_viewer() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::Content("sick leave letter".into())).await.unwrap();
        assert!(msg.contains("sick leave letter"));

        let artifact = dir.path().join("sick_leave_letter.txt");
        let text = std::fs::read_to_string(&artifact).unwrap();
        assert!(text.contains("generated content"));
        assert!(control.calls().iter().any(|c| c.starts_with("view:")));
    }

    #[tokio::test]
    async fn play_delegates_to_the_video_platform() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control.clone(), dir.path());

        let msg = exec.execute(&Directive::Play("blue in green".into())).await.unwrap();
        assert_eq!(msg, "Playing blue in green on YouTube");
        assert_eq!(control.calls(), vec!["play:blue in green"]);
    }

    #[tokio::test]
    async fn non_automation_directive_is_rejected() {
        let control = Arc::new(RecordingDesktop::default());
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(control, dir.path());

        let err = exec.execute(&Directive::General("hi".into())).await.unwrap_err();
        assert!(matches!(err, AutomationError::NotAutomation(_)));
    }
}
