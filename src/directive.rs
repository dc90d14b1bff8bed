//! Typed directives extracted from classifier output.
//!
//! The classifier replies with a comma-separated list of free-text tokens
//! like `open chrome, general tell me about gandhi`. This module lexes each
//! token into a keyword plus payload and validates it against the enumerated
//! keyword set. Unmatched tokens are dropped, deliberately and silently:
//! the filter is a whitelist, not a parser that can fail.

use tracing::debug;

/// A single classified, typed action extracted from an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Launch an application or site by name.
    Open(String),
    /// Close an application by name.
    Close(String),
    /// Play a query on the video platform.
    Play(String),
    /// OS-level system command (mute, volume, ...).
    System(String),
    /// Generate written content on a topic and open it in a viewer.
    Content(String),
    /// Open a web search for the topic.
    GoogleSearch(String),
    /// Open a video-platform search for the topic.
    YoutubeSearch(String),
    /// Conversational query answerable from general knowledge.
    General(String),
    /// Query needing up-to-date information from the web.
    Realtime(String),
    /// A reminder with a time expression and a message.
    Reminder {
        /// When the reminder should fire, as spoken.
        when: String,
        /// What to remind about.
        message: String,
    },
    /// End the session.
    Exit,
}

impl Directive {
    /// True for directives the automation executor handles.
    pub fn is_automation(&self) -> bool {
        matches!(
            self,
            Directive::Open(_)
                | Directive::Close(_)
                | Directive::Play(_)
                | Directive::System(_)
                | Directive::Content(_)
                | Directive::GoogleSearch(_)
                | Directive::YoutubeSearch(_)
        )
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::Open(p) => write!(f, "open {p}"),
            Directive::Close(p) => write!(f, "close {p}"),
            Directive::Play(p) => write!(f, "play {p}"),
            Directive::System(p) => write!(f, "system {p}"),
            Directive::Content(p) => write!(f, "content {p}"),
            Directive::GoogleSearch(p) => write!(f, "google search {p}"),
            Directive::YoutubeSearch(p) => write!(f, "youtube search {p}"),
            Directive::General(p) => write!(f, "general {p}"),
            Directive::Realtime(p) => write!(f, "realtime {p}"),
            Directive::Reminder { when, message } => write!(f, "reminder {when} {message}"),
            Directive::Exit => write!(f, "exit"),
        }
    }
}

/// Recognized directive keywords, longest first so that `google search`
/// wins over a hypothetical `google` prefix.
const KEYWORDS: &[&str] = &[
    "youtube search",
    "google search",
    "realtime",
    "reminder",
    "content",
    "general",
    "system",
    "close",
    "open",
    "play",
    "exit",
];

/// Lex one comma-separated token into a directive.
///
/// Returns `None` when the token does not start with a recognized keyword,
/// or when a payload-carrying keyword arrives with an empty payload
/// (an `open` with nothing to open is classifier noise, not a command).
pub fn parse_token(token: &str) -> Option<Directive> {
    let trimmed = token.trim();
    let lower = trimmed.to_lowercase();

    let keyword = KEYWORDS.iter().find(|k| {
        lower.starts_with(**k)
            && (lower.len() == k.len() || lower.as_bytes().get(k.len()) == Some(&b' '))
    })?;

    let payload = lower[keyword.len()..].trim().to_owned();

    match *keyword {
        "exit" => Some(Directive::Exit),
        "open" if !payload.is_empty() => Some(Directive::Open(payload)),
        "close" if !payload.is_empty() => Some(Directive::Close(payload)),
        "play" if !payload.is_empty() => Some(Directive::Play(payload)),
        "open" | "close" | "play" => {
            debug!(token = trimmed, "dropping directive with empty payload");
            None
        }
        "system" => Some(Directive::System(payload)),
        "content" => Some(Directive::Content(payload)),
        "google search" => Some(Directive::GoogleSearch(payload)),
        "youtube search" => Some(Directive::YoutubeSearch(payload)),
        "general" => Some(Directive::General(payload)),
        "realtime" => Some(Directive::Realtime(payload)),
        "reminder" => Some(parse_reminder(&payload)),
        _ => None,
    }
}

/// Parse a classifier reply into an ordered directive list.
///
/// Tokens that do not match the keyword whitelist are discarded; order of
/// the surviving directives follows the reply (which in turn follows the
/// order the user spoke them).
pub fn parse_response(response: &str) -> Vec<Directive> {
    response.split(',').filter_map(parse_token).collect()
}

/// Split a reminder payload into a time expression and a message.
///
/// Leading tokens that read as temporal (contain a digit, or are month/day
/// names, meridiems, or connective words like "at"/"on") form the `when`
/// part; the remainder is the message.
fn parse_reminder(payload: &str) -> Directive {
    const TEMPORAL_WORDS: &[&str] = &[
        "am", "pm", "at", "on", "today", "tomorrow", "tonight", "monday", "tuesday", "wednesday",
        "thursday", "friday", "saturday", "sunday", "january", "february", "march", "april",
        "may", "june", "july", "august", "september", "october", "november", "december",
    ];

    let words: Vec<&str> = payload.split_whitespace().collect();
    let mut split = 0;
    for word in &words {
        let temporal =
            word.chars().any(|c| c.is_ascii_digit()) || TEMPORAL_WORDS.contains(word);
        if temporal {
            split += 1;
        } else {
            break;
        }
    }

    Directive::Reminder {
        when: words[..split].join(" "),
        message: words[split..].join(" "),
    }
}
