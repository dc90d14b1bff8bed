//! Utterance normalization and text shaping.
//!
//! Raw transcripts arrive with inconsistent casing, stray whitespace and
//! trailing punctuation. Everything downstream (classifier, emergency keyword
//! scan, responders) works on the canonical form produced here.

use chrono::{DateTime, Utc};

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    /// Recognized speech.
    Voice,
    /// Typed input.
    Typed,
}

/// A single captured utterance. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Canonical text (see [`normalize`]).
    pub text: String,
    /// Capture timestamp.
    pub captured_at: DateTime<Utc>,
    /// Capture source.
    pub source: UtteranceSource,
}

impl Utterance {
    /// Build an utterance from raw text, normalizing it on the way in.
    pub fn new(raw: &str, source: UtteranceSource) -> Self {
        Self {
            text: normalize(raw),
            captured_at: Utc::now(),
            source,
        }
    }
}

/// Canonicalize raw text: trim, lowercase, strip trailing punctuation.
pub fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', '?', '!'])
        .trim()
        .to_lowercase()
}

/// Leading words that mark a query as a question.
const QUESTION_WORDS: &[&str] = &[
    "how", "what", "who", "where", "when", "why", "which", "whose", "whom", "can you",
];

/// Shape a normalized query for the conversational back end: question-word
/// queries get a trailing `?`, statements a trailing `.`, then sentence case.
pub fn shape_query(query: &str) -> String {
    let normalized = normalize(query);
    if normalized.is_empty() {
        return normalized;
    }

    let is_question = QUESTION_WORDS
        .iter()
        .any(|w| normalized.starts_with(w) && {
            // Word boundary: "whoever" must not count as "who".
            normalized.len() == w.len()
                || normalized.as_bytes().get(w.len()) == Some(&b' ')
        });

    let terminator = if is_question { '?' } else { '.' };
    let mut shaped = String::with_capacity(normalized.len() + 1);
    let mut chars = normalized.chars();
    if let Some(first) = chars.next() {
        shaped.extend(first.to_uppercase());
        shaped.push_str(chars.as_str());
    }
    shaped.push(terminator);
    shaped
}

/// Strip blank lines from a generated answer before speaking/persisting it.
pub fn clean_answer(answer: &str) -> String {
    answer
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
