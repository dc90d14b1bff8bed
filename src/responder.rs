//! Conversational responders.
//!
//! [`GeneralResponder`] answers chat-class queries straight from the
//! completion provider, with a local fast path for trivially answerable
//! queries (time, date, identity) that never costs a network call.
//! [`RealtimeResponder`] grounds its answer in fresh web snippets fetched
//! through the [`SearchEngine`] seam before consulting the provider.

use crate::error::{AssistantError, Result};
use crate::normalize::{clean_answer, shape_query};
use crate::providers::{ChatMessage, CompletionProvider};
use async_trait::async_trait;
use chrono::Local;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a rendered clock preamble stays valid before it is rebuilt.
const PREAMBLE_TTL: Duration = Duration::from_secs(60);

/// One web search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Web search seam for the realtime responder.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Fetch up to `limit` results for `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// [`SearchEngine`] backed by the DuckDuckGo instant-answer endpoint.
pub struct InstantAnswerSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl InstantAnswerSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Dispatch(format!("search client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SearchEngine for InstantAnswerSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let body: serde_json::Value = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| AssistantError::Dispatch(format!("search request: {e}")))?
            .json()
            .await
            .map_err(|e| AssistantError::Dispatch(format!("search body: {e}")))?;

        let mut hits = Vec::new();

        let abstract_text = body["AbstractText"].as_str().unwrap_or_default();
        if !abstract_text.is_empty() {
            hits.push(SearchHit {
                title: body["Heading"].as_str().unwrap_or(query).to_owned(),
                snippet: abstract_text.to_owned(),
                url: body["AbstractURL"].as_str().unwrap_or_default().to_owned(),
            });
        }

        if let Some(topics) = body["RelatedTopics"].as_array() {
            for topic in topics {
                if hits.len() >= limit {
                    break;
                }
                if let Some(text) = topic["Text"].as_str() {
                    hits.push(SearchHit {
                        title: query.to_owned(),
                        snippet: text.to_owned(),
                        url: topic["FirstURL"].as_str().unwrap_or_default().to_owned(),
                    });
                }
            }
        }

        hits.truncate(limit);
        Ok(hits)
    }
}

/// Clock-derived preamble giving the model the current day, date and time.
/// Rebuilt at most once per [`PREAMBLE_TTL`].
struct ClockPreamble {
    cached: Mutex<Option<(Instant, String)>>,
}

impl ClockPreamble {
    fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    fn render(&self) -> String {
        let mut guard = match self.cached.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((built, text)) = guard.as_ref() {
            if built.elapsed() < PREAMBLE_TTL {
                return text.clone();
            }
        }
        let now = Local::now();
        let text = format!(
            "Use this real-time information if needed:\n\
             Day: {}\nDate: {}\nTime: {}",
            now.format("%A"),
            now.format("%d %B %Y"),
            now.format("%H:%M:%S"),
        );
        *guard = Some((Instant::now(), text.clone()));
        text
    }
}

/// Answers chat-class queries via the completion provider.
pub struct GeneralResponder {
    provider: Arc<dyn CompletionProvider>,
    identity: String,
    username: String,
    assistant_name: String,
    preamble: ClockPreamble,
}

impl GeneralResponder {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        username: &str,
        assistant_name: &str,
    ) -> Self {
        let identity = format!(
            "You are {assistant_name}, an accurate and concise AI assistant \
             for {username}. Reply only in English, in complete sentences, \
             with proper grammar and punctuation. Do not mention your \
             training data and do not pad answers with small talk."
        );
        Self {
            provider,
            identity,
            username: username.to_owned(),
            assistant_name: assistant_name.to_owned(),
            preamble: ClockPreamble::new(),
        }
    }

    /// Answer `query` given the recent conversation `history`.
    ///
    /// Trivial queries (clock, date, identity) are answered locally.
    pub async fn respond(&self, query: &str, history: &[ChatMessage]) -> Result<String> {
        if let Some(instant) = self.instant_response(query) {
            debug!(query, "answered from instant-response table");
            return Ok(instant);
        }

        let system = format!("{}\n\n{}", self.identity, self.preamble.render());
        let shaped = shape_query(query);
        let raw = self
            .provider
            .complete(&system, history, &shaped)
            .await
            .map_err(|e| AssistantError::Provider(e.to_string()))?;
        Ok(clean_answer(&raw))
    }

    /// Local fast path for queries whose answer the process already knows.
    fn instant_response(&self, query: &str) -> Option<String> {
        let q = query.trim().to_lowercase();
        let now = Local::now();
        if matches!(q.as_str(), "hello" | "hi" | "hey" | "good morning" | "good evening") {
            return Some(format!(
                "Hello {}! How can I help you?",
                self.username
            ));
        }
        if matches!(q.as_str(), "goodbye" | "bye" | "good night") {
            return Some(format!("Goodbye {}! Take care.", self.username));
        }
        if q == "how are you" || q == "how are you doing" {
            return Some("I'm doing great, thank you for asking!".to_owned());
        }
        if q == "what time is it" || q == "what is the time" || q == "the time" {
            return Some(format!("It's {}.", now.format("%H:%M")));
        }
        if q == "what is the date" || q == "what's the date" || q == "today's date" {
            return Some(format!("Today is {}.", now.format("%A, %d %B %Y")));
        }
        if q == "who are you" || q == "what is your name" {
            return Some(format!(
                "I'm {}, your personal assistant.",
                self.assistant_name
            ));
        }
        None
    }
}

/// Answers current-events queries grounded in fresh search snippets.
pub struct RealtimeResponder {
    provider: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchEngine>,
    identity: String,
    max_results: usize,
    preamble: ClockPreamble,
}

impl RealtimeResponder {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchEngine>,
        username: &str,
        assistant_name: &str,
        max_results: usize,
    ) -> Self {
        let identity = format!(
            "You are {assistant_name}, an AI assistant for {username} with \
             access to live web search results. Answer from the provided \
             results in a professional, well-punctuated style. Reply only \
             in English."
        );
        Self {
            provider,
            search,
            identity,
            max_results,
            preamble: ClockPreamble::new(),
        }
    }

    /// Answer `query`, grounding the provider call in search snippets.
    /// A failed search degrades to an ungrounded answer rather than an error.
    pub async fn respond(&self, query: &str, history: &[ChatMessage]) -> Result<String> {
        let snippets = match self.search.search(query, self.max_results).await {
            Ok(hits) => render_hits(query, &hits),
            Err(e) => {
                warn!(error = %e, "search failed, answering without grounding");
                String::new()
            }
        };

        let mut system = format!("{}\n\n{}", self.identity, self.preamble.render());
        if !snippets.is_empty() {
            system.push_str("\n\n");
            system.push_str(&snippets);
        }

        let shaped = shape_query(query);
        let raw = self
            .provider
            .complete(&system, history, &shaped)
            .await
            .map_err(|e| AssistantError::Provider(e.to_string()))?;
        Ok(clean_answer(&raw))
    }
}

fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let mut out = format!("Search results for '{query}':\n[start]\n");
    for hit in hits {
        out.push_str(&format!("Title: {}\nDescription: {}\n\n", hit.title, hit.snippet));
    }
    out.push_str("[end]");
    out
}
