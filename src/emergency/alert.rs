//! Alert composition and fan-out.
//!
//! The dispatcher composes one alert message and attempts delivery to every
//! configured contact through a [`MessageChannel`]. Delivery is best-effort
//! per contact; the escalation is considered successful once any single
//! contact was reached.

use crate::error::{AssistantError, Result};
use crate::geo::Location;
use async_trait::async_trait;
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Outbound message delivery seam.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn id(&self) -> &str;

    /// Deliver `body` to a single contact address.
    async fn send(&self, contact: &str, body: &str) -> Result<()>;
}

/// [`MessageChannel`] that POSTs to a messaging gateway webhook.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Messaging(format!("client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MessageChannel for WebhookChannel {
    fn id(&self) -> &str {
        "webhook"
    }

    async fn send(&self, contact: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "to": contact, "message": body }))
            .send()
            .await
            .map_err(|e| AssistantError::Messaging(format!("send to {contact}: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AssistantError::Messaging(format!(
                "gateway returned {} for {contact}",
                response.status()
            )))
        }
    }
}

/// Fans one alert out to all contacts and reports how many were reached.
pub struct AlertDispatcher {
    channel: Arc<dyn MessageChannel>,
    contacts: Vec<String>,
    username: String,
}

impl AlertDispatcher {
    pub fn new(channel: Arc<dyn MessageChannel>, contacts: Vec<String>, username: &str) -> Self {
        Self {
            channel,
            contacts,
            username: username.to_owned(),
        }
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Deliver the alert to every contact, continuing past individual
    /// failures. Returns the number of contacts actually reached.
    pub async fn dispatch(&self, reason: &str, location: &Location, clip: &Path) -> usize {
        let body = compose_alert(&self.username, reason, location, clip);
        let mut reached = 0;
        for contact in &self.contacts {
            match self.channel.send(contact, &body).await {
                Ok(()) => {
                    info!(%contact, channel = self.channel.id(), "alert delivered");
                    reached += 1;
                }
                Err(e) => {
                    error!(%contact, error = %e, "alert delivery failed");
                }
            }
        }
        reached
    }
}

/// Render the alert body sent to contacts.
fn compose_alert(username: &str, reason: &str, location: &Location, clip: &Path) -> String {
    format!(
        "EMERGENCY ALERT for {username}\n\
         Trigger: {reason}\n\
         Time: {}\n\
         Last known location: {} ({})\n\
         Audio recording saved at: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        location.place,
        location.maps_url(),
        clip.display(),
    )
}
