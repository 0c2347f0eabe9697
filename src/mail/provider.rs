//! Email provider boundary — inbox provisioning and outbound send.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::MailConfig;
use crate::error::MailError;

/// A provider-side inbox created for a thread.
#[derive(Debug, Clone)]
pub struct CreatedInbox {
    pub inbox_id: String,
}

/// Abstraction over the email provider.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Provision an inbox at `local_part@domain`.
    async fn create_inbox(&self, local_part: &str, domain: &str)
    -> Result<CreatedInbox, MailError>;

    /// Send a message from a provisioned inbox. Single best-effort attempt.
    async fn send_message(
        &self,
        inbox_id: &str,
        to: &str,
        subject: &str,
        text: &str,
    ) -> Result<(), MailError>;
}

/// AgentMail REST client.
pub struct AgentMailProvider {
    config: MailConfig,
    client: reqwest::Client,
}

impl AgentMailProvider {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CreateInboxResponse {
    inbox_id: String,
}

#[async_trait]
impl MailProvider for AgentMailProvider {
    async fn create_inbox(
        &self,
        local_part: &str,
        domain: &str,
    ) -> Result<CreatedInbox, MailError> {
        let url = format!("{}/v0/inboxes", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "username": local_part,
                "domain": domain,
            }))
            .send()
            .await
            .map_err(|e| MailError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateInboxResponse =
            response.json().await.map_err(|e| MailError::InvalidResponse {
                reason: format!("inbox create response: {e}"),
            })?;

        tracing::info!(inbox_id = %parsed.inbox_id, local_part, "Inbox provisioned");
        Ok(CreatedInbox {
            inbox_id: parsed.inbox_id,
        })
    }

    async fn send_message(
        &self,
        inbox_id: &str,
        to: &str,
        subject: &str,
        text: &str,
    ) -> Result<(), MailError> {
        let url = format!("{}/v0/inboxes/{inbox_id}/messages/send", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| MailError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(inbox_id, to, "Email sent");
        Ok(())
    }
}
