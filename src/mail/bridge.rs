//! Email bridge — translates between the unified timeline and the email
//! provider, and provisions thread mailboxes lazily.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{DatabaseError, MailError, Result};
use crate::mail::provider::MailProvider;
use crate::mail::registry::MailboxRegistry;
use crate::store::{Database, MailboxBinding, Message, MessageBody};
use crate::transcript;

/// Subject line used when emailing a thread transcript.
pub const TRANSCRIPT_SUBJECT: &str = "Your Chat Transcript";

/// An inbound email as delivered by the provider webhook. All fields are
/// optional on the wire; defaults are applied when folding into the timeline.
#[derive(Debug, Clone, Default)]
pub struct InboundEmail {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Bidirectional bridge between threads and the email provider.
#[derive(Clone)]
pub struct EmailBridge {
    db: Arc<dyn Database>,
    registry: MailboxRegistry,
    provider: Arc<dyn MailProvider>,
    domain: String,
}

impl EmailBridge {
    pub fn new(
        db: Arc<dyn Database>,
        registry: MailboxRegistry,
        provider: Arc<dyn MailProvider>,
        domain: String,
    ) -> Self {
        Self {
            db,
            registry,
            provider,
            domain,
        }
    }

    /// Deterministic local part for a thread's mailbox, so repeated
    /// provisioning attempts target the same address.
    fn local_part_for(thread_id: Uuid) -> String {
        format!("thread-{thread_id}")
    }

    /// Return the thread's mailbox, provisioning one on first use.
    ///
    /// An existing binding is returned without any provider call. Otherwise
    /// the provider creates the inbox and the binding is persisted through
    /// the registry's conflict-safe insert; if a concurrent caller won the
    /// race, the winner's binding is returned.
    pub async fn ensure_mailbox(&self, thread_id: Uuid) -> Result<MailboxBinding> {
        if let Some(existing) = self.registry.get(thread_id).await? {
            return Ok(existing);
        }

        if self.db.get_thread(thread_id).await?.is_none() {
            return Err(DatabaseError::thread_not_found(thread_id).into());
        }

        let local_part = Self::local_part_for(thread_id);
        let email_address = format!("{local_part}@{}", self.domain);

        let inbox = self.provider.create_inbox(&local_part, &self.domain).await?;

        let binding = self
            .registry
            .bind(
                thread_id,
                &inbox.inbox_id,
                &email_address,
                &local_part,
                &self.domain,
            )
            .await?;

        tracing::info!(
            thread_id = %thread_id,
            email = %binding.email_address,
            "Mailbox bound to thread"
        );
        Ok(binding)
    }

    /// Send an email from the thread's mailbox and record it on the timeline.
    ///
    /// The message is appended only after the provider accepts the send; a
    /// provider failure leaves no local state behind.
    pub async fn send_outbound(
        &self,
        thread_id: Uuid,
        to: &str,
        subject: &str,
        text: &str,
    ) -> Result<Message> {
        let binding = self.ensure_mailbox(thread_id).await?;

        self.provider
            .send_message(&binding.inbox_id, to, subject, text)
            .await?;

        let message = self
            .db
            .append_message(
                thread_id,
                &MessageBody::Email {
                    content: text.to_string(),
                    from: binding.email_address.clone(),
                    to: to.to_string(),
                    subject: subject.to_string(),
                },
            )
            .await?;

        Ok(message)
    }

    /// Fold an inbound email into the owning thread's timeline.
    ///
    /// The recipient field is intentionally left blank — the provider payload
    /// carries no structured recipient for inbound mail.
    pub async fn receive_inbound(
        &self,
        inbox_id: &str,
        inbound: InboundEmail,
    ) -> Result<Message> {
        let binding = self
            .registry
            .resolve_inbox(inbox_id)
            .await?
            .ok_or_else(|| MailError::UnknownInbox {
                inbox_id: inbox_id.to_string(),
            })?;

        let from = inbound.from.unwrap_or_else(|| "unknown".to_string());
        let subject = inbound
            .subject
            .unwrap_or_else(|| "(no subject)".to_string());
        let content = inbound.text.or(inbound.html).unwrap_or_default();

        let message = self
            .db
            .append_message(
                binding.thread_id,
                &MessageBody::Email {
                    content,
                    from,
                    to: String::new(),
                    subject,
                },
            )
            .await?;

        tracing::info!(
            thread_id = %binding.thread_id,
            inbox_id,
            "Inbound email recorded"
        );
        Ok(message)
    }

    /// Email the thread's rendered transcript to `recipient`.
    pub async fn send_transcript(&self, thread_id: Uuid, recipient: &str) -> Result<Message> {
        if self.db.get_thread(thread_id).await?.is_none() {
            return Err(DatabaseError::thread_not_found(thread_id).into());
        }
        let messages = self.db.list_messages(thread_id).await?;
        let body = transcript::render(&messages);
        self.send_outbound(thread_id, recipient, TRANSCRIPT_SUBJECT, &body)
            .await
    }
}
