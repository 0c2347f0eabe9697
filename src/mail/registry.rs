//! Mailbox registry — the one-to-one mapping from thread to provisioned inbox.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::{Database, MailboxBinding};

/// Lookup and binding operations over the persisted thread↔inbox mapping.
#[derive(Clone)]
pub struct MailboxRegistry {
    db: Arc<dyn Database>,
}

impl MailboxRegistry {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Pure lookup; never creates.
    pub async fn get(&self, thread_id: Uuid) -> Result<Option<MailboxBinding>, DatabaseError> {
        self.db.get_binding(thread_id).await
    }

    /// Reverse lookup for the inbound-email path.
    pub async fn resolve_inbox(
        &self,
        inbox_id: &str,
    ) -> Result<Option<MailboxBinding>, DatabaseError> {
        self.db.get_binding_by_inbox(inbox_id).await
    }

    /// Persist a binding. On conflict with an existing binding for the same
    /// thread, the already persisted binding is returned unchanged.
    pub async fn bind(
        &self,
        thread_id: Uuid,
        inbox_id: &str,
        email_address: &str,
        local_part: &str,
        domain: &str,
    ) -> Result<MailboxBinding, DatabaseError> {
        let binding = MailboxBinding {
            thread_id,
            inbox_id: inbox_id.to_string(),
            email_address: email_address.to_string(),
            local_part: local_part.to_string(),
            domain: domain.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_binding(&binding).await
    }
}
