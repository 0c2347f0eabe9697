//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::types::{ContextMessage, MailboxBinding, Message, MessageBody, Thread};

/// Backend-agnostic database trait covering threads, messages, and
/// mailbox bindings.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Threads ─────────────────────────────────────────────────────

    /// Allocate a new thread with no messages. Always succeeds.
    async fn create_thread(&self, name: Option<&str>) -> Result<Thread, DatabaseError>;

    /// Look up a thread by id.
    async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Insert a message at the end of the thread's timeline.
    ///
    /// This is the sole mutation point for the timeline — chat, agent, and
    /// email paths all route through it. Fails with `NotFound` if the thread
    /// is unknown. The insert is a single statement; readers never observe a
    /// partial append.
    async fn append_message(
        &self,
        thread_id: Uuid,
        body: &MessageBody,
    ) -> Result<Message, DatabaseError>;

    /// The full timeline, oldest first. Empty for a thread with no messages.
    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, DatabaseError>;

    /// Up to `limit` most recent user/assistant messages, chronologically
    /// ascending. Email messages are excluded so a mail exchange does not
    /// leak into the agent's working context.
    async fn load_recent_context(
        &self,
        thread_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ContextMessage>, DatabaseError>;

    // ── Mailbox bindings ────────────────────────────────────────────

    /// Look up the binding for a thread.
    async fn get_binding(&self, thread_id: Uuid)
    -> Result<Option<MailboxBinding>, DatabaseError>;

    /// Reverse lookup: which binding owns a provider inbox handle.
    async fn get_binding_by_inbox(
        &self,
        inbox_id: &str,
    ) -> Result<Option<MailboxBinding>, DatabaseError>;

    /// Unique-constraint insert of a binding.
    ///
    /// At most one binding exists per thread. If a binding for the thread is
    /// already persisted, the insert is a no-op and the existing binding is
    /// returned, so concurrent provisioning for one thread is safe.
    async fn insert_binding(
        &self,
        binding: &MailboxBinding,
    ) -> Result<MailboxBinding, DatabaseError>;
}
