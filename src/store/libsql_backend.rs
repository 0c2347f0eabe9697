//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and safe
//! for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::Database;
use crate::store::types::{ContextMessage, ContextRole, MailboxBinding, Message, MessageBody, Thread};

const MESSAGE_COLUMNS: &str =
    "seq, id, thread_id, role, content, from_addr, to_addr, subject, created_at";

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Check that a thread row exists.
    async fn thread_exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM threads WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Thread lookup failed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Thread lookup failed: {e}")))?;
        Ok(row.is_some())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string written by this backend.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Query(format!("Malformed UUID in row: {e}")))
}

/// Map a libsql row (MESSAGE_COLUMNS order) to a Message.
fn row_to_message(row: &libsql::Row) -> Result<Message, DatabaseError> {
    let seq: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;
    let id_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;
    let thread_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;
    let role: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;
    let content: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;
    let from_addr: Option<String> = row.get(5).ok();
    let to_addr: Option<String> = row.get(6).ok();
    let subject: Option<String> = row.get(7).ok();
    let created_str: String = row
        .get(8)
        .map_err(|e| DatabaseError::Query(format!("Bad message row: {e}")))?;

    let body = match role.as_str() {
        "user" => MessageBody::User { content },
        "assistant" => MessageBody::Assistant { content },
        "email" => MessageBody::Email {
            content,
            from: from_addr.unwrap_or_default(),
            to: to_addr.unwrap_or_default(),
            subject: subject.unwrap_or_default(),
        },
        other => {
            return Err(DatabaseError::Query(format!(
                "Unknown message role in row: {other}"
            )));
        }
    };

    Ok(Message {
        id: parse_uuid(&id_str)?,
        thread_id: parse_uuid(&thread_str)?,
        seq,
        created_at: parse_datetime(&created_str),
        body,
    })
}

/// Map a libsql row (thread_id, inbox_id, email_address, local_part, domain,
/// created_at) to a MailboxBinding.
fn row_to_binding(row: &libsql::Row) -> Result<MailboxBinding, DatabaseError> {
    let thread_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;
    let inbox_id: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;
    let email_address: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;
    let local_part: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;
    let domain: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;
    let created_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("Bad binding row: {e}")))?;

    Ok(MailboxBinding {
        thread_id: parse_uuid(&thread_str)?,
        inbox_id,
        email_address,
        local_part,
        domain,
        created_at: parse_datetime(&created_str),
    })
}

/// Split a MessageBody into its flat column values.
fn body_columns(body: &MessageBody) -> (Option<&str>, Option<&str>, Option<&str>) {
    match body {
        MessageBody::Email {
            from, to, subject, ..
        } => (Some(from.as_str()), Some(to.as_str()), Some(subject.as_str())),
        _ => (None, None, None),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create_thread(&self, name: Option<&str>) -> Result<Thread, DatabaseError> {
        let thread = Thread {
            id: Uuid::new_v4(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO threads (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![
                    thread.id.to_string(),
                    thread.name.clone(),
                    thread.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Thread insert failed: {e}")))?;

        debug!(thread_id = %thread.id, "Thread created");
        Ok(thread)
    }

    async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, created_at FROM threads WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Thread lookup failed: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Thread lookup failed: {e}")))?
        else {
            return Ok(None);
        };

        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("Bad thread row: {e}")))?;
        let name: Option<String> = row.get(1).ok();
        let created_str: String = row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("Bad thread row: {e}")))?;

        Ok(Some(Thread {
            id: parse_uuid(&id_str)?,
            name,
            created_at: parse_datetime(&created_str),
        }))
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        body: &MessageBody,
    ) -> Result<Message, DatabaseError> {
        if !self.thread_exists(thread_id).await? {
            return Err(DatabaseError::thread_not_found(thread_id));
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let (from_addr, to_addr, subject) = body_columns(body);

        // RETURNING keeps the insert and the seq read in one statement; the
        // connection is shared across tasks, so reading last_insert_rowid()
        // afterward could observe another task's insert.
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO messages (id, thread_id, role, content, from_addr, to_addr, subject, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING seq",
                params![
                    id.to_string(),
                    thread_id.to_string(),
                    body.role(),
                    body.content(),
                    from_addr,
                    to_addr,
                    subject,
                    created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Message insert failed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Message insert failed: {e}")))?
            .ok_or_else(|| {
                DatabaseError::Query("Message insert returned no row".to_string())
            })?;
        let seq: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("Bad insert result row: {e}")))?;
        debug!(message_id = %id, thread_id = %thread_id, role = body.role(), seq, "Message appended");

        Ok(Message {
            id,
            thread_id,
            seq,
            created_at,
            body: body.clone(),
        })
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE thread_id = ?1 ORDER BY created_at ASC, seq ASC"
                ),
                params![thread_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Message list failed: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Message list failed: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn load_recent_context(
        &self,
        thread_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ContextMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT role, content FROM messages
                 WHERE thread_id = ?1 AND role IN ('user', 'assistant')
                 ORDER BY seq DESC LIMIT ?2",
                params![thread_id.to_string(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Context load failed: {e}")))?;

        let mut context = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Context load failed: {e}")))?
        {
            let role_str: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Bad context row: {e}")))?;
            let content: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("Bad context row: {e}")))?;
            let role = match role_str.as_str() {
                "user" => ContextRole::User,
                "assistant" => ContextRole::Assistant,
                other => {
                    return Err(DatabaseError::Query(format!(
                        "Unexpected role in context query: {other}"
                    )));
                }
            };
            context.push(ContextMessage { role, content });
        }

        // Query returns newest-first; the prompt wants chronological order.
        context.reverse();
        Ok(context)
    }

    async fn get_binding(
        &self,
        thread_id: Uuid,
    ) -> Result<Option<MailboxBinding>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT thread_id, inbox_id, email_address, local_part, domain, created_at
                 FROM mailbox_bindings WHERE thread_id = ?1",
                params![thread_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Binding lookup failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Binding lookup failed: {e}")))?
        {
            Some(row) => Ok(Some(row_to_binding(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_binding_by_inbox(
        &self,
        inbox_id: &str,
    ) -> Result<Option<MailboxBinding>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT thread_id, inbox_id, email_address, local_part, domain, created_at
                 FROM mailbox_bindings WHERE inbox_id = ?1",
                params![inbox_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Binding reverse lookup failed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Binding reverse lookup failed: {e}")))?
        {
            Some(row) => Ok(Some(row_to_binding(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_binding(
        &self,
        binding: &MailboxBinding,
    ) -> Result<MailboxBinding, DatabaseError> {
        // Unique-constraint insert: the first writer for a thread wins, later
        // writers observe the persisted row instead of creating a duplicate.
        self.conn()
            .execute(
                "INSERT INTO mailbox_bindings
                     (thread_id, inbox_id, email_address, local_part, domain, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(thread_id) DO NOTHING",
                params![
                    binding.thread_id.to_string(),
                    binding.inbox_id.clone(),
                    binding.email_address.clone(),
                    binding.local_part.clone(),
                    binding.domain.clone(),
                    binding.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Binding insert failed: {e}")))?;

        self.get_binding(binding.thread_id).await?.ok_or_else(|| {
            DatabaseError::Constraint(format!(
                "Binding for thread {} vanished after insert",
                binding.thread_id
            ))
        })
    }
}
