//! Core data model — threads, messages, mailbox bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logical conversation spanning chat and email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    /// Optional display name; unused by the core flows.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role-tagged message payload. Each variant carries only the fields valid
/// for that role; email address fields never appear on chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageBody {
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    Email {
        content: String,
        from: String,
        /// Empty for inbound mail — the provider payload carries no
        /// structured recipient, and the source behavior is preserved.
        to: String,
        subject: String,
    },
}

impl MessageBody {
    /// The role tag as stored in the database.
    pub fn role(&self) -> &'static str {
        match self {
            MessageBody::User { .. } => "user",
            MessageBody::Assistant { .. } => "assistant",
            MessageBody::Email { .. } => "email",
        }
    }

    /// The textual content, regardless of role.
    pub fn content(&self) -> &str {
        match self {
            MessageBody::User { content }
            | MessageBody::Assistant { content }
            | MessageBody::Email { content, .. } => content,
        }
    }
}

/// One immutable entry in a thread's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    /// Store-assigned insert ordinal. Timeline order is `(created_at, seq)`,
    /// and the store assigns both monotonically, so ordering by `seq` alone
    /// is equivalent and stable.
    pub seq: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Role restricted to what the completion provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextRole {
    User,
    Assistant,
}

/// A context entry for the agent prompt. Email messages are never
/// represented here — they are filtered out before the prompt is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: ContextRole,
    pub content: String,
}

/// Provisioned email identity bound 1:1 to a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxBinding {
    pub thread_id: Uuid,
    /// Provider-side inbox handle.
    pub inbox_id: String,
    pub email_address: String,
    pub local_part: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_role_tags() {
        let user = MessageBody::User {
            content: "hi".into(),
        };
        assert_eq!(user.role(), "user");
        assert_eq!(user.content(), "hi");

        let email = MessageBody::Email {
            content: "body".into(),
            from: "a@b.com".into(),
            to: String::new(),
            subject: "s".into(),
        };
        assert_eq!(email.role(), "email");
    }

    #[test]
    fn message_serializes_flat_with_role_tag() {
        let msg = Message {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            seq: 1,
            created_at: Utc::now(),
            body: MessageBody::Email {
                content: "hello".into(),
                from: "alice@example.com".into(),
                to: "bob@example.com".into(),
                subject: "Greetings".into(),
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "email");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["from"], "alice@example.com");
        assert_eq!(json["subject"], "Greetings");
    }

    #[test]
    fn chat_message_has_no_email_fields() {
        let msg = Message {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            seq: 1,
            created_at: Utc::now(),
            body: MessageBody::User {
                content: "hi".into(),
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("from").is_none());
        assert!(json.get("subject").is_none());
    }

    #[test]
    fn message_body_deserializes_by_role() {
        let body: MessageBody =
            serde_json::from_str(r#"{"role":"assistant","content":"hello"}"#).unwrap();
        assert_eq!(
            body,
            MessageBody::Assistant {
                content: "hello".into()
            }
        );
    }
}
