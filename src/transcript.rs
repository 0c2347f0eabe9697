//! Transcript rendering — a human-readable document for a thread's timeline.

use chrono::{DateTime, Local, Utc};

use crate::store::{Message, MessageBody};

/// Fixed sentinel for a thread with no messages.
pub const EMPTY_TRANSCRIPT: &str = "No messages yet.";

/// Render a timeline as a plain-text transcript.
///
/// Output is for human consumption only; the generation-timestamp header
/// varies run to run and is never compared byte-for-byte.
pub fn render(messages: &[Message]) -> String {
    if messages.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Chat transcript — generated {}\n",
        format_timestamp(Utc::now())
    ));

    for message in messages {
        out.push('\n');
        out.push_str(&format!(
            "[{}] {}:\n",
            format_timestamp(message.created_at),
            sender_label(&message.body)
        ));
        out.push_str(message.body.content());
        out.push('\n');

        if let MessageBody::Email { to, subject, .. } = &message.body {
            if let Some(annotation) = email_annotation(subject, to) {
                out.push_str(&annotation);
                out.push('\n');
            }
        }
    }

    out
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn sender_label(body: &MessageBody) -> &str {
    match body {
        MessageBody::User { .. } => "You",
        MessageBody::Assistant { .. } => "AI Agent",
        MessageBody::Email { from, .. } => {
            if from.is_empty() {
                "Email"
            } else {
                from
            }
        }
    }
}

/// Trailing annotation for email messages: subject and recipient, when present.
fn email_annotation(subject: &str, to: &str) -> Option<String> {
    match (subject.is_empty(), to.is_empty()) {
        (true, true) => None,
        (false, true) => Some(format!("(subject: {subject})")),
        (true, false) => Some(format!("(to: {to})")),
        (false, false) => Some(format!("(subject: {subject}, to: {to})")),
    }
}
