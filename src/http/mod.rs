//! HTTP surface — caller-facing thread/message/mail API plus the email
//! provider webhook.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::ReplyPipeline;
use crate::error::{DatabaseError, Error, MailError};
use crate::mail::{EmailBridge, InboundEmail};
use crate::store::{Database, MessageBody};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub bridge: EmailBridge,
    pub pipeline: Arc<ReplyPipeline>,
}

/// Build the Axum router with API and webhook routes.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/threads", post(create_thread))
        .route("/api/threads/{id}/messages", post(send_message).get(list_messages))
        .route("/api/threads/{id}/mailbox", post(ensure_mailbox))
        .route("/api/threads/{id}/email/send", post(send_email))
        .route("/api/threads/{id}/email/transcript", post(send_transcript))
        .route("/agentmail/webhook", post(agentmail_webhook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a service error to an HTTP status.
fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
        Error::Mail(MailError::UnknownInbox { .. }) => StatusCode::NOT_FOUND,
        Error::Mail(_) | Error::Llm(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = error_status(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Unhandled error in handler");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatmail"
    }))
}

// ── Threads & messages ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateThreadRequest {
    #[serde(default)]
    name: Option<String>,
}

async fn create_thread(
    State(state): State<AppState>,
    Json(body): Json<CreateThreadRequest>,
) -> impl IntoResponse {
    match state.db.create_thread(body.name.as_deref()).await {
        Ok(thread) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "thread_id": thread.id })),
        ),
        Err(e) => error_response(e.into()),
    }
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
}

/// Append a user message and schedule the agent reply.
///
/// Returns 202: the reply is generated asynchronously and lands on the
/// timeline later. Consumers must render by timeline order, not by arrival
/// order of their own requests.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let thread_id = match parse_thread_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let message = match state
        .db
        .append_message(
            thread_id,
            &MessageBody::User {
                content: body.content,
            },
        )
        .await
    {
        Ok(message) => message,
        Err(e) => return error_response(e.into()),
    };

    let task_id = state.pipeline.schedule(thread_id).await;
    info!(thread_id = %thread_id, task_id = %task_id, "User message accepted");

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": message, "task_id": task_id })),
    )
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let thread_id = match parse_thread_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.db.list_messages(thread_id).await {
        Ok(messages) => (StatusCode::OK, Json(serde_json::json!(messages))),
        Err(e) => error_response(e.into()),
    }
}

// ── Email operations ────────────────────────────────────────────────────

async fn ensure_mailbox(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let thread_id = match parse_thread_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.bridge.ensure_mailbox(thread_id).await {
        Ok(binding) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "inbox_id": binding.inbox_id,
                "email_address": binding.email_address,
            })),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct SendEmailRequest {
    to: String,
    subject: String,
    text: String,
}

async fn send_email(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendEmailRequest>,
) -> impl IntoResponse {
    let thread_id = match parse_thread_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state
        .bridge
        .send_outbound(thread_id, &body.to, &body.subject, &body.text)
        .await
    {
        Ok(message) => (StatusCode::OK, Json(serde_json::json!({ "message": message }))),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct SendTranscriptRequest {
    recipient: String,
}

async fn send_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendTranscriptRequest>,
) -> impl IntoResponse {
    let thread_id = match parse_thread_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.bridge.send_transcript(thread_id, &body.recipient).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "sent" })),
        ),
        Err(e) => error_response(e),
    }
}

// ── Webhook ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WebhookPayload {
    inbox_id: Option<String>,
    message: Option<WebhookMessage>,
}

#[derive(Deserialize)]
struct WebhookMessage {
    from: Option<String>,
    subject: Option<String>,
    text: Option<String>,
    html: Option<String>,
}

/// Inbound email webhook — the only network-facing entry for the email
/// provider. 400 for a malformed payload, 404 for an unmapped inbox, 200 on
/// success, 500 otherwise.
async fn agentmail_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    let (Some(inbox_id), Some(message)) = (payload.inbox_id, payload.message) else {
        return (StatusCode::BAD_REQUEST, "Missing inbox_id or message");
    };

    let inbound = InboundEmail {
        from: message.from,
        subject: message.subject,
        text: message.text,
        html: message.html,
    };

    match state.bridge.receive_inbound(&inbox_id, inbound).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(Error::Mail(MailError::UnknownInbox { .. })) => {
            warn!(inbox_id, "Webhook for unmapped inbox");
            (StatusCode::NOT_FOUND, "Inbox not found")
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn parse_thread_id(
    raw: &str,
) -> std::result::Result<Uuid, (StatusCode, Json<serde_json::Value>)> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Invalid thread ID" })),
        )
    })
}
