//! End-to-end tests for the HTTP API and the email provider webhook,
//! driven through the router with an in-memory database and mock providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use chatmail::agent::{PipelineConfig, ReplyPipeline};
use chatmail::error::{LlmError, MailError};
use chatmail::http::{AppState, app_routes};
use chatmail::llm::{CompletionProvider, CompletionRequest, CompletionResponse};
use chatmail::mail::{CreatedInbox, EmailBridge, MailProvider, MailboxRegistry};
use chatmail::store::{Database, LibSqlBackend};

struct CannedLlm {
    reply: String,
}

#[async_trait]
impl CompletionProvider for CannedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: self.reply.clone(),
        })
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

struct FakeMail {
    create_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl FakeMail {
    fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MailProvider for FakeMail {
    async fn create_inbox(
        &self,
        local_part: &str,
        _domain: &str,
    ) -> Result<CreatedInbox, MailError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedInbox {
            inbox_id: format!("inbox-{local_part}"),
        })
    }

    async fn send_message(
        &self,
        _inbox_id: &str,
        _to: &str,
        _subject: &str,
        _text: &str,
    ) -> Result<(), MailError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    db: Arc<dyn Database>,
    pipeline: Arc<ReplyPipeline>,
    mail: Arc<FakeMail>,
}

async fn test_app(reply: &str) -> TestApp {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let llm = Arc::new(CannedLlm {
        reply: reply.to_string(),
    });
    let mail = Arc::new(FakeMail::new());

    let registry = MailboxRegistry::new(Arc::clone(&db));
    let bridge = EmailBridge::new(
        Arc::clone(&db),
        registry,
        mail.clone() as Arc<dyn MailProvider>,
        "agentmail.to".to_string(),
    );
    let pipeline = Arc::new(ReplyPipeline::new(
        Arc::clone(&db),
        llm,
        PipelineConfig::default(),
    ));

    let router = app_routes(AppState {
        db: Arc::clone(&db),
        bridge,
        pipeline: Arc::clone(&pipeline),
    });

    TestApp {
        router,
        db,
        pipeline,
        mail,
    }
}

async fn request(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let req = match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app("hi").await;
    let (status, body) = request(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_round_trip_through_the_api() {
    let app = test_app("Hi there!").await;

    let (status, body) =
        request(&app.router, "POST", "/api/threads", Some(json!({ "name": "demo" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/messages"),
        Some(json!({ "content": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"]["role"], "user");
    assert_eq!(body["message"]["content"], "Hello");

    // Wait for the background reply so the listing below is deterministic.
    let task_id: Uuid = body["task_id"].as_str().unwrap().parse().unwrap();
    let reply = app.pipeline.wait(task_id).await.unwrap();
    assert_eq!(reply.body.content(), "Hi there!");

    let (status, body) = request(
        &app.router,
        "GET",
        &format!("/api/threads/{thread_id}/messages"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "Hello");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hi there!");
}

#[tokio::test]
async fn message_to_unknown_thread_is_404() {
    let app = test_app("hi").await;
    let (status, _) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{}/messages", Uuid::new_v4()),
        Some(json!({ "content": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_thread_id_is_400() {
    let app = test_app("hi").await;
    let (status, _) = request(
        &app.router,
        "GET",
        "/api/threads/not-a-uuid/messages",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mailbox_provisioning_is_idempotent_over_http() {
    let app = test_app("hi").await;
    let (_, body) = request(&app.router, "POST", "/api/threads", Some(json!({}))).await;
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (status, first) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/mailbox"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        first["email_address"],
        format!("thread-{thread_id}@agentmail.to")
    );

    let (status, second) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/mailbox"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(app.mail.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn outbound_email_lands_on_the_timeline() {
    let app = test_app("hi").await;
    let (_, body) = request(&app.router, "POST", "/api/threads", Some(json!({}))).await;
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/email/send"),
        Some(json!({ "to": "bob@example.com", "subject": "Hi", "text": "Hello Bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["role"], "email");
    assert_eq!(body["message"]["to"], "bob@example.com");
    assert_eq!(app.mail.send_calls.load(Ordering::SeqCst), 1);

    let (_, body) = request(
        &app.router,
        "GET",
        &format!("/api/threads/{thread_id}/messages"),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn transcript_email_goes_out_once() {
    let app = test_app("hi").await;
    let (_, body) = request(&app.router, "POST", "/api/threads", Some(json!({}))).await;
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/email/transcript"),
        Some(json!({ "recipient": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(app.mail.send_calls.load(Ordering::SeqCst), 1);
}

// ── Webhook contract ────────────────────────────────────────────────────

#[tokio::test]
async fn webhook_rejects_missing_fields() {
    let app = test_app("hi").await;

    let (status, _) = request(
        &app.router,
        "POST",
        "/agentmail/webhook",
        Some(json!({ "message": { "text": "hello" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app.router,
        "POST",
        "/agentmail/webhook",
        Some(json!({ "inbox_id": "inbox-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_for_unmapped_inbox_is_404() {
    let app = test_app("hi").await;
    let (status, _) = request(
        &app.router,
        "POST",
        "/agentmail/webhook",
        Some(json!({ "inbox_id": "nope", "message": { "text": "hello" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_folds_inbound_email_into_the_thread() {
    let app = test_app("hi").await;
    let (_, body) = request(&app.router, "POST", "/api/threads", Some(json!({}))).await;
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (_, binding) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/mailbox"),
        None,
    )
    .await;
    let inbox_id = binding["inbox_id"].as_str().unwrap();

    let (status, _) = request(
        &app.router,
        "POST",
        "/agentmail/webhook",
        Some(json!({
            "inbox_id": inbox_id,
            "message": {
                "from": "carol@example.com",
                "subject": "Ping",
                "text": "Are you there?"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let thread_uuid: Uuid = thread_id.parse().unwrap();
    let messages = app.db.list_messages(thread_uuid).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body.role(), "email");
    assert_eq!(messages[0].body.content(), "Are you there?");
}

#[tokio::test]
async fn webhook_applies_inbound_defaults() {
    let app = test_app("hi").await;
    let (_, body) = request(&app.router, "POST", "/api/threads", Some(json!({}))).await;
    let thread_id = body["thread_id"].as_str().unwrap().to_string();

    let (_, binding) = request(
        &app.router,
        "POST",
        &format!("/api/threads/{thread_id}/mailbox"),
        None,
    )
    .await;
    let inbox_id = binding["inbox_id"].as_str().unwrap();

    let (status, _) = request(
        &app.router,
        "POST",
        "/agentmail/webhook",
        Some(json!({
            "inbox_id": inbox_id,
            "message": { "html": "<p>rich body</p>" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let thread_uuid: Uuid = thread_id.parse().unwrap();
    let messages = app.db.list_messages(thread_uuid).await.unwrap();
    let json = serde_json::to_value(&messages[0]).unwrap();
    assert_eq!(json["from"], "unknown");
    assert_eq!(json["subject"], "(no subject)");
    assert_eq!(json["content"], "<p>rich body</p>");
}
