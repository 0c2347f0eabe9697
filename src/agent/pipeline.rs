//! Agent reply pipeline — one asynchronous assistant reply per user message.
//!
//! Scheduling is decoupled from the caller: appending a user message returns
//! before the reply exists. Each scheduled invocation is a tracked task with
//! its own identity, so callers (and tests) can await its terminal outcome
//! deterministically instead of settling on wall-clock time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{DEFAULT_SYSTEM_PROMPT, LlmConfig};
use crate::error::{Error, LlmError, PipelineError, Result};
use crate::llm::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::store::{ContextRole, Database, Message, MessageBody};

/// Pipeline tuning knobs, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How many recent user/assistant messages to feed back as context.
    pub context_limit: usize,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_limit: 20,
            temperature: 0.7,
            max_tokens: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl From<&LlmConfig> for PipelineConfig {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            context_limit: llm.context_limit,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            system_prompt: llm.system_prompt.clone(),
        }
    }
}

/// Schedules and tracks agent reply tasks.
pub struct ReplyPipeline {
    db: Arc<dyn Database>,
    llm: Arc<dyn CompletionProvider>,
    config: PipelineConfig,
    /// Scheduled-but-not-yet-awaited tasks, by task id.
    tasks: Arc<RwLock<HashMap<Uuid, JoinHandle<Result<Message>>>>>,
}

impl ReplyPipeline {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Arc<dyn CompletionProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            llm,
            config,
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Schedule a reply for the thread. Returns immediately with the task id;
    /// the completion call and assistant append happen in the background.
    ///
    /// Finished tasks nobody awaited are pruned here, so the tracking map
    /// stays bounded by the number of in-flight replies. A pruned task id is
    /// indistinguishable from an unknown one to `wait`.
    pub async fn schedule(&self, thread_id: Uuid) -> Uuid {
        let task_id = Uuid::new_v4();
        let db = Arc::clone(&self.db);
        let llm = Arc::clone(&self.llm);
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            let result = run_reply(db, llm, &config, thread_id).await;
            match &result {
                Ok(message) => {
                    tracing::info!(
                        thread_id = %thread_id,
                        message_id = %message.id,
                        "Agent reply appended"
                    );
                }
                Err(e) => {
                    // Terminal for this invocation only; the user message
                    // that triggered it has already been appended.
                    tracing::warn!(thread_id = %thread_id, error = %e, "Agent reply failed");
                }
            }
            result
        });

        let mut tasks = self.tasks.write().await;
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(task_id, handle);
        drop(tasks);
        tracing::debug!(thread_id = %thread_id, task_id = %task_id, "Reply scheduled");
        task_id
    }

    /// Await a scheduled task's terminal outcome: the appended assistant
    /// message on Completed, the terminal error on Failed.
    ///
    /// `TaskNotFound` for an unknown id, an already-awaited task, or one
    /// that finished and was pruned by a later `schedule`.
    pub async fn wait(&self, task_id: Uuid) -> Result<Message> {
        let handle = self
            .tasks
            .write()
            .await
            .remove(&task_id)
            .ok_or(PipelineError::TaskNotFound { id: task_id })?;

        handle.await.map_err(|e| {
            Error::Pipeline(PipelineError::TaskPanicked {
                id: task_id,
                reason: e.to_string(),
            })
        })?
    }

    /// Count of tasks not yet awaited and not yet finished.
    pub async fn running_count(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Total tracked entries, finished or not.
    #[cfg(test)]
    async fn tracked_count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

/// One reply invocation: load context, complete, append.
async fn run_reply(
    db: Arc<dyn Database>,
    llm: Arc<dyn CompletionProvider>,
    config: &PipelineConfig,
    thread_id: Uuid,
) -> Result<Message> {
    let context = db
        .load_recent_context(thread_id, config.context_limit)
        .await?;

    let mut messages = Vec::with_capacity(context.len() + 1);
    messages.push(ChatMessage::system(&config.system_prompt));
    for entry in context {
        messages.push(match entry.role {
            ContextRole::User => ChatMessage::user(entry.content),
            ContextRole::Assistant => ChatMessage::assistant(entry.content),
        });
    }

    let response = llm
        .complete(CompletionRequest {
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
        .await?;

    if response.content.is_empty() {
        return Err(LlmError::EmptyCompletion {
            provider: llm.model_name().to_string(),
        }
        .into());
    }

    let message = db
        .append_message(
            thread_id,
            &MessageBody::Assistant {
                content: response.content,
            },
        )
        .await?;
    Ok(message)
}
