//! Error types for chatmail.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl DatabaseError {
    /// Shorthand for an unknown-thread error.
    pub fn thread_not_found(id: Uuid) -> Self {
        DatabaseError::NotFound {
            entity: "thread".to_string(),
            id: id.to_string(),
        }
    }
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Empty completion from {provider}")]
    EmptyCompletion { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Email provider and bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail provider request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Mail provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from mail provider: {reason}")]
    InvalidResponse { reason: String },

    #[error("No thread is bound to inbox {inbox_id}")]
    UnknownInbox { inbox_id: String },
}

/// Reply pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Reply task {id} not found")]
    TaskNotFound { id: Uuid },

    #[error("Reply task {id} panicked: {reason}")]
    TaskPanicked { id: Uuid, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
