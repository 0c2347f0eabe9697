//! Configuration types, built from environment variables at startup.

use secrecy::SecretString;

use crate::error::ConfigError;

/// System instruction prepended to every agent completion request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant in a chat app \
that can also send and receive emails. Be concise and friendly.";

/// Completion provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    /// Sampling temperature for agent replies.
    pub temperature: f64,
    /// Maximum output tokens per reply.
    pub max_tokens: u32,
    /// How many recent user/assistant messages to feed back as context.
    pub context_limit: usize,
    pub system_prompt: String,
}

impl LlmConfig {
    /// Build from environment. Requires `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let base_url = std::env::var("CHATMAIL_LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let model =
            std::env::var("CHATMAIL_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let system_prompt = std::env::var("CHATMAIL_SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            temperature: 0.7,
            max_tokens: 500,
            context_limit: 20,
            system_prompt,
        })
    }
}

/// Email provider configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// Domain under which thread mailboxes are provisioned.
    pub domain: String,
}

impl MailConfig {
    /// Build from environment. Requires `AGENTMAIL_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("AGENTMAIL_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("AGENTMAIL_API_KEY".to_string()))?;

        let base_url = std::env::var("CHATMAIL_MAIL_BASE_URL")
            .unwrap_or_else(|_| "https://api.agentmail.to".to_string());

        let domain =
            std::env::var("AGENTMAIL_DOMAIN").unwrap_or_else(|_| "agentmail.to".to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            domain,
        })
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub llm: LlmConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Build the full configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = match std::env::var("CHATMAIL_PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CHATMAIL_PORT".to_string(),
                message: format!("not a valid port: {s}"),
            })?,
            Err(_) => 8080,
        };

        let db_path = std::env::var("CHATMAIL_DB_PATH")
            .unwrap_or_else(|_| "./data/chatmail.db".to_string());

        Ok(Self {
            bind_addr: format!("0.0.0.0:{port}"),
            db_path,
            llm: LlmConfig::from_env()?,
            mail: MailConfig::from_env()?,
        })
    }
}
