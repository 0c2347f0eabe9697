use std::path::Path;
use std::sync::Arc;

use chatmail::agent::{PipelineConfig, ReplyPipeline};
use chatmail::config::AppConfig;
use chatmail::http::{AppState, app_routes};
use chatmail::llm::create_provider;
use chatmail::mail::{AgentMailProvider, EmailBridge, MailboxRegistry};
use chatmail::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        eprintln!("  export AGENTMAIL_API_KEY=am-...");
        std::process::exit(1);
    });

    eprintln!("✉️  Chatmail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Mail domain: {}", config.mail.domain);
    eprintln!("   API: http://{}/api/threads", config.bind_addr);
    eprintln!("   Webhook: http://{}/agentmail/webhook\n", config.bind_addr);

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(Path::new(&config.db_path)).await?);
    let llm = create_provider(&config.llm);
    let mail_provider = Arc::new(AgentMailProvider::new(config.mail.clone()));

    let registry = MailboxRegistry::new(Arc::clone(&db));
    let bridge = EmailBridge::new(
        Arc::clone(&db),
        registry,
        mail_provider,
        config.mail.domain.clone(),
    );
    let pipeline = Arc::new(ReplyPipeline::new(
        Arc::clone(&db),
        llm,
        PipelineConfig::from(&config.llm),
    ));

    let state = AppState {
        db,
        bridge,
        pipeline,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Listening");
    axum::serve(listener, app_routes(state)).await?;

    Ok(())
}
