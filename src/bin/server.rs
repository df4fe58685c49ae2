// Blitz - Chat Workflow Server
// Serves the chat endpoint and the builder's diagnostic endpoints
// Run with: cargo run --bin blitz-server -- --seed demos/support-workflow.json

//! # Blitz Server Binary
//!
//! Wires the library together into a running HTTP service:
//!
//! ```text
//! main()
//!   ↓ loads
//! AppConfig (defaults → blitz.toml → BLITZ__* env)
//!   ↓ builds
//! ProviderRegistry → IntentClassifier ─┐
//! HttpModuleApiClient → ModuleRegistry ┼→ WorkflowExecutionEngine → ChatService
//! In-memory storage + ConfigResolver ──┘
//!   ↓ serves
//! BlitzApiServer (Axum)
//! ```
//!
//! Storage is in-memory, so workflows come either from the builder's save
//! endpoint or from a JSON document passed with `--seed`.
//!
//! ## Rust Learning Notes:
//!
//! ### anyhow at the Edge
//! The library returns typed errors; `main` only needs to report them, so it
//! converts everything into `anyhow::Error` with `?` and adds context where a
//! bare error would be ambiguous.

use anyhow::{Context, Result};
use blitz_workflow::config::AppConfig;
use blitz_workflow::engine::modules::HttpModuleApiClient;
use blitz_workflow::engine::{
    AesGcmDecryptor, ChatService, ConfigResolver, Decryptor, EngineConfig, Encryptor, InMemoryChatStorage,
    InMemoryIdentityProvider, InMemoryWorkflowStorage, ModuleRegistry, NodeConfigService, PlaintextDecryptor,
    WorkflowExecutionEngine,
};
use blitz_workflow::llm::classifier::IntentClassifier;
use blitz_workflow::llm::providers::ProviderRegistry;
use blitz_workflow::models::WorkflowDocument;
use blitz_workflow::BlitzApiServerBuilder;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blitz-server")]
#[command(about = "Blitz chat workflow server")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to ./blitz.toml when present)
    #[arg(long, env = "BLITZ_CONFIG")]
    config: Option<PathBuf>,

    /// Workflow document to import at startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// User that owns the seeded workflow's business
    #[arg(long, default_value = "demo-user")]
    seed_user: String,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

fn credential_cipher(config: &AppConfig) -> Result<(Arc<dyn Decryptor>, Arc<dyn Encryptor>)> {
    match config.security.encryption_key.as_deref() {
        Some(key) => {
            let cipher = Arc::new(AesGcmDecryptor::from_base64_key(key).context("invalid security.encryption_key")?);
            Ok((cipher.clone(), cipher))
        }
        None => {
            warn!("⚠️  No security.encryption_key configured, credentials are stored in plaintext");
            Ok((Arc::new(PlaintextDecryptor), Arc::new(PlaintextDecryptor)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting Blitz Server...");
    info!("=====================================");
    info!("Server: {}", config.bind_address());
    info!("Max module hops: {}", config.engine.max_hops);

    let (decryptor, encryptor) = credential_cipher(&config)?;

    let classifier = IntentClassifier::new(ProviderRegistry::from_config(&config.providers))
        .with_timeout(Duration::from_secs(config.engine.classifier_timeout_secs));
    let module_api = HttpModuleApiClient::new().with_default_timeout_ms(config.engine.default_module_timeout_ms);
    let engine = WorkflowExecutionEngine::new(
        classifier.clone(),
        ModuleRegistry::with_defaults(Arc::new(module_api)),
        EngineConfig {
            max_hops: config.engine.max_hops,
        },
    );

    let workflows = Arc::new(InMemoryWorkflowStorage::new());
    let mut identity = InMemoryIdentityProvider::new();
    let node_configs = NodeConfigService::new(workflows.clone(), encryptor, classifier);

    if let Some(path) = &cli.seed {
        let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let document: WorkflowDocument =
            serde_json::from_str(&raw).with_context(|| format!("invalid workflow document {}", path.display()))?;
        let workflow = node_configs.import_document(&document).await?;
        identity = identity.with_business(&cli.seed_user, &workflow.business_id, &workflow.name);
        info!(
            "🌱 Seeded workflow '{}' ({}) for business {} owned by {}",
            workflow.name, workflow.id, workflow.business_id, cli.seed_user
        );
    }

    let chat = ChatService::new(
        Arc::new(identity),
        Arc::new(InMemoryChatStorage::new()),
        workflows.clone(),
        ConfigResolver::new(workflows, decryptor),
        engine,
    );

    BlitzApiServerBuilder::new()
        .with_config(config.server.clone())
        .with_chat_service(chat)
        .with_node_config_service(node_configs)
        .build()?
        .run()
        .await?;

    Ok(())
}
