//! Blitz Admin CLI
//!
//! Maintenance commands for operators: credential encryption, offline
//! workflow validation and GenAI credential checks.

use anyhow::{bail, Context, Result};
use blitz_workflow::config::AppConfig;
use blitz_workflow::engine::{AesGcmDecryptor, Encryptor};
use blitz_workflow::llm::classifier::IntentClassifier;
use blitz_workflow::llm::providers::ProviderRegistry;
use blitz_workflow::models::{GenAIConfig, NodeConfig, WorkflowDocument};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "blitz-admin")]
#[command(about = "Blitz Admin CLI - credentials, workflow validation and GenAI checks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to ./blitz.toml when present)
    #[arg(long, env = "BLITZ_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh base64 AES-256-GCM key for security.encryption_key
    GenerateKey,

    /// Encrypt a secret with the configured key, for hand-written configuration rows
    EncryptSecret {
        /// Plaintext to encrypt
        secret: String,
    },

    /// Statically validate a workflow document
    ValidateWorkflow {
        /// Path to the workflow JSON document
        file: PathBuf,
    },

    /// Send one test classification with a model/API key pair
    TestGenai {
        #[arg(long)]
        model: String,

        #[arg(long, env = "BLITZ_GENAI_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = AppConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::GenerateKey => {
            println!("{}", AesGcmDecryptor::generate_key()?);
        }
        Commands::EncryptSecret { secret } => encrypt_secret(&config, &secret)?,
        Commands::ValidateWorkflow { file } => validate_workflow(&file)?,
        Commands::TestGenai { model, api_key } => test_genai(&config, model, api_key).await?,
    }

    Ok(())
}

fn encrypt_secret(config: &AppConfig, secret: &str) -> Result<()> {
    let Some(key) = config.security.encryption_key.as_deref() else {
        bail!("security.encryption_key is not configured (set BLITZ__SECURITY__ENCRYPTION_KEY)");
    };
    let cipher = AesGcmDecryptor::from_base64_key(key)?;
    println!("{}", cipher.encrypt(secret)?);
    Ok(())
}

fn validate_workflow(path: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document: WorkflowDocument =
        serde_json::from_str(&raw).with_context(|| format!("invalid workflow document {}", path.display()))?;
    let workflow_id = document.id.clone().unwrap_or_else(|| "<unsaved>".to_string());
    let graph = document.to_graph(&workflow_id);

    println!("\n📋 Workflow '{}' ({})", document.name, workflow_id);
    println!("=====================================");
    println!("Nodes: {}", graph.nodes().len());
    println!("Edges: {}", graph.edges().len());

    let mut problems = 0usize;

    match graph.entry_node() {
        Some(entry) => println!("Entry node: {}", entry.id),
        None => {
            problems += 1;
            println!("{} no genai-intent entry node", "✗".red());
        }
    }

    if let Err(violations) = graph.validate() {
        for violation in violations {
            problems += 1;
            println!("{} {}", "✗".red(), violation);
        }
    }

    if let Some(cycle) = graph.find_module_cycle() {
        problems += 1;
        println!("{} module cycle: {}", "✗".red(), cycle.join(" -> "));
    }

    println!("\nNode configuration:");
    for node in graph.nodes() {
        let mut note = String::new();
        if let NodeConfig::Module(module) = &node.config {
            let missing = module.missing_api_aliases();
            if !missing.is_empty() {
                note = format!(" (missing API bindings: {})", missing.join(", "));
            }
        }
        let marker = if node.is_configured() {
            "✓".green()
        } else {
            "…".yellow()
        };
        println!("  {} {} [{}]{}", marker, node.id, node.node_type(), note);
    }

    println!();
    if problems > 0 {
        bail!("{} problem(s) found", problems);
    }
    println!("{}", "✅ Workflow graph is valid".green());
    Ok(())
}

async fn test_genai(config: &AppConfig, model: String, api_key: String) -> Result<()> {
    let classifier = IntentClassifier::new(ProviderRegistry::from_config(&config.providers))
        .with_timeout(Duration::from_secs(config.engine.classifier_timeout_secs));
    let genai = GenAIConfig::new(model.trim(), api_key.trim());

    info!(model = %genai.model, key = %genai.masked_api_key(), "Testing GenAI credential");
    let result = classifier
        .test_configuration(&genai, "Hello, can you help me with my order?")
        .await;

    if result.valid {
        println!("{} {} answered", "✅".green(), genai.model);
        Ok(())
    } else {
        bail!(
            "{} rejected the credential: {}",
            genai.model,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}
