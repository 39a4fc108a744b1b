//! pipegen - natural-language to data-pipeline generator
//!
//! CLI entry point: HTTP server, one-shot generation and offline validation.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use pipegen::artifact::Artifact;
use pipegen::cli::{Cli, Command, OutputFormat, format_event, format_validation, get_log_path};
use pipegen::config::Config;
use pipegen::domain::{DomainMetadata, GenerationRequest, RequestContext};
use pipegen::events::ProgressEvent;
use pipegen::llm::create_generator;
use pipegen::metadata::{ChainedMetadataProvider, ManualMetadataProvider, MetadataProvider};
use pipegen::orchestrator::GenerationOrchestrator;
use pipegen::server;
use pipegen::validation::{ResourceCheck, SchemaValidator};

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_stderr: bool) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    let to_stderr = matches!(cli.command, Command::Serve { stderr_log: true });
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), to_stderr)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(models = ?config.llm.models, "pipegen loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve { .. } => cmd_serve(&config).await,
        Command::Generate {
            prompt,
            metadata,
            max_iterations,
        } => cmd_generate(&config, &prompt, metadata.as_deref(), max_iterations).await,
        Command::Validate {
            artifact,
            metadata,
            strict,
            format,
        } => cmd_validate(&artifact, metadata.as_deref(), strict, format),
    }
}

async fn cmd_serve(config: &Config) -> Result<()> {
    debug!("cmd_serve: called");
    config.validate()?;
    println!("pipegen listening on http://{}", config.server.bind);
    println!("Logs are written to: {}", get_log_path().display());
    server::serve(config).await
}

async fn load_metadata(config: &Config, path: Option<&Path>) -> Result<DomainMetadata> {
    match path {
        Some(path) => {
            debug!(?path, "load_metadata: reading metadata file");
            ManualMetadataProvider::read(path).context(format!("Failed to load metadata from {}", path.display()))
        }
        None => {
            debug!("load_metadata: using configured sources");
            let provider = ChainedMetadataProvider::from_config(&config.metadata);
            Ok(provider.get_metadata(&RequestContext::anonymous()).await)
        }
    }
}

async fn cmd_generate(
    config: &Config,
    prompt: &str,
    metadata_path: Option<&Path>,
    max_iterations: Option<u32>,
) -> Result<()> {
    debug!(%prompt, ?metadata_path, ?max_iterations, "cmd_generate: called");
    config.validate()?;

    let mut config = config.clone();
    if let Some(max) = max_iterations {
        debug!(max, "cmd_generate: overriding max_iterations");
        config.generation.max_iterations = max;
    }

    let metadata = load_metadata(&config, metadata_path).await?;
    if let Some(message) = &metadata.message {
        println!("Metadata ({:?}): {}", metadata.source, message);
    }

    let generator = create_generator(&config.llm).context("Failed to create text generator")?;
    let orchestrator = Arc::new(GenerationOrchestrator::from_config(generator, &config));
    let request = GenerationRequest::new(prompt, metadata);

    let (mut rx, handle) = orchestrator.start(request, config.server.event_buffer);
    let mut final_artifact = None;
    while let Some(event) = rx.recv().await {
        println!("{}", format_event(&event));
        if let ProgressEvent::Complete { artifact, .. } = event {
            final_artifact = artifact;
        }
    }
    let report = handle.await.context("Orchestration task failed")?;

    if let Some(artifact) = final_artifact {
        println!();
        println!("{}", artifact.trim_end());
    }
    if !report.outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_validate(path: &Path, metadata_path: Option<&Path>, strict: bool, format: OutputFormat) -> Result<()> {
    debug!(?path, ?metadata_path, strict, %format, "cmd_validate: called");
    let artifact = Artifact::from_file(path)?;
    let metadata = match metadata_path {
        Some(p) => ManualMetadataProvider::read(p).context(format!("Failed to load metadata from {}", p.display()))?,
        None => DomainMetadata::default(),
    };

    let resource_check = if strict { ResourceCheck::Strict } else { ResourceCheck::Lenient };
    let result = SchemaValidator::with_resource_check(resource_check).validate(artifact.raw(), &metadata);

    match format {
        OutputFormat::Text => println!("{}", format_validation(&result)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}
