//! CLI entrypoint for verity
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use verity_application::{
    CacheBackend, ConsensusEngine, ConsensusRequest, NoProgress, ProgressNotifier,
    RunConsensusError,
};
use verity_domain::OutputFormat;
use verity_infrastructure::{
    ConfigLoader, EncryptedResultCache, FileCacheBackend, FileConfig, FsCacheBackend,
    HttpEvidenceSource, InMemoryCacheBackend, JsonlAuditLogger, build_providers,
};
use verity_presentation::{Cli, ConsoleFormatter, ProgressReporter, SimpleProgress};

/// Exit code when every provider failed
const EXIT_EMPTY_RESULT: u8 = 2;
/// Exit code when the caller was rate limited
const EXIT_RATE_LIMITED: u8 = 3;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_logging(&cli)?;

    info!("Starting verity");

    // === Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };

    if cli.show_config {
        ConfigLoader::print_config_sources();
        println!();
        println!("{}", toml::to_string_pretty(&file_config.redacted())?);
        return Ok(ExitCode::SUCCESS);
    }

    if !file_config.output.color {
        colored::control::set_override(false);
    }

    let engine_config = file_config
        .to_engine_config()
        .context("Invalid configuration")?;

    // === Dependency Injection ===
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let selected = select_providers(&file_config, &cli.provider)?;
    let providers = build_providers(&selected, &client)?;
    if providers.is_empty() {
        bail!("No providers configured. Add [[providers]] tables to verity.toml.");
    }

    let validation_enabled = engine_config.validation.enabled;
    let mut engine = ConsensusEngine::new(engine_config.clone(), providers)?;

    if validation_enabled {
        let source = HttpEvidenceSource::https_only().context("Failed to build evidence client")?;
        engine = engine.with_evidence_source(Arc::new(source));
    }

    if engine_config.cache.enabled
        && let Some(secret) = engine_config.cache.secret.as_deref()
    {
        let backend: Arc<dyn CacheBackend> = match file_config.cache.backend {
            FileCacheBackend::Memory => Arc::new(InMemoryCacheBackend::new()),
            FileCacheBackend::Fs => {
                let dir = file_config
                    .cache
                    .dir
                    .clone()
                    .or_else(ConfigLoader::default_cache_dir)
                    .context("No cache directory available; set cache.dir")?;
                info!("Using filesystem cache at {}", dir.display());
                Arc::new(FsCacheBackend::new(dir))
            }
        };
        engine = engine.with_cache(Arc::new(EncryptedResultCache::new(backend, secret)?));
    }

    if let Some(path) = cli.audit_log.clone().or(file_config.output.audit_log.clone()) {
        match JsonlAuditLogger::new(&path) {
            Some(logger) => engine = engine.with_audit_logger(Arc::new(logger)),
            None => warn!("Audit log disabled: cannot write {}", path.display()),
        }
    }

    // Health mode
    if cli.health {
        let reports = engine.health().await;
        print!("{}", ConsoleFormatter::format_health(&reports));
        let all_healthy = reports.iter().all(|r| r.healthy);
        return Ok(if all_healthy {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // Single query mode - query is required
    let Some(query) = cli.query.clone() else {
        bail!("A query is required. Use --health to probe providers.");
    };

    let mut request = ConsensusRequest::new(query)?;
    if let Some(context) = &cli.context {
        request = request.with_context(context.as_str());
    }
    if let Some(caller) = &cli.caller {
        request = request.with_caller(caller.as_str());
    }
    if cli.no_cache {
        request = request.without_cache();
    }
    if cli.no_validation {
        request = request.without_validation();
    }

    let format = cli
        .output
        .or(file_config.output.format)
        .unwrap_or_default();

    let show_progress = !cli.quiet && file_config.output.progress && format != OutputFormat::Json;
    let progress: Box<dyn ProgressNotifier> = if !show_progress {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    match engine.run_with_progress(request, progress.as_ref()).await {
        Ok(response) => {
            println!("{}", ConsoleFormatter::render(&response, format));
            engine.flush_cache_writes().await;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", ConsoleFormatter::format_error(&e));
            Ok(ExitCode::from(exit_code(&e)))
        }
    }
}

/// Console logging from `-v` (overridable by `RUST_LOG`), plus an optional
/// daily-rotated file log.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "verity.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Providers named with `-p`, or all of them when none were named
fn select_providers(
    config: &FileConfig,
    names: &[String],
) -> Result<Vec<verity_infrastructure::FileProviderConfig>> {
    if names.is_empty() {
        return Ok(config.providers.clone());
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match config.providers.iter().find(|p| p.id.trim() == name.trim()) {
            Some(provider) => selected.push(provider.clone()),
            None => {
                let known: Vec<&str> = config.providers.iter().map(|p| p.id.as_str()).collect();
                bail!(
                    "Unknown provider '{}'. Configured providers: {}",
                    name,
                    if known.is_empty() {
                        "(none)".to_string()
                    } else {
                        known.join(", ")
                    }
                );
            }
        }
    }
    Ok(selected)
}

fn exit_code(error: &RunConsensusError) -> u8 {
    match error {
        RunConsensusError::EmptyResult(_) => EXIT_EMPTY_RESULT,
        RunConsensusError::RateLimited { .. } => EXIT_RATE_LIMITED,
        _ => 1,
    }
}
