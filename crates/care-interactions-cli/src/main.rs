//! Care-Interactions command-line runner.
//!
//! Usage:
//!   care-interactions --config care.toml check request.json
//!   care-interactions --region wales --care-home-type children check -
//!   care-interactions --database interactions.db administer dose.json
//!   care-interactions --database interactions.db refresh
//!   care-interactions --database interactions.db verify-audit

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use care_interactions_core::{AdministrationRequest, EngineConfig, InteractionEngine, InteractionError, SystemClock};

/// Check new medications against a resident's current medicines and allergies.
#[derive(Parser)]
#[command(name = "care-interactions", version, about)]
struct Cli {
    /// TOML engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured region (e.g. ENGLAND, WALES)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Override the configured care home type (ADULT or CHILDREN)
    #[arg(long, global = true)]
    care_home_type: Option<String>,

    /// Override the configured SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a JSON request ("-" reads stdin).
    Check { request: PathBuf },
    /// Run the administration gate for a JSON dose record ("-" reads stdin).
    Administer { request: PathBuf },
    /// Refresh every knowledge source and clear the caches.
    Refresh,
    /// Verify the audit chain.
    VerifyAudit,
}

fn main() -> ExitCode {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            // Structured errors go to stdout so callers can parse them
            if let Some(err) = e.downcast_ref::<InteractionError>() {
                let body = serde_json::json!({
                    "error": err.code(),
                    "message": err.to_string(),
                    "details": err.details(),
                    "status": err.status_code(),
                });
                println!("{}", body);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    tracing::debug!(region = %config.region, care_home_type = %config.care_home_type, "Configuration loaded");
    let engine = InteractionEngine::from_config_with_reference_sources(&config, Arc::new(SystemClock))?;

    match &cli.command {
        Command::Check { request } => {
            let raw = read_input(request)?;
            let report = engine.check_json(&raw)?;
            print_json(&report, cli.pretty)?;
        }
        Command::Administer { request } => {
            let raw = read_input(request)?;
            let request: AdministrationRequest =
                serde_json::from_str(&raw).context("Administration request is not valid JSON")?;
            let outcome = engine.administration().administer(&request)?;
            print_json(&outcome, cli.pretty)?;
            if !outcome.recorded {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Refresh => {
            let refresh = engine.refresh()?;
            print_json(&refresh, cli.pretty)?;
        }
        Command::VerifyAudit => {
            let verification = engine.verify_audit()?;
            print_json(&verification, cli.pretty)?;
            if !verification.valid {
                return Ok(ExitCode::from(2));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    if let Some(care_home_type) = &cli.care_home_type {
        config.care_home_type = care_home_type.clone();
    }
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read request from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read request file '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
