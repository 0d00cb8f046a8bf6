use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use switchyard_core::{SAMPLE_QUERIES, Switchyard};

mod config;
mod report;

use config::SwitchyardConfig;
use report::ConsoleReporter;

/// Exit status after Ctrl-C, as a shell would report SIGINT
const INTERRUPTED_EXIT: u8 = 130;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(version)]
#[command(about = "Route queries to specialist agents and run them on Gemini")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in sample queries (default)
    Run,

    /// Route and answer a single query
    Ask {
        /// The query to send
        query: String,
    },

    /// List the agent keys queries can be routed to
    Agents,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&cli.config, SAMPLE_QUERIES).await,
        Commands::Ask { query } => cmd_run(&cli.config, &[query.as_str()]).await,
        Commands::Agents => cmd_agents(&cli.config),
        Commands::Config => cmd_config(&cli.config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\nFATAL: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the routing context from config
fn build_switchyard(cfg: &SwitchyardConfig) -> Result<Switchyard> {
    cfg.check_credential()?;

    let instructions = cfg.instruction_map()?;
    let provider = cfg.provider()?;
    info!("Gemini client initialized ({})", cfg.oracle.base_url);

    Switchyard::new(
        Box::new(provider),
        instructions,
        cfg.router_config(),
        cfg.executor_config(),
    )
    .context("Invalid routing configuration")
}

async fn cmd_run(config_path: &Option<PathBuf>, queries: &[&str]) -> Result<ExitCode> {
    let cfg = SwitchyardConfig::load(config_path)?;
    let yard = build_switchyard(&cfg)?;

    println!("--- Multi-Agent Switchyard Initialized ---");
    println!(
        "Total Specialized Instructions/Agents: {}",
        yard.instructions().len()
    );
    println!("-----------------------------------------------------------------");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut reporter = ConsoleReporter::stdout();
    let summary = yard.run(queries, &mut reporter, &cancel).await;

    if summary.interrupted {
        println!("\nScript terminated by user.");
        return Ok(ExitCode::from(INTERRUPTED_EXIT));
    }

    println!("\n--- ALL TESTS COMPLETE ---");
    Ok(ExitCode::SUCCESS)
}

fn cmd_agents(config_path: &Option<PathBuf>) -> Result<ExitCode> {
    let cfg = SwitchyardConfig::load(config_path)?;
    let instructions = cfg.instruction_map()?;
    for key in instructions.keys() {
        let marker = if key == cfg.routing.fallback_key {
            " (fallback)"
        } else if key == cfg.routing.creative_key {
            " (creative model)"
        } else {
            ""
        };
        println!("{}{}", key, marker);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<ExitCode> {
    let cfg = SwitchyardConfig::load(config_path)?;
    println!("{}", cfg.to_masked_toml()?);
    Ok(ExitCode::SUCCESS)
}
