//! Toolkit Host - plays a scripted host session against the toolkit runtime.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use toolkit_runtime::config::default_config_path;
use toolkit_runtime::{
    MemoryErrorReporter, MemoryHost, MemorySettingsStore, Scenario, ScenarioRunner, Toolkit,
    ToolkitConfig, message_channel,
};

mod demo;

/// Toolkit host simulator
#[derive(Parser)]
#[command(name = "toolkit-host")]
#[command(about = "Run a scripted host session against the toolkit runtime")]
#[command(version)]
struct Args {
    /// Scenario file (TOML)
    #[arg(short, long)]
    scenario: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries the report.
    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<PathBuf>) -> toolkit_runtime::Result<ToolkitConfig> {
    match path.or_else(|| default_config_path().filter(|p| p.exists())) {
        Some(path) => {
            info!("Loading config from {}", path.display());
            ToolkitConfig::load(&path)
        }
        None => ToolkitConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let config = match load_config(args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let scenario = match Scenario::load(&args.scenario) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load scenario {}: {}", args.scenario.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let catalog = match demo::catalog() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to declare features: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = Arc::new(MemoryHost::new());
    let reporter = Arc::new(MemoryErrorReporter::new());
    let storage = Arc::new(
        MemorySettingsStore::with_disable_switch(config.disable_switch.clone())
            .with_settings(scenario.bootstrap.options.clone()),
    );

    let toolkit = Toolkit::new(config, catalog, host.clone(), storage, reporter.clone());

    let (_sender, receiver) = message_channel();
    let message_loop = match toolkit.initialize(receiver) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to initialize toolkit: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Running scenario {} ({} steps)",
        args.scenario.display(),
        scenario.steps.len()
    );
    let report = ScenarioRunner::new(toolkit, host, reporter)
        .run(&scenario)
        .await;
    message_loop.abort();

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize report: {}", e);
            ExitCode::FAILURE
        }
    }
}
