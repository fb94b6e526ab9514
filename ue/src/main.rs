//! Albor LTE UE Simulator
//!
//! Runs the UE RRC through a scripted scenario against simulated lower
//! layers and a simulated eNodeB, in virtual time.

mod config;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ScenarioKind, UeConfig};
use scenario::Summary;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Albor LTE UE simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Scenario to run
    #[arg(long, value_enum)]
    scenario: Option<ScenarioKind>,

    /// Simulated time in milliseconds
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Print every RRC trace event as a JSON line on stdout
    #[arg(long)]
    trace_json: bool,
}

impl Args {
    /// Command line flags take precedence over the configuration file
    fn apply(&self, config: &mut UeConfig) {
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(kind) = self.scenario {
            config.scenario.kind = kind;
        }
        if let Some(duration_ms) = self.duration_ms {
            config.scenario.duration_ms = duration_ms;
        }
        if self.trace_json {
            config.log.trace_json = true;
        }
    }
}

/// Run the scenario on a blocking thread; the RRC is single threaded
async fn run_simulation(config: UeConfig) -> Result<Summary> {
    tokio::task::spawn_blocking(move || scenario::run(&config))
        .await
        .context("Simulation task failed")?
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => UeConfig::load(path)?,
        None => UeConfig::default(),
    };
    args.apply(&mut config);

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor LTE UE simulator");
    match &args.config {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }
    info!("UE configuration:");
    info!("  IMSI: {}", config.rrc.imsi);
    info!("  Component carriers: {}", config.rrc.number_of_component_carriers);
    info!("  T300: {} ms, T310: {} ms", config.rrc.t300_ms, config.rrc.t310_ms);
    info!("  N310: {}, N311: {}", config.rrc.n310, config.rrc.n311);
    info!("  Scenario: {:?}, {} ms", config.scenario.kind, config.scenario.duration_ms);

    // Wait for the run or a shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, abandoning the run");
        }
        result = run_simulation(config) => {
            let summary = result?;
            summary.log();
        }
    }

    info!("UE simulator shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layers::rrc::UeRrcState;

    #[tokio::test]
    async fn test_run_simulation_on_blocking_thread() {
        let mut config = UeConfig::default();
        config.scenario.duration_ms = 500;
        let summary = run_simulation(config).await.unwrap();
        assert_eq!(summary.final_state, Some(UeRrcState::ConnectedNormally));
        assert_eq!(summary.connections, 1);
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_reported() {
        let mut config = UeConfig::default();
        config.rrc.n310 = 0;
        assert!(run_simulation(config).await.is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let args = Args::parse_from([
            "albor_ue",
            "--scenario",
            "handover",
            "--duration-ms",
            "900",
            "--trace-json",
            "-l",
            "debug",
        ]);
        let mut config = UeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.scenario.kind, ScenarioKind::Handover);
        assert_eq!(config.scenario.duration_ms, 900);
        assert_eq!(config.log.level, "debug");
        assert!(config.log.trace_json);
    }
}
