//! TOML configuration of the UE simulator
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use common::Earfcn;
use layers::rrc::UeRrcConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UeConfig {
    /// UE RRC protocol parameters
    #[serde(default)]
    pub rrc: UeRrcConfig,
    /// Simulated radio environment and network behaviour
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Scripted behaviour of the simulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// Cell selection and connection establishment, then user plane traffic
    #[default]
    Attach,
    /// Attach, lose the radio link and re-attach
    Rlf,
    /// Attach and follow an A3 triggered handover
    Handover,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub kind: ScenarioKind,
    /// Simulated time in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Downlink carrier of every cell
    #[serde(default = "default_dl_earfcn")]
    pub dl_earfcn: Earfcn,
    /// Uplink carrier broadcast in SIB2
    #[serde(default = "default_ul_earfcn")]
    pub ul_earfcn: Earfcn,
    /// Cell bandwidth in resource blocks
    #[serde(default = "default_bandwidth_rbs")]
    pub bandwidth_rbs: u16,
    /// Period of PHY measurement reports
    #[serde(default = "default_measurement_period_ms")]
    pub measurement_period_ms: u64,
    /// Peak of the uniform noise added to every RSRP sample
    #[serde(default)]
    pub noise_db: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Start of the out-of-sync burst in the RLF scenario
    #[serde(default = "default_rlf_at_ms")]
    pub rlf_at_ms: u64,
    /// Period of uplink packets while connected
    #[serde(default = "default_data_period_ms")]
    pub data_period_ms: u64,
    #[serde(default = "default_cells")]
    pub cells: Vec<CellConfig>,
}

/// One simulated eNodeB cell
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CellConfig {
    /// Physical cell identity
    pub id: u16,
    /// RSRP at time zero in dBm
    pub rsrp_dbm: f64,
    /// Linear RSRP drift
    #[serde(default)]
    pub slope_db_per_s: f64,
}

fn default_duration_ms() -> u64 {
    3000
}

fn default_dl_earfcn() -> Earfcn {
    100
}

fn default_ul_earfcn() -> Earfcn {
    18100
}

fn default_bandwidth_rbs() -> u16 {
    25
}

fn default_measurement_period_ms() -> u64 {
    40
}

fn default_seed() -> u64 {
    1
}

fn default_rlf_at_ms() -> u64 {
    1500
}

fn default_data_period_ms() -> u64 {
    100
}

/// A fading serving cell and a neighbour getting stronger
fn default_cells() -> Vec<CellConfig> {
    vec![
        CellConfig { id: 1, rsrp_dbm: -70.0, slope_db_per_s: -20.0 },
        CellConfig { id: 2, rsrp_dbm: -95.0, slope_db_per_s: 20.0 },
    ]
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            kind: ScenarioKind::default(),
            duration_ms: default_duration_ms(),
            dl_earfcn: default_dl_earfcn(),
            ul_earfcn: default_ul_earfcn(),
            bandwidth_rbs: default_bandwidth_rbs(),
            measurement_period_ms: default_measurement_period_ms(),
            noise_db: 0.0,
            seed: default_seed(),
            rlf_at_ms: default_rlf_at_ms(),
            data_period_ms: default_data_period_ms(),
            cells: default_cells(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Print every RRC trace event as a JSON line
    #[serde(default)]
    pub trace_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), trace_json: false }
    }
}

impl UeConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: UeConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.rrc.validate().context("Invalid [rrc] section")?;
        let scenario = &self.scenario;
        if scenario.cells.is_empty() {
            bail!("Scenario needs at least one cell");
        }
        if scenario.measurement_period_ms == 0 || scenario.data_period_ms == 0 {
            bail!("Measurement and data periods must be positive");
        }
        if scenario.noise_db < 0.0 {
            bail!("Negative noise amplitude {}", scenario.noise_db);
        }
        if common::TransmissionBandwidth::from_rbs(scenario.bandwidth_rbs).is_none() {
            bail!("Invalid bandwidth {} RBs", scenario.bandwidth_rbs);
        }
        Ok(())
    }
}
