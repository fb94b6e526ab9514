//! UE RRC configuration

use super::RrcError;
use common::{Imsi, ComponentCarrierId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest number of component carriers
pub const MIN_NO_CC: ComponentCarrierId = 1;

/// Largest number of component carriers
pub const MAX_NO_CC: ComponentCarrierId = 5;

/// UE RRC configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UeRrcConfig {
    /// UE identity used in RRC Connection Request
    #[serde(default)]
    pub imsi: Imsi,
    /// T300 connection establishment timer in ms
    #[serde(default = "default_t300_ms")]
    pub t300_ms: u64,
    /// T310 radio link failure timer in ms
    #[serde(default = "default_t310_ms")]
    pub t310_ms: u64,
    /// Consecutive out-of-sync indications that start T310
    #[serde(default = "default_n310")]
    pub n310: u8,
    /// Consecutive in-sync indications that stop T310
    #[serde(default = "default_n311")]
    pub n311: u8,
    /// Use RLC transparent mode on every data radio bearer
    #[serde(default)]
    pub use_rlc_transparent_mode: bool,
    /// Number of configured component carriers
    #[serde(default = "default_number_of_component_carriers")]
    pub number_of_component_carriers: ComponentCarrierId,
}

fn default_t300_ms() -> u64 {
    100
}

fn default_t310_ms() -> u64 {
    1000
}

fn default_n310() -> u8 {
    6
}

fn default_n311() -> u8 {
    2
}

fn default_number_of_component_carriers() -> ComponentCarrierId {
    MIN_NO_CC
}

impl Default for UeRrcConfig {
    fn default() -> Self {
        Self {
            imsi: Imsi::default(),
            t300_ms: default_t300_ms(),
            t310_ms: default_t310_ms(),
            n310: default_n310(),
            n311: default_n311(),
            use_rlc_transparent_mode: false,
            number_of_component_carriers: default_number_of_component_carriers(),
        }
    }
}

impl UeRrcConfig {
    /// Check every attribute against its allowed range
    pub fn validate(&self) -> Result<(), RrcError> {
        if !(100..=2000).contains(&self.t300_ms) {
            return Err(RrcError::InvalidConfiguration(format!(
                "T300 {} ms outside 100..=2000", self.t300_ms
            )));
        }
        if self.t310_ms > 2000 {
            return Err(RrcError::InvalidConfiguration(format!(
                "T310 {} ms outside 0..=2000", self.t310_ms
            )));
        }
        if !(1..=20).contains(&self.n310) {
            return Err(RrcError::InvalidConfiguration(format!("N310 {} outside 1..=20", self.n310)));
        }
        if !(1..=10).contains(&self.n311) {
            return Err(RrcError::InvalidConfiguration(format!("N311 {} outside 1..=10", self.n311)));
        }
        if !(MIN_NO_CC..=MAX_NO_CC).contains(&self.number_of_component_carriers) {
            return Err(RrcError::InvalidConfiguration(format!(
                "{} component carriers outside {}..={}",
                self.number_of_component_carriers, MIN_NO_CC, MAX_NO_CC
            )));
        }
        Ok(())
    }

    pub fn t300(&self) -> Duration {
        Duration::from_millis(self.t300_ms)
    }

    pub fn t310(&self) -> Duration {
        Duration::from_millis(self.t310_ms)
    }
}
