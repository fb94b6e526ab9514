//! Common Types for the LTE UE stack
//!
//! Defines fundamental identifiers used throughout the protocol stack

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use std::fmt;

/// E-UTRA Absolute Radio Frequency Channel Number
pub type Earfcn = u32;

/// Component carrier index (0 is the primary carrier)
pub type ComponentCarrierId = u8;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }

    /// RNTI 0 means no RNTI has been assigned yet
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cell Identity
///
/// Ordered so that per-cell maps iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u16);

impl CellId {
    /// Get the cell identity value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// International Mobile Subscriber Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Imsi(pub u64);

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed Subscriber Group identity
pub type CsgId = u32;

/// E-UTRA transmission bandwidth in resource blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum TransmissionBandwidth {
    /// 1.4 MHz
    Rb6 = 6,
    /// 3 MHz
    Rb15 = 15,
    /// 5 MHz
    Rb25 = 25,
    /// 10 MHz
    Rb50 = 50,
    /// 15 MHz
    Rb75 = 75,
    /// 20 MHz
    Rb100 = 100,
}

impl TransmissionBandwidth {
    /// Validate a bandwidth expressed as number of resource blocks
    pub fn from_rbs(rbs: u16) -> Option<Self> {
        Self::from_u16(rbs)
    }

    /// Number of resource blocks
    pub fn rbs(&self) -> u16 {
        *self as u16
    }

    /// Channel bandwidth in Hz
    pub fn as_hz(&self) -> u32 {
        match self {
            TransmissionBandwidth::Rb6 => 1_400_000,
            TransmissionBandwidth::Rb15 => 3_000_000,
            TransmissionBandwidth::Rb25 => 5_000_000,
            TransmissionBandwidth::Rb50 => 10_000_000,
            TransmissionBandwidth::Rb75 => 15_000_000,
            TransmissionBandwidth::Rb100 => 20_000_000,
        }
    }
}
