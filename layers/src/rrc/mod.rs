//! Radio Resource Control (RRC) Layer Implementation
//!
//! Implements the LTE UE RRC according to 3GPP TS 36.331: cell search and
//! selection, connection establishment, handover, radio link failure
//! detection, radio bearer management and the layer 3 measurement and
//! reporting machinery.
//!
//! The RRC is driven by a discrete-event [`common::Scheduler`]. Every
//! handler runs to completion; a handler may re-enter the state machine
//! synchronously (for example camping with a pending connection request
//! cascades into random access), but the recursion depth is bounded.

pub mod bearer;
pub mod cell_selection;
pub mod config;
pub mod meas_config;
pub mod measurement;
pub mod reporting;
pub mod state;
pub mod timers;
pub mod trace;
pub mod triggering;
pub mod ue_rrc;

#[cfg(test)]
mod test_support;

pub use config::UeRrcConfig;
pub use state::UeRrcState;
pub use trace::{SyncIndication, UeRrcEvent, UeRrcTrace};
pub use ue_rrc::{LteUeRrc, UeRrcSaps};

use thiserror::Error;

/// Errors raised by the UE RRC
///
/// Every variant is fatal: it denotes either a network side protocol
/// violation or a deliberately unsupported feature. Recoverable failures are
/// modelled as state transitions instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RrcError {
    #[error("{procedure} not allowed in state {state}")]
    InvalidState {
        procedure: &'static str,
        state: UeRrcState,
    },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("No radio bearer with identity {0}")]
    MissingBearer(u8),

    #[error("Measurement configuration error: {0}")]
    MissingMeasConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
