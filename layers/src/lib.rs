//! Protocol Stack Layers Library
//! 
//! This crate implements the LTE UE control plane (RRC) together with the
//! RLC and PDCP entities it creates for its radio bearers.

pub mod rlc;
pub mod pdcp;
pub mod rrc;

use bytes::Bytes;
use thiserror::Error;

pub use rrc::RrcError;

/// Common errors for protocol layers
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Invalid protocol data unit")]
    InvalidPdu,
    
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    
    #[error("Processing error: {0}")]
    ProcessingError(String),
    
    #[error("RRC error: {0}")]
    Rrc(#[from] RrcError),
}

/// Common trait for the user plane entities of a radio bearer
///
/// "Uplink" is the UE transmit direction, "downlink" the receive direction.
pub trait ProtocolLayer {
    /// Process an SDU handed down by the upper layer, producing the PDU for
    /// the lower layer
    fn process_uplink(&mut self, data: Bytes) -> Result<Bytes, LayerError>;
    
    /// Process a PDU received from the lower layer, producing the SDU for
    /// the upper layer
    fn process_downlink(&mut self, data: Bytes) -> Result<Bytes, LayerError>;
}
