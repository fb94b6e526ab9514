//! Packet Data Convergence Protocol (PDCP) Entity Implementation
//!
//! Implements the UE side LTE PDCP entity according to 3GPP TS 36.323.
//! Header compression and security are not modelled.

use crate::{LayerError, ProtocolLayer};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::Rnti;
use tracing::{debug, trace};

/// PDCP entity configuration
#[derive(Debug, Clone, Copy)]
pub struct PdcpConfig {
    /// SN size in bits (5 for SRBs, 12 for DRBs)
    pub sn_size: u8,
}

impl PdcpConfig {
    /// Configuration used on signalling radio bearers
    pub fn srb() -> Self {
        Self { sn_size: 5 }
    }

    /// Configuration used on data radio bearers
    pub fn drb() -> Self {
        Self { sn_size: 12 }
    }

    fn validate(&self) -> Result<(), LayerError> {
        if self.sn_size != 5 && self.sn_size != 12 {
            return Err(LayerError::ConfigurationError(
                "Invalid SN size: must be 5 or 12 bits".to_string()
            ));
        }
        Ok(())
    }

    fn header_len(&self) -> usize {
        if self.sn_size == 5 { 1 } else { 2 }
    }
}

/// PDCP PDU types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdcpPduType {
    /// Data PDU
    Data,
    /// Control PDU - PDCP status report
    StatusReport,
}

/// PDCP header structure
#[derive(Debug, Clone)]
pub struct PdcpHeader {
    /// PDU type
    pub pdu_type: PdcpPduType,
    /// Sequence number
    pub sn: u16,
}

/// PDCP entity of one radio bearer
#[derive(Debug)]
pub struct PdcpEntity {
    config: PdcpConfig,
    rnti: Rnti,
    lcid: u8,
    /// Next PDCP sequence number for transmission
    tx_next: u16,
    /// Next expected PDCP sequence number for reception
    rx_next: u16,
}

impl PdcpEntity {
    /// Create a new PDCP entity
    pub fn new(config: PdcpConfig, rnti: Rnti, lcid: u8) -> Result<Self, LayerError> {
        config.validate()?;
        debug!("Creating PDCP entity rnti={} lcid={} sn_size={}", rnti, lcid, config.sn_size);
        Ok(Self {
            config,
            rnti,
            lcid,
            tx_next: 0,
            rx_next: 0,
        })
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn lcid(&self) -> u8 {
        self.lcid
    }

    pub fn tx_next(&self) -> u16 {
        self.tx_next
    }

    fn sn_mask(&self) -> u16 {
        (1u16 << self.config.sn_size) - 1
    }

    fn encode_header(&self, header: &PdcpHeader, buf: &mut BytesMut) {
        let sn = header.sn & self.sn_mask();
        if self.config.header_len() == 1 {
            buf.put_u8(sn as u8);
        } else {
            let dc = if header.pdu_type == PdcpPduType::Data { 0x8000 } else { 0 };
            buf.put_u16(dc | sn);
        }
    }

    fn decode_header(&self, data: &mut Bytes) -> Result<PdcpHeader, LayerError> {
        if data.len() < self.config.header_len() {
            return Err(LayerError::InvalidPdu);
        }
        if self.config.header_len() == 1 {
            let sn = u16::from(data.get_u8()) & self.sn_mask();
            Ok(PdcpHeader { pdu_type: PdcpPduType::Data, sn })
        } else {
            let word = data.get_u16();
            let pdu_type = if word & 0x8000 != 0 {
                PdcpPduType::Data
            } else {
                PdcpPduType::StatusReport
            };
            Ok(PdcpHeader { pdu_type, sn: word & self.sn_mask() })
        }
    }
}

impl ProtocolLayer for PdcpEntity {
    fn process_uplink(&mut self, data: Bytes) -> Result<Bytes, LayerError> {
        let header = PdcpHeader {
            pdu_type: PdcpPduType::Data,
            sn: self.tx_next,
        };
        self.tx_next = (self.tx_next + 1) & self.sn_mask();

        let mut buf = BytesMut::with_capacity(self.config.header_len() + data.len());
        self.encode_header(&header, &mut buf);
        buf.extend_from_slice(&data);
        trace!("PDCP lcid={} tx sn={} len={}", self.lcid, header.sn, buf.len());
        Ok(buf.freeze())
    }

    fn process_downlink(&mut self, mut data: Bytes) -> Result<Bytes, LayerError> {
        let header = self.decode_header(&mut data)?;
        if header.pdu_type != PdcpPduType::Data {
            return Err(LayerError::ProcessingError(
                "PDCP status reports are not supported".to_string(),
            ));
        }
        self.rx_next = (header.sn + 1) & self.sn_mask();
        Ok(data)
    }
}
