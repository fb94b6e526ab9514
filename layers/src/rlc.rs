//! Radio Link Control (RLC) Entity Implementation
//!
//! Implements the UE side LTE RLC entities according to 3GPP TS 36.322.
//! Segmentation and ARQ are not modelled: every SDU maps to one PDU.

use crate::{LayerError, ProtocolLayer};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::Rnti;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// RLC operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RlcMode {
    /// Transparent Mode
    Tm,
    /// Unacknowledged Mode
    Um,
    /// Acknowledged Mode
    Am,
}

impl RlcMode {
    /// SN field length in bits
    pub fn sn_field_length(&self) -> u8 {
        match self {
            RlcMode::Tm => 0,
            RlcMode::Um => 5,
            RlcMode::Am => 10,
        }
    }

    /// Header length in bytes
    pub fn header_len(&self) -> usize {
        match self {
            RlcMode::Tm => 0,
            RlcMode::Um => 1,
            RlcMode::Am => 2,
        }
    }
}

/// RLC PDU header
#[derive(Debug, Clone, PartialEq)]
pub struct RlcPduHeader {
    /// Data/Control flag (AM only)
    pub dc: bool,
    /// Sequence number
    pub sn: u16,
    /// Framing info
    pub fi: u8,
    /// Polling bit (AM only)
    pub p: bool,
}

/// RLC entity of one radio bearer
#[derive(Debug)]
pub struct RlcEntity {
    mode: RlcMode,
    rnti: Rnti,
    lcid: u8,
    /// Next sequence number to assign
    vt_s: u16,
    /// Next sequence number expected in reception
    vr_r: u16,
}

impl RlcEntity {
    /// Create a new RLC entity
    pub fn new(mode: RlcMode, rnti: Rnti, lcid: u8) -> Self {
        debug!("Creating RLC {:?} entity rnti={} lcid={}", mode, rnti, lcid);
        Self {
            mode,
            rnti,
            lcid,
            vt_s: 0,
            vr_r: 0,
        }
    }

    pub fn mode(&self) -> RlcMode {
        self.mode
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn lcid(&self) -> u8 {
        self.lcid
    }

    pub fn set_rnti(&mut self, rnti: Rnti) {
        self.rnti = rnti;
    }

    /// Next sequence number that will be assigned
    pub fn tx_sn(&self) -> u16 {
        self.vt_s
    }

    fn sn_modulus(&self) -> u16 {
        1 << self.mode.sn_field_length()
    }

    fn encode_header(&self, header: &RlcPduHeader, buf: &mut BytesMut) {
        match self.mode {
            RlcMode::Tm => {}
            RlcMode::Um => {
                // FI(2) E(1) SN(5)
                buf.put_u8(((header.fi & 0x03) << 6) | (header.sn as u8 & 0x1F));
            }
            RlcMode::Am => {
                // D/C(1) RF(1) P(1) FI(2) E(1) SN(10)
                let mut word: u16 = header.sn & 0x03FF;
                if header.dc {
                    word |= 0x8000;
                }
                if header.p {
                    word |= 0x2000;
                }
                word |= u16::from(header.fi & 0x03) << 11;
                buf.put_u16(word);
            }
        }
    }

    fn decode_header(&self, data: &mut Bytes) -> Result<RlcPduHeader, LayerError> {
        if data.len() < self.mode.header_len() {
            return Err(LayerError::InvalidPdu);
        }
        match self.mode {
            RlcMode::Tm => Ok(RlcPduHeader { dc: true, sn: 0, fi: 0, p: false }),
            RlcMode::Um => {
                let byte = data.get_u8();
                Ok(RlcPduHeader {
                    dc: true,
                    sn: u16::from(byte & 0x1F),
                    fi: byte >> 6,
                    p: false,
                })
            }
            RlcMode::Am => {
                let word = data.get_u16();
                Ok(RlcPduHeader {
                    dc: word & 0x8000 != 0,
                    sn: word & 0x03FF,
                    fi: ((word >> 11) & 0x03) as u8,
                    p: word & 0x2000 != 0,
                })
            }
        }
    }
}

impl ProtocolLayer for RlcEntity {
    fn process_uplink(&mut self, data: Bytes) -> Result<Bytes, LayerError> {
        if self.mode == RlcMode::Tm {
            return Ok(data);
        }

        let header = RlcPduHeader {
            dc: true,
            sn: self.vt_s,
            fi: 0,
            p: false,
        };
        self.vt_s = (self.vt_s + 1) % self.sn_modulus();

        let mut buf = BytesMut::with_capacity(self.mode.header_len() + data.len());
        self.encode_header(&header, &mut buf);
        buf.extend_from_slice(&data);
        trace!("RLC lcid={} tx sn={} len={}", self.lcid, header.sn, buf.len());
        Ok(buf.freeze())
    }

    fn process_downlink(&mut self, mut data: Bytes) -> Result<Bytes, LayerError> {
        let header = self.decode_header(&mut data)?;
        if !header.dc {
            debug!("RLC lcid={} dropping status PDU", self.lcid);
            return Err(LayerError::ProcessingError(
                "RLC status PDUs are not supported".to_string(),
            ));
        }
        if self.mode != RlcMode::Tm {
            if header.sn != self.vr_r {
                debug!("RLC lcid={} expected sn={} got sn={}", self.lcid, self.vr_r, header.sn);
            }
            self.vr_r = (header.sn + 1) % self.sn_modulus();
        }
        Ok(data)
    }
}
