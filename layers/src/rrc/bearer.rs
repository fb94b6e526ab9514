//! Radio bearer management
//!
//! The bearer manager owns SRB0, SRB1 and the data radio bearers together
//! with their RLC and PDCP entities. MAC logical channel bookkeeping stays
//! with the caller, which knows the component carriers.

use super::RrcError;
use crate::pdcp::{PdcpConfig, PdcpEntity};
use crate::rlc::{RlcEntity, RlcMode};
use crate::{LayerError, ProtocolLayer};
use bytes::Bytes;
use common::Rnti;
use interfaces::{DrbToAddMod, LogicalChannelConfig, RlcConfig, SrbToAddMod};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Logical channel of the CCCH
pub const SRB0_LCID: u8 = 0;

/// Logical channel of the DCCH carried by SRB1
pub const SRB1_LCID: u8 = 1;

/// Highest logical channel identity reserved for signalling
pub const MAX_SRB_LCID: u8 = 2;

#[derive(Debug)]
pub struct SignalingRadioBearer {
    pub srb_identity: u8,
    pub logical_channel_identity: u8,
    pub logical_channel_config: LogicalChannelConfig,
    pub rlc: RlcEntity,
    pub pdcp: Option<PdcpEntity>,
}

#[derive(Debug)]
pub struct DataRadioBearer {
    pub eps_bearer_identity: u8,
    pub drb_identity: u8,
    pub logical_channel_identity: u8,
    pub logical_channel_config: LogicalChannelConfig,
    pub rlc: RlcEntity,
    pub pdcp: Option<PdcpEntity>,
}

impl DataRadioBearer {
    /// Pass an uplink packet through PDCP (if any) and RLC
    pub fn transmit(&mut self, packet: Bytes) -> Result<Bytes, LayerError> {
        let sdu = match self.pdcp.as_mut() {
            Some(pdcp) => pdcp.process_uplink(packet)?,
            None => packet,
        };
        self.rlc.process_uplink(sdu)
    }

    /// Pass a received PDU up through RLC and PDCP (if any)
    pub fn receive(&mut self, pdu: Bytes) -> Result<Bytes, LayerError> {
        let sdu = self.rlc.process_downlink(pdu)?;
        match self.pdcp.as_mut() {
            Some(pdcp) => pdcp.process_downlink(sdu),
            None => Ok(sdu),
        }
    }
}

/// Signalling and data radio bearers of one UE
#[derive(Debug)]
pub struct BearerManager {
    srb0: SignalingRadioBearer,
    srb1: Option<SignalingRadioBearer>,
    drb_map: BTreeMap<u8, DataRadioBearer>,
    /// EPS bearer identity to DRB identity
    bid_to_drbid: BTreeMap<u8, u8>,
}

impl BearerManager {
    /// Create the manager with SRB0 (RLC TM on the CCCH)
    pub fn new(rnti: Rnti) -> Self {
        let srb0 = SignalingRadioBearer {
            srb_identity: 0,
            logical_channel_identity: SRB0_LCID,
            logical_channel_config: LogicalChannelConfig::ccch(),
            rlc: RlcEntity::new(RlcMode::Tm, rnti, SRB0_LCID),
            pdcp: None,
        };
        Self {
            srb0,
            srb1: None,
            drb_map: BTreeMap::new(),
            bid_to_drbid: BTreeMap::new(),
        }
    }

    pub fn srb0(&self) -> &SignalingRadioBearer {
        &self.srb0
    }

    pub fn set_srb0_rnti(&mut self, rnti: Rnti) {
        self.srb0.rlc.set_rnti(rnti);
    }

    pub fn srb1(&self) -> Option<&SignalingRadioBearer> {
        self.srb1.as_ref()
    }

    pub fn has_srb1(&self) -> bool {
        self.srb1.is_some()
    }

    /// Create SRB1 with RLC AM and PDCP on LCID 1
    pub fn create_srb1(&mut self, rnti: Rnti, srb: &SrbToAddMod) -> Result<&SignalingRadioBearer, RrcError> {
        if srb.srb_identity != 1 {
            return Err(RrcError::ProtocolViolation(format!(
                "only SRB1 can be added, got SRB{}",
                srb.srb_identity
            )));
        }
        let pdcp = PdcpEntity::new(PdcpConfig::srb(), rnti, SRB1_LCID)
            .map_err(|e| RrcError::InvalidConfiguration(e.to_string()))?;
        info!("Creating SRB1 rnti={}", rnti);
        Ok(self.srb1.insert(SignalingRadioBearer {
            srb_identity: 1,
            logical_channel_identity: SRB1_LCID,
            logical_channel_config: srb.logical_channel_config,
            rlc: RlcEntity::new(RlcMode::Am, rnti, SRB1_LCID),
            pdcp: Some(pdcp),
        }))
    }

    /// Move SRB1 out of the manager; the caller drops it when done
    pub fn take_srb1(&mut self) -> Option<SignalingRadioBearer> {
        self.srb1.take()
    }

    /// Add a data radio bearer. Returns `false` when a DRB with the same
    /// identity already exists; modification is not supported.
    pub fn add_drb(&mut self, rnti: Rnti, drb: &DrbToAddMod, use_rlc_tm: bool) -> Result<bool, RrcError> {
        if drb.logical_channel_identity <= MAX_SRB_LCID {
            return Err(RrcError::ProtocolViolation(format!(
                "LCID {} of DRB {} is reserved for SRBs",
                drb.logical_channel_identity, drb.drb_identity
            )));
        }
        if self.drb_map.contains_key(&drb.drb_identity) {
            info!("DRB {} already exists, modification not implemented", drb.drb_identity);
            return Ok(false);
        }

        let mode = if use_rlc_tm {
            RlcMode::Tm
        } else {
            match drb.rlc_config {
                RlcConfig::Am => RlcMode::Am,
                RlcConfig::UmBiDirectional => RlcMode::Um,
                RlcConfig::UmUniDirectionalUl | RlcConfig::UmUniDirectionalDl => {
                    return Err(RrcError::Unsupported(format!("RLC config {:?}", drb.rlc_config)));
                }
            }
        };
        let lcid = drb.logical_channel_identity;
        let pdcp = if mode == RlcMode::Tm {
            None
        } else {
            Some(
                PdcpEntity::new(PdcpConfig::drb(), rnti, lcid)
                    .map_err(|e| RrcError::InvalidConfiguration(e.to_string()))?,
            )
        };

        debug!(
            "Creating DRB {} bid={} lcid={} rlc={:?}",
            drb.drb_identity, drb.eps_bearer_identity, lcid, mode
        );
        self.drb_map.insert(
            drb.drb_identity,
            DataRadioBearer {
                eps_bearer_identity: drb.eps_bearer_identity,
                drb_identity: drb.drb_identity,
                logical_channel_identity: lcid,
                logical_channel_config: drb.logical_channel_config,
                rlc: RlcEntity::new(mode, rnti, lcid),
                pdcp,
            },
        );
        self.bid_to_drbid.insert(drb.eps_bearer_identity, drb.drb_identity);
        Ok(true)
    }

    /// Remove a DRB and its bearer id mapping, returning its logical channel
    pub fn release_drb(&mut self, drb_id: u8) -> Result<u8, RrcError> {
        let drb = self.drb_map.remove(&drb_id).ok_or(RrcError::MissingBearer(drb_id))?;
        self.bid_to_drbid.remove(&drb.eps_bearer_identity);
        debug!("Released DRB {} lcid={}", drb_id, drb.logical_channel_identity);
        Ok(drb.logical_channel_identity)
    }

    /// Drop every DRB and the bearer id map
    pub fn clear_drbs(&mut self) {
        self.drb_map.clear();
        self.bid_to_drbid.clear();
    }

    pub fn drb(&self, drb_id: u8) -> Option<&DataRadioBearer> {
        self.drb_map.get(&drb_id)
    }

    pub fn drb_count(&self) -> usize {
        self.drb_map.len()
    }

    /// DRB serving EPS bearer `bid`. `Ok(None)` when the bearer id is unknown;
    /// a mapping that points to a missing DRB is an error.
    pub fn drb_for_bid(&mut self, bid: u8) -> Result<Option<&mut DataRadioBearer>, RrcError> {
        let Some(drb_id) = self.bid_to_drbid.get(&bid).copied() else {
            return Ok(None);
        };
        self.drb_map
            .get_mut(&drb_id)
            .map(Some)
            .ok_or(RrcError::MissingBearer(drb_id))
    }

    pub fn drb_by_lcid(&mut self, lcid: u8) -> Option<&mut DataRadioBearer> {
        self.drb_map.values_mut().find(|drb| drb.logical_channel_identity == lcid)
    }
}
