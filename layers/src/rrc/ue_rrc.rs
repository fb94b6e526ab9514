//! UE RRC state machine
//!
//! [`LteUeRrc`] owns the connection state, the radio bearers and the
//! measurement engine of one UE. Lower layer indications, network messages
//! and NAS requests enter through its public handlers; timers re-enter it
//! through [`LteUeRrc::handle_timer`].

use super::bearer::{BearerManager, SRB0_LCID, SRB1_LCID};
use super::cell_selection::{evaluate_cell, strongest_cell, CellSelectionOutcome};
use super::measurement::MeasValues;
use super::timers::{TimerHandle, UeRrcTimer};
use super::trace::{TraceListener, TraceListeners};
use super::triggering::{CarrierState, MeasurementEngine, ServingContext};
use super::{RrcError, SyncIndication, UeRrcConfig, UeRrcEvent, UeRrcState, UeRrcTrace};
use crate::LayerError;
use bytes::Bytes;
use common::{CellId, ComponentCarrierId, CsgId, Earfcn, EventId, Imsi, Rnti, Scheduler, TransmissionBandwidth};
use interfaces::{
    AsSapUser, LogicalChannelConfig, MacSapProvider, MasterInformationBlock, NonCriticalExtensionConfiguration,
    RachConfig, RadioResourceConfigDedicated, RrcConnectionReconfiguration, RrcConnectionReconfigurationCompleted,
    RrcConnectionReestablishment, RrcConnectionReestablishmentReject, RrcConnectionReject, RrcConnectionRelease,
    RrcConnectionRequest, RrcConnectionSetup, RrcConnectionSetupCompleted, RrcSapUser, SetupParameters,
    SystemInformation, SystemInformationBlockType1, SystemInformationBlockType2, TransmitPduParameters,
    UeCmacSapProvider, UeCphySapProvider, UeMeasurementsParameters,
};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Collaborators of the RRC, one MAC and PHY control SAP per component carrier
pub struct UeRrcSaps {
    pub cmac: Vec<Box<dyn UeCmacSapProvider>>,
    pub cphy: Vec<Box<dyn UeCphySapProvider>>,
    pub mac: Box<dyn MacSapProvider>,
    pub rrc_sap_user: Box<dyn RrcSapUser>,
    pub as_sap_user: Box<dyn AsSapUser>,
}

/// LTE UE RRC protocol entity
pub struct LteUeRrc {
    config: UeRrcConfig,
    saps: UeRrcSaps,
    timers: TimerHandle,
    trace_listeners: TraceListeners,

    state: UeRrcState,
    imsi: Imsi,
    rnti: Rnti,
    cell_id: Option<CellId>,
    previous_cell_id: Option<CellId>,
    dl_earfcn: Earfcn,
    ul_earfcn: Earfcn,
    dl_bandwidth: u16,
    ul_bandwidth: u16,
    csg_white_list: Option<CsgId>,

    has_received_mib: bool,
    sib1: Option<SystemInformationBlockType1>,
    sib2: Option<SystemInformationBlockType2>,
    /// Acceptable cells rejected by cell selection, skipped by later searches
    acceptable_cells: BTreeSet<CellId>,

    connection_pending: bool,
    leaving_connected_mode: bool,
    last_rrc_transaction_identifier: u8,
    conn_est_fail_count: u8,
    conn_est_fail_count_limit: u8,
    no_of_sync_indications: u8,
    t300: Option<EventId>,
    t310: Option<EventId>,

    bearers: BearerManager,
    meas: MeasurementEngine,
}

impl LteUeRrc {
    /// Create and initialize an RRC instance driven by `scheduler`.
    ///
    /// SRB0 is set up on MAC CC0 before this returns.
    pub fn new(config: UeRrcConfig, saps: UeRrcSaps, scheduler: Rc<Scheduler>) -> Result<Rc<RefCell<Self>>, RrcError> {
        config.validate()?;
        let carriers = usize::from(config.number_of_component_carriers);
        if saps.cmac.len() != carriers || saps.cphy.len() != carriers {
            return Err(RrcError::InvalidConfiguration(format!(
                "{} component carriers but {} CMAC and {} CPHY SAPs",
                carriers,
                saps.cmac.len(),
                saps.cphy.len()
            )));
        }

        let rrc = Rc::new_cyclic(|weak| {
            let timers = TimerHandle::new(scheduler, weak.clone());
            RefCell::new(Self {
                imsi: config.imsi,
                config,
                saps,
                meas: MeasurementEngine::new(timers.clone()),
                timers,
                trace_listeners: TraceListeners::default(),
                state: UeRrcState::IdleStart,
                rnti: Rnti(0),
                cell_id: None,
                previous_cell_id: None,
                dl_earfcn: 0,
                ul_earfcn: 0,
                dl_bandwidth: 0,
                ul_bandwidth: 0,
                csg_white_list: None,
                has_received_mib: false,
                sib1: None,
                sib2: None,
                acceptable_cells: BTreeSet::new(),
                connection_pending: false,
                leaving_connected_mode: false,
                last_rrc_transaction_identifier: 0,
                conn_est_fail_count: 0,
                conn_est_fail_count_limit: 1,
                no_of_sync_indications: 0,
                t300: None,
                t310: None,
                bearers: BearerManager::new(Rnti(0)),
            })
        });
        rrc.borrow_mut().initialize();
        Ok(rrc)
    }

    fn initialize(&mut self) {
        let srb0 = self.bearers.srb0();
        self.saps.cmac[0].add_lc(srb0.logical_channel_identity, srb0.logical_channel_config);
        self.saps.rrc_sap_user.setup(SetupParameters { srb0_lcid: SRB0_LCID, srb1_lcid: None });
        debug!("UE RRC imsi={} initialized with SRB0", self.imsi);
    }

    pub fn add_trace_listener(&mut self, listener: TraceListener) {
        self.trace_listeners.add(listener);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> UeRrcState {
        self.state
    }

    pub fn imsi(&self) -> Imsi {
        self.imsi
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn cell_id(&self) -> Option<CellId> {
        self.cell_id
    }

    pub fn previous_cell_id(&self) -> Option<CellId> {
        self.previous_cell_id
    }

    pub fn dl_earfcn(&self) -> Earfcn {
        self.dl_earfcn
    }

    pub fn ul_earfcn(&self) -> Earfcn {
        self.ul_earfcn
    }

    pub fn dl_bandwidth(&self) -> u16 {
        self.dl_bandwidth
    }

    pub fn ul_bandwidth(&self) -> u16 {
        self.ul_bandwidth
    }

    pub fn has_srb1(&self) -> bool {
        self.bearers.has_srb1()
    }

    pub fn drb_count(&self) -> usize {
        self.bearers.drb_count()
    }

    pub fn conn_est_fail_count(&self) -> u8 {
        self.conn_est_fail_count
    }

    pub fn sync_indication_count(&self) -> u8 {
        self.no_of_sync_indications
    }

    pub fn is_t300_running(&self) -> bool {
        self.timers.is_running(&self.t300)
    }

    pub fn is_t310_running(&self) -> bool {
        self.timers.is_running(&self.t310)
    }

    pub fn stored_measurement(&self, cell_id: CellId) -> Option<MeasValues> {
        self.meas.store().get(cell_id).copied()
    }

    pub fn triggered_cells(&self, meas_id: u8) -> Option<Vec<CellId>> {
        self.meas.triggered_cells(meas_id).map(|cells| cells.iter().copied().collect())
    }

    pub fn measurements(&self) -> &MeasurementEngine {
        &self.meas
    }

    // ------------------------------------------------------------------
    // NAS requests
    // ------------------------------------------------------------------

    /// Start searching for cells on `dl_earfcn`
    pub fn start_cell_selection(&mut self, dl_earfcn: Earfcn) -> Result<(), RrcError> {
        if self.state != UeRrcState::IdleStart {
            return Err(self.invalid_state("cell selection"));
        }
        self.dl_earfcn = dl_earfcn;
        self.saps.cphy[0].start_cell_search(dl_earfcn);
        self.switch_to_state(UeRrcState::IdleCellSearch)
    }

    /// Camp on a given cell without cell search
    pub fn force_camped_on_enb(&mut self, cell_id: CellId, dl_earfcn: Earfcn) -> Result<(), RrcError> {
        match self.state {
            UeRrcState::IdleStart => {
                self.cell_id = Some(cell_id);
                self.dl_earfcn = dl_earfcn;
                self.saps.cphy[0].synchronize_with_enb(cell_id, dl_earfcn);
                self.switch_to_state(UeRrcState::IdleWaitMib)
            }
            UeRrcState::IdleCellSearch | UeRrcState::IdleWaitMibSib1 | UeRrcState::IdleWaitSib1 => {
                Err(self.invalid_state("forced camping"))
            }
            state => {
                info!("imsi={} ignoring forced camping on cell {} in state {}", self.imsi, cell_id, state);
                Ok(())
            }
        }
    }

    pub fn set_csg_white_list(&mut self, csg_id: CsgId) {
        self.csg_white_list = Some(csg_id);
    }

    /// Request an RRC connection as soon as the UE is camped
    pub fn connect(&mut self) -> Result<(), RrcError> {
        match self.state {
            UeRrcState::IdleStart
            | UeRrcState::IdleCellSearch
            | UeRrcState::IdleWaitMibSib1
            | UeRrcState::IdleWaitMib
            | UeRrcState::IdleWaitSib1 => {
                self.connection_pending = true;
                Ok(())
            }
            UeRrcState::IdleCampedNormally => {
                self.connection_pending = true;
                self.switch_to_state(UeRrcState::IdleWaitSib2)
            }
            UeRrcState::IdleWaitSib2 | UeRrcState::IdleRandomAccess | UeRrcState::IdleConnecting => {
                debug!("imsi={} connection request already in progress", self.imsi);
                Ok(())
            }
            _ => {
                debug!("imsi={} already connected", self.imsi);
                Ok(())
            }
        }
    }

    /// Release the connection and restart cell search
    pub fn disconnect(&mut self) -> Result<(), RrcError> {
        match self.state {
            UeRrcState::IdleStart
            | UeRrcState::IdleCellSearch
            | UeRrcState::IdleWaitMibSib1
            | UeRrcState::IdleWaitMib
            | UeRrcState::IdleWaitSib1
            | UeRrcState::IdleCampedNormally => {
                info!("imsi={} already disconnected", self.imsi);
                Ok(())
            }
            UeRrcState::IdleWaitSib2 | UeRrcState::IdleRandomAccess | UeRrcState::IdleConnecting => {
                Err(self.invalid_state("disconnect"))
            }
            _ => self.leave_connected_mode(),
        }
    }

    /// Send an uplink packet on the DRB of EPS bearer `bid`
    pub fn send_data(&mut self, packet: Bytes, bid: u8) -> Result<(), LayerError> {
        let rnti = self.rnti;
        let Some(drb) = self.bearers.drb_for_bid(bid)? else {
            debug!("imsi={} no DRB for bid {}, dropping packet", self.imsi, bid);
            return Ok(());
        };
        let lcid = drb.logical_channel_identity;
        let pdu = drb.transmit(packet)?;
        self.saps.mac.transmit_pdu(TransmitPduParameters { pdu, rnti, lcid });
        Ok(())
    }

    /// Deliver a PDU received by the MAC on `lcid`
    pub fn receive_pdu(&mut self, lcid: u8, pdu: Bytes) -> Result<(), LayerError> {
        if lcid == SRB0_LCID || lcid == SRB1_LCID {
            debug!("imsi={} signalling PDU on lcid {} ignored", self.imsi, lcid);
            return Ok(());
        }
        let drb = self
            .bearers
            .drb_by_lcid(lcid)
            .ok_or_else(|| LayerError::ProcessingError(format!("no DRB on LCID {}", lcid)))?;
        let sdu = drb.receive(pdu)?;
        self.saps.as_sap_user.recv_data(sdu);
        Ok(())
    }

    // ------------------------------------------------------------------
    // MAC indications
    // ------------------------------------------------------------------

    pub fn set_temporary_cell_rnti(&mut self, rnti: Rnti) {
        debug!("imsi={} temporary C-RNTI {}", self.imsi, rnti);
        self.rnti = rnti;
        self.bearers.set_srb0_rnti(rnti);
        self.saps.cmac[0].set_rnti(rnti);
        self.saps.cphy[0].set_rnti(rnti);
    }

    pub fn notify_random_access_successful(&mut self) -> Result<(), RrcError> {
        self.fire(UeRrcEvent::RandomAccessSuccessful);
        match self.state {
            UeRrcState::IdleRandomAccess => {
                self.switch_to_state(UeRrcState::IdleConnecting)?;
                self.saps
                    .rrc_sap_user
                    .send_rrc_connection_request(RrcConnectionRequest { ue_identity: self.imsi });
                self.timers.cancel(&mut self.t300);
                self.t300 = Some(self.timers.schedule(self.config.t300(), UeRrcTimer::ConnectionTimeout));
                Ok(())
            }
            UeRrcState::ConnectedHandover => {
                self.saps.rrc_sap_user.send_rrc_connection_reconfiguration_completed(
                    RrcConnectionReconfigurationCompleted {
                        rrc_transaction_identifier: self.last_rrc_transaction_identifier,
                    },
                );
                // reports refer to the source cell
                self.meas.clear_all_reports();
                self.switch_to_state(UeRrcState::ConnectedNormally)?;
                self.saps.cmac[0].notify_connection_successful();
                self.fire(UeRrcEvent::HandoverEndOk);
                Ok(())
            }
            _ => Err(self.invalid_state("random access success")),
        }
    }

    pub fn notify_random_access_failed(&mut self) -> Result<(), RrcError> {
        self.fire(UeRrcEvent::RandomAccessError);
        match self.state {
            UeRrcState::IdleRandomAccess => {
                self.switch_to_state(UeRrcState::IdleCampedNormally)?;
                self.saps.as_sap_user.notify_connection_failed();
                Ok(())
            }
            UeRrcState::ConnectedHandover => {
                // recovery through re-establishment is not implemented
                warn!("imsi={} handover to cell {:?} failed", self.imsi, self.cell_id);
                self.fire(UeRrcEvent::HandoverEndError);
                Ok(())
            }
            _ => Err(self.invalid_state("random access failure")),
        }
    }

    // ------------------------------------------------------------------
    // PHY indications
    // ------------------------------------------------------------------

    pub fn recv_master_information_block(
        &mut self,
        cc: ComponentCarrierId,
        mib: MasterInformationBlock,
    ) -> Result<(), RrcError> {
        let cc = self.check_cc(cc)?;
        if TransmissionBandwidth::from_rbs(mib.dl_bandwidth).is_none() {
            return Err(RrcError::ProtocolViolation(format!(
                "MIB with invalid bandwidth {} RBs",
                mib.dl_bandwidth
            )));
        }
        self.saps.cphy[cc].set_dl_bandwidth(mib.dl_bandwidth);
        if cc != 0 {
            debug!("imsi={} MIB on secondary carrier {}", self.imsi, cc);
            return Ok(());
        }

        self.dl_bandwidth = mib.dl_bandwidth;
        self.has_received_mib = true;
        self.fire(UeRrcEvent::MibReceived);

        match self.state {
            UeRrcState::IdleWaitMib => self.switch_to_state(UeRrcState::IdleCampedNormally),
            UeRrcState::IdleWaitMibSib1 => self.switch_to_state(UeRrcState::IdleWaitSib1),
            _ => Ok(()),
        }
    }

    pub fn recv_system_information_block_type1(
        &mut self,
        cc: ComponentCarrierId,
        sib1: SystemInformationBlockType1,
    ) -> Result<(), RrcError> {
        let cc = self.check_cc(cc)?;
        if cc != 0 {
            debug!("imsi={} SIB1 on secondary carrier {} ignored", self.imsi, cc);
            return Ok(());
        }
        match self.state {
            UeRrcState::IdleWaitSib1 => {
                let cell = sib1.cell_access_related_info.cell_identity;
                let synchronized = self.saps.cphy[0].cell_id();
                if synchronized != Some(cell) {
                    return Err(RrcError::ProtocolViolation(format!(
                        "SIB1 of cell {} while synchronized to {:?}",
                        cell, synchronized
                    )));
                }
                self.sib1 = Some(sib1);
                self.fire(UeRrcEvent::Sib1Received);
                self.evaluate_cell_for_selection(cell)
            }
            UeRrcState::IdleCampedNormally
            | UeRrcState::IdleWaitSib2
            | UeRrcState::IdleRandomAccess
            | UeRrcState::IdleConnecting
            | UeRrcState::ConnectedNormally
            | UeRrcState::ConnectedHandover
            | UeRrcState::ConnectedPhyProblem
            | UeRrcState::ConnectedReestablishing => {
                self.sib1 = Some(sib1);
                self.fire(UeRrcEvent::Sib1Received);
                Ok(())
            }
            state => {
                debug!("imsi={} SIB1 ignored in state {}", self.imsi, state);
                Ok(())
            }
        }
    }

    /// Store a batch of PHY measurements and run triggering or cell search
    pub fn report_ue_measurements(&mut self, params: UeMeasurementsParameters) -> Result<(), RrcError> {
        let cc = self.check_cc(params.component_carrier_id)?;
        let filter = (self.state == UeRrcState::ConnectedNormally).then(|| self.meas.config().filter_coefficients());
        let carrier_freq = if cc == 0 { self.dl_earfcn } else { self.saps.cphy[cc].dl_earfcn() };

        for m in &params.ue_measurements_list {
            let stored = self
                .meas
                .store_mut()
                .save(m.cell_id, m.rsrp, m.rsrq, carrier_freq, filter);
            let is_serving = Some(m.cell_id) == self.cell_id;
            debug!(
                "imsi={} cc={} cell {} RSRP {} dBm RSRQ {} dB filtered={}",
                self.imsi,
                cc,
                m.cell_id,
                stored.rsrp,
                stored.rsrq,
                filter.is_some()
            );
            self.fire(UeRrcEvent::RsrpMeasurement { rsrp: stored.rsrp, is_serving, cc: cc as ComponentCarrierId });
        }

        if self.state == UeRrcState::IdleCellSearch {
            return self.synchronize_to_strongest_cell();
        }
        // events are only triggered by primary carrier measurements
        if cc != 0 {
            return Ok(());
        }
        let ctx = self.serving_context();
        self.meas.evaluate_all(&ctx)?;
        self.flush_measurement_reports();
        Ok(())
    }

    pub fn notify_in_sync(&mut self) {
        self.no_of_sync_indications = self.no_of_sync_indications.saturating_add(1);
        self.fire(UeRrcEvent::PhySyncDetection {
            kind: SyncIndication::InSync,
            count: self.no_of_sync_indications,
        });
        if self.no_of_sync_indications == self.config.n311 {
            self.reset_rlf_params();
        }
    }

    pub fn notify_out_of_sync(&mut self) {
        self.no_of_sync_indications = self.no_of_sync_indications.saturating_add(1);
        self.fire(UeRrcEvent::PhySyncDetection {
            kind: SyncIndication::OutOfSync,
            count: self.no_of_sync_indications,
        });
        if self.no_of_sync_indications == self.config.n310 {
            info!("imsi={} {} out-of-sync indications, starting T310", self.imsi, self.config.n310);
            self.timers.cancel(&mut self.t310);
            self.t310 = Some(self.timers.schedule(self.config.t310(), UeRrcTimer::RadioLinkFailure));
            self.saps.cphy[0].start_in_sync_detection();
            self.no_of_sync_indications = 0;
        }
    }

    pub fn reset_sync_indication_counter(&mut self) {
        debug!("imsi={} sync indication counter reset from {}", self.imsi, self.no_of_sync_indications);
        self.no_of_sync_indications = 0;
    }

    // ------------------------------------------------------------------
    // RRC messages from the eNodeB
    // ------------------------------------------------------------------

    pub fn recv_system_information(&mut self, si: SystemInformation) -> Result<(), RrcError> {
        let Some(sib2) = si.sib2 else {
            return Ok(());
        };
        match self.state {
            UeRrcState::IdleStart
            | UeRrcState::IdleCellSearch
            | UeRrcState::IdleWaitMibSib1
            | UeRrcState::IdleWaitMib
            | UeRrcState::IdleWaitSib1 => {
                debug!("imsi={} SIB2 ignored in state {}", self.imsi, self.state);
                return Ok(());
            }
            _ => {}
        }

        let rach = &sib2.radio_resource_config_common.rach_config_common;
        let limit = rach.tx_fail_param.conn_est_fail_count;
        if !(1..=4).contains(&limit) {
            return Err(RrcError::ProtocolViolation(format!("connEstFailCount {} outside 1..=4", limit)));
        }

        self.ul_bandwidth = sib2.freq_info.ul_bandwidth;
        self.ul_earfcn = sib2.freq_info.ul_carrier_freq;
        self.conn_est_fail_count_limit = limit;
        self.sib2 = Some(sib2);
        self.fire(UeRrcEvent::Sib2Received);

        self.saps.cmac[0].configure_rach(RachConfig {
            number_of_ra_preambles: rach.preamble_info.number_of_ra_preambles,
            preamble_trans_max: rach.ra_supervision_info.preamble_trans_max,
            ra_response_window_size: rach.ra_supervision_info.ra_response_window_size,
            conn_est_fail_count: limit,
        });
        self.saps.cphy[0].configure_uplink(self.ul_earfcn, self.ul_bandwidth);
        self.saps.cphy[0]
            .configure_reference_signal_power(sib2.radio_resource_config_common.pdsch_config_common.reference_signal_power);

        if self.state == UeRrcState::IdleWaitSib2 {
            debug_assert!(self.connection_pending);
            self.start_connection()?;
        }
        Ok(())
    }

    pub fn recv_rrc_connection_setup(&mut self, msg: RrcConnectionSetup) -> Result<(), RrcError> {
        if self.state != UeRrcState::IdleConnecting {
            return Err(self.invalid_state("RRC connection setup"));
        }
        self.apply_radio_resource_config_dedicated(&msg.radio_resource_config_dedicated)?;
        self.conn_est_fail_count = 0;
        self.timers.cancel(&mut self.t300);
        self.switch_to_state(UeRrcState::ConnectedNormally)?;
        self.leaving_connected_mode = false;
        self.saps
            .rrc_sap_user
            .send_rrc_connection_setup_completed(RrcConnectionSetupCompleted {
                rrc_transaction_identifier: msg.rrc_transaction_identifier,
            });
        self.saps.as_sap_user.notify_connection_successful();
        self.saps.cmac[0].notify_connection_successful();
        self.fire(UeRrcEvent::ConnectionEstablished);
        Ok(())
    }

    pub fn recv_rrc_connection_reconfiguration(&mut self, msg: RrcConnectionReconfiguration) -> Result<(), RrcError> {
        if self.state != UeRrcState::ConnectedNormally {
            return Err(self.invalid_state("RRC connection reconfiguration"));
        }

        let Some(mci) = msg.mobility_control_info else {
            if let Some(nce) = &msg.non_critical_extension {
                self.apply_secondary_cell_config(nce)?;
            }
            if let Some(rrcd) = &msg.radio_resource_config_dedicated {
                self.apply_radio_resource_config_dedicated(rrcd)?;
            }
            if let Some(mc) = &msg.meas_config {
                self.meas.apply_meas_config(mc, &mut self.saps.cphy)?;
            }
            self.saps
                .rrc_sap_user
                .send_rrc_connection_reconfiguration_completed(RrcConnectionReconfigurationCompleted {
                    rrc_transaction_identifier: msg.rrc_transaction_identifier,
                });
            self.fire(UeRrcEvent::ConnectionReconfiguration);
            return Ok(());
        };

        info!("imsi={} handover command to cell {}", self.imsi, mci.target_phys_cell_id);
        self.switch_to_state(UeRrcState::ConnectedHandover)?;
        if self.is_t310_running() {
            self.reset_rlf_params();
        }
        self.fire(UeRrcEvent::HandoverStart { target: mci.target_phys_cell_id });

        for cmac in self.saps.cmac.iter_mut() {
            cmac.reset();
        }
        for cphy in self.saps.cphy.iter_mut() {
            cphy.reset();
        }

        self.previous_cell_id = self.cell_id;
        self.cell_id = Some(mci.target_phys_cell_id);
        let carrier_freq = mci
            .carrier_freq
            .ok_or_else(|| RrcError::Unsupported("handover without target carrier frequency".into()))?;
        let carrier_bandwidth = mci
            .carrier_bandwidth
            .ok_or_else(|| RrcError::Unsupported("handover without target carrier bandwidth".into()))?;
        self.dl_earfcn = carrier_freq.dl_carrier_freq;
        self.ul_earfcn = carrier_freq.ul_carrier_freq;
        self.dl_bandwidth = carrier_bandwidth.dl_bandwidth;
        self.ul_bandwidth = carrier_bandwidth.ul_bandwidth;
        self.saps.cphy[0].synchronize_with_enb(mci.target_phys_cell_id, self.dl_earfcn);
        self.saps.cphy[0].set_dl_bandwidth(self.dl_bandwidth);
        self.saps.cphy[0].configure_uplink(self.ul_earfcn, self.ul_bandwidth);

        self.rnti = mci.new_ue_identity;
        self.bearers.set_srb0_rnti(self.rnti);
        let rach = mci
            .rach_config_dedicated
            .ok_or_else(|| RrcError::Unsupported("handover with contention based random access".into()))?;
        self.saps.cmac[0].start_non_contention_based_random_access(
            self.rnti,
            rach.ra_preamble_index,
            rach.ra_prach_mask_index,
        );
        self.saps.cphy[0].set_rnti(self.rnti);
        self.last_rrc_transaction_identifier = msg.rrc_transaction_identifier;

        let rrcd = msg
            .radio_resource_config_dedicated
            .as_ref()
            .ok_or_else(|| RrcError::ProtocolViolation("handover without radio resource config".into()))?;
        // the old SRB1 lives until the end of this handler
        let _old_srb1 = self.bearers.take_srb1();
        self.bearers.clear_drbs();
        self.apply_radio_resource_config_dedicated(rrcd)?;

        if let Some(nce) = &msg.non_critical_extension {
            self.apply_secondary_cell_config(nce)?;
        }
        if let Some(mc) = &msg.meas_config {
            self.meas.apply_meas_config(mc, &mut self.saps.cphy)?;
        }
        // completion is sent once random access to the target succeeds
        Ok(())
    }

    pub fn recv_rrc_connection_reestablishment(&mut self, msg: RrcConnectionReestablishment) -> Result<(), RrcError> {
        if self.state != UeRrcState::ConnectedReestablishing {
            return Err(self.invalid_state("RRC connection re-establishment"));
        }
        warn!(
            "imsi={} RRC connection re-establishment (transaction {}) not implemented",
            self.imsi, msg.rrc_transaction_identifier
        );
        Ok(())
    }

    pub fn recv_rrc_connection_reestablishment_reject(
        &mut self,
        _msg: RrcConnectionReestablishmentReject,
    ) -> Result<(), RrcError> {
        if self.state != UeRrcState::ConnectedReestablishing {
            return Err(self.invalid_state("RRC connection re-establishment reject"));
        }
        warn!("imsi={} RRC connection re-establishment rejected", self.imsi);
        self.saps.as_sap_user.notify_connection_released();
        Ok(())
    }

    pub fn recv_rrc_connection_release(&mut self, msg: RrcConnectionRelease) -> Result<(), RrcError> {
        warn!(
            "imsi={} RRC connection release (transaction {}) not implemented",
            self.imsi, msg.rrc_transaction_identifier
        );
        Ok(())
    }

    pub fn recv_rrc_connection_reject(&mut self, msg: RrcConnectionReject) -> Result<(), RrcError> {
        info!("imsi={} RRC connection rejected, wait time {} s", self.imsi, msg.wait_time);
        self.timers.cancel(&mut self.t300);
        for cmac in self.saps.cmac.iter_mut() {
            cmac.reset();
        }
        self.sib2 = None;
        self.switch_to_state(UeRrcState::IdleCampedNormally)?;
        self.saps.as_sap_user.notify_connection_failed();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Dispatch an expired timer
    pub fn handle_timer(&mut self, timer: UeRrcTimer) -> Result<(), RrcError> {
        match timer {
            UeRrcTimer::ConnectionTimeout => self.connection_timeout(),
            UeRrcTimer::RadioLinkFailure => self.radio_link_failure_detected(),
            UeRrcTimer::MeasurementReport { meas_id } => {
                let ctx = self.serving_context();
                self.meas.send_measurement_report(meas_id, &ctx)?;
                self.flush_measurement_reports();
                Ok(())
            }
            UeRrcTimer::EnteringTrigger { meas_id, trigger_id } => {
                self.meas.on_entering_trigger(meas_id, trigger_id);
                Ok(())
            }
            UeRrcTimer::LeavingTrigger { meas_id, trigger_id, report_on_leave } => {
                let ctx = self.serving_context();
                self.meas.on_leaving_trigger(meas_id, trigger_id, report_on_leave, &ctx)?;
                self.flush_measurement_reports();
                Ok(())
            }
        }
    }

    /// T300 expiry
    fn connection_timeout(&mut self) -> Result<(), RrcError> {
        self.t300 = None;
        self.conn_est_fail_count = self.conn_est_fail_count.saturating_add(1);
        let count = self.conn_est_fail_count;
        if count >= self.conn_est_fail_count_limit {
            warn!("imsi={} connection establishment failed {} times, giving up", self.imsi, count);
            self.fire(UeRrcEvent::ConnectionTimeout { count });
            self.switch_to_state(UeRrcState::ConnectedPhyProblem)?;
            self.saps.as_sap_user.notify_connection_released();
            self.conn_est_fail_count = 0;
        } else {
            for cmac in self.saps.cmac.iter_mut() {
                cmac.reset();
            }
            self.sib2 = None;
            self.switch_to_state(UeRrcState::IdleCampedNormally)?;
            self.fire(UeRrcEvent::ConnectionTimeout { count });
            self.saps.as_sap_user.notify_connection_failed();
        }
        Ok(())
    }

    /// T310 expiry
    fn radio_link_failure_detected(&mut self) -> Result<(), RrcError> {
        self.t310 = None;
        warn!("imsi={} radio link failure on cell {:?}", self.imsi, self.cell_id);
        self.fire(UeRrcEvent::RadioLinkFailure);
        self.switch_to_state(UeRrcState::ConnectedPhyProblem)?;
        self.saps.rrc_sap_user.send_ideal_ue_context_remove_request(self.rnti);
        self.saps.as_sap_user.notify_connection_released();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Change state and run the entry actions of the new state. Entry actions
    /// may switch state again.
    fn switch_to_state(&mut self, new_state: UeRrcState) -> Result<(), RrcError> {
        let old_state = self.state;
        if new_state == UeRrcState::IdleStart && !self.leaving_connected_mode {
            return Err(RrcError::InvalidState { procedure: "entering IDLE_START", state: old_state });
        }
        self.state = new_state;
        info!("imsi={} rnti={} state {} -> {}", self.imsi, self.rnti, old_state, new_state);
        self.fire(UeRrcEvent::StateTransition { from: old_state, to: new_state });

        match new_state {
            UeRrcState::IdleCampedNormally if self.connection_pending => {
                self.switch_to_state(UeRrcState::IdleWaitSib2)
            }
            UeRrcState::IdleWaitSib2 if self.sib2.is_some() => {
                debug_assert!(self.connection_pending);
                self.start_connection()
            }
            _ => Ok(()),
        }
    }

    fn start_connection(&mut self) -> Result<(), RrcError> {
        self.connection_pending = false;
        self.switch_to_state(UeRrcState::IdleRandomAccess)?;
        self.saps.cmac[0].start_contention_based_random_access();
        Ok(())
    }

    fn synchronize_to_strongest_cell(&mut self) -> Result<(), RrcError> {
        debug_assert_eq!(self.state, UeRrcState::IdleCellSearch);
        match strongest_cell(self.meas.store(), &self.acceptable_cells) {
            None => {
                warn!("imsi={} no suitable cell found on carrier {}", self.imsi, self.dl_earfcn);
                Ok(())
            }
            Some(cell) => {
                debug!("imsi={} synchronizing to strongest cell {}", self.imsi, cell);
                self.saps.cphy[0].synchronize_with_enb(cell, self.dl_earfcn);
                self.switch_to_state(UeRrcState::IdleWaitMibSib1)
            }
        }
    }

    fn evaluate_cell_for_selection(&mut self, cell: CellId) -> Result<(), RrcError> {
        let sib1 = self
            .sib1
            .ok_or_else(|| RrcError::ProtocolViolation("cell selection without SIB1".into()))?;
        let rsrp = self
            .meas
            .store()
            .get(cell)
            .map(|v| v.rsrp)
            .ok_or_else(|| RrcError::ProtocolViolation(format!("cell selection of unmeasured cell {}", cell)))?;

        let outcome = evaluate_cell(rsrp, &sib1, self.csg_white_list);
        info!("imsi={} cell {} selection outcome {:?}", self.imsi, cell, outcome);
        if outcome == CellSelectionOutcome::Suitable {
            self.cell_id = Some(cell);
            self.saps.cphy[0].synchronize_with_enb(cell, self.dl_earfcn);
            self.saps.cphy[0].set_dl_bandwidth(self.dl_bandwidth);
            self.fire(UeRrcEvent::InitialCellSelectionEndOk);
            return self.switch_to_state(UeRrcState::IdleCampedNormally);
        }

        self.has_received_mib = false;
        self.sib1 = None;
        self.fire(UeRrcEvent::InitialCellSelectionEndError);
        if outcome == CellSelectionOutcome::AcceptableNotSuitable {
            self.acceptable_cells.insert(cell);
        }
        self.switch_to_state(UeRrcState::IdleCellSearch)?;
        self.synchronize_to_strongest_cell()
    }

    fn apply_radio_resource_config_dedicated(&mut self, rrcd: &RadioResourceConfigDedicated) -> Result<(), RrcError> {
        if let Some(pcd) = rrcd.physical_config_dedicated {
            let cphy = &mut self.saps.cphy[0];
            if let Some(tm) = pcd.transmission_mode {
                cphy.set_transmission_mode(tm);
            }
            if let Some(srs) = pcd.srs_config_index {
                cphy.set_srs_configuration_index(srs);
            }
            if let Some(pa) = pcd.pdsch_pa {
                cphy.set_pa(pa.to_db());
            }
        }

        if rrcd.srb_to_add_mod_list.len() > 1 {
            return Err(RrcError::ProtocolViolation(format!(
                "{} SRBs to add, at most one supported",
                rrcd.srb_to_add_mod_list.len()
            )));
        }
        if let Some(srb) = rrcd.srb_to_add_mod_list.first() {
            if self.bearers.has_srb1() {
                info!("imsi={} SRB1 modification not implemented", self.imsi);
            } else {
                if !matches!(self.state, UeRrcState::IdleConnecting | UeRrcState::ConnectedHandover) {
                    return Err(self.invalid_state("SRB1 setup"));
                }
                let lc_config = self.bearers.create_srb1(self.rnti, srb)?.logical_channel_config;
                self.fire(UeRrcEvent::Srb1Created);
                self.saps.cmac[0].add_lc(SRB1_LCID, lc_config);
                self.saps.rrc_sap_user.setup(SetupParameters {
                    srb0_lcid: SRB0_LCID,
                    srb1_lcid: Some(SRB1_LCID),
                });
            }
        }

        for drb in &rrcd.drb_to_add_mod_list {
            if self.bearers.add_drb(self.rnti, drb, self.config.use_rlc_transparent_mode)? {
                self.fire(UeRrcEvent::DrbCreated { drb_id: drb.drb_identity });
                self.add_lc_on_all_carriers(drb.logical_channel_identity, drb.logical_channel_config);
            }
        }

        for drb_id in &rrcd.drb_to_release_list {
            let lcid = self.bearers.release_drb(*drb_id)?;
            for cmac in self.saps.cmac.iter_mut() {
                cmac.remove_lc(lcid);
            }
        }
        Ok(())
    }

    fn add_lc_on_all_carriers(&mut self, lcid: u8, config: LogicalChannelConfig) {
        for cmac in self.saps.cmac.iter_mut() {
            cmac.add_lc(lcid, config);
        }
    }

    fn apply_secondary_cell_config(&mut self, nce: &NonCriticalExtensionConfiguration) -> Result<(), RrcError> {
        for index in &nce.s_cell_to_release_list {
            let cc = self.check_scell_index(*index)?;
            debug!("imsi={} releasing SCell {}", self.imsi, cc);
            self.saps.cphy[cc].reset();
            self.saps.cmac[cc].reset();
        }

        for scell in &nce.s_cell_to_add_mod_list {
            let cc = self.check_scell_index(scell.s_cell_index)?;
            let id = scell.cell_identification;
            let common = scell.radio_resource_config_common_scell;
            let cphy = &mut self.saps.cphy[cc];
            cphy.synchronize_with_enb(id.phys_cell_id, id.dl_carrier_freq);
            cphy.set_dl_bandwidth(common.dl_bandwidth);
            cphy.configure_uplink(common.ul_carrier_freq, common.ul_bandwidth);
            cphy.configure_reference_signal_power(common.reference_signal_power);
            if let Some(dedicated) = scell.radio_resource_config_dedicated_scell {
                cphy.set_transmission_mode(dedicated.transmission_mode);
                cphy.set_pa(dedicated.pdsch_pa.to_db());
                cphy.set_srs_configuration_index(dedicated.srs_config_index);
            }
            cphy.set_rnti(self.rnti);
            self.saps.cmac[cc].set_rnti(self.rnti);
            info!("imsi={} SCell {} configured on cell {}", self.imsi, cc, id.phys_cell_id);
        }

        if !nce.s_cell_to_add_mod_list.is_empty() {
            self.fire(UeRrcEvent::SCarrierConfigured { cc_count: nce.s_cell_to_add_mod_list.len() });
        }
        Ok(())
    }

    /// Tear down the connection and restart cell search on the last carrier
    fn leave_connected_mode(&mut self) -> Result<(), RrcError> {
        info!("imsi={} leaving connected mode", self.imsi);
        self.leaving_connected_mode = true;
        self.meas.store_mut().clear();
        self.reset_rlf_params();
        self.meas.clear_meas_ids();
        for cmac in self.saps.cmac.iter_mut() {
            cmac.reset();
        }
        self.bearers.clear_drbs();
        self.bearers.take_srb1();
        self.has_received_mib = false;
        self.sib1 = None;
        self.sib2 = None;
        for cphy in self.saps.cphy.iter_mut() {
            cphy.reset_phy_after_rlf();
        }

        self.previous_cell_id = self.cell_id;
        self.cell_id = None;
        self.rnti = Rnti(0);
        self.bearers.set_srb0_rnti(self.rnti);

        self.switch_to_state(UeRrcState::IdleStart)?;
        let dl_earfcn = self.dl_earfcn;
        self.start_cell_selection(dl_earfcn)?;
        self.leaving_connected_mode = false;
        Ok(())
    }

    fn reset_rlf_params(&mut self) {
        debug!("imsi={} resetting radio link failure parameters", self.imsi);
        self.timers.cancel(&mut self.t310);
        self.no_of_sync_indications = 0;
        self.saps.cphy[0].reset_rlf_params();
    }

    /// Serving cells of every component carrier as seen by triggering
    fn serving_context(&self) -> ServingContext {
        let carriers = self
            .saps
            .cphy
            .iter()
            .enumerate()
            .map(|(cc, cphy)| {
                if cc == 0 {
                    CarrierState { cell_id: self.cell_id, dl_earfcn: self.dl_earfcn }
                } else {
                    CarrierState { cell_id: cphy.cell_id(), dl_earfcn: cphy.dl_earfcn() }
                }
            })
            .collect();
        ServingContext { pcell: self.cell_id, carriers }
    }

    fn flush_measurement_reports(&mut self) {
        for report in self.meas.take_outbox() {
            debug!("imsi={} sending measurement report for measId {}", self.imsi, report.meas_results.meas_id);
            self.saps.rrc_sap_user.send_measurement_report(report);
        }
    }

    fn check_cc(&self, cc: ComponentCarrierId) -> Result<usize, RrcError> {
        let index = usize::from(cc);
        if index >= self.saps.cphy.len() {
            return Err(RrcError::ProtocolViolation(format!("unknown component carrier {}", cc)));
        }
        Ok(index)
    }

    fn check_scell_index(&self, index: u8) -> Result<usize, RrcError> {
        match self.check_cc(index)? {
            0 => Err(RrcError::ProtocolViolation("SCell index 0 is the PCell".into())),
            cc => Ok(cc),
        }
    }

    fn invalid_state(&self, procedure: &'static str) -> RrcError {
        RrcError::InvalidState { procedure, state: self.state }
    }

    fn fire(&mut self, event: UeRrcEvent) {
        if self.trace_listeners.is_empty() {
            return;
        }
        let record = UeRrcTrace {
            time: self.timers.now(),
            imsi: self.imsi,
            cell_id: self.cell_id,
            rnti: self.rnti,
            event,
        };
        self.trace_listeners.fire(&record);
    }
}

impl std::fmt::Debug for LteUeRrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LteUeRrc")
            .field("imsi", &self.imsi)
            .field("state", &self.state)
            .field("cell_id", &self.cell_id)
            .field("rnti", &self.rnti)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrc::test_support::*;
    use common::dbm_to_rsrp_range;
    use interfaces::*;
    use std::time::Duration;

    fn handover_command(target: u16) -> RrcConnectionReconfiguration {
        RrcConnectionReconfiguration {
            rrc_transaction_identifier: 3,
            mobility_control_info: Some(MobilityControlInfo {
                target_phys_cell_id: CellId(target),
                carrier_freq: Some(CarrierFreqEutra { dl_carrier_freq: DL_EARFCN, ul_carrier_freq: UL_EARFCN }),
                carrier_bandwidth: Some(CarrierBandwidthEutra { dl_bandwidth: 25, ul_bandwidth: 25 }),
                new_ue_identity: Rnti(77),
                rach_config_common: None,
                rach_config_dedicated: Some(RachConfigDedicated { ra_preamble_index: 5, ra_prach_mask_index: 0 }),
            }),
            radio_resource_config_dedicated: Some(setup_config(&[])),
            ..Default::default()
        }
    }

    fn reconfigure(h: &Harness, mc: MeasConfig) {
        h.rrc
            .borrow_mut()
            .recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration {
                rrc_transaction_identifier: 1,
                meas_config: Some(mc),
                ..Default::default()
            })
            .unwrap();
    }

    fn a1(time_to_trigger: u16) -> ReportConfigEutra {
        // -80 dBm threshold, 1 dB hysteresis
        ReportConfigEutra {
            event_id: EventType::A1,
            threshold1: ThresholdEutra::Rsrp(60),
            hysteresis: 2,
            time_to_trigger,
            ..Default::default()
        }
    }

    #[test]
    fn test_attach_end_to_end() {
        let h = Harness::new();
        let rrc = &h.rrc;

        rrc.borrow_mut().start_cell_selection(2_100_000).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCellSearch);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::StartCellSearch(2_100_000)));

        h.measure(&[(5, -70.0)]);
        assert_eq!(h.state(), UeRrcState::IdleWaitMibSib1);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::Synchronize(CellId(5), 2_100_000)));

        rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleWaitSib1);

        // q-RxLevMin -100 dBm leaves a 30 dB margin
        rrc.borrow_mut().recv_system_information_block_type1(0, sib1(5, -50, None)).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert_eq!(rrc.borrow().cell_id(), Some(CellId(5)));
        assert!(h.traces.borrow().contains(&UeRrcEvent::InitialCellSelectionEndOk));

        rrc.borrow_mut().connect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleWaitSib2);

        rrc.borrow_mut().recv_system_information(sib2(4)).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleRandomAccess);
        assert!(h.mac_calls[0].borrow().contains(&MacCall::StartContentionBasedRandomAccess));
        assert_eq!(rrc.borrow().ul_earfcn(), UL_EARFCN);

        rrc.borrow_mut().set_temporary_cell_rnti(Rnti(61));
        rrc.borrow_mut().notify_random_access_successful().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleConnecting);
        assert!(rrc.borrow().is_t300_running());
        assert_eq!(
            h.sent_count(|m| *m == SentMessage::ConnectionRequest(RrcConnectionRequest { ue_identity: Imsi(1001) })),
            1
        );

        rrc.borrow_mut()
            .recv_rrc_connection_setup(RrcConnectionSetup {
                rrc_transaction_identifier: 2,
                radio_resource_config_dedicated: setup_config(&[drb(1, 5, 3)]),
            })
            .unwrap();
        assert_eq!(h.state(), UeRrcState::ConnectedNormally);
        assert!(!rrc.borrow().is_t300_running());
        assert!(rrc.borrow().has_srb1());
        assert_eq!(rrc.borrow().drb_count(), 1);
        assert_eq!(
            h.sent_count(|m| matches!(m, SentMessage::SetupCompleted(c) if c.rrc_transaction_identifier == 2)),
            1
        );
        assert_eq!(*h.nas.borrow(), vec![NasEvent::ConnectionSuccessful]);
        let mac = h.mac_calls[0].borrow();
        assert!(mac.contains(&MacCall::AddLc(0)));
        assert!(mac.contains(&MacCall::AddLc(1)));
        assert!(mac.contains(&MacCall::AddLc(3)));
        drop(mac);

        // the cancelled T300 never fires
        h.advance(Duration::from_millis(500));
        assert_eq!(h.state(), UeRrcState::ConnectedNormally);
    }

    #[test]
    fn test_camped_connect_with_cached_sib2() {
        let h = Harness::new();
        h.camp(5, -70.0);
        h.rrc.borrow_mut().recv_system_information(sib2(4)).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);

        h.rrc.borrow_mut().connect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleRandomAccess);
        let states = h.states();
        assert_eq!(
            states[states.len() - 2..],
            [UeRrcState::IdleWaitSib2, UeRrcState::IdleRandomAccess]
        );
    }

    #[test]
    fn test_connect_before_camping_is_pending() {
        let h = Harness::new();
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        h.rrc.borrow_mut().connect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCellSearch);

        h.measure(&[(5, -70.0)]);
        h.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        h.rrc.borrow_mut().recv_system_information_block_type1(0, sib1(5, -50, None)).unwrap();

        // camping re-enters WAIT_SIB2 straight away
        assert_eq!(h.state(), UeRrcState::IdleWaitSib2);
        assert!(h.states().contains(&UeRrcState::IdleCampedNormally));
    }

    #[test]
    fn test_rejected_csg_cell_never_reselected() {
        let h = Harness::new();
        h.rrc.borrow_mut().set_csg_white_list(7);
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        h.measure(&[(5, -70.0), (6, -80.0)]);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::Synchronize(CellId(5), DL_EARFCN)));

        h.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        h.rrc.borrow_mut().recv_system_information_block_type1(0, sib1(5, -50, Some(42))).unwrap();
        assert!(h.traces.borrow().contains(&UeRrcEvent::InitialCellSelectionEndError));
        assert_eq!(h.state(), UeRrcState::IdleWaitMibSib1);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::Synchronize(CellId(6), DL_EARFCN)));

        h.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        h.rrc.borrow_mut().recv_system_information_block_type1(0, sib1(6, -50, None)).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert_eq!(h.rrc.borrow().cell_id(), Some(CellId(6)));
    }

    #[test]
    fn test_cell_search_stalls_without_candidates() {
        let h = Harness::new();
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        h.measure(&[(5, -150.0)]);
        assert_eq!(h.state(), UeRrcState::IdleCellSearch);
        assert_eq!(h.scheduler.pending_events(), 0);
    }

    #[test]
    fn test_force_camped() {
        let h = Harness::new();
        h.rrc.borrow_mut().force_camped_on_enb(CellId(9), DL_EARFCN).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleWaitMib);
        h.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert_eq!(h.rrc.borrow().cell_id(), Some(CellId(9)));
        assert_eq!(h.rrc.borrow().dl_bandwidth(), 25);

        let h = Harness::new();
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        let result = h.rrc.borrow_mut().force_camped_on_enb(CellId(9), DL_EARFCN);
        assert!(matches!(result, Err(RrcError::InvalidState { .. })));
    }

    #[test]
    fn test_connection_timeout_retries_then_gives_up() {
        let h = Harness::new();
        h.camp(5, -70.0);
        let attempt = || {
            let mut rrc = h.rrc.borrow_mut();
            rrc.connect().unwrap();
            rrc.recv_system_information(sib2(2)).unwrap();
            rrc.notify_random_access_successful().unwrap();
        };

        attempt();
        assert_eq!(h.state(), UeRrcState::IdleConnecting);
        h.advance(Duration::from_millis(100));
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert_eq!(h.rrc.borrow().conn_est_fail_count(), 1);
        assert!(h.traces.borrow().contains(&UeRrcEvent::ConnectionTimeout { count: 1 }));
        assert!(h.mac_calls[0].borrow().contains(&MacCall::Reset));
        assert_eq!(*h.nas.borrow(), vec![NasEvent::ConnectionFailed]);

        // SIB2 was invalidated, so the retry waits for it again
        h.rrc.borrow_mut().connect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleWaitSib2);
        h.rrc.borrow_mut().recv_system_information(sib2(2)).unwrap();
        h.rrc.borrow_mut().notify_random_access_successful().unwrap();
        h.advance(Duration::from_millis(100));

        assert_eq!(h.state(), UeRrcState::ConnectedPhyProblem);
        assert_eq!(h.rrc.borrow().conn_est_fail_count(), 0);
        assert_eq!(h.nas.borrow().last(), Some(&NasEvent::ConnectionReleased));
    }

    #[test]
    fn test_connection_reject() {
        let h = Harness::new();
        h.camp(5, -70.0);
        {
            let mut rrc = h.rrc.borrow_mut();
            rrc.connect().unwrap();
            rrc.recv_system_information(sib2(4)).unwrap();
            rrc.notify_random_access_successful().unwrap();
            rrc.recv_rrc_connection_reject(RrcConnectionReject { wait_time: 1 }).unwrap();
        }
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert!(!h.rrc.borrow().is_t300_running());
        assert_eq!(*h.nas.borrow(), vec![NasEvent::ConnectionFailed]);

        h.rrc.borrow_mut().connect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleWaitSib2);
    }

    #[test]
    fn test_random_access_failure_returns_to_camped() {
        let h = Harness::new();
        h.camp(5, -70.0);
        h.rrc.borrow_mut().connect().unwrap();
        h.rrc.borrow_mut().recv_system_information(sib2(4)).unwrap();
        h.rrc.borrow_mut().notify_random_access_failed().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);
        assert_eq!(*h.nas.borrow(), vec![NasEvent::ConnectionFailed]);
        assert!(h.traces.borrow().contains(&UeRrcEvent::RandomAccessError));
    }

    #[test]
    fn test_rlf_recovered_by_in_sync() {
        let h = Harness::connected(5);
        for _ in 0..6 {
            h.rrc.borrow_mut().notify_out_of_sync();
        }
        assert!(h.rrc.borrow().is_t310_running());
        assert_eq!(h.rrc.borrow().sync_indication_count(), 0);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::StartInSyncDetection));

        h.advance(Duration::from_millis(500));
        h.rrc.borrow_mut().notify_in_sync();
        h.rrc.borrow_mut().notify_in_sync();
        assert!(!h.rrc.borrow().is_t310_running());
        assert_eq!(h.rrc.borrow().sync_indication_count(), 0);

        h.advance(Duration::from_secs(2));
        assert_eq!(h.state(), UeRrcState::ConnectedNormally);
        assert!(!h.traces.borrow().contains(&UeRrcEvent::RadioLinkFailure));
    }

    #[test]
    fn test_rlf_detected_and_recovered_by_disconnect() {
        let h = Harness::connected(5);
        for _ in 0..6 {
            h.rrc.borrow_mut().notify_out_of_sync();
        }
        h.advance(Duration::from_millis(1000));
        assert_eq!(h.state(), UeRrcState::ConnectedPhyProblem);
        assert_eq!(h.nas.borrow().last(), Some(&NasEvent::ConnectionReleased));
        assert_eq!(h.sent_count(|m| *m == SentMessage::UeContextRemoveRequest(Rnti(61))), 1);

        h.rrc.borrow_mut().disconnect().unwrap();
        let rrc = h.rrc.borrow();
        assert_eq!(rrc.state(), UeRrcState::IdleCellSearch);
        assert_eq!(rrc.previous_cell_id(), Some(CellId(5)));
        assert_eq!(rrc.cell_id(), None);
        assert_eq!(rrc.rnti(), Rnti(0));
        assert!(!rrc.has_srb1());
        assert_eq!(rrc.drb_count(), 0);
        assert!(rrc.stored_measurement(CellId(5)).is_none());
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::ResetAfterRlf));
        assert!(h.states().contains(&UeRrcState::IdleStart));
    }

    #[test]
    fn test_disconnect_by_state() {
        let h = Harness::new();
        h.camp(5, -70.0);
        assert!(h.rrc.borrow_mut().disconnect().is_ok());
        assert_eq!(h.state(), UeRrcState::IdleCampedNormally);

        h.rrc.borrow_mut().connect().unwrap();
        h.rrc.borrow_mut().recv_system_information(sib2(4)).unwrap();
        let result = h.rrc.borrow_mut().disconnect();
        assert_eq!(
            result,
            Err(RrcError::InvalidState { procedure: "disconnect", state: UeRrcState::IdleRandomAccess })
        );

        let h = Harness::connected(5);
        h.rrc.borrow_mut().disconnect().unwrap();
        assert_eq!(h.state(), UeRrcState::IdleCellSearch);
        let searches = h.phy_calls[0]
            .borrow()
            .iter()
            .filter(|c| **c == PhyCall::StartCellSearch(DL_EARFCN))
            .count();
        assert_eq!(searches, 2);
    }

    #[test]
    fn test_illegal_states_are_fatal() {
        let h = Harness::new();
        let mut rrc = h.rrc.borrow_mut();
        assert!(rrc.notify_random_access_successful().is_err());
        assert!(rrc.notify_random_access_failed().is_err());
        assert!(rrc
            .recv_rrc_connection_setup(RrcConnectionSetup {
                rrc_transaction_identifier: 0,
                radio_resource_config_dedicated: setup_config(&[]),
            })
            .is_err());
        assert!(rrc.recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration::default()).is_err());
        assert!(rrc
            .recv_rrc_connection_reestablishment_reject(RrcConnectionReestablishmentReject {})
            .is_err());
        rrc.start_cell_selection(DL_EARFCN).unwrap();
        assert!(matches!(
            rrc.start_cell_selection(DL_EARFCN),
            Err(RrcError::InvalidState { state: UeRrcState::IdleCellSearch, .. })
        ));
        assert!(rrc.recv_rrc_connection_release(RrcConnectionRelease { rrc_transaction_identifier: 0 }).is_ok());
    }

    #[test]
    fn test_malformed_broadcast_is_fatal() {
        let h = Harness::new();
        let mut rrc = h.rrc.borrow_mut();
        let bad_mib = MasterInformationBlock { dl_bandwidth: 24, system_frame_number: 0 };
        assert!(matches!(rrc.recv_master_information_block(0, bad_mib), Err(RrcError::ProtocolViolation(_))));
        assert!(rrc.recv_master_information_block(3, mib()).is_err());
        drop(rrc);

        h.camp(5, -70.0);
        let result = h.rrc.borrow_mut().recv_system_information(sib2(5));
        assert!(matches!(result, Err(RrcError::ProtocolViolation(_))));

        let h = Harness::new();
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        h.measure(&[(5, -70.0)]);
        h.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        let result = h.rrc.borrow_mut().recv_system_information_block_type1(0, sib1(8, -50, None));
        assert!(matches!(result, Err(RrcError::ProtocolViolation(_))));
    }

    #[test]
    fn test_l3_filter_only_when_connected() {
        let h = Harness::new();
        h.camp(5, -80.0);
        h.measure(&[(5, -90.0)]);
        // idle mode replaces the stored value
        assert_eq!(h.rrc.borrow().stored_measurement(CellId(5)).map(|v| v.rsrp), Some(-90.0));

        h.measure(&[(5, -80.0)]);
        h.connect(setup_config(&[]));
        h.measure(&[(5, -70.0)]);
        let stored = h.rrc.borrow().stored_measurement(CellId(5)).unwrap();
        assert!((stored.rsrp - (-75.0)).abs() < 1e-9);
        assert_eq!(stored.carrier_freq, DL_EARFCN);
        assert!(h
            .traces
            .borrow()
            .contains(&UeRrcEvent::RsrpMeasurement { rsrp: -75.0, is_serving: true, cc: 0 }));
    }

    #[test]
    fn test_a1_round_trip() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a1(0)));
        assert_eq!(
            h.sent_count(|m| matches!(m, SentMessage::ReconfigurationCompleted(c) if c.rrc_transaction_identifier == 1)),
            1
        );
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::FilterCoefficient(0)));

        h.measure(&[(5, -70.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(5)]));
        h.advance(Duration::from_micros(1));
        assert_eq!(h.measurement_reports().len(), 1);

        // entering again while triggered changes nothing
        h.measure(&[(5, -70.0)]);
        h.advance(Duration::from_millis(1));
        assert_eq!(h.measurement_reports().len(), 1);

        h.measure(&[(5, -85.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), None);
        h.advance(Duration::from_secs(2));
        assert_eq!(h.measurement_reports().len(), 1);
        assert_eq!(h.measurement_reports()[0].meas_results.meas_id, 1);
    }

    #[test]
    fn test_time_to_trigger_cancelled_at_half() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a1(640)));

        h.measure(&[(5, -70.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_entering_triggers(1), 1);
        h.advance(Duration::from_millis(320));
        h.measure(&[(5, -85.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_entering_triggers(1), 0);

        h.advance(Duration::from_secs(2));
        assert_eq!(h.rrc.borrow().triggered_cells(1), None);
        assert!(h.measurement_reports().is_empty());
    }

    #[test]
    fn test_time_to_trigger_elapses() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a1(640)));

        h.measure(&[(5, -70.0)]);
        h.advance(Duration::from_millis(320));
        h.measure(&[(5, -70.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_entering_triggers(1), 1);
        h.advance(Duration::from_millis(320));
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(5)]));
        h.advance(Duration::from_micros(1));
        assert_eq!(h.measurement_reports().len(), 1);
    }

    #[test]
    fn test_a3_periodic_reports() {
        let h = Harness::connected(5);
        reconfigure(
            &h,
            meas_config(ReportConfigEutra { event_id: EventType::A3, ..Default::default() }),
        );

        h.measure(&[(5, -80.0), (7, -70.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(7)]));
        h.advance(Duration::from_micros(1));
        h.advance(Duration::from_millis(480));

        let reports = h.measurement_reports();
        assert_eq!(reports.len(), 2);
        let results = &reports[0].meas_results;
        assert_eq!(results.rsrp_result, dbm_to_rsrp_range(-80.0));
        assert_eq!(results.meas_result_list_eutra.len(), 1);
        assert_eq!(results.meas_result_list_eutra[0].phys_cell_id, CellId(7));
    }

    fn a3(time_to_trigger: u16, report_on_leave: bool) -> ReportConfigEutra {
        ReportConfigEutra { event_id: EventType::A3, time_to_trigger, report_on_leave, ..Default::default() }
    }

    #[test]
    fn test_a3_leaving_cancelled_at_half() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a3(640, false)));

        h.measure(&[(5, -80.0), (7, -70.0)]);
        h.advance(Duration::from_millis(640));
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(7)]));

        h.measure(&[(5, -70.0), (7, -80.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_leaving_triggers(1), 1);
        h.advance(Duration::from_millis(320));
        h.measure(&[(5, -80.0), (7, -70.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_leaving_triggers(1), 0);

        h.advance(Duration::from_secs(2));
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(7)]));
    }

    #[test]
    fn test_a3_report_on_leave() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a3(40, true)));

        h.measure(&[(5, -80.0), (7, -70.0)]);
        h.advance(Duration::from_millis(40));
        h.advance(Duration::from_micros(1));
        assert_eq!(h.measurement_reports().len(), 1);

        h.measure(&[(5, -70.0), (7, -80.0)]);
        h.advance(Duration::from_millis(40));
        assert_eq!(h.rrc.borrow().triggered_cells(1), None);
        let reports = h.measurement_reports();
        assert_eq!(reports.len(), 2);
        assert!(reports[1].meas_results.meas_result_list_eutra.is_empty());

        // the entry is gone, so no periodic report follows
        h.advance(Duration::from_secs(2));
        assert_eq!(h.measurement_reports().len(), 2);
    }

    #[test]
    fn test_a5_leaves_when_pcell_recovers() {
        let h = Harness::connected(5);
        // thresh1 -100 dBm, thresh2 -90 dBm
        reconfigure(
            &h,
            meas_config(ReportConfigEutra {
                event_id: EventType::A5,
                threshold1: ThresholdEutra::Rsrp(40),
                threshold2: ThresholdEutra::Rsrp(50),
                time_to_trigger: 40,
                ..Default::default()
            }),
        );

        h.measure(&[(5, -105.0), (7, -85.0)]);
        h.advance(Duration::from_millis(40));
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(7)]));
        h.advance(Duration::from_micros(1));
        assert_eq!(h.measurement_reports().len(), 1);

        // neighbour still above thresh2
        h.measure(&[(5, -80.0), (7, -85.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_leaving_triggers(1), 1);
        h.advance(Duration::from_millis(40));
        assert_eq!(h.rrc.borrow().triggered_cells(1), None);

        for _ in 0..10 {
            h.measure(&[(5, -80.0), (7, -85.0)]);
            h.advance(Duration::from_millis(200));
        }
        assert_eq!(h.rrc.borrow().triggered_cells(1), None);
        assert_eq!(h.measurement_reports().len(), 1);
    }

    #[test]
    fn test_a5_leaving_restarts_while_pcell_degraded() {
        let h = Harness::connected(5);
        reconfigure(
            &h,
            meas_config(ReportConfigEutra {
                event_id: EventType::A5,
                threshold1: ThresholdEutra::Rsrp(40),
                threshold2: ThresholdEutra::Rsrp(50),
                time_to_trigger: 40,
                ..Default::default()
            }),
        );
        h.measure(&[(5, -105.0), (7, -85.0)]);
        h.advance(Duration::from_millis(40));

        // PCell recovers, then degrades again before the delay elapses
        h.measure(&[(5, -80.0), (7, -85.0)]);
        h.advance(Duration::from_millis(20));
        h.measure(&[(5, -105.0), (7, -85.0)]);
        assert_eq!(h.rrc.borrow().measurements().pending_leaving_triggers(1), 0);
        h.advance(Duration::from_millis(100));
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(7)]));
    }

    #[test]
    fn test_removed_meas_id_never_reports() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a1(0)));
        h.measure(&[(5, -70.0)]);
        assert!(h.rrc.borrow().triggered_cells(1).is_some());

        reconfigure(&h, MeasConfig { meas_id_to_remove_list: vec![1], ..Default::default() });
        h.advance(Duration::from_secs(2));
        assert!(h.measurement_reports().is_empty());
    }

    #[test]
    fn test_unsupported_meas_config_is_fatal() {
        let h = Harness::connected(5);
        let result = h.rrc.borrow_mut().recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration {
            meas_config: Some(MeasConfig { s_measure: Some(20), ..Default::default() }),
            ..Default::default()
        });
        assert!(matches!(result, Err(RrcError::Unsupported(_))));
    }

    #[test]
    fn test_handover_replaces_bearers() {
        let h = Harness::connected(5);
        assert_eq!(h.rrc.borrow().drb_count(), 1);

        h.rrc.borrow_mut().recv_rrc_connection_reconfiguration(handover_command(7)).unwrap();
        {
            let rrc = h.rrc.borrow();
            assert_eq!(rrc.state(), UeRrcState::ConnectedHandover);
            assert_eq!(rrc.drb_count(), 0);
            assert!(rrc.has_srb1());
            assert_eq!(rrc.rnti(), Rnti(77));
            assert_eq!(rrc.cell_id(), Some(CellId(7)));
            assert_eq!(rrc.previous_cell_id(), Some(CellId(5)));
        }
        assert_eq!(h.sent_count(|m| matches!(m, SentMessage::ReconfigurationCompleted(_))), 0);
        assert!(h.mac_calls[0]
            .borrow()
            .contains(&MacCall::StartNonContentionBasedRandomAccess { rnti: Rnti(77), preamble_id: 5 }));

        // the new SRB1 is created after the handover started
        let traces = h.traces.borrow().clone();
        let start = traces
            .iter()
            .position(|e| *e == UeRrcEvent::HandoverStart { target: CellId(7) })
            .unwrap();
        assert_eq!(traces[start..].iter().filter(|e| **e == UeRrcEvent::Srb1Created).count(), 1);

        h.rrc.borrow_mut().notify_random_access_successful().unwrap();
        assert_eq!(h.state(), UeRrcState::ConnectedNormally);
        assert_eq!(
            h.sent_count(|m| matches!(m, SentMessage::ReconfigurationCompleted(c) if c.rrc_transaction_identifier == 3)),
            1
        );
        assert!(h.traces.borrow().contains(&UeRrcEvent::HandoverEndOk));
    }

    #[test]
    fn test_measurements_during_handover() {
        let h = Harness::connected(5);
        reconfigure(&h, meas_config(a1(0)));
        h.measure(&[(5, -70.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(5)]));

        h.rrc.borrow_mut().recv_rrc_connection_reconfiguration(handover_command(7)).unwrap();
        h.measure(&[(7, -70.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(5), CellId(7)]));

        // triggered target is not entered twice
        h.measure(&[(7, -70.0)]);
        assert_eq!(h.rrc.borrow().triggered_cells(1), Some(vec![CellId(5), CellId(7)]));
    }

    #[test]
    fn test_handover_failure_only_traced() {
        let h = Harness::connected(5);
        h.rrc.borrow_mut().recv_rrc_connection_reconfiguration(handover_command(7)).unwrap();
        h.rrc.borrow_mut().notify_random_access_failed().unwrap();
        assert_eq!(h.state(), UeRrcState::ConnectedHandover);
        assert!(h.traces.borrow().contains(&UeRrcEvent::HandoverEndError));
    }

    #[test]
    fn test_reconfiguration_adds_and_releases_drbs() {
        let h = Harness::connected(5);
        let rrcd = RadioResourceConfigDedicated {
            drb_to_add_mod_list: vec![drb(2, 6, 4)],
            drb_to_release_list: vec![1],
            ..Default::default()
        };
        h.rrc
            .borrow_mut()
            .recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration {
                rrc_transaction_identifier: 4,
                radio_resource_config_dedicated: Some(rrcd),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(h.rrc.borrow().drb_count(), 1);
        assert!(h.mac_calls[0].borrow().contains(&MacCall::RemoveLc(3)));
        assert!(h.mac_calls[0].borrow().contains(&MacCall::AddLc(4)));
        assert!(h.traces.borrow().contains(&UeRrcEvent::ConnectionReconfiguration));

        let release_unknown = RrcConnectionReconfiguration {
            radio_resource_config_dedicated: Some(RadioResourceConfigDedicated {
                drb_to_release_list: vec![9],
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = h.rrc.borrow_mut().recv_rrc_connection_reconfiguration(release_unknown);
        assert_eq!(result, Err(RrcError::MissingBearer(9)));
    }

    #[test]
    fn test_data_plane() {
        let h = Harness::connected(5);
        h.rrc.borrow_mut().send_data(Bytes::from_static(b"ip"), 5).unwrap();
        h.rrc.borrow_mut().send_data(Bytes::from_static(b"ip"), 9).unwrap();
        {
            let pdus = h.pdus.borrow();
            assert_eq!(pdus.len(), 1);
            assert_eq!((pdus[0].lcid, pdus[0].rnti, pdus[0].pdu.len()), (3, Rnti(61), 6));
        }

        // RLC AM header, PDCP data header, payload
        let pdu = Bytes::from_static(&[0x80, 0x00, 0x80, 0x00, b'i', b'p']);
        h.rrc.borrow_mut().receive_pdu(3, pdu).unwrap();
        assert_eq!(h.nas.borrow().last(), Some(&NasEvent::Data(Bytes::from_static(b"ip"))));
        assert!(h.rrc.borrow_mut().receive_pdu(4, Bytes::from_static(b"x")).is_err());
    }

    #[test]
    fn test_secondary_cell_configuration() {
        let h = Harness::with_config(UeRrcConfig {
            imsi: Imsi(1001),
            number_of_component_carriers: 2,
            ..Default::default()
        });
        h.camp(5, -70.0);
        h.connect(setup_config(&[]));

        let scell = SCellToAddMod {
            s_cell_index: 1,
            cell_identification: CellIdentification { phys_cell_id: CellId(9), dl_carrier_freq: 300 },
            radio_resource_config_common_scell: RadioResourceConfigCommonSCell {
                dl_bandwidth: 50,
                ul_carrier_freq: 18300,
                ul_bandwidth: 50,
                reference_signal_power: 15,
            },
            radio_resource_config_dedicated_scell: None,
        };
        h.rrc
            .borrow_mut()
            .recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration {
                non_critical_extension: Some(NonCriticalExtensionConfiguration {
                    s_cell_to_add_mod_list: vec![scell],
                    s_cell_to_release_list: Vec::new(),
                }),
                ..Default::default()
            })
            .unwrap();
        assert!(h.phy_calls[1].borrow().contains(&PhyCall::Synchronize(CellId(9), 300)));
        assert!(h.mac_calls[1].borrow().contains(&MacCall::SetRnti(Rnti(61))));
        assert!(h.traces.borrow().contains(&UeRrcEvent::SCarrierConfigured { cc_count: 1 }));

        h.measure_cc(1, &[(9, -80.0)]);
        assert_eq!(h.rrc.borrow().stored_measurement(CellId(9)).map(|v| v.carrier_freq), Some(300));

        h.rrc
            .borrow_mut()
            .recv_rrc_connection_reconfiguration(RrcConnectionReconfiguration {
                non_critical_extension: Some(NonCriticalExtensionConfiguration {
                    s_cell_to_add_mod_list: Vec::new(),
                    s_cell_to_release_list: vec![1],
                }),
                ..Default::default()
            })
            .unwrap();
        assert!(h.phy_calls[1].borrow().contains(&PhyCall::Reset));
        assert!(h.mac_calls[1].borrow().contains(&MacCall::Reset));
    }

    #[test]
    fn test_secondary_carrier_measurements_drive_cell_search() {
        let h = Harness::with_config(UeRrcConfig {
            imsi: Imsi(1001),
            number_of_component_carriers: 2,
            ..Default::default()
        });
        h.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        h.measure_cc(1, &[(9, -75.0)]);
        assert_eq!(h.state(), UeRrcState::IdleWaitMibSib1);
        assert!(h.phy_calls[0].borrow().contains(&PhyCall::Synchronize(CellId(9), DL_EARFCN)));
    }

    #[test]
    fn test_sap_count_must_match_carriers() {
        let scheduler = Rc::new(Scheduler::new());
        let saps = UeRrcSaps {
            cmac: Vec::new(),
            cphy: Vec::new(),
            mac: Box::new(NoopMac),
            rrc_sap_user: Box::new(NoopRrcSapUser),
            as_sap_user: Box::new(NoopAsSapUser),
        };
        let result = LteUeRrc::new(UeRrcConfig::default(), saps, scheduler);
        assert!(matches!(result, Err(RrcError::InvalidConfiguration(_))));
    }

    struct NoopMac;

    impl MacSapProvider for NoopMac {
        fn transmit_pdu(&mut self, _params: TransmitPduParameters) {}
    }

    struct NoopRrcSapUser;

    impl RrcSapUser for NoopRrcSapUser {
        fn setup(&mut self, _params: SetupParameters) {}
        fn send_rrc_connection_request(&mut self, _msg: RrcConnectionRequest) {}
        fn send_rrc_connection_setup_completed(&mut self, _msg: RrcConnectionSetupCompleted) {}
        fn send_rrc_connection_reconfiguration_completed(&mut self, _msg: RrcConnectionReconfigurationCompleted) {}
        fn send_measurement_report(&mut self, _msg: MeasurementReport) {}
        fn send_ideal_ue_context_remove_request(&mut self, _rnti: Rnti) {}
    }

    struct NoopAsSapUser;

    impl AsSapUser for NoopAsSapUser {
        fn notify_connection_successful(&mut self) {}
        fn notify_connection_failed(&mut self) {}
        fn notify_connection_released(&mut self) {}
        fn recv_data(&mut self, _packet: Bytes) {}
    }
}
