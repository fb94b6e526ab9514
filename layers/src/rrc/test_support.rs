//! Recording SAP doubles and a harness driving one RRC instance

use super::{LteUeRrc, UeRrcConfig, UeRrcEvent, UeRrcSaps, UeRrcState, UeRrcTrace};
use bytes::Bytes;
use common::{CellId, Earfcn, Imsi, Rnti, Scheduler};
use interfaces::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub const DL_EARFCN: Earfcn = 100;
pub const UL_EARFCN: Earfcn = 18100;

#[derive(Debug, Clone, PartialEq)]
pub enum MacCall {
    ConfigureRach(RachConfig),
    StartContentionBasedRandomAccess,
    StartNonContentionBasedRandomAccess { rnti: Rnti, preamble_id: u8 },
    AddLc(u8),
    RemoveLc(u8),
    Reset,
    SetRnti(Rnti),
    NotifyConnectionSuccessful,
}

pub struct MockCmac {
    calls: Log<MacCall>,
}

impl UeCmacSapProvider for MockCmac {
    fn configure_rach(&mut self, config: RachConfig) {
        self.calls.borrow_mut().push(MacCall::ConfigureRach(config));
    }

    fn start_contention_based_random_access(&mut self) {
        self.calls.borrow_mut().push(MacCall::StartContentionBasedRandomAccess);
    }

    fn start_non_contention_based_random_access(&mut self, rnti: Rnti, preamble_id: u8, _prach_mask: u8) {
        self.calls
            .borrow_mut()
            .push(MacCall::StartNonContentionBasedRandomAccess { rnti, preamble_id });
    }

    fn add_lc(&mut self, lcid: u8, _config: LogicalChannelConfig) {
        self.calls.borrow_mut().push(MacCall::AddLc(lcid));
    }

    fn remove_lc(&mut self, lcid: u8) {
        self.calls.borrow_mut().push(MacCall::RemoveLc(lcid));
    }

    fn reset(&mut self) {
        self.calls.borrow_mut().push(MacCall::Reset);
    }

    fn set_rnti(&mut self, rnti: Rnti) {
        self.calls.borrow_mut().push(MacCall::SetRnti(rnti));
    }

    fn notify_connection_successful(&mut self) {
        self.calls.borrow_mut().push(MacCall::NotifyConnectionSuccessful);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhyCall {
    Reset,
    StartCellSearch(Earfcn),
    Synchronize(CellId, Earfcn),
    SetDlBandwidth(u16),
    ConfigureUplink(Earfcn, u16),
    ReferenceSignalPower(i8),
    SetRnti(Rnti),
    TransmissionMode(u8),
    SrsConfigurationIndex(u16),
    Pa(f64),
    FilterCoefficient(u8),
    ResetAfterRlf,
    ResetRlfParams,
    StartInSyncDetection,
}

pub struct MockCphy {
    calls: Log<PhyCall>,
    cell_id: Option<CellId>,
    dl_earfcn: Earfcn,
}

impl UeCphySapProvider for MockCphy {
    fn reset(&mut self) {
        self.cell_id = None;
        self.calls.borrow_mut().push(PhyCall::Reset);
    }

    fn start_cell_search(&mut self, dl_earfcn: Earfcn) {
        self.cell_id = None;
        self.dl_earfcn = dl_earfcn;
        self.calls.borrow_mut().push(PhyCall::StartCellSearch(dl_earfcn));
    }

    fn synchronize_with_enb(&mut self, cell_id: CellId, dl_earfcn: Earfcn) {
        self.cell_id = Some(cell_id);
        self.dl_earfcn = dl_earfcn;
        self.calls.borrow_mut().push(PhyCall::Synchronize(cell_id, dl_earfcn));
    }

    fn cell_id(&self) -> Option<CellId> {
        self.cell_id
    }

    fn dl_earfcn(&self) -> Earfcn {
        self.dl_earfcn
    }

    fn set_dl_bandwidth(&mut self, dl_bandwidth: u16) {
        self.calls.borrow_mut().push(PhyCall::SetDlBandwidth(dl_bandwidth));
    }

    fn configure_uplink(&mut self, ul_earfcn: Earfcn, ul_bandwidth: u16) {
        self.calls.borrow_mut().push(PhyCall::ConfigureUplink(ul_earfcn, ul_bandwidth));
    }

    fn configure_reference_signal_power(&mut self, reference_signal_power: i8) {
        self.calls
            .borrow_mut()
            .push(PhyCall::ReferenceSignalPower(reference_signal_power));
    }

    fn set_rnti(&mut self, rnti: Rnti) {
        self.calls.borrow_mut().push(PhyCall::SetRnti(rnti));
    }

    fn set_transmission_mode(&mut self, transmission_mode: u8) {
        self.calls.borrow_mut().push(PhyCall::TransmissionMode(transmission_mode));
    }

    fn set_srs_configuration_index(&mut self, srs_config_index: u16) {
        self.calls.borrow_mut().push(PhyCall::SrsConfigurationIndex(srs_config_index));
    }

    fn set_pa(&mut self, pa: f64) {
        self.calls.borrow_mut().push(PhyCall::Pa(pa));
    }

    fn set_rsrp_filter_coefficient(&mut self, filter_coefficient: u8) {
        self.calls.borrow_mut().push(PhyCall::FilterCoefficient(filter_coefficient));
    }

    fn reset_phy_after_rlf(&mut self) {
        self.cell_id = None;
        self.calls.borrow_mut().push(PhyCall::ResetAfterRlf);
    }

    fn reset_rlf_params(&mut self) {
        self.calls.borrow_mut().push(PhyCall::ResetRlfParams);
    }

    fn start_in_sync_detection(&mut self) {
        self.calls.borrow_mut().push(PhyCall::StartInSyncDetection);
    }
}

pub struct MockMac {
    pdus: Log<TransmitPduParameters>,
}

impl MacSapProvider for MockMac {
    fn transmit_pdu(&mut self, params: TransmitPduParameters) {
        self.pdus.borrow_mut().push(params);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Setup(SetupParameters),
    ConnectionRequest(RrcConnectionRequest),
    SetupCompleted(RrcConnectionSetupCompleted),
    ReconfigurationCompleted(RrcConnectionReconfigurationCompleted),
    MeasurementReport(MeasurementReport),
    UeContextRemoveRequest(Rnti),
}

pub struct MockRrcSapUser {
    sent: Log<SentMessage>,
}

impl RrcSapUser for MockRrcSapUser {
    fn setup(&mut self, params: SetupParameters) {
        self.sent.borrow_mut().push(SentMessage::Setup(params));
    }

    fn send_rrc_connection_request(&mut self, msg: RrcConnectionRequest) {
        self.sent.borrow_mut().push(SentMessage::ConnectionRequest(msg));
    }

    fn send_rrc_connection_setup_completed(&mut self, msg: RrcConnectionSetupCompleted) {
        self.sent.borrow_mut().push(SentMessage::SetupCompleted(msg));
    }

    fn send_rrc_connection_reconfiguration_completed(&mut self, msg: RrcConnectionReconfigurationCompleted) {
        self.sent.borrow_mut().push(SentMessage::ReconfigurationCompleted(msg));
    }

    fn send_measurement_report(&mut self, msg: MeasurementReport) {
        self.sent.borrow_mut().push(SentMessage::MeasurementReport(msg));
    }

    fn send_ideal_ue_context_remove_request(&mut self, rnti: Rnti) {
        self.sent.borrow_mut().push(SentMessage::UeContextRemoveRequest(rnti));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NasEvent {
    ConnectionSuccessful,
    ConnectionFailed,
    ConnectionReleased,
    Data(Bytes),
}

pub struct MockAsSapUser {
    events: Log<NasEvent>,
}

impl AsSapUser for MockAsSapUser {
    fn notify_connection_successful(&mut self) {
        self.events.borrow_mut().push(NasEvent::ConnectionSuccessful);
    }

    fn notify_connection_failed(&mut self) {
        self.events.borrow_mut().push(NasEvent::ConnectionFailed);
    }

    fn notify_connection_released(&mut self) {
        self.events.borrow_mut().push(NasEvent::ConnectionReleased);
    }

    fn recv_data(&mut self, packet: Bytes) {
        self.events.borrow_mut().push(NasEvent::Data(packet));
    }
}

/// One RRC wired to recording doubles
pub struct Harness {
    pub scheduler: Rc<Scheduler>,
    pub rrc: Rc<RefCell<LteUeRrc>>,
    pub mac_calls: Vec<Log<MacCall>>,
    pub phy_calls: Vec<Log<PhyCall>>,
    pub pdus: Log<TransmitPduParameters>,
    pub sent: Log<SentMessage>,
    pub nas: Log<NasEvent>,
    pub traces: Log<UeRrcEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(UeRrcConfig { imsi: Imsi(1001), ..Default::default() })
    }

    pub fn with_config(config: UeRrcConfig) -> Self {
        let carriers = usize::from(config.number_of_component_carriers);
        let scheduler = Rc::new(Scheduler::new());
        let mac_calls: Vec<Log<MacCall>> = (0..carriers).map(|_| Log::default()).collect();
        let phy_calls: Vec<Log<PhyCall>> = (0..carriers).map(|_| Log::default()).collect();
        let pdus = Log::default();
        let sent = Log::default();
        let nas = Log::default();
        let traces: Log<UeRrcEvent> = Log::default();

        let saps = UeRrcSaps {
            cmac: mac_calls
                .iter()
                .map(|calls| Box::new(MockCmac { calls: calls.clone() }) as Box<dyn UeCmacSapProvider>)
                .collect(),
            cphy: phy_calls
                .iter()
                .map(|calls| {
                    Box::new(MockCphy { calls: calls.clone(), cell_id: None, dl_earfcn: 0 })
                        as Box<dyn UeCphySapProvider>
                })
                .collect(),
            mac: Box::new(MockMac { pdus: pdus.clone() }),
            rrc_sap_user: Box::new(MockRrcSapUser { sent: sent.clone() }),
            as_sap_user: Box::new(MockAsSapUser { events: nas.clone() }),
        };
        let rrc = LteUeRrc::new(config, saps, scheduler.clone()).unwrap();
        {
            let traces = traces.clone();
            rrc.borrow_mut()
                .add_trace_listener(Box::new(move |rec: &UeRrcTrace| traces.borrow_mut().push(rec.event.clone())));
        }

        Self { scheduler, rrc, mac_calls, phy_calls, pdus, sent, nas, traces }
    }

    pub fn state(&self) -> UeRrcState {
        self.rrc.borrow().state()
    }

    pub fn advance(&self, delta: Duration) {
        self.scheduler.advance(delta).unwrap();
    }

    pub fn measure(&self, cells: &[(u16, f64)]) {
        self.measure_cc(0, cells);
    }

    pub fn measure_cc(&self, cc: u8, cells: &[(u16, f64)]) {
        let params = UeMeasurementsParameters {
            ue_measurements_list: cells
                .iter()
                .map(|(cell, rsrp)| UeMeasurementsElement { cell_id: CellId(*cell), rsrp: *rsrp, rsrq: -10.0 })
                .collect(),
            component_carrier_id: cc,
        };
        self.rrc.borrow_mut().report_ue_measurements(params).unwrap();
    }

    /// Run cell search and selection onto `cell` measured at `rsrp`
    pub fn camp(&self, cell: u16, rsrp: f64) {
        self.rrc.borrow_mut().start_cell_selection(DL_EARFCN).unwrap();
        self.measure(&[(cell, rsrp)]);
        self.rrc.borrow_mut().recv_master_information_block(0, mib()).unwrap();
        self.rrc.borrow_mut().recv_system_information_block_type1(0, sib1(cell, -50, None)).unwrap();
    }

    /// Attach from IDLE_CAMPED_NORMALLY up to CONNECTED_NORMALLY
    pub fn connect(&self, rrcd: RadioResourceConfigDedicated) {
        let mut rrc = self.rrc.borrow_mut();
        rrc.connect().unwrap();
        rrc.recv_system_information(sib2(4)).unwrap();
        rrc.set_temporary_cell_rnti(Rnti(61));
        rrc.notify_random_access_successful().unwrap();
        rrc.recv_rrc_connection_setup(RrcConnectionSetup {
            rrc_transaction_identifier: 0,
            radio_resource_config_dedicated: rrcd,
        })
        .unwrap();
    }

    /// Camp on `cell` and connect with SRB1 and one AM DRB
    pub fn connected(cell: u16) -> Self {
        let h = Self::new();
        h.camp(cell, -70.0);
        h.connect(setup_config(&[drb(1, 5, 3)]));
        h
    }

    pub fn sent_count(&self, pred: impl Fn(&SentMessage) -> bool) -> usize {
        self.sent.borrow().iter().filter(|m| pred(m)).count()
    }

    pub fn measurement_reports(&self) -> Vec<MeasurementReport> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|m| match m {
                SentMessage::MeasurementReport(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<UeRrcState> {
        self.traces
            .borrow()
            .iter()
            .filter_map(|e| match e {
                UeRrcEvent::StateTransition { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }
}

pub fn mib() -> MasterInformationBlock {
    MasterInformationBlock { dl_bandwidth: 25, system_frame_number: 0 }
}

pub fn sib1(cell: u16, q_rx_lev_min: i8, csg: Option<u32>) -> SystemInformationBlockType1 {
    SystemInformationBlockType1 {
        cell_access_related_info: CellAccessRelatedInfo {
            plmn_identity: 1,
            cell_identity: CellId(cell),
            csg_indication: csg.is_some(),
            csg_identity: csg.unwrap_or(0),
        },
        cell_selection_info: CellSelectionInfo { q_rx_lev_min, q_qual_min: 0 },
    }
}

pub fn sib2(conn_est_fail_count: u8) -> SystemInformation {
    SystemInformation {
        sib2: Some(SystemInformationBlockType2 {
            radio_resource_config_common: RadioResourceConfigCommonSib {
                rach_config_common: RachConfigCommon {
                    preamble_info: PreambleInfo { number_of_ra_preambles: 52 },
                    ra_supervision_info: RaSupervisionInfo { preamble_trans_max: 50, ra_response_window_size: 3 },
                    tx_fail_param: TxFailParam { conn_est_fail_count },
                },
                pdsch_config_common: PdschConfigCommon { reference_signal_power: 18, pb: 0 },
            },
            freq_info: FreqInfo { ul_carrier_freq: UL_EARFCN, ul_bandwidth: 25 },
        }),
    }
}

pub fn drb(drb_identity: u8, eps_bearer_identity: u8, lcid: u8) -> DrbToAddMod {
    DrbToAddMod {
        eps_bearer_identity,
        drb_identity,
        rlc_config: RlcConfig::Am,
        logical_channel_identity: lcid,
        logical_channel_config: LogicalChannelConfig {
            priority: 9,
            prioritized_bit_rate_kbps: 0,
            bucket_size_duration_ms: 100,
            logical_channel_group: 3,
        },
    }
}

pub fn setup_config(drbs: &[DrbToAddMod]) -> RadioResourceConfigDedicated {
    RadioResourceConfigDedicated {
        srb_to_add_mod_list: vec![SrbToAddMod {
            srb_identity: 1,
            logical_channel_config: LogicalChannelConfig {
                priority: 1,
                prioritized_bit_rate_kbps: 65535,
                bucket_size_duration_ms: 65535,
                logical_channel_group: 0,
            },
        }],
        drb_to_add_mod_list: drbs.to_vec(),
        drb_to_release_list: Vec::new(),
        physical_config_dedicated: Some(PhysicalConfigDedicated {
            transmission_mode: Some(1),
            srs_config_index: Some(17),
            pdsch_pa: Some(PdschPa::Db0),
        }),
    }
}

/// Single measurement identity on the serving carrier
pub fn meas_config(report: ReportConfigEutra) -> MeasConfig {
    MeasConfig {
        meas_object_to_add_mod_list: vec![MeasObjectToAddMod {
            meas_object_id: 1,
            meas_object_eutra: MeasObjectEutra::new(DL_EARFCN),
        }],
        report_config_to_add_mod_list: vec![ReportConfigToAddMod { report_config_id: 1, report_config_eutra: report }],
        meas_id_to_add_mod_list: vec![MeasIdToAddMod { meas_id: 1, meas_object_id: 1, report_config_id: 1 }],
        // filter coefficient 0 disables smoothing
        quantity_config: Some(QuantityConfig { filter_coefficient_rsrp: 0, filter_coefficient_rsrq: 0 }),
        ..Default::default()
    }
}
