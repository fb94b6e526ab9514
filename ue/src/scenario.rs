//! Scripted single-UE scenarios
//!
//! One [`LteUeRrc`] runs against simulated MAC, PHY, eNodeB and NAS
//! collaborators. The collaborators never call back into the RRC while it is
//! running a handler; every response is scheduled as a future event on the
//! shared virtual-time [`Scheduler`].

use crate::config::{ScenarioConfig, ScenarioKind, UeConfig};
use anyhow::{Context, Result};
use bytes::Bytes;
use common::{CellId, Earfcn, EventError, Rnti, Scheduler};
use interfaces::*;
use layers::rrc::{LteUeRrc, RrcError, UeRrcEvent, UeRrcSaps, UeRrcState, UeRrcTrace};
use layers::LayerError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// EPS bearer carrying the simulated uplink traffic
const DATA_BEARER_ID: u8 = 5;
const DATA_DRB_ID: u8 = 1;
const DATA_LCID: u8 = 3;
const FIRST_RNTI: u16 = 100;

const MIB_DELAY: Duration = Duration::from_millis(10);
const SIB1_DELAY: Duration = Duration::from_millis(20);
const SIB2_PERIOD: Duration = Duration::from_millis(80);
const RANDOM_ACCESS_DELAY: Duration = Duration::from_millis(5);
const ENB_RESPONSE_DELAY: Duration = Duration::from_millis(10);
const LOOPBACK_DELAY: Duration = Duration::from_millis(2);
const OUT_OF_SYNC_PERIOD: Duration = Duration::from_millis(10);
const RECONNECT_DELAY: Duration = Duration::from_millis(10);
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one scenario run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub final_state: Option<UeRrcState>,
    pub elapsed: Duration,
    pub state_transitions: usize,
    pub connections: usize,
    pub measurement_reports: usize,
    pub handovers: usize,
    pub radio_link_failures: usize,
    pub packets_sent: usize,
    pub packets_received: usize,
}

impl Summary {
    pub fn log(&self) {
        info!("Scenario summary after {:?}:", self.elapsed);
        if let Some(state) = self.final_state {
            info!("  Final state: {}", state);
        }
        info!("  State transitions: {}", self.state_transitions);
        info!("  Connections established: {}", self.connections);
        info!("  Measurement reports: {}", self.measurement_reports);
        info!("  Handovers: {}", self.handovers);
        info!("  Radio link failures: {}", self.radio_link_failures);
        info!("  Packets sent/received: {}/{}", self.packets_sent, self.packets_received);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PhyCarrier {
    cell_id: Option<CellId>,
    dl_earfcn: Earfcn,
}

/// State of the simulated radio and network
struct Environment {
    config: ScenarioConfig,
    rng: StdRng,
    phy: Vec<PhyCarrier>,
    measuring: bool,
    /// Bumped on every PHY (re)synchronization; stale broadcasts are dropped
    sync_generation: u64,
    next_rnti: u16,
    transaction_id: u8,
    handover_sent: bool,
    nas_connected: bool,
    /// Bumped on every connection; stale traffic generators stop
    data_generation: u64,
}

impl Environment {
    fn rsrp(&mut self, base: f64, slope: f64, now: Duration) -> f64 {
        let noise = self.config.noise_db;
        let jitter = if noise > 0.0 { self.rng.gen_range(-noise..=noise) } else { 0.0 };
        base + slope * now.as_secs_f64() + jitter
    }

    fn next_transaction_id(&mut self) -> u8 {
        self.transaction_id = (self.transaction_id + 1) % 4;
        self.transaction_id
    }
}

/// Shared simulation context handed to every collaborator
struct Sim {
    /// Weak so that pending events do not keep the scheduler alive
    scheduler: Weak<Scheduler>,
    rrc: RefCell<Weak<RefCell<LteUeRrc>>>,
    env: RefCell<Environment>,
    summary: RefCell<Summary>,
}

impl Sim {
    /// Run `f` on the RRC `delay` from now. Errors abort the run.
    fn later<F>(self: &Rc<Self>, delay: Duration, f: F)
    where
        F: FnOnce(&mut LteUeRrc) -> Result<(), RrcError> + 'static,
    {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return;
        };
        let sim = self.clone();
        scheduler.schedule(delay, move || {
            let rrc = sim.rrc.borrow().upgrade();
            match rrc {
                Some(rrc) => f(&mut rrc.borrow_mut()).map_err(EventError::new),
                None => Ok(()),
            }
        });
    }

    fn now(&self) -> Duration {
        self.scheduler.upgrade().map_or(Duration::ZERO, |s| s.now())
    }
}

// ----------------------------------------------------------------------
// PHY
// ----------------------------------------------------------------------

struct SimPhy {
    sim: Rc<Sim>,
    cc: usize,
}

impl SimPhy {
    /// Broadcast MIB, SIB1 and periodic SIB2 of the synchronized cell
    fn start_broadcast(&self, cell_id: CellId) {
        let generation = {
            let mut env = self.sim.env.borrow_mut();
            env.sync_generation += 1;
            env.sync_generation
        };
        let bandwidth = self.sim.env.borrow().config.bandwidth_rbs;

        let mib = MasterInformationBlock { dl_bandwidth: bandwidth, system_frame_number: 0 };
        let sim = self.sim.clone();
        self.sim.later(MIB_DELAY, move |rrc| {
            if !is_current(&sim, generation) {
                return Ok(());
            }
            rrc.recv_master_information_block(0, mib)
        });

        let sim = self.sim.clone();
        self.sim.later(SIB1_DELAY, move |rrc| {
            if !is_current(&sim, generation) {
                return Ok(());
            }
            rrc.recv_system_information_block_type1(0, sib1(cell_id))
        });

        schedule_sib2(self.sim.clone(), generation);
    }
}

fn is_current(sim: &Sim, generation: u64) -> bool {
    sim.env.borrow().sync_generation == generation
}

fn schedule_sib2(sim: Rc<Sim>, generation: u64) {
    let next = sim.clone();
    sim.later(SIB2_PERIOD, move |rrc| {
        if !is_current(&next, generation) {
            return Ok(());
        }
        let ul_earfcn = next.env.borrow().config.ul_earfcn;
        let bandwidth = next.env.borrow().config.bandwidth_rbs;
        schedule_sib2(next.clone(), generation);
        rrc.recv_system_information(sib2(ul_earfcn, bandwidth))
    });
}

impl UeCphySapProvider for SimPhy {
    fn reset(&mut self) {
        debug!("PHY cc={} reset", self.cc);
        self.sim.env.borrow_mut().phy[self.cc].cell_id = None;
    }

    fn start_cell_search(&mut self, dl_earfcn: Earfcn) {
        info!("PHY cc={} cell search on EARFCN {}", self.cc, dl_earfcn);
        let mut env = self.sim.env.borrow_mut();
        env.phy[self.cc] = PhyCarrier { cell_id: None, dl_earfcn };
        env.measuring = true;
    }

    fn synchronize_with_enb(&mut self, cell_id: CellId, dl_earfcn: Earfcn) {
        info!("PHY cc={} synchronizing with cell {} on EARFCN {}", self.cc, cell_id, dl_earfcn);
        {
            let mut env = self.sim.env.borrow_mut();
            env.phy[self.cc] = PhyCarrier { cell_id: Some(cell_id), dl_earfcn };
            env.measuring = true;
        }
        if self.cc == 0 {
            self.start_broadcast(cell_id);
        }
    }

    fn cell_id(&self) -> Option<CellId> {
        self.sim.env.borrow().phy[self.cc].cell_id
    }

    fn dl_earfcn(&self) -> Earfcn {
        self.sim.env.borrow().phy[self.cc].dl_earfcn
    }

    fn set_dl_bandwidth(&mut self, dl_bandwidth: u16) {
        debug!("PHY cc={} DL bandwidth {} RBs", self.cc, dl_bandwidth);
    }

    fn configure_uplink(&mut self, ul_earfcn: Earfcn, ul_bandwidth: u16) {
        debug!("PHY cc={} UL EARFCN {} bandwidth {} RBs", self.cc, ul_earfcn, ul_bandwidth);
    }

    fn configure_reference_signal_power(&mut self, reference_signal_power: i8) {
        debug!("PHY cc={} reference signal power {} dBm", self.cc, reference_signal_power);
    }

    fn set_rnti(&mut self, rnti: Rnti) {
        debug!("PHY cc={} RNTI {}", self.cc, rnti);
    }

    fn set_transmission_mode(&mut self, transmission_mode: u8) {
        debug!("PHY cc={} transmission mode {}", self.cc, transmission_mode);
    }

    fn set_srs_configuration_index(&mut self, srs_config_index: u16) {
        debug!("PHY cc={} SRS configuration index {}", self.cc, srs_config_index);
    }

    fn set_pa(&mut self, pa: f64) {
        debug!("PHY cc={} P_A {} dB", self.cc, pa);
    }

    fn set_rsrp_filter_coefficient(&mut self, filter_coefficient: u8) {
        debug!("PHY cc={} RSRP filter coefficient {}", self.cc, filter_coefficient);
    }

    fn reset_phy_after_rlf(&mut self) {
        info!("PHY cc={} reset after radio link failure", self.cc);
        let mut env = self.sim.env.borrow_mut();
        env.phy[self.cc].cell_id = None;
        env.measuring = false;
    }

    fn reset_rlf_params(&mut self) {
        debug!("PHY cc={} radio link failure parameters reset", self.cc);
    }

    fn start_in_sync_detection(&mut self) {
        debug!("PHY cc={} in-sync detection started", self.cc);
    }
}

/// Periodic PHY measurement of every configured cell
fn schedule_measurements(sim: Rc<Sim>, period: Duration) {
    let next = sim.clone();
    sim.later(period, move |rrc| {
        schedule_measurements(next.clone(), period);
        let params = {
            let mut env = next.env.borrow_mut();
            if !env.measuring {
                return Ok(());
            }
            let now = next.now();
            let cells = env.config.cells.clone();
            let ue_measurements_list = cells
                .iter()
                .map(|cell| UeMeasurementsElement {
                    cell_id: CellId(cell.id),
                    rsrp: env.rsrp(cell.rsrp_dbm, cell.slope_db_per_s, now),
                    rsrq: -10.0,
                })
                .collect();
            UeMeasurementsParameters { ue_measurements_list, component_carrier_id: 0 }
        };
        rrc.report_ue_measurements(params)
    });
}

// ----------------------------------------------------------------------
// MAC
// ----------------------------------------------------------------------

struct SimCmac {
    sim: Rc<Sim>,
    cc: usize,
}

impl UeCmacSapProvider for SimCmac {
    fn configure_rach(&mut self, config: RachConfig) {
        debug!("MAC cc={} RACH configured: {:?}", self.cc, config);
    }

    fn start_contention_based_random_access(&mut self) {
        let rnti = {
            let mut env = self.sim.env.borrow_mut();
            let rnti = Rnti(env.next_rnti);
            env.next_rnti += 1;
            rnti
        };
        info!("MAC cc={} contention based random access, T-C-RNTI {}", self.cc, rnti);
        self.sim.later(RANDOM_ACCESS_DELAY, move |rrc| {
            rrc.set_temporary_cell_rnti(rnti);
            rrc.notify_random_access_successful()
        });
    }

    fn start_non_contention_based_random_access(&mut self, rnti: Rnti, preamble_id: u8, _prach_mask: u8) {
        info!("MAC cc={} dedicated random access rnti={} preamble={}", self.cc, rnti, preamble_id);
        self.sim.later(RANDOM_ACCESS_DELAY, |rrc| rrc.notify_random_access_successful());
    }

    fn add_lc(&mut self, lcid: u8, config: LogicalChannelConfig) {
        debug!("MAC cc={} add LCID {} priority {}", self.cc, lcid, config.priority);
    }

    fn remove_lc(&mut self, lcid: u8) {
        debug!("MAC cc={} remove LCID {}", self.cc, lcid);
    }

    fn reset(&mut self) {
        debug!("MAC cc={} reset", self.cc);
    }

    fn set_rnti(&mut self, rnti: Rnti) {
        debug!("MAC cc={} RNTI {}", self.cc, rnti);
    }

    fn notify_connection_successful(&mut self) {
        debug!("MAC cc={} connection successful", self.cc);
    }
}

/// Data SAP looping every uplink PDU back as downlink
struct SimMac {
    sim: Rc<Sim>,
}

impl MacSapProvider for SimMac {
    fn transmit_pdu(&mut self, params: TransmitPduParameters) {
        self.sim.summary.borrow_mut().packets_sent += 1;
        let TransmitPduParameters { pdu, rnti, lcid } = params;
        debug!("MAC tx rnti={} lcid={} {} bytes", rnti, lcid, pdu.len());
        let sim = self.sim.clone();
        self.sim.later(LOOPBACK_DELAY, move |rrc| {
            // the bearer may be gone by now, which loses the packet
            if let Err(e) = rrc.receive_pdu(lcid, pdu) {
                debug!("Loopback PDU dropped: {}", e);
            } else {
                sim.summary.borrow_mut().packets_received += 1;
            }
            Ok(())
        });
    }
}

// ----------------------------------------------------------------------
// eNodeB
// ----------------------------------------------------------------------

struct SimEnb {
    sim: Rc<Sim>,
}

impl SimEnb {
    fn meas_config(&self) -> MeasConfig {
        let env = self.sim.env.borrow();
        let report = match env.config.kind {
            ScenarioKind::Handover => ReportConfigEutra {
                event_id: EventType::A3,
                a3_offset: 2,
                hysteresis: 2,
                time_to_trigger: 160,
                report_interval: ReportInterval::Ms240,
                ..Default::default()
            },
            // serving cell below -100 dBm
            ScenarioKind::Attach | ScenarioKind::Rlf => ReportConfigEutra {
                event_id: EventType::A2,
                threshold1: ThresholdEutra::Rsrp(40),
                hysteresis: 2,
                ..Default::default()
            },
        };
        MeasConfig {
            meas_object_to_add_mod_list: vec![MeasObjectToAddMod {
                meas_object_id: 1,
                meas_object_eutra: MeasObjectEutra::new(env.config.dl_earfcn),
            }],
            report_config_to_add_mod_list: vec![ReportConfigToAddMod { report_config_id: 1, report_config_eutra: report }],
            meas_id_to_add_mod_list: vec![MeasIdToAddMod { meas_id: 1, meas_object_id: 1, report_config_id: 1 }],
            ..Default::default()
        }
    }

    fn handover(&self, report: &MeasurementReport) {
        let Some(target) = report.meas_results.meas_result_list_eutra.first().map(|r| r.phys_cell_id) else {
            return;
        };
        let msg = {
            let mut env = self.sim.env.borrow_mut();
            if env.config.kind != ScenarioKind::Handover || env.handover_sent {
                return;
            }
            env.handover_sent = true;
            let new_rnti = Rnti(env.next_rnti);
            env.next_rnti += 1;
            let bandwidth = env.config.bandwidth_rbs;
            RrcConnectionReconfiguration {
                rrc_transaction_identifier: env.next_transaction_id(),
                mobility_control_info: Some(MobilityControlInfo {
                    target_phys_cell_id: target,
                    carrier_freq: Some(CarrierFreqEutra {
                        dl_carrier_freq: env.config.dl_earfcn,
                        ul_carrier_freq: env.config.ul_earfcn,
                    }),
                    carrier_bandwidth: Some(CarrierBandwidthEutra { dl_bandwidth: bandwidth, ul_bandwidth: bandwidth }),
                    new_ue_identity: new_rnti,
                    rach_config_common: None,
                    rach_config_dedicated: Some(RachConfigDedicated { ra_preamble_index: 52, ra_prach_mask_index: 0 }),
                }),
                radio_resource_config_dedicated: Some(radio_resource_config()),
                ..Default::default()
            }
        };
        info!("eNB commanding handover to cell {}", target);
        self.sim.later(ENB_RESPONSE_DELAY, move |rrc| {
            if rrc.state() != UeRrcState::ConnectedNormally {
                warn!("Handover command dropped in state {}", rrc.state());
                return Ok(());
            }
            rrc.recv_rrc_connection_reconfiguration(msg)
        });
    }
}

impl RrcSapUser for SimEnb {
    fn setup(&mut self, params: SetupParameters) {
        debug!("eNB SRBs: SRB0 lcid {} SRB1 lcid {:?}", params.srb0_lcid, params.srb1_lcid);
    }

    fn send_rrc_connection_request(&mut self, msg: RrcConnectionRequest) {
        info!("eNB received RRC connection request from IMSI {}", msg.ue_identity);
        let transaction = self.sim.env.borrow_mut().next_transaction_id();
        self.sim.later(ENB_RESPONSE_DELAY, move |rrc| {
            if rrc.state() != UeRrcState::IdleConnecting {
                return Ok(());
            }
            rrc.recv_rrc_connection_setup(RrcConnectionSetup {
                rrc_transaction_identifier: transaction,
                radio_resource_config_dedicated: radio_resource_config(),
            })
        });
    }

    fn send_rrc_connection_setup_completed(&mut self, msg: RrcConnectionSetupCompleted) {
        info!("eNB connection setup completed (transaction {})", msg.rrc_transaction_identifier);
        let transaction = self.sim.env.borrow_mut().next_transaction_id();
        let reconfiguration = RrcConnectionReconfiguration {
            rrc_transaction_identifier: transaction,
            meas_config: Some(self.meas_config()),
            ..Default::default()
        };
        self.sim.later(ENB_RESPONSE_DELAY, move |rrc| {
            if rrc.state() != UeRrcState::ConnectedNormally {
                return Ok(());
            }
            rrc.recv_rrc_connection_reconfiguration(reconfiguration)
        });
    }

    fn send_rrc_connection_reconfiguration_completed(&mut self, msg: RrcConnectionReconfigurationCompleted) {
        info!("eNB reconfiguration completed (transaction {})", msg.rrc_transaction_identifier);
    }

    fn send_measurement_report(&mut self, msg: MeasurementReport) {
        let results = &msg.meas_results;
        info!(
            "eNB measurement report measId {} serving RSRP range {} with {} neighbours",
            results.meas_id,
            results.rsrp_result,
            results.meas_result_list_eutra.len()
        );
        self.sim.summary.borrow_mut().measurement_reports += 1;
        self.handover(&msg);
    }

    fn send_ideal_ue_context_remove_request(&mut self, rnti: Rnti) {
        info!("eNB removing context of RNTI {}", rnti);
    }
}

// ----------------------------------------------------------------------
// NAS
// ----------------------------------------------------------------------

struct SimNas {
    sim: Rc<Sim>,
}

impl AsSapUser for SimNas {
    fn notify_connection_successful(&mut self) {
        info!("NAS connection established");
        let (generation, period) = {
            let mut env = self.sim.env.borrow_mut();
            env.nas_connected = true;
            env.data_generation += 1;
            (env.data_generation, Duration::from_millis(env.config.data_period_ms))
        };
        schedule_traffic(self.sim.clone(), generation, period);
    }

    fn notify_connection_failed(&mut self) {
        warn!("NAS connection attempt failed, retrying");
        self.sim.later(RETRY_DELAY, |rrc| rrc.connect());
    }

    fn notify_connection_released(&mut self) {
        warn!("NAS connection released, restarting cell search");
        self.sim.env.borrow_mut().nas_connected = false;
        self.sim.later(RECONNECT_DELAY, |rrc| {
            rrc.disconnect()?;
            rrc.connect()
        });
    }

    fn recv_data(&mut self, packet: Bytes) {
        debug!("NAS received {} bytes", packet.len());
    }
}

fn schedule_traffic(sim: Rc<Sim>, generation: u64, period: Duration) {
    let next = sim.clone();
    sim.later(period, move |rrc| {
        {
            let env = next.env.borrow();
            if !env.nas_connected || env.data_generation != generation {
                return Ok(());
            }
        }
        schedule_traffic(next.clone(), generation, period);
        let packet = Bytes::from(vec![0x45; 40]);
        match rrc.send_data(packet, DATA_BEARER_ID) {
            Ok(()) => Ok(()),
            Err(LayerError::Rrc(e)) => Err(e),
            Err(e) => {
                warn!("Uplink packet dropped: {}", e);
                Ok(())
            }
        }
    });
}

// ----------------------------------------------------------------------
// Runner
// ----------------------------------------------------------------------

/// Out-of-sync burst long enough to start T310
fn schedule_radio_link_loss(sim: &Rc<Sim>, at: Duration, n310: u8) {
    for i in 0..u32::from(n310) {
        sim.later(at + OUT_OF_SYNC_PERIOD * i, |rrc| {
            if rrc.state().is_connected() {
                rrc.notify_out_of_sync();
            }
            Ok(())
        });
    }
}

/// Run the configured scenario to completion
pub fn run(config: &UeConfig) -> Result<Summary> {
    config.validate()?;
    let scenario = config.scenario.clone();
    let carriers = usize::from(config.rrc.number_of_component_carriers);
    let scheduler = Rc::new(Scheduler::new());

    let sim = Rc::new(Sim {
        scheduler: Rc::downgrade(&scheduler),
        rrc: RefCell::new(Weak::new()),
        env: RefCell::new(Environment {
            rng: StdRng::seed_from_u64(scenario.seed),
            phy: vec![PhyCarrier::default(); carriers],
            measuring: false,
            sync_generation: 0,
            next_rnti: FIRST_RNTI,
            transaction_id: 0,
            handover_sent: false,
            nas_connected: false,
            data_generation: 0,
            config: scenario.clone(),
        }),
        summary: RefCell::new(Summary::default()),
    });

    let saps = UeRrcSaps {
        cmac: (0..carriers)
            .map(|cc| Box::new(SimCmac { sim: sim.clone(), cc }) as Box<dyn UeCmacSapProvider>)
            .collect(),
        cphy: (0..carriers)
            .map(|cc| Box::new(SimPhy { sim: sim.clone(), cc }) as Box<dyn UeCphySapProvider>)
            .collect(),
        mac: Box::new(SimMac { sim: sim.clone() }),
        rrc_sap_user: Box::new(SimEnb { sim: sim.clone() }),
        as_sap_user: Box::new(SimNas { sim: sim.clone() }),
    };
    let rrc = LteUeRrc::new(config.rrc.clone(), saps, scheduler.clone()).context("Failed to create UE RRC")?;
    *sim.rrc.borrow_mut() = Rc::downgrade(&rrc);

    {
        let sim = sim.clone();
        let trace_json = config.log.trace_json;
        rrc.borrow_mut().add_trace_listener(Box::new(move |record: &UeRrcTrace| {
            if trace_json {
                match serde_json::to_string(record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize trace record: {}", e),
                }
            }
            let mut summary = sim.summary.borrow_mut();
            match record.event {
                UeRrcEvent::StateTransition { .. } => summary.state_transitions += 1,
                UeRrcEvent::ConnectionEstablished => summary.connections += 1,
                UeRrcEvent::HandoverEndOk => summary.handovers += 1,
                UeRrcEvent::RadioLinkFailure => summary.radio_link_failures += 1,
                _ => {}
            }
        }));
    }

    info!(
        "Running {:?} scenario for {} ms with {} cells on EARFCN {}",
        scenario.kind,
        scenario.duration_ms,
        scenario.cells.len(),
        scenario.dl_earfcn
    );
    if scenario.kind == ScenarioKind::Handover && scenario.cells.len() < 2 {
        warn!("Handover scenario with a single cell never hands over");
    }

    {
        let mut ue = rrc.borrow_mut();
        ue.start_cell_selection(scenario.dl_earfcn)?;
        ue.connect()?;
    }
    schedule_measurements(sim.clone(), Duration::from_millis(scenario.measurement_period_ms));
    if scenario.kind == ScenarioKind::Rlf {
        schedule_radio_link_loss(&sim, Duration::from_millis(scenario.rlf_at_ms), config.rrc.n310);
    }

    scheduler
        .run_until(Duration::from_millis(scenario.duration_ms))
        .context("Scenario aborted")?;

    let mut summary = sim.summary.borrow().clone();
    summary.final_state = Some(rrc.borrow().state());
    summary.elapsed = scheduler.now();
    Ok(summary)
}

fn sib1(cell_id: CellId) -> SystemInformationBlockType1 {
    SystemInformationBlockType1 {
        cell_access_related_info: CellAccessRelatedInfo {
            plmn_identity: 1,
            cell_identity: cell_id,
            csg_indication: false,
            csg_identity: 0,
        },
        // -120 dBm
        cell_selection_info: CellSelectionInfo { q_rx_lev_min: -60, q_qual_min: 0 },
    }
}

fn sib2(ul_earfcn: Earfcn, ul_bandwidth: u16) -> SystemInformation {
    SystemInformation {
        sib2: Some(SystemInformationBlockType2 {
            radio_resource_config_common: RadioResourceConfigCommonSib {
                rach_config_common: RachConfigCommon {
                    preamble_info: PreambleInfo { number_of_ra_preambles: 52 },
                    ra_supervision_info: RaSupervisionInfo { preamble_trans_max: 50, ra_response_window_size: 3 },
                    tx_fail_param: TxFailParam { conn_est_fail_count: 1 },
                },
                pdsch_config_common: PdschConfigCommon { reference_signal_power: 18, pb: 0 },
            },
            freq_info: FreqInfo { ul_carrier_freq: ul_earfcn, ul_bandwidth },
        }),
    }
}

/// SRB1 plus the default data bearer
fn radio_resource_config() -> RadioResourceConfigDedicated {
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
        drb_to_add_mod_list: vec![DrbToAddMod {
            eps_bearer_identity: DATA_BEARER_ID,
            drb_identity: DATA_DRB_ID,
            rlc_config: RlcConfig::Am,
            logical_channel_identity: DATA_LCID,
            logical_channel_config: LogicalChannelConfig {
                priority: 9,
                prioritized_bit_rate_kbps: 0,
                bucket_size_duration_ms: 100,
                logical_channel_group: 3,
            },
        }],
        drb_to_release_list: Vec::new(),
        physical_config_dedicated: Some(PhysicalConfigDedicated {
            transmission_mode: Some(1),
            srs_config_index: Some(17),
            pdsch_pa: Some(PdschPa::Db0),
        }),
    }
}
