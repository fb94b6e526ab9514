//! RRC Message Types exchanged between UE and eNodeB
//!
//! Decoded information elements of 3GPP TS 36.331. Messages are handed over
//! as structures; bit-level ASN.1 encoding is not modelled.

use common::{CellId, CsgId, Earfcn, Imsi, Rnti};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of neighbour cells reported per measurement report
pub const MAX_REPORT_CELLS: u8 = 8;

// ---------------------------------------------------------------------------
// Broadcast system information
// ---------------------------------------------------------------------------

/// Master Information Block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasterInformationBlock {
    /// Downlink bandwidth in resource blocks
    pub dl_bandwidth: u16,
    /// System frame number
    pub system_frame_number: u16,
}

/// Cell access related information carried in SIB1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellAccessRelatedInfo {
    /// PLMN identity
    pub plmn_identity: u32,
    /// Cell identity
    pub cell_identity: CellId,
    /// Whether the cell is a closed subscriber group cell
    pub csg_indication: bool,
    /// CSG identity, meaningful only when `csg_indication` is set
    pub csg_identity: CsgId,
}

/// Cell selection parameters carried in SIB1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSelectionInfo {
    /// Minimum required RX level IE (-70..=-22, 2 dB steps)
    pub q_rx_lev_min: i8,
    /// Minimum required quality level IE
    pub q_qual_min: i8,
}

/// System Information Block Type 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemInformationBlockType1 {
    pub cell_access_related_info: CellAccessRelatedInfo,
    pub cell_selection_info: CellSelectionInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreambleInfo {
    pub number_of_ra_preambles: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaSupervisionInfo {
    pub preamble_trans_max: u8,
    pub ra_response_window_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TxFailParam {
    /// Number of T300 expiries tolerated before giving up
    pub conn_est_fail_count: u8,
}

/// Common RACH configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RachConfigCommon {
    pub preamble_info: PreambleInfo,
    pub ra_supervision_info: RaSupervisionInfo,
    pub tx_fail_param: TxFailParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdschConfigCommon {
    /// Reference signal power in dBm
    pub reference_signal_power: i8,
    pub pb: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioResourceConfigCommonSib {
    pub rach_config_common: RachConfigCommon,
    pub pdsch_config_common: PdschConfigCommon,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreqInfo {
    pub ul_carrier_freq: Earfcn,
    /// Uplink bandwidth in resource blocks
    pub ul_bandwidth: u16,
}

/// System Information Block Type 2
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemInformationBlockType2 {
    pub radio_resource_config_common: RadioResourceConfigCommonSib,
    pub freq_info: FreqInfo,
}

/// System Information message; only SIB2 is modelled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemInformation {
    pub sib2: Option<SystemInformationBlockType2>,
}

// ---------------------------------------------------------------------------
// Dedicated radio resource configuration
// ---------------------------------------------------------------------------

/// Logical channel configuration (TS 36.331 LogicalChannelConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalChannelConfig {
    pub priority: u8,
    pub prioritized_bit_rate_kbps: u16,
    pub bucket_size_duration_ms: u16,
    pub logical_channel_group: u8,
}

impl LogicalChannelConfig {
    /// Configuration used for the CCCH carried by SRB0
    pub fn ccch() -> Self {
        Self {
            priority: 0,
            prioritized_bit_rate_kbps: 65535,
            bucket_size_duration_ms: 65535,
            logical_channel_group: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrbToAddMod {
    pub srb_identity: u8,
    pub logical_channel_config: LogicalChannelConfig,
}

/// RLC configuration of a data radio bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RlcConfig {
    Am,
    UmBiDirectional,
    UmUniDirectionalUl,
    UmUniDirectionalDl,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrbToAddMod {
    pub eps_bearer_identity: u8,
    pub drb_identity: u8,
    pub rlc_config: RlcConfig,
    pub logical_channel_identity: u8,
    pub logical_channel_config: LogicalChannelConfig,
}

/// PDSCH P_A values (TS 36.331 PDSCH-ConfigDedicated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdschPa {
    DbMinus6,
    DbMinus4Dot77,
    DbMinus3,
    DbMinus1Dot77,
    Db0,
    Db1,
    Db2,
    Db3,
}

impl PdschPa {
    /// Value in dB
    pub fn to_db(self) -> f64 {
        match self {
            PdschPa::DbMinus6 => -6.0,
            PdschPa::DbMinus4Dot77 => -4.77,
            PdschPa::DbMinus3 => -3.0,
            PdschPa::DbMinus1Dot77 => -1.77,
            PdschPa::Db0 => 0.0,
            PdschPa::Db1 => 1.0,
            PdschPa::Db2 => 2.0,
            PdschPa::Db3 => 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalConfigDedicated {
    /// Transmission mode from AntennaInfoDedicated
    pub transmission_mode: Option<u8>,
    /// SRS configuration index from SoundingRS-UL-ConfigDedicated
    pub srs_config_index: Option<u16>,
    pub pdsch_pa: Option<PdschPa>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadioResourceConfigDedicated {
    pub srb_to_add_mod_list: Vec<SrbToAddMod>,
    pub drb_to_add_mod_list: Vec<DrbToAddMod>,
    pub drb_to_release_list: Vec<u8>,
    pub physical_config_dedicated: Option<PhysicalConfigDedicated>,
}

// ---------------------------------------------------------------------------
// Connection control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionRequest {
    pub ue_identity: Imsi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionSetup {
    pub rrc_transaction_identifier: u8,
    pub radio_resource_config_dedicated: RadioResourceConfigDedicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionSetupCompleted {
    pub rrc_transaction_identifier: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierFreqEutra {
    pub dl_carrier_freq: Earfcn,
    pub ul_carrier_freq: Earfcn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierBandwidthEutra {
    pub dl_bandwidth: u16,
    pub ul_bandwidth: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RachConfigDedicated {
    pub ra_preamble_index: u8,
    pub ra_prach_mask_index: u8,
}

/// Handover command contents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobilityControlInfo {
    pub target_phys_cell_id: CellId,
    pub carrier_freq: Option<CarrierFreqEutra>,
    pub carrier_bandwidth: Option<CarrierBandwidthEutra>,
    pub new_ue_identity: Rnti,
    pub rach_config_common: Option<RachConfigCommon>,
    pub rach_config_dedicated: Option<RachConfigDedicated>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellIdentification {
    pub phys_cell_id: CellId,
    pub dl_carrier_freq: Earfcn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioResourceConfigCommonSCell {
    pub dl_bandwidth: u16,
    pub ul_carrier_freq: Earfcn,
    pub ul_bandwidth: u16,
    pub reference_signal_power: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioResourceConfigDedicatedSCell {
    pub transmission_mode: u8,
    pub srs_config_index: u16,
    pub pdsch_pa: PdschPa,
}

/// Secondary cell to be added to or modified in the UE configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SCellToAddMod {
    /// Component carrier index of the secondary cell (1..=4)
    pub s_cell_index: u8,
    pub cell_identification: CellIdentification,
    pub radio_resource_config_common_scell: RadioResourceConfigCommonSCell,
    pub radio_resource_config_dedicated_scell: Option<RadioResourceConfigDedicatedSCell>,
}

/// Carrier aggregation extension of RRC Connection Reconfiguration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NonCriticalExtensionConfiguration {
    pub s_cell_to_add_mod_list: Vec<SCellToAddMod>,
    pub s_cell_to_release_list: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RrcConnectionReconfiguration {
    pub rrc_transaction_identifier: u8,
    pub meas_config: Option<MeasConfig>,
    pub mobility_control_info: Option<MobilityControlInfo>,
    pub radio_resource_config_dedicated: Option<RadioResourceConfigDedicated>,
    pub non_critical_extension: Option<NonCriticalExtensionConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionReconfigurationCompleted {
    pub rrc_transaction_identifier: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionReestablishment {
    pub rrc_transaction_identifier: u8,
    pub radio_resource_config_dedicated: RadioResourceConfigDedicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RrcConnectionReestablishmentReject {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionRelease {
    pub rrc_transaction_identifier: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcConnectionReject {
    /// Wait time in seconds
    pub wait_time: u8,
}

// ---------------------------------------------------------------------------
// Measurement configuration
// ---------------------------------------------------------------------------

/// Range of physical cell identities used by black cell lists
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysCellIdRange {
    pub start: u16,
    pub range: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellsToAddMod {
    pub cell_index: u8,
    pub phys_cell_id: u16,
    pub cell_individual_offset: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackCellsToAddMod {
    pub cell_index: u8,
    pub phys_cell_id_range: PhysCellIdRange,
}

/// E-UTRA measurement object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasObjectEutra {
    pub carrier_freq: Earfcn,
    pub allowed_meas_bandwidth: u8,
    pub presence_antenna_port1: bool,
    pub neigh_cell_config: u8,
    /// Frequency specific offset in dB
    pub offset_freq: i8,
    pub cells_to_remove_list: Vec<u8>,
    pub cells_to_add_mod_list: Vec<CellsToAddMod>,
    pub black_cells_to_remove_list: Vec<u8>,
    pub black_cells_to_add_mod_list: Vec<BlackCellsToAddMod>,
    pub cell_for_which_to_report_cgi: Option<u16>,
}

impl MeasObjectEutra {
    /// Measurement object on `carrier_freq` without cell lists
    pub fn new(carrier_freq: Earfcn) -> Self {
        Self {
            carrier_freq,
            allowed_meas_bandwidth: 6,
            presence_antenna_port1: false,
            neigh_cell_config: 0,
            offset_freq: 0,
            cells_to_remove_list: Vec::new(),
            cells_to_add_mod_list: Vec::new(),
            black_cells_to_remove_list: Vec::new(),
            black_cells_to_add_mod_list: Vec::new(),
            cell_for_which_to_report_cgi: None,
        }
    }

    /// Whether any per-cell list is configured
    pub fn has_cell_lists(&self) -> bool {
        !self.cells_to_remove_list.is_empty()
            || !self.cells_to_add_mod_list.is_empty()
            || !self.black_cells_to_remove_list.is_empty()
            || !self.black_cells_to_add_mod_list.is_empty()
            || self.cell_for_which_to_report_cgi.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasObjectToAddMod {
    pub meas_object_id: u8,
    pub meas_object_eutra: MeasObjectEutra,
}

/// Threshold of an event, expressed as an RSRP or RSRQ range IE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdEutra {
    Rsrp(u8),
    Rsrq(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    Event,
    Periodical,
}

/// Measurement event types (TS 36.331 5.5.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Serving becomes better than threshold
    A1,
    /// Serving becomes worse than threshold
    A2,
    /// Neighbour becomes offset better than PCell
    A3,
    /// Neighbour becomes better than threshold
    A4,
    /// PCell worse than threshold1 and neighbour better than threshold2
    A5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerQuantity {
    Rsrp,
    Rsrq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportQuantity {
    SameAsTriggerQuantity,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportPurpose {
    ReportStrongestCells,
    ReportCgi,
}

/// Periodic report interval (TS 36.331 ReportInterval)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportInterval {
    Ms120,
    Ms240,
    Ms480,
    Ms640,
    Ms1024,
    Ms2048,
    Ms5120,
    Ms10240,
    Min1,
    Min6,
    Min12,
    Min30,
    Min60,
}

impl ReportInterval {
    /// Interval between two consecutive reports
    pub fn as_duration(self) -> Duration {
        match self {
            ReportInterval::Ms120 => Duration::from_millis(120),
            ReportInterval::Ms240 => Duration::from_millis(240),
            ReportInterval::Ms480 => Duration::from_millis(480),
            ReportInterval::Ms640 => Duration::from_millis(640),
            ReportInterval::Ms1024 => Duration::from_millis(1024),
            ReportInterval::Ms2048 => Duration::from_millis(2048),
            ReportInterval::Ms5120 => Duration::from_millis(5120),
            ReportInterval::Ms10240 => Duration::from_millis(10240),
            ReportInterval::Min1 => Duration::from_secs(60),
            ReportInterval::Min6 => Duration::from_secs(360),
            ReportInterval::Min12 => Duration::from_secs(720),
            ReportInterval::Min30 => Duration::from_secs(1800),
            ReportInterval::Min60 => Duration::from_secs(3600),
        }
    }
}

/// E-UTRA report configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportConfigEutra {
    pub trigger_type: TriggerType,
    pub event_id: EventType,
    pub threshold1: ThresholdEutra,
    pub threshold2: ThresholdEutra,
    pub report_on_leave: bool,
    /// a3-Offset IE (-30..=30, 0.5 dB steps)
    pub a3_offset: i8,
    /// Hysteresis IE (0..=30, 0.5 dB steps)
    pub hysteresis: u8,
    /// Time to trigger in milliseconds
    pub time_to_trigger: u16,
    pub purpose: ReportPurpose,
    pub trigger_quantity: TriggerQuantity,
    pub report_quantity: ReportQuantity,
    pub max_report_cells: u8,
    pub report_interval: ReportInterval,
    pub report_amount: u8,
}

impl Default for ReportConfigEutra {
    fn default() -> Self {
        Self {
            trigger_type: TriggerType::Event,
            event_id: EventType::A1,
            threshold1: ThresholdEutra::Rsrp(0),
            threshold2: ThresholdEutra::Rsrp(0),
            report_on_leave: false,
            a3_offset: 0,
            hysteresis: 0,
            time_to_trigger: 0,
            purpose: ReportPurpose::ReportStrongestCells,
            trigger_quantity: TriggerQuantity::Rsrp,
            report_quantity: ReportQuantity::Both,
            max_report_cells: MAX_REPORT_CELLS,
            report_interval: ReportInterval::Ms480,
            report_amount: 255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportConfigToAddMod {
    pub report_config_id: u8,
    pub report_config_eutra: ReportConfigEutra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasIdToAddMod {
    pub meas_id: u8,
    pub meas_object_id: u8,
    pub report_config_id: u8,
}

/// Layer 3 filter coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityConfig {
    pub filter_coefficient_rsrp: u8,
    pub filter_coefficient_rsrq: u8,
}

impl Default for QuantityConfig {
    fn default() -> Self {
        Self {
            filter_coefficient_rsrp: 4,
            filter_coefficient_rsrq: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasGapConfig {
    pub gap_offset: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedStatePars {
    pub t_evaluation: u16,
    pub t_hyst_normal: u16,
    pub n_cell_change_medium: u8,
    pub n_cell_change_high: u8,
}

/// Measurement configuration delta sent by the network
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasConfig {
    pub meas_object_to_remove_list: Vec<u8>,
    pub meas_object_to_add_mod_list: Vec<MeasObjectToAddMod>,
    pub report_config_to_remove_list: Vec<u8>,
    pub report_config_to_add_mod_list: Vec<ReportConfigToAddMod>,
    pub meas_id_to_remove_list: Vec<u8>,
    pub meas_id_to_add_mod_list: Vec<MeasIdToAddMod>,
    pub quantity_config: Option<QuantityConfig>,
    pub meas_gap_config: Option<MeasGapConfig>,
    pub s_measure: Option<u8>,
    pub speed_state_pars: Option<SpeedStatePars>,
}

// ---------------------------------------------------------------------------
// Measurement reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasResultEutra {
    pub phys_cell_id: CellId,
    pub rsrp_result: Option<u8>,
    pub rsrq_result: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasResultScell {
    pub rsrp_result: u8,
    pub rsrq_result: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasResultServFreq {
    pub serv_freq_id: u8,
    pub meas_result_scell: Option<MeasResultScell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasResults {
    pub meas_id: u8,
    /// PCell RSRP range IE
    pub rsrp_result: u8,
    /// PCell RSRQ range IE
    pub rsrq_result: u8,
    pub meas_result_list_eutra: Vec<MeasResultEutra>,
    pub meas_scell_result_list: Vec<MeasResultServFreq>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementReport {
    pub meas_results: MeasResults,
}
