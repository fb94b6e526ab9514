//! Service Access Points of the UE RRC
//!
//! Providers are implemented by the MAC, PHY and RRC protocol entities that
//! sit around the RRC. They must never call back into the RRC from inside a
//! provider method; responses (random access outcome, measurements, sync
//! indications) are delivered later through the scheduler.

use crate::message_types::{
    LogicalChannelConfig, MeasurementReport, RrcConnectionReconfigurationCompleted,
    RrcConnectionRequest, RrcConnectionSetupCompleted,
};
use bytes::Bytes;
use common::{CellId, ComponentCarrierId, Earfcn, Rnti};
use serde::{Deserialize, Serialize};

/// RACH parameters handed to the MAC after SIB2 reception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RachConfig {
    pub number_of_ra_preambles: u8,
    pub preamble_trans_max: u8,
    pub ra_response_window_size: u8,
    pub conn_est_fail_count: u8,
}

/// Control SAP offered by the UE MAC of one component carrier
pub trait UeCmacSapProvider {
    /// Configure the random access channel
    fn configure_rach(&mut self, config: RachConfig);

    /// Start contention based random access on the camped cell
    fn start_contention_based_random_access(&mut self);

    /// Start non-contention based random access with a dedicated preamble
    fn start_non_contention_based_random_access(&mut self, rnti: Rnti, preamble_id: u8, prach_mask: u8);

    /// Add a logical channel
    fn add_lc(&mut self, lcid: u8, config: LogicalChannelConfig);

    /// Remove a logical channel
    fn remove_lc(&mut self, lcid: u8);

    /// Reset the MAC, dropping every logical channel except LCID 0
    fn reset(&mut self);

    fn set_rnti(&mut self, rnti: Rnti);

    fn notify_connection_successful(&mut self);
}

/// Control SAP offered by the UE PHY of one component carrier
pub trait UeCphySapProvider {
    fn reset(&mut self);

    /// Start measuring every cell on the given downlink carrier
    fn start_cell_search(&mut self, dl_earfcn: Earfcn);

    /// Lock onto a cell; the PHY keeps reporting on its downlink carrier
    fn synchronize_with_enb(&mut self, cell_id: CellId, dl_earfcn: Earfcn);

    /// Cell the PHY is synchronized to
    fn cell_id(&self) -> Option<CellId>;

    /// Downlink carrier the PHY is tuned to
    fn dl_earfcn(&self) -> Earfcn;

    fn set_dl_bandwidth(&mut self, dl_bandwidth: u16);

    fn configure_uplink(&mut self, ul_earfcn: Earfcn, ul_bandwidth: u16);

    fn configure_reference_signal_power(&mut self, reference_signal_power: i8);

    fn set_rnti(&mut self, rnti: Rnti);

    fn set_transmission_mode(&mut self, transmission_mode: u8);

    fn set_srs_configuration_index(&mut self, srs_config_index: u16);

    /// Set P_A in dB
    fn set_pa(&mut self, pa: f64);

    fn set_rsrp_filter_coefficient(&mut self, filter_coefficient: u8);

    fn reset_phy_after_rlf(&mut self);

    fn reset_rlf_params(&mut self);

    fn start_in_sync_detection(&mut self);
}

/// One entry of a PHY measurement report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UeMeasurementsElement {
    pub cell_id: CellId,
    /// RSRP in dBm
    pub rsrp: f64,
    /// RSRQ in dB
    pub rsrq: f64,
}

/// Batch of PHY measurements for one component carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeMeasurementsParameters {
    pub ue_measurements_list: Vec<UeMeasurementsElement>,
    pub component_carrier_id: ComponentCarrierId,
}

/// Parameters of a PDU handed to the MAC for transmission
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitPduParameters {
    pub pdu: Bytes,
    pub rnti: Rnti,
    pub lcid: u8,
}

/// Data SAP offered by the UE MAC
pub trait MacSapProvider {
    fn transmit_pdu(&mut self, params: TransmitPduParameters);
}

/// Upward SAP towards NAS
pub trait AsSapUser {
    fn notify_connection_successful(&mut self);

    fn notify_connection_failed(&mut self);

    fn notify_connection_released(&mut self);

    /// Deliver a received user plane packet
    fn recv_data(&mut self, packet: Bytes);
}

/// Signalling radio bearers usable by the RRC protocol entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupParameters {
    pub srb0_lcid: u8,
    pub srb1_lcid: Option<u8>,
}

/// SAP used by the RRC to send UE originated messages to the eNodeB
pub trait RrcSapUser {
    fn setup(&mut self, params: SetupParameters);

    fn send_rrc_connection_request(&mut self, msg: RrcConnectionRequest);

    fn send_rrc_connection_setup_completed(&mut self, msg: RrcConnectionSetupCompleted);

    fn send_rrc_connection_reconfiguration_completed(&mut self, msg: RrcConnectionReconfigurationCompleted);

    fn send_measurement_report(&mut self, msg: MeasurementReport);

    /// Tell the eNodeB to drop the UE context after radio link failure
    fn send_ideal_ue_context_remove_request(&mut self, rnti: Rnti);
}
