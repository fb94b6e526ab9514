//! Common Utilities
//!
//! Conversions between E-UTRA measurement information elements and physical
//! values according to 3GPP TS 36.133 and TS 36.331

use tracing::trace;

/// Highest RSRP range value (TS 36.133 9.1.4)
pub const RSRP_RANGE_MAX: u8 = 97;

/// Highest RSRQ range value (TS 36.133 9.1.7)
pub const RSRQ_RANGE_MAX: u8 = 34;

/// Convert an RSRP range IE (0..=97) to dBm
pub fn rsrp_range_to_dbm(range: u8) -> f64 {
    let range = range.min(RSRP_RANGE_MAX);
    f64::from(range) - 140.0
}

/// Convert a measured RSRP in dBm to its range IE, clamping to -140..=-44 dBm
pub fn dbm_to_rsrp_range(dbm: f64) -> u8 {
    let dbm = dbm.clamp(-140.0, -44.0);
    let range = (dbm + 141.0).floor() as u8;
    let range = range.min(RSRP_RANGE_MAX);
    trace!("RSRP {} dBm mapped to range {}", dbm, range);
    range
}

/// Convert an RSRQ range IE (0..=34) to dB
pub fn rsrq_range_to_db(range: u8) -> f64 {
    let range = range.min(RSRQ_RANGE_MAX);
    (f64::from(range) - 40.0) / 2.0
}

/// Convert a measured RSRQ in dB to its range IE, clamping to -19.5..=-3 dB
pub fn db_to_rsrq_range(db: f64) -> u8 {
    if db.is_nan() {
        return 0;
    }
    let db = db.clamp(-19.5, -3.0);
    let range = (2.0 * db + 40.0).floor() as u8;
    range.min(RSRQ_RANGE_MAX)
}

/// Hysteresis IE (0..=30) in half dB steps
pub fn hysteresis_ie_to_db(ie: u8) -> f64 {
    f64::from(ie.min(30)) * 0.5
}

/// a3-Offset IE (-30..=30) in half dB steps
pub fn a3_offset_ie_to_db(ie: i8) -> f64 {
    f64::from(ie.clamp(-30, 30)) * 0.5
}

/// q-RxLevMin IE (-70..=-22) in 2 dB steps
pub fn q_rx_lev_min_ie_to_dbm(ie: i8) -> f64 {
    f64::from(ie.clamp(-70, -22)) * 2.0
}

/// Layer 3 filter weight for filter coefficient `k` (TS 36.331 5.5.3.2)
pub fn filter_coefficient_to_alpha(k: u8) -> f64 {
    0.5f64.powf(f64::from(k) / 4.0)
}
