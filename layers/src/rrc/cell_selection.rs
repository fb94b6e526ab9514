//! Initial cell selection (TS 36.304 5.2.3)

use super::measurement::MeasurementStore;
use common::{q_rx_lev_min_ie_to_dbm, CellId, CsgId};
use interfaces::SystemInformationBlockType1;
use std::collections::BTreeSet;
use tracing::debug;

/// Cells measured at or below this RSRP are never selected
pub const MIN_RSRP_DBM: f64 = -140.0;

/// Result of checking a candidate cell against its SIB1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellSelectionOutcome {
    /// Acceptable and allowed by the CSG restriction
    Suitable,
    /// Meets the S criterion but belongs to a foreign CSG
    AcceptableNotSuitable,
    NotAcceptable,
}

/// Strongest measured cell that has not been rejected before.
///
/// Equal RSRP values resolve to the lowest cell id.
pub fn strongest_cell(store: &MeasurementStore, rejected: &BTreeSet<CellId>) -> Option<CellId> {
    let mut best: Option<(CellId, f64)> = None;
    for (cell_id, values) in store.iter() {
        if values.rsrp <= MIN_RSRP_DBM || rejected.contains(&cell_id) {
            continue;
        }
        // ascending iteration, so only a strictly stronger cell replaces
        if best.map_or(true, |(_, rsrp)| values.rsrp > rsrp) {
            best = Some((cell_id, values.rsrp));
        }
    }
    best.map(|(cell_id, _)| cell_id)
}

/// S criterion and CSG check of a cell measured at `rsrp` dBm
pub fn evaluate_cell(
    rsrp: f64,
    sib1: &SystemInformationBlockType1,
    csg_white_list: Option<CsgId>,
) -> CellSelectionOutcome {
    let q_rx_lev_min = q_rx_lev_min_ie_to_dbm(sib1.cell_selection_info.q_rx_lev_min);
    let s_rx_lev = rsrp - q_rx_lev_min;
    let access = &sib1.cell_access_related_info;
    debug!(
        "Cell {} Srxlev={} dB csg_indication={} csg_identity={}",
        access.cell_identity, s_rx_lev, access.csg_indication, access.csg_identity
    );

    if s_rx_lev <= 0.0 {
        return CellSelectionOutcome::NotAcceptable;
    }
    if !access.csg_indication || csg_white_list == Some(access.csg_identity) {
        CellSelectionOutcome::Suitable
    } else {
        CellSelectionOutcome::AcceptableNotSuitable
    }
}
