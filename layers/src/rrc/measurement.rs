//! Stored cell measurements with layer 3 filtering (TS 36.331 5.5.3.2)

use common::{CellId, Earfcn};
use std::collections::btree_map::{self, BTreeMap};

/// Latest (possibly filtered) measurement of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasValues {
    /// RSRP in dBm
    pub rsrp: f64,
    /// RSRQ in dB, NaN when the PHY had no valid value
    pub rsrq: f64,
    /// Downlink carrier the cell was first measured on
    pub carrier_freq: Earfcn,
}

/// Layer 3 filter coefficients `a` for RSRP and RSRQ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    pub a_rsrp: f64,
    pub a_rsrq: f64,
}

/// `F_n = (1 - a) * F_{n-1} + a * M_n`
pub fn l3_filter(previous: f64, sample: f64, a: f64) -> f64 {
    (1.0 - a) * previous + a * sample
}

/// Measurements keyed by cell, iterated in ascending cell order
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    cells: BTreeMap<CellId, MeasValues>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new sample and return the resulting stored value.
    ///
    /// The first sample of a cell is stored unfiltered together with
    /// `carrier_freq`. Later samples are filtered with `filter` when given and
    /// replace the stored value otherwise.
    pub fn save(
        &mut self,
        cell_id: CellId,
        rsrp: f64,
        rsrq: f64,
        carrier_freq: Earfcn,
        filter: Option<FilterCoefficients>,
    ) -> MeasValues {
        match self.cells.entry(cell_id) {
            btree_map::Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                match filter {
                    Some(coeff) => {
                        stored.rsrp = l3_filter(stored.rsrp, rsrp, coeff.a_rsrp);
                        stored.rsrq = if stored.rsrq.is_nan() {
                            rsrq
                        } else {
                            l3_filter(stored.rsrq, rsrq, coeff.a_rsrq)
                        };
                    }
                    None => {
                        stored.rsrp = rsrp;
                        stored.rsrq = rsrq;
                    }
                }
                *stored
            }
            btree_map::Entry::Vacant(entry) => *entry.insert(MeasValues { rsrp, rsrq, carrier_freq }),
        }
    }

    pub fn get(&self, cell_id: CellId) -> Option<&MeasValues> {
        self.cells.get(&cell_id)
    }

    pub fn contains(&self, cell_id: CellId) -> bool {
        self.cells.contains_key(&cell_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, &MeasValues)> {
        self.cells.iter().map(|(id, v)| (*id, v))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
