//! UE RRC trace events
//!
//! Listeners are registered on the RRC instance at setup time and receive
//! every event in the order it happens.

use super::UeRrcState;
use common::{CellId, ComponentCarrierId, Imsi, Rnti};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Kind of physical layer synchronization indication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncIndication {
    InSync,
    OutOfSync,
}

impl fmt::Display for SyncIndication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIndication::InSync => f.write_str("InSync"),
            SyncIndication::OutOfSync => f.write_str("OutOfSync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UeRrcEvent {
    StateTransition { from: UeRrcState, to: UeRrcState },
    MibReceived,
    Sib1Received,
    Sib2Received,
    InitialCellSelectionEndOk,
    InitialCellSelectionEndError,
    RandomAccessSuccessful,
    RandomAccessError,
    ConnectionEstablished,
    ConnectionTimeout { count: u8 },
    ConnectionReconfiguration,
    HandoverStart { target: CellId },
    HandoverEndOk,
    HandoverEndError,
    SCarrierConfigured { cc_count: usize },
    Srb1Created,
    DrbCreated { drb_id: u8 },
    RadioLinkFailure,
    PhySyncDetection { kind: SyncIndication, count: u8 },
    RsrpMeasurement { rsrp: f64, is_serving: bool, cc: ComponentCarrierId },
}

/// One trace record with UE context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UeRrcTrace {
    pub time: Duration,
    pub imsi: Imsi,
    pub cell_id: Option<CellId>,
    pub rnti: Rnti,
    pub event: UeRrcEvent,
}

pub type TraceListener = Box<dyn FnMut(&UeRrcTrace)>;

/// Registered trace listeners
#[derive(Default)]
pub struct TraceListeners {
    listeners: Vec<TraceListener>,
}

impl TraceListeners {
    pub fn add(&mut self, listener: TraceListener) {
        self.listeners.push(listener);
    }

    pub fn fire(&mut self, record: &UeRrcTrace) {
        for listener in self.listeners.iter_mut() {
            listener(record);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for TraceListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceListeners({})", self.listeners.len())
    }
}
