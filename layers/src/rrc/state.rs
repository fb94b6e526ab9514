//! UE RRC connection states

use serde::{Deserialize, Serialize};
use std::fmt;

/// UE RRC state (TS 36.331 / TS 36.304 idle mode procedures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UeRrcState {
    IdleStart,
    IdleCellSearch,
    IdleWaitMibSib1,
    IdleWaitMib,
    IdleWaitSib1,
    IdleCampedNormally,
    IdleWaitSib2,
    IdleRandomAccess,
    IdleConnecting,
    ConnectedNormally,
    ConnectedHandover,
    ConnectedPhyProblem,
    ConnectedReestablishing,
}

impl UeRrcState {
    /// Whether the UE holds an RRC connection
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            UeRrcState::ConnectedNormally
                | UeRrcState::ConnectedHandover
                | UeRrcState::ConnectedPhyProblem
                | UeRrcState::ConnectedReestablishing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UeRrcState::IdleStart => "IDLE_START",
            UeRrcState::IdleCellSearch => "IDLE_CELL_SEARCH",
            UeRrcState::IdleWaitMibSib1 => "IDLE_WAIT_MIB_SIB1",
            UeRrcState::IdleWaitMib => "IDLE_WAIT_MIB",
            UeRrcState::IdleWaitSib1 => "IDLE_WAIT_SIB1",
            UeRrcState::IdleCampedNormally => "IDLE_CAMPED_NORMALLY",
            UeRrcState::IdleWaitSib2 => "IDLE_WAIT_SIB2",
            UeRrcState::IdleRandomAccess => "IDLE_RANDOM_ACCESS",
            UeRrcState::IdleConnecting => "IDLE_CONNECTING",
            UeRrcState::ConnectedNormally => "CONNECTED_NORMALLY",
            UeRrcState::ConnectedHandover => "CONNECTED_HANDOVER",
            UeRrcState::ConnectedPhyProblem => "CONNECTED_PHY_PROBLEM",
            UeRrcState::ConnectedReestablishing => "CONNECTED_REESTABLISHING",
        }
    }
}

impl fmt::Display for UeRrcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
