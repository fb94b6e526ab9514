//! UE RRC timers
//!
//! Timers are scheduler events that call back into the owning [`LteUeRrc`]
//! through a weak reference. An expired callback for a dropped RRC is a
//! no-op.

use super::ue_rrc::LteUeRrc;
use common::{EventError, EventId, Scheduler};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Delay between adding the first cell to a report entry and sending the
/// first report, so that filtering and triggering of the same instant are
/// complete before the report is built
pub const UE_MEASUREMENT_REPORT_DELAY: Duration = Duration::from_micros(1);

/// Timer kinds dispatched by [`LteUeRrc::handle_timer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeRrcTimer {
    /// T300 expiry
    ConnectionTimeout,
    /// T310 expiry
    RadioLinkFailure,
    /// Periodic or first measurement report of a measurement identity
    MeasurementReport { meas_id: u8 },
    /// Time-to-trigger of an entering condition elapsed
    EnteringTrigger { meas_id: u8, trigger_id: u64 },
    /// Time-to-trigger of a leaving condition elapsed
    LeavingTrigger { meas_id: u8, trigger_id: u64, report_on_leave: bool },
}

/// Schedules [`UeRrcTimer`]s on behalf of one RRC instance
#[derive(Clone)]
pub struct TimerHandle {
    scheduler: Rc<Scheduler>,
    owner: Weak<RefCell<LteUeRrc>>,
}

impl TimerHandle {
    pub(crate) fn new(scheduler: Rc<Scheduler>, owner: Weak<RefCell<LteUeRrc>>) -> Self {
        Self { scheduler, owner }
    }

    pub fn schedule(&self, delay: Duration, timer: UeRrcTimer) -> EventId {
        let owner = self.owner.clone();
        self.scheduler.schedule(delay, move || match owner.upgrade() {
            Some(rrc) => rrc.borrow_mut().handle_timer(timer).map_err(EventError::new),
            None => Ok(()),
        })
    }

    /// Cancel the timer held in `slot`, leaving it empty
    pub fn cancel(&self, slot: &mut Option<EventId>) {
        if let Some(id) = slot.take() {
            self.scheduler.cancel(id);
        }
    }

    pub fn cancel_id(&self, id: EventId) {
        self.scheduler.cancel(id);
    }

    pub fn is_running(&self, slot: &Option<EventId>) -> bool {
        slot.map_or(false, |id| self.scheduler.is_pending(id))
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimerHandle(now={:?})", self.scheduler.now())
    }
}
