//! Measurement event triggering (TS 36.331 5.5.4)
//!
//! For every measurement identity the engine evaluates the entering and
//! leaving inequalities of events A1 to A5 against the stored measurements,
//! keeps the reporting entry (`VarMeasReportList`) up to date and runs the
//! time-to-trigger queues.

use super::meas_config::VarMeasConfig;
use super::measurement::MeasurementStore;
use super::timers::{TimerHandle, UeRrcTimer, UE_MEASUREMENT_REPORT_DELAY};
use super::RrcError;
use common::{
    a3_offset_ie_to_db, hysteresis_ie_to_db, rsrp_range_to_dbm, rsrq_range_to_db, CellId, Earfcn,
    EventId,
};
use interfaces::{EventType, MeasurementReport, ReportConfigEutra, ThresholdEutra, TriggerQuantity};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Tuning of one component carrier as seen by the RRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierState {
    pub cell_id: Option<CellId>,
    pub dl_earfcn: Earfcn,
}

/// Serving cells at the time of an evaluation, indexed by component carrier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServingContext {
    /// Primary cell
    pub pcell: Option<CellId>,
    pub carriers: Vec<CarrierState>,
}

impl ServingContext {
    /// Serving cell configured on `carrier_freq`. When several carriers
    /// match, the highest component carrier wins.
    pub fn serving_cell_on(&self, carrier_freq: Earfcn) -> Option<CellId> {
        self.carriers
            .iter()
            .rev()
            .find(|cc| cc.dl_earfcn == carrier_freq && cc.cell_id.is_some())
            .and_then(|cc| cc.cell_id)
    }
}

/// Reporting entry of one measurement identity
#[derive(Debug, Clone, PartialEq)]
pub struct VarMeasReport {
    pub meas_id: u8,
    pub cells_triggered_list: BTreeSet<CellId>,
    pub number_of_reports_sent: u32,
    pub periodic_report_timer: Option<EventId>,
}

impl VarMeasReport {
    fn new(meas_id: u8) -> Self {
        Self {
            meas_id,
            cells_triggered_list: BTreeSet::new(),
            number_of_reports_sent: 0,
            periodic_report_timer: None,
        }
    }
}

/// Time-to-trigger delay in flight
#[derive(Debug, Clone, PartialEq)]
pub(super) struct PendingTrigger {
    pub id: u64,
    pub cells: Vec<CellId>,
    pub timer: EventId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Entering,
    Leaving,
}

/// Outcome of evaluating the inequalities of one measurement identity
#[derive(Debug, Default)]
struct Evaluation {
    entering: Vec<CellId>,
    leaving: Vec<CellId>,
}

/// Measurement store, configuration, reporting entries and trigger queues
#[derive(Debug)]
pub struct MeasurementEngine {
    pub(super) config: VarMeasConfig,
    pub(super) store: MeasurementStore,
    pub(super) reports: BTreeMap<u8, VarMeasReport>,
    entering_queue: BTreeMap<u8, VecDeque<PendingTrigger>>,
    leaving_queue: BTreeMap<u8, VecDeque<PendingTrigger>>,
    next_trigger_id: u64,
    pub(super) timers: TimerHandle,
    pub(super) outbox: Vec<MeasurementReport>,
}

impl MeasurementEngine {
    pub fn new(timers: TimerHandle) -> Self {
        Self {
            config: VarMeasConfig::default(),
            store: MeasurementStore::new(),
            reports: BTreeMap::new(),
            entering_queue: BTreeMap::new(),
            leaving_queue: BTreeMap::new(),
            next_trigger_id: 0,
            timers,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &VarMeasConfig {
        &self.config
    }

    pub fn store(&self) -> &MeasurementStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MeasurementStore {
        &mut self.store
    }

    /// Cells currently triggered for `meas_id`, if a reporting entry exists
    pub fn triggered_cells(&self, meas_id: u8) -> Option<&BTreeSet<CellId>> {
        self.reports.get(&meas_id).map(|r| &r.cells_triggered_list)
    }

    pub fn report(&self, meas_id: u8) -> Option<&VarMeasReport> {
        self.reports.get(&meas_id)
    }

    pub fn pending_entering_triggers(&self, meas_id: u8) -> usize {
        self.entering_queue.get(&meas_id).map_or(0, VecDeque::len)
    }

    pub fn pending_leaving_triggers(&self, meas_id: u8) -> usize {
        self.leaving_queue.get(&meas_id).map_or(0, VecDeque::len)
    }

    /// Measurement reports built since the last call
    pub fn take_outbox(&mut self) -> Vec<MeasurementReport> {
        std::mem::take(&mut self.outbox)
    }

    /// Run the triggering procedure of every configured measurement identity
    pub fn evaluate_all(&mut self, ctx: &ServingContext) -> Result<(), RrcError> {
        let meas_ids: Vec<u8> = self.config.meas_id_list.keys().copied().collect();
        for meas_id in meas_ids {
            self.measurement_report_triggering(meas_id, ctx)?;
        }
        Ok(())
    }

    /// Evaluate the event of `meas_id` against the stored measurements
    pub fn measurement_report_triggering(
        &mut self,
        meas_id: u8,
        ctx: &ServingContext,
    ) -> Result<(), RrcError> {
        let (meas_object, report_config) = self.config.resolve(meas_id)?;
        let carrier_freq = meas_object.carrier_freq;
        let offset_freq = f64::from(meas_object.offset_freq);
        let report_config = *report_config;

        let serving_cell = match ctx.serving_cell_on(carrier_freq) {
            Some(cell) => cell,
            None => {
                trace!("measId {}: no serving cell on carrier {}", meas_id, carrier_freq);
                return Ok(());
            }
        };

        let evaluation = match report_config.event_id {
            EventType::A1 | EventType::A2 => {
                self.evaluate_serving_event(meas_id, &report_config, serving_cell)?
            }
            EventType::A3 | EventType::A4 => {
                self.evaluate_neighbour_event(meas_id, &report_config, ctx.pcell, carrier_freq, offset_freq)?
            }
            EventType::A5 => self.evaluate_a5(meas_id, &report_config, ctx.pcell, offset_freq)?,
        };

        let Some(evaluation) = evaluation else {
            return Ok(());
        };

        debug!(
            "measId {} event {:?}: entering {:?} leaving {:?}",
            meas_id, report_config.event_id, evaluation.entering, evaluation.leaving
        );

        let time_to_trigger = Duration::from_millis(u64::from(report_config.time_to_trigger));

        if !evaluation.entering.is_empty() {
            if time_to_trigger.is_zero() {
                self.add_cells(meas_id, &evaluation.entering);
            } else {
                self.schedule_trigger(Direction::Entering, meas_id, evaluation.entering, time_to_trigger, false);
            }
        }

        if !evaluation.leaving.is_empty() {
            let report_on_leave = report_config.event_id == EventType::A3 && report_config.report_on_leave;
            if time_to_trigger.is_zero() {
                self.erase_cells(meas_id, &evaluation.leaving, report_on_leave, ctx)?;
            } else {
                self.schedule_trigger(
                    Direction::Leaving,
                    meas_id,
                    evaluation.leaving,
                    time_to_trigger,
                    report_on_leave,
                );
            }
        }

        Ok(())
    }

    /// Events A1 and A2 on the serving cell of the object's carrier
    fn evaluate_serving_event(
        &mut self,
        meas_id: u8,
        cfg: &ReportConfigEutra,
        serving_cell: CellId,
    ) -> Result<Option<Evaluation>, RrcError> {
        let thresh = threshold_value(cfg.trigger_quantity, cfg.threshold1)?;
        let Some(ms) = self.quantity(serving_cell, cfg.trigger_quantity) else {
            trace!("measId {}: serving cell {} not measured", meas_id, serving_cell);
            return Ok(None);
        };
        let hys = hysteresis_ie_to_db(cfg.hysteresis);
        let ttt_running = cfg.time_to_trigger > 0;

        let (entry_cond, leaving_cond) = match cfg.event_id {
            // A1-1: Ms - Hys > Thresh, A1-2: Ms + Hys < Thresh
            EventType::A1 => (ms - hys > thresh, ms + hys < thresh),
            // A2-1: Ms + Hys < Thresh, A2-2: Ms - Hys > Thresh
            _ => (ms + hys < thresh, ms - hys > thresh),
        };

        let triggered = self.reports.get(&meas_id);
        let mut evaluation = Evaluation::default();

        if entry_cond {
            // the entry may still list the cell served before a handover
            let has_triggered = triggered.map_or(false, |r| r.cells_triggered_list.contains(&serving_cell));
            if !has_triggered {
                evaluation.entering.push(serving_cell);
            }
        } else if ttt_running {
            self.cancel_entering_trigger(meas_id);
        }

        if leaving_cond {
            if let Some(report) = self.reports.get(&meas_id) {
                if report.cells_triggered_list.contains(&serving_cell) {
                    evaluation.leaving.push(serving_cell);
                }
            }
        } else if ttt_running {
            self.cancel_leaving_trigger(meas_id);
        }

        trace!(
            "event {:?}: serving cell {} ms={} thresh={} entry={} leaving={}",
            cfg.event_id, serving_cell, ms, thresh, entry_cond, leaving_cond
        );
        Ok(Some(evaluation))
    }

    /// Events A3 and A4, evaluated per neighbour cell
    fn evaluate_neighbour_event(
        &mut self,
        meas_id: u8,
        cfg: &ReportConfigEutra,
        pcell: Option<CellId>,
        carrier_freq: Earfcn,
        offset_freq: f64,
    ) -> Result<Option<Evaluation>, RrcError> {
        let hys = hysteresis_ie_to_db(cfg.hysteresis);
        let ttt_running = cfg.time_to_trigger > 0;

        // Right hand side of the inequalities: Mp + Ofp + Off for A3, Thresh for A4
        let reference = match cfg.event_id {
            EventType::A3 => {
                // threshold1 only carries the quantity for A3
                check_threshold_quantity(cfg.trigger_quantity, cfg.threshold1)?;
                let Some(mp) = pcell.and_then(|cell| self.quantity(cell, cfg.trigger_quantity)) else {
                    trace!("measId {}: PCell not measured", meas_id);
                    return Ok(None);
                };
                mp + offset_freq + a3_offset_ie_to_db(cfg.a3_offset)
            }
            _ => threshold_value(cfg.trigger_quantity, cfg.threshold1)?,
        };

        let neighbours: Vec<(CellId, f64)> = self
            .store
            .iter()
            .filter(|(cell, _)| Some(*cell) != pcell)
            .filter(|(_, v)| cfg.event_id != EventType::A3 || v.carrier_freq == carrier_freq)
            .map(|(cell, v)| (cell, quantity_of(v.rsrp, v.rsrq, cfg.trigger_quantity)))
            .collect();

        let mut evaluation = Evaluation::default();
        for (cell, mn) in neighbours {
            let has_triggered = self.is_triggered(meas_id, cell);

            // A3-1 / A4-1: Mn + Ofn - Hys > reference
            let entry_cond = mn + offset_freq - hys > reference;
            if entry_cond {
                if !has_triggered {
                    evaluation.entering.push(cell);
                }
            } else if ttt_running {
                self.cancel_entering_trigger_for(meas_id, cell);
            }

            // A3-2 / A4-2: Mn + Ofn + Hys < reference
            let leaving_cond = mn + offset_freq + hys < reference;
            if leaving_cond {
                if has_triggered {
                    evaluation.leaving.push(cell);
                }
            } else if ttt_running {
                self.cancel_leaving_trigger_for(meas_id, cell);
            }

            trace!(
                "event {:?}: neighbour {} mn={} reference={} entry={} leaving={}",
                cfg.event_id, cell, mn, reference, entry_cond, leaving_cond
            );
        }

        Ok(Some(evaluation))
    }

    /// Event A5: PCell worse than threshold1 and neighbour better than threshold2
    fn evaluate_a5(
        &mut self,
        meas_id: u8,
        cfg: &ReportConfigEutra,
        pcell: Option<CellId>,
        offset_freq: f64,
    ) -> Result<Option<Evaluation>, RrcError> {
        let thresh1 = threshold_value(cfg.trigger_quantity, cfg.threshold1)?;
        let thresh2 = threshold_value(cfg.trigger_quantity, cfg.threshold2)?;
        let Some(mp) = pcell.and_then(|cell| self.quantity(cell, cfg.trigger_quantity)) else {
            trace!("measId {}: PCell not measured", meas_id);
            return Ok(None);
        };
        let hys = hysteresis_ie_to_db(cfg.hysteresis);
        let ttt_running = cfg.time_to_trigger > 0;

        let neighbours: Vec<(CellId, f64)> = self
            .store
            .iter()
            .filter(|(cell, _)| Some(*cell) != pcell)
            .map(|(cell, v)| (cell, quantity_of(v.rsrp, v.rsrq, cfg.trigger_quantity)))
            .collect();

        let mut evaluation = Evaluation::default();

        // A5-1: Mp + Hys < Thresh1
        let serving_degraded = mp + hys < thresh1;
        if serving_degraded {
            for &(cell, mn) in &neighbours {
                // A5-2: Mn + Ofn - Hys > Thresh2
                if mn + offset_freq - hys > thresh2 {
                    if !self.is_triggered(meas_id, cell) {
                        evaluation.entering.push(cell);
                    }
                } else if ttt_running {
                    self.cancel_entering_trigger_for(meas_id, cell);
                }
            }
        } else if ttt_running {
            self.cancel_entering_trigger(meas_id);
        }

        if self.reports.contains_key(&meas_id) {
            // A5-3: Mp - Hys > Thresh1
            let serving_recovered = mp - hys > thresh1;
            if !serving_recovered && ttt_running {
                self.cancel_leaving_trigger(meas_id);
            }
            for &(cell, mn) in &neighbours {
                if !self.is_triggered(meas_id, cell) {
                    continue;
                }
                // A5-4: Mn + Ofn + Hys < Thresh2
                let neighbour_left = mn + offset_freq + hys < thresh2;
                if serving_recovered {
                    // A5-3 alone takes the cell out; A5-4 only restarts its delay
                    if ttt_running && !neighbour_left {
                        self.cancel_leaving_trigger_for(meas_id, cell);
                    }
                    evaluation.leaving.push(cell);
                } else if neighbour_left {
                    evaluation.leaving.push(cell);
                }
            }
            trace!(
                "event A5: pcell mp={} thresh1={} thresh2={} recovered={}",
                mp, thresh1, thresh2, serving_recovered
            );
        }

        Ok(Some(evaluation))
    }

    fn quantity(&self, cell: CellId, quantity: TriggerQuantity) -> Option<f64> {
        self.store.get(cell).map(|v| quantity_of(v.rsrp, v.rsrq, quantity))
    }

    fn is_triggered(&self, meas_id: u8, cell: CellId) -> bool {
        self.reports
            .get(&meas_id)
            .map_or(false, |r| r.cells_triggered_list.contains(&cell))
    }

    fn queue_mut(&mut self, direction: Direction, meas_id: u8) -> &mut VecDeque<PendingTrigger> {
        let queues = match direction {
            Direction::Entering => &mut self.entering_queue,
            Direction::Leaving => &mut self.leaving_queue,
        };
        queues.entry(meas_id).or_default()
    }

    /// Queue a time-to-trigger delay for the cells that are not already
    /// waiting in the same direction
    fn schedule_trigger(
        &mut self,
        direction: Direction,
        meas_id: u8,
        cells: Vec<CellId>,
        delay: Duration,
        report_on_leave: bool,
    ) {
        let trigger_id = self.next_trigger_id;
        let timers = self.timers.clone();
        let queue = self.queue_mut(direction, meas_id);

        let fresh: Vec<CellId> = cells
            .into_iter()
            .filter(|cell| !queue.iter().any(|t| t.cells.contains(cell)))
            .collect();
        if fresh.is_empty() {
            return;
        }

        let timer = match direction {
            Direction::Entering => timers.schedule(delay, UeRrcTimer::EnteringTrigger { meas_id, trigger_id }),
            Direction::Leaving => timers.schedule(
                delay,
                UeRrcTimer::LeavingTrigger { meas_id, trigger_id, report_on_leave },
            ),
        };
        debug!(
            "measId {}: {:?} time-to-trigger {:?} for cells {:?}",
            meas_id, direction, delay, fresh
        );
        queue.push_back(PendingTrigger { id: trigger_id, cells: fresh, timer });
        self.next_trigger_id += 1;
    }

    /// Remove a fired trigger from its queue and return its cells
    fn take_fired(&mut self, direction: Direction, meas_id: u8, trigger_id: u64) -> Option<Vec<CellId>> {
        let queue = self.queue_mut(direction, meas_id);
        let pos = queue.iter().position(|t| t.id == trigger_id)?;
        queue.remove(pos).map(|t| t.cells)
    }

    /// Entering time-to-trigger of `trigger_id` elapsed
    pub fn on_entering_trigger(&mut self, meas_id: u8, trigger_id: u64) {
        let Some(cells) = self.take_fired(Direction::Entering, meas_id, trigger_id) else {
            debug!("measId {}: stale entering trigger {}", meas_id, trigger_id);
            return;
        };
        self.add_cells(meas_id, &cells);
        for cell in &cells {
            self.cancel_entering_trigger_for(meas_id, *cell);
        }
    }

    /// Leaving time-to-trigger of `trigger_id` elapsed
    pub fn on_leaving_trigger(
        &mut self,
        meas_id: u8,
        trigger_id: u64,
        report_on_leave: bool,
        ctx: &ServingContext,
    ) -> Result<(), RrcError> {
        let Some(cells) = self.take_fired(Direction::Leaving, meas_id, trigger_id) else {
            debug!("measId {}: stale leaving trigger {}", meas_id, trigger_id);
            return Ok(());
        };
        self.erase_cells(meas_id, &cells, report_on_leave, ctx)?;
        for cell in &cells {
            self.cancel_leaving_trigger_for(meas_id, *cell);
        }
        Ok(())
    }

    /// Add cells to the reporting entry, creating it when needed. The first
    /// report of an entry is sent after [`UE_MEASUREMENT_REPORT_DELAY`].
    pub fn add_cells(&mut self, meas_id: u8, cells: &[CellId]) {
        debug_assert!(!cells.is_empty());
        let report = self.reports.entry(meas_id).or_insert_with(|| VarMeasReport::new(meas_id));
        report.cells_triggered_list.extend(cells.iter().copied());

        if !self.timers.is_running(&report.periodic_report_timer) {
            report.number_of_reports_sent = 0;
            report.periodic_report_timer = Some(
                self.timers
                    .schedule(UE_MEASUREMENT_REPORT_DELAY, UeRrcTimer::MeasurementReport { meas_id }),
            );
        }
        debug!("measId {}: triggered cells {:?}", meas_id, report.cells_triggered_list);
    }

    /// Remove cells from the reporting entry, dropping the entry once empty
    pub fn erase_cells(
        &mut self,
        meas_id: u8,
        cells: &[CellId],
        report_on_leave: bool,
        ctx: &ServingContext,
    ) -> Result<(), RrcError> {
        let Some(report) = self.reports.get_mut(&meas_id) else {
            warn!("measId {}: no reporting entry to remove cells {:?} from", meas_id, cells);
            return Ok(());
        };
        for cell in cells {
            report.cells_triggered_list.remove(cell);
        }

        if report_on_leave {
            self.send_measurement_report(meas_id, ctx)?;
        }

        let emptied = self
            .reports
            .get(&meas_id)
            .map_or(false, |r| r.cells_triggered_list.is_empty());
        if emptied {
            if let Some(mut report) = self.reports.remove(&meas_id) {
                self.timers.cancel(&mut report.periodic_report_timer);
            }
            debug!("measId {}: reporting entry removed", meas_id);
        }
        Ok(())
    }

    /// Drop the reporting entry of `meas_id` and every pending trigger
    pub fn clear_report(&mut self, meas_id: u8) {
        if let Some(mut report) = self.reports.remove(&meas_id) {
            debug!("measId {}: deleting existing report", meas_id);
            self.timers.cancel(&mut report.periodic_report_timer);
        }
        self.cancel_entering_trigger(meas_id);
        self.cancel_leaving_trigger(meas_id);
    }

    /// Clear the reports of every configured measurement identity
    pub fn clear_all_reports(&mut self) {
        let meas_ids: Vec<u8> = self.config.meas_id_list.keys().copied().collect();
        for meas_id in meas_ids {
            self.clear_report(meas_id);
        }
    }

    fn cancel_queue(&mut self, direction: Direction, meas_id: u8) {
        let timers = self.timers.clone();
        let queue = self.queue_mut(direction, meas_id);
        for trigger in queue.drain(..) {
            trace!("measId {}: cancelling {:?} trigger {}", meas_id, direction, trigger.id);
            timers.cancel_id(trigger.timer);
        }
    }

    fn cancel_queue_for(&mut self, direction: Direction, meas_id: u8, cell: CellId) {
        let timers = self.timers.clone();
        let queue = self.queue_mut(direction, meas_id);
        queue.retain_mut(|trigger| {
            trigger.cells.retain(|c| *c != cell);
            if trigger.cells.is_empty() {
                trace!("measId {}: cancelling {:?} trigger {}", meas_id, direction, trigger.id);
                timers.cancel_id(trigger.timer);
                false
            } else {
                true
            }
        });
    }

    pub fn cancel_entering_trigger(&mut self, meas_id: u8) {
        self.cancel_queue(Direction::Entering, meas_id);
    }

    pub fn cancel_entering_trigger_for(&mut self, meas_id: u8, cell: CellId) {
        self.cancel_queue_for(Direction::Entering, meas_id, cell);
    }

    pub fn cancel_leaving_trigger(&mut self, meas_id: u8) {
        self.cancel_queue(Direction::Leaving, meas_id);
    }

    pub fn cancel_leaving_trigger_for(&mut self, meas_id: u8, cell: CellId) {
        self.cancel_queue_for(Direction::Leaving, meas_id, cell);
    }

    /// Forget the trigger queues of a removed measurement identity
    pub(super) fn drop_queues(&mut self, meas_id: u8) {
        self.entering_queue.remove(&meas_id);
        self.leaving_queue.remove(&meas_id);
    }
}

fn quantity_of(rsrp: f64, rsrq: f64, quantity: TriggerQuantity) -> f64 {
    match quantity {
        TriggerQuantity::Rsrp => rsrp,
        TriggerQuantity::Rsrq => rsrq,
    }
}

fn check_threshold_quantity(quantity: TriggerQuantity, threshold: ThresholdEutra) -> Result<(), RrcError> {
    threshold_value(quantity, threshold).map(|_| ())
}

/// Threshold in dBm or dB; its kind must match the trigger quantity
fn threshold_value(quantity: TriggerQuantity, threshold: ThresholdEutra) -> Result<f64, RrcError> {
    match (quantity, threshold) {
        (TriggerQuantity::Rsrp, ThresholdEutra::Rsrp(range)) => Ok(rsrp_range_to_dbm(range)),
        (TriggerQuantity::Rsrq, ThresholdEutra::Rsrq(range)) => Ok(rsrq_range_to_db(range)),
        (quantity, threshold) => Err(RrcError::ProtocolViolation(format!(
            "threshold {:?} does not match trigger quantity {:?}",
            threshold, quantity
        ))),
    }
}
