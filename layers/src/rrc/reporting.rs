//! Measurement reporting (TS 36.331 5.5.5)

use super::timers::UeRrcTimer;
use super::triggering::{MeasurementEngine, ServingContext};
use super::RrcError;
use common::{db_to_rsrq_range, dbm_to_rsrp_range, CellId};
use interfaces::{
    MeasResultEutra, MeasResultScell, MeasResultServFreq, MeasResults, MeasurementReport, ReportQuantity,
    TriggerQuantity,
};
use tracing::{error, info, warn};

impl MeasurementEngine {
    /// Build the report of `meas_id`, queue it in the outbox and re-arm the
    /// periodic report. The report amount is treated as infinite.
    pub fn send_measurement_report(&mut self, meas_id: u8, ctx: &ServingContext) -> Result<(), RrcError> {
        let (_, report_config) = self.config.resolve(meas_id)?;
        let report_config = *report_config;

        let Some(entry) = self.reports.get(&meas_id) else {
            error!("No entry found in VarMeasReportList for measId {}", meas_id);
            return Ok(());
        };

        let pcell = ctx
            .pcell
            .ok_or_else(|| RrcError::ProtocolViolation("measurement report without PCell".into()))?;
        let serving = self.store.get(pcell).ok_or_else(|| {
            RrcError::ProtocolViolation(format!("no measurement of serving cell {}", pcell))
        })?;

        let mut results = MeasResults {
            meas_id,
            rsrp_result: dbm_to_rsrp_range(serving.rsrp),
            rsrq_result: db_to_rsrq_range(serving.rsrq),
            meas_result_list_eutra: Vec::new(),
            meas_scell_result_list: Vec::new(),
        };
        info!(
            "Reporting serving cell {} RSRP {} ({} dBm) RSRQ {} ({} dB)",
            pcell, results.rsrp_result, serving.rsrp, results.rsrq_result, serving.rsrq
        );

        for (cc, carrier) in ctx.carriers.iter().enumerate().skip(1) {
            let Some(values) = carrier.cell_id.and_then(|cell| self.store.get(cell)) else {
                continue;
            };
            results.meas_scell_result_list.push(MeasResultServFreq {
                serv_freq_id: cc as u8,
                meas_result_scell: Some(MeasResultScell {
                    rsrp_result: dbm_to_rsrp_range(values.rsrp),
                    rsrq_result: db_to_rsrq_range(values.rsrq),
                }),
            });
        }

        if entry.cells_triggered_list.is_empty() {
            warn!("cellsTriggeredList of measId {} is empty", meas_id);
        }

        // neighbours with equal trigger quantity sort by ascending cell id
        // (BTreeSet order, stable sort)
        let mut neighbours: Vec<(CellId, f64, f64)> = entry
            .cells_triggered_list
            .iter()
            .filter(|cell| **cell != pcell)
            .filter_map(|cell| self.store.get(*cell).map(|v| (*cell, v.rsrp, v.rsrq)))
            .collect();
        let key = |n: &(CellId, f64, f64)| match report_config.trigger_quantity {
            TriggerQuantity::Rsrp => n.1,
            TriggerQuantity::Rsrq => n.2,
        };
        neighbours.sort_by(|a, b| key(b).total_cmp(&key(a)));

        for (cell, rsrp, rsrq) in neighbours
            .into_iter()
            .take(usize::from(report_config.max_report_cells))
        {
            let (with_rsrp, with_rsrq) = match (report_config.report_quantity, report_config.trigger_quantity) {
                (ReportQuantity::Both, _) => (true, true),
                (ReportQuantity::SameAsTriggerQuantity, TriggerQuantity::Rsrp) => (true, false),
                (ReportQuantity::SameAsTriggerQuantity, TriggerQuantity::Rsrq) => (false, true),
            };
            let result = MeasResultEutra {
                phys_cell_id: cell,
                rsrp_result: with_rsrp.then(|| dbm_to_rsrp_range(rsrp)),
                rsrq_result: with_rsrq.then(|| db_to_rsrq_range(rsrq)),
            };
            info!(
                "Reporting neighbour cell {} RSRP {:?} ({} dBm) RSRQ {:?} ({} dB)",
                cell, result.rsrp_result, rsrp, result.rsrq_result, rsrq
            );
            results.meas_result_list_eutra.push(result);
        }

        let timers = self.timers.clone();
        if let Some(entry) = self.reports.get_mut(&meas_id) {
            entry.number_of_reports_sent += 1;
            timers.cancel(&mut entry.periodic_report_timer);
            entry.periodic_report_timer = Some(timers.schedule(
                report_config.report_interval.as_duration(),
                UeRrcTimer::MeasurementReport { meas_id },
            ));
        }

        self.outbox.push(MeasurementReport { meas_results: results });
        Ok(())
    }
}
