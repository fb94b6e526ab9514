//! Measurement configuration (`VarMeasConfig`, TS 36.331 5.5.2)

use super::measurement::FilterCoefficients;
use super::triggering::MeasurementEngine;
use super::RrcError;
use common::filter_coefficient_to_alpha;
use interfaces::{
    MeasConfig, MeasIdToAddMod, MeasObjectEutra, MeasObjectToAddMod, QuantityConfig, ReportConfigEutra,
    ReportConfigToAddMod, TriggerType, UeCphySapProvider,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Measurement objects, report configurations and identities in force
#[derive(Debug, Clone, PartialEq)]
pub struct VarMeasConfig {
    pub meas_id_list: BTreeMap<u8, MeasIdToAddMod>,
    pub meas_object_list: BTreeMap<u8, MeasObjectToAddMod>,
    pub report_config_list: BTreeMap<u8, ReportConfigToAddMod>,
    pub quantity_config: QuantityConfig,
    pub a_rsrp: f64,
    pub a_rsrq: f64,
}

impl Default for VarMeasConfig {
    fn default() -> Self {
        let quantity_config = QuantityConfig::default();
        Self {
            meas_id_list: BTreeMap::new(),
            meas_object_list: BTreeMap::new(),
            report_config_list: BTreeMap::new(),
            a_rsrp: filter_coefficient_to_alpha(quantity_config.filter_coefficient_rsrp),
            a_rsrq: filter_coefficient_to_alpha(quantity_config.filter_coefficient_rsrq),
            quantity_config,
        }
    }
}

impl VarMeasConfig {
    pub fn filter_coefficients(&self) -> FilterCoefficients {
        FilterCoefficients { a_rsrp: self.a_rsrp, a_rsrq: self.a_rsrq }
    }

    /// Measurement object and report configuration linked by `meas_id`
    pub fn resolve(&self, meas_id: u8) -> Result<(&MeasObjectEutra, &ReportConfigEutra), RrcError> {
        let link = self
            .meas_id_list
            .get(&meas_id)
            .ok_or_else(|| RrcError::MissingMeasConfig(format!("measId {}", meas_id)))?;
        let object = self.meas_object_list.get(&link.meas_object_id).ok_or_else(|| {
            RrcError::MissingMeasConfig(format!("measObjectId {} of measId {}", link.meas_object_id, meas_id))
        })?;
        let report = self.report_config_list.get(&link.report_config_id).ok_or_else(|| {
            RrcError::MissingMeasConfig(format!(
                "reportConfigId {} of measId {}",
                link.report_config_id, meas_id
            ))
        })?;
        Ok((&object.meas_object_eutra, &report.report_config_eutra))
    }

    fn meas_ids_where(&self, pred: impl Fn(&MeasIdToAddMod) -> bool) -> Vec<u8> {
        self.meas_id_list.values().filter(|m| pred(m)).map(|m| m.meas_id).collect()
    }
}

impl MeasurementEngine {
    /// Apply a measurement configuration delta in the order of TS 36.331
    /// 5.5.2.1. Every change that invalidates a measurement identity clears
    /// its reporting entry and pending triggers before returning.
    pub fn apply_meas_config(
        &mut self,
        mc: &MeasConfig,
        cphy: &mut [Box<dyn UeCphySapProvider>],
    ) -> Result<(), RrcError> {
        if mc.meas_gap_config.is_some() {
            return Err(RrcError::Unsupported("measurement gaps".into()));
        }
        if mc.s_measure.is_some() {
            return Err(RrcError::Unsupported("s-measure".into()));
        }
        if mc.speed_state_pars.is_some() {
            return Err(RrcError::Unsupported("speed state parameters".into()));
        }
        if let Some(obj) = mc.meas_object_to_add_mod_list.iter().find(|o| o.meas_object_eutra.has_cell_lists()) {
            return Err(RrcError::Unsupported(format!(
                "cell lists in measObjectId {}",
                obj.meas_object_id
            )));
        }
        if let Some(rc) = mc
            .report_config_to_add_mod_list
            .iter()
            .find(|r| r.report_config_eutra.trigger_type != TriggerType::Event)
        {
            return Err(RrcError::Unsupported(format!(
                "periodical trigger in reportConfigId {}",
                rc.report_config_id
            )));
        }

        // 5.5.2.4 measurement object removal
        for &object_id in &mc.meas_object_to_remove_list {
            debug!("Deleting measObjectId {}", object_id);
            self.config.meas_object_list.remove(&object_id);
            for meas_id in self.config.meas_ids_where(|m| m.meas_object_id == object_id) {
                debug!("Deleting measId {} referring to measObjectId {}", meas_id, object_id);
                self.config.meas_id_list.remove(&meas_id);
                self.clear_report(meas_id);
            }
        }

        // 5.5.2.5 measurement object addition/modification
        for object in &mc.meas_object_to_add_mod_list {
            let object_id = object.meas_object_id;
            if self.config.meas_object_list.insert(object_id, object.clone()).is_some() {
                debug!("measObjectId {} exists, updating entry", object_id);
                for meas_id in self.config.meas_ids_where(|m| m.meas_object_id == object_id) {
                    self.clear_report(meas_id);
                }
            }
        }

        // 5.5.2.6 reporting configuration removal
        for &report_config_id in &mc.report_config_to_remove_list {
            debug!("Deleting reportConfigId {}", report_config_id);
            self.config.report_config_list.remove(&report_config_id);
            for meas_id in self.config.meas_ids_where(|m| m.report_config_id == report_config_id) {
                debug!("Deleting measId {} referring to reportConfigId {}", meas_id, report_config_id);
                self.config.meas_id_list.remove(&meas_id);
                self.clear_report(meas_id);
            }
        }

        // 5.5.2.7 reporting configuration addition/modification
        for report_config in &mc.report_config_to_add_mod_list {
            let report_config_id = report_config.report_config_id;
            if self
                .config
                .report_config_list
                .insert(report_config_id, *report_config)
                .is_some()
            {
                debug!("reportConfigId {} exists, updating entry", report_config_id);
                for meas_id in self.config.meas_ids_where(|m| m.report_config_id == report_config_id) {
                    self.clear_report(meas_id);
                }
            }
        }

        // 5.5.2.8 quantity configuration
        if let Some(qc) = mc.quantity_config {
            for phy in cphy.iter_mut() {
                phy.set_rsrp_filter_coefficient(qc.filter_coefficient_rsrp);
            }
            self.config.quantity_config = qc;
            self.config.a_rsrp = filter_coefficient_to_alpha(qc.filter_coefficient_rsrp);
            self.config.a_rsrq = filter_coefficient_to_alpha(qc.filter_coefficient_rsrq);
            debug!(
                "New filter coefficients: aRsrp={} aRsrq={}",
                self.config.a_rsrp, self.config.a_rsrq
            );
            self.clear_all_reports();
        }

        // 5.5.2.2 measurement identity removal
        for &meas_id in &mc.meas_id_to_remove_list {
            debug!("Deleting measId {}", meas_id);
            self.config.meas_id_list.remove(&meas_id);
            self.clear_report(meas_id);
            self.drop_queues(meas_id);
        }

        // 5.5.2.3 measurement identity addition/modification
        for link in &mc.meas_id_to_add_mod_list {
            if !self.config.meas_object_list.contains_key(&link.meas_object_id) {
                return Err(RrcError::MissingMeasConfig(format!(
                    "measId {} refers to unknown measObjectId {}",
                    link.meas_id, link.meas_object_id
                )));
            }
            if !self.config.report_config_list.contains_key(&link.report_config_id) {
                return Err(RrcError::MissingMeasConfig(format!(
                    "measId {} refers to unknown reportConfigId {}",
                    link.meas_id, link.report_config_id
                )));
            }
            debug!(
                "measId {} (measObjectId={}, reportConfigId={})",
                link.meas_id, link.meas_object_id, link.report_config_id
            );
            self.config.meas_id_list.insert(link.meas_id, *link);
            self.clear_report(link.meas_id);
        }

        Ok(())
    }

    /// Remove every measurement identity along with its reports
    pub fn clear_meas_ids(&mut self) {
        self.clear_all_reports();
        let meas_ids: Vec<u8> = self.config.meas_id_list.keys().copied().collect();
        for meas_id in meas_ids {
            self.drop_queues(meas_id);
        }
        self.config.meas_id_list.clear();
    }
}
