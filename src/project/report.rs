//! Measurement report over every case of a project.

use std::io::Write;
use std::path::PathBuf;

use atomic_write_file::AtomicWriteFile;
use tracing::instrument;

use crate::constants::REPORT_FILE_SUFFIX;
use crate::error::Result;
use crate::measure::measure;
use crate::types::{
    Measurement, MeasurementOutcome, MeasurementReport, ReportOptions, ReportRow, ValidationState,
};

use super::lifecycle::{Project, check_name, name_prefix, sort_for_display};

impl Project {
    /// Measure the validated `mask_name` of one case. `None` when the case has no validated
    /// mask.
    pub fn measure_case(
        &self,
        case_id: &str,
        mask_name: &str,
        options: &ReportOptions,
    ) -> Result<Option<Measurement>> {
        let record = match self.masks.read(case_id, mask_name) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let ValidationState::Validated { mask, .. } = &record.validation else {
            return Ok(None);
        };
        record.check_consistency()?;

        let image = self.images.read(case_id)?;
        measure(
            image.matrix.view(),
            mask,
            image.spacing,
            options.restricted_range,
        )
        .map(Some)
    }

    /// One row per listed case, in display order. Cases that fail to load or measure are kept
    /// as rows and listed by [`MeasurementReport::failures`].
    #[instrument(skip(self, options))]
    pub fn measurement_report(
        &self,
        mask_name: &str,
        options: &ReportOptions,
    ) -> Result<MeasurementReport> {
        check_name("mask", mask_name)?;
        let mut case_ids = self.element_names()?;
        sort_for_display(&mut case_ids);

        #[cfg(feature = "parallel")]
        let rows: Vec<ReportRow> = {
            use rayon::prelude::*;
            case_ids
                .par_iter()
                .map(|case_id| self.report_row(case_id, mask_name, options))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let rows: Vec<ReportRow> = case_ids
            .iter()
            .map(|case_id| self.report_row(case_id, mask_name, options))
            .collect();

        let report = MeasurementReport {
            mask_name: mask_name.to_string(),
            rows,
        };
        tracing::info!(
            rows = report.rows.len(),
            measured = report.measured_count(),
            failed = report.failures().count(),
            "measurement report built"
        );
        Ok(report)
    }

    /// Build the report and write it to `<root>/<mask>_measurements.csv`, replacing any
    /// previous file.
    pub fn write_measurement_report(
        &self,
        mask_name: &str,
        options: &ReportOptions,
    ) -> Result<(PathBuf, MeasurementReport)> {
        let report = self.measurement_report(mask_name, options)?;
        let path = self.report_path(mask_name);
        let mut file = AtomicWriteFile::open(&path)?;
        file.write_all(report.to_csv().as_bytes())?;
        file.commit()?;
        tracing::debug!(path = %path.display(), "measurement report written");
        Ok((path, report))
    }

    #[must_use]
    pub fn report_path(&self, mask_name: &str) -> PathBuf {
        self.root.join(format!("{mask_name}{REPORT_FILE_SUFFIX}"))
    }

    fn report_row(&self, case_id: &str, mask_name: &str, options: &ReportOptions) -> ReportRow {
        let outcome = match self.measure_case(case_id, mask_name, options) {
            Ok(Some(measurement)) => MeasurementOutcome::Measured(measurement),
            Ok(None) => MeasurementOutcome::Unmeasured,
            Err(err) => {
                tracing::warn!(case = %case_id, error = %err, "case not measured");
                MeasurementOutcome::Failed(err.to_string())
            }
        };
        ReportRow {
            case_id: case_id.to_string(),
            label: name_prefix(case_id).to_string(),
            outcome,
        }
    }
}
