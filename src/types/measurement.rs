//! Measurement records and the tabular report built from them.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_RESTRICTED_HU_MAX, DEFAULT_RESTRICTED_HU_MIN, IMAT_HU_MAX, IMAT_HU_MIN,
    REPORT_DECIMALS, UNMEASURED_MARKER,
};

/// Report column headers, in output order.
pub const REPORT_HEADER: [&str; 6] = [
    "Name",
    "Area [full] (cm^2)",
    "Area [restricted] (cm^2)",
    "Mean [full] (HU)",
    "Mean [restricted] (HU)",
    "IMAT (cm^2)",
];

/// Inclusive HU interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HuRange {
    pub lo: f64,
    pub hi: f64,
}

impl HuRange {
    /// Intramuscular adipose tissue band. Fixed, not configurable.
    pub const IMAT: Self = Self {
        lo: IMAT_HU_MIN,
        hi: IMAT_HU_MAX,
    };

    #[must_use]
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    #[must_use]
    pub fn contains(self, hu: f64) -> bool {
        self.lo <= hu && hu <= self.hi
    }
}

impl Default for HuRange {
    fn default() -> Self {
        Self::new(DEFAULT_RESTRICTED_HU_MIN, DEFAULT_RESTRICTED_HU_MAX)
    }
}

/// Tunables for report generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Band used for the restricted area and mean.
    pub restricted_range: HuRange,
}

/// Full-precision result of measuring one validated mask.
///
/// Means are `None` when no pixel contributed to them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub pixel_area_cm2: f64,
    pub full_area_cm2: f64,
    pub restricted_area_cm2: f64,
    pub imat_area_cm2: f64,
    pub full_mean_hu: Option<f64>,
    pub restricted_mean_hu: Option<f64>,
}

/// What a report row holds for one case.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementOutcome {
    Measured(Measurement),
    /// No validated mask for the requested mask name.
    Unmeasured,
    /// Reading or measuring the case failed; the row renders as unmeasured.
    Failed(String),
}

impl MeasurementOutcome {
    #[must_use]
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Self::Measured(measurement) => Some(measurement),
            Self::Unmeasured | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Full case identifier.
    pub case_id: String,
    /// Label printed in the first column (the name prefix).
    pub label: String,
    pub outcome: MeasurementOutcome,
}

impl ReportRow {
    /// Cells in [`REPORT_HEADER`] order, rounded for output.
    #[must_use]
    pub fn cells(&self) -> [String; 6] {
        let label = self.label.clone();
        match self.outcome.measurement() {
            Some(m) => [
                label,
                format_value(Some(m.full_area_cm2)),
                format_value(Some(m.restricted_area_cm2)),
                format_value(m.full_mean_hu),
                format_value(m.restricted_mean_hu),
                format_value(Some(m.imat_area_cm2)),
            ],
            None => [
                label,
                UNMEASURED_MARKER.to_string(),
                UNMEASURED_MARKER.to_string(),
                UNMEASURED_MARKER.to_string(),
                UNMEASURED_MARKER.to_string(),
                UNMEASURED_MARKER.to_string(),
            ],
        }
    }
}

/// One row per case, in project display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementReport {
    pub mask_name: String,
    pub rows: Vec<ReportRow>,
}

impl MeasurementReport {
    /// Rows whose case could not be processed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().filter_map(|row| match &row.outcome {
            MeasurementOutcome::Failed(reason) => Some((row.case_id.as_str(), reason.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn measured_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.outcome.measurement().is_some())
            .count()
    }

    /// Comma-separated rendering with a header row and `\r\n` line endings.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, REPORT_HEADER.iter().copied());
        for row in &self.rows {
            let cells = row.cells();
            push_csv_line(&mut out, cells.iter().map(String::as_str));
        }
        out
    }
}

/// Round to [`REPORT_DECIMALS`] digits; `None` becomes the unmeasured marker.
#[must_use]
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => {
            let mut text = format!("{value:.prec$}", prec = REPORT_DECIMALS);
            // Trim trailing zeros but keep one fractional digit.
            let min_len = text.find('.').map_or(text.len(), |dot| dot + 2);
            let keep = text.trim_end_matches('0').len().max(min_len);
            text.truncate(keep);
            // Avoid printing "-0.0".
            if text == "-0.0" {
                text.remove(0);
            }
            text
        }
        _ => UNMEASURED_MARKER.to_string(),
    }
}

fn push_csv_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (index, cell) in cells.enumerate() {
        if index > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_rounded_to_three_digits() {
        assert_eq!(format_value(Some(0.08)), "0.08");
        assert_eq!(format_value(Some(12.34567)), "12.346");
        assert_eq!(format_value(Some(-0.0001)), "0.0");
        assert_eq!(format_value(Some(10.0)), "10.0");
        assert_eq!(format_value(Some(-100.0)), "-100.0");
        assert_eq!(format_value(Some(1.0005)), "1.0");
        assert_eq!(format_value(Some(1.2345)), "1.234");
        assert_eq!(format_value(Some(0.0625)), "0.062");
        assert_eq!(format_value(Some(0.1875)), "0.188");
        assert_eq!(format_value(None), "N/A");
        assert_eq!(format_value(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn unmeasured_rows_render_na_in_every_numeric_column() {
        let row = ReportRow {
            case_id: "7___b".into(),
            label: "7".into(),
            outcome: MeasurementOutcome::Unmeasured,
        };
        let cells = row.cells();
        assert_eq!(cells[0], "7");
        assert!(cells[1..].iter().all(|cell| cell == "N/A"));
    }

    #[test]
    fn csv_has_header_and_quotes_awkward_labels() {
        let report = MeasurementReport {
            mask_name: "muscle".into(),
            rows: vec![ReportRow {
                case_id: "a,b".into(),
                label: "a,b".into(),
                outcome: MeasurementOutcome::Measured(Measurement {
                    pixel_area_cm2: 0.02,
                    full_area_cm2: 0.08,
                    restricted_area_cm2: 0.08,
                    imat_area_cm2: 0.0,
                    full_mean_hu: Some(10.0),
                    restricted_mean_hu: None,
                }),
            }],
        };
        let csv = report.to_csv();
        let mut lines = csv.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "Name,Area [full] (cm^2),Area [restricted] (cm^2),Mean [full] (HU),Mean [restricted] (HU),IMAT (cm^2)"
        );
        assert_eq!(lines.next().unwrap(), "\"a,b\",0.08,0.08,10.0,N/A,0.0");
        assert_eq!(report.measured_count(), 1);
    }

    #[test]
    fn imat_band_is_inclusive() {
        assert!(HuRange::IMAT.contains(-190.0));
        assert!(HuRange::IMAT.contains(-31.0));
        assert!(!HuRange::IMAT.contains(-30.5));
    }
}
