//! Public types exposed by the `bms-project` crate.

pub mod batch;
pub mod image;
pub mod mask;
pub mod measurement;
pub mod verification;

pub use batch::{BatchReport, ElementFailure};
pub use image::{CaseImage, DisplayParams, HuMatrix, PixelSpacing};
pub use mask::{CurrentMask, Mask, MaskRecord, MaskUpdate, ValidationState};
pub use measurement::{
    HuRange, Measurement, MeasurementOutcome, MeasurementReport, REPORT_HEADER, ReportOptions,
    ReportRow, format_value,
};
pub use verification::{
    Finding, FindingCode, Severity, VerificationReport, VerificationStatus,
};
