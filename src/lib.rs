#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: store and manifest accessors are self-describing.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Pixel counts and HU values stay far below the ranges where these casts lose information.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Pattern matching: these pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::len_without_is_empty)]

//! Project model for BM-Segmenter CT segmentation projects.
//!
//! A project directory holds a TOML manifest listing the cases, one NumPy archive per case with
//! the HU matrix, and one archive per (case, mask name) with the predicted, current and
//! validated segmentations. [`Project`] and [`Element`] expose the cases; [`measure`] turns a
//! validated mask into areas and mean densities.

/// The bms-project crate version (matches `Cargo.toml`).
pub const BMS_PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod error;
pub mod io;
pub mod manifest;
pub mod measure;
pub mod project;
pub mod store;
pub mod types;

pub use constants::*;
pub use error::{ErrorKind, ProjectError, RenameStep, Result};
pub use io::{NpyArray, NpzArchive};
pub use manifest::{Manifest, ManifestDocument};
pub use measure::measure;
pub use project::{
    Element, MaskPredictor, PredictionAdapter, PredictorError, Project, name_prefix,
    sort_for_display,
};
pub use store::{CaseImageStore, MaskStore};
pub use types::{
    BatchReport, CaseImage, CurrentMask, DisplayParams, ElementFailure, Finding, FindingCode,
    HuMatrix, HuRange, Mask, MaskRecord, MaskUpdate, Measurement, MeasurementOutcome,
    MeasurementReport, PixelSpacing, REPORT_HEADER, ReportOptions, ReportRow, Severity,
    ValidationState, VerificationReport, VerificationStatus, format_value,
};
