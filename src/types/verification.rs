//! Consistency findings produced by [`crate::Project::verify`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    /// Listed in `files` but `data/dicoms/<case>/0.npz` is missing.
    MissingImage,
    /// Image directory present but not listed in `files`.
    UnlistedImage,
    /// Identifier appears more than once in `files`.
    DuplicateCase,
    /// The default group does not mirror `files`.
    DefaultGroupOutOfSync,
    /// Mask archive whose case is not listed (typical after an interrupted rename).
    OrphanMask,
    /// Validated mask differs from the current one, or the archive cannot be decoded.
    MaskIntegrity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub code: FindingCode,
    pub severity: Severity,
    pub case_id: Option<String>,
    pub mask_name: Option<String>,
    pub detail: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {:?}", self.severity, self.code)?;
        if let Some(case_id) = &self.case_id {
            write!(f, " case={case_id}")?;
        }
        if let Some(mask_name) = &self.mask_name {
            write!(f, " mask={mask_name}")?;
        }
        write!(f, ": {}", self.detail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Clean,
    Warnings,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub findings: Vec<Finding>,
    pub cases_checked: usize,
    pub masks_checked: usize,
}

impl VerificationReport {
    #[must_use]
    pub fn status(&self) -> VerificationStatus {
        match self.findings.iter().map(|finding| finding.severity).max() {
            None => VerificationStatus::Clean,
            Some(Severity::Warning) => VerificationStatus::Warnings,
            Some(Severity::Error) => VerificationStatus::Failed,
        }
    }

    #[must_use]
    pub fn has(&self, code: FindingCode) -> bool {
        self.findings.iter().any(|finding| finding.code == code)
    }

    pub(crate) fn push(
        &mut self,
        code: FindingCode,
        severity: Severity,
        case_id: Option<&str>,
        mask_name: Option<&str>,
        detail: impl Into<String>,
    ) {
        self.findings.push(Finding {
            code,
            severity,
            case_id: case_id.map(str::to_string),
            mask_name: mask_name.map(str::to_string),
            detail: detail.into(),
        });
    }
}
