//! Read-only consistency check across the manifest and both stores.

use std::collections::HashSet;

use tracing::instrument;

use crate::error::Result;
use crate::types::{FindingCode, Severity, VerificationReport, VerificationStatus};

use super::lifecycle::Project;

impl Project {
    /// Walk the manifest, the image directories and every mask archive and report what does not
    /// line up. Nothing is repaired.
    #[instrument(skip(self))]
    pub fn verify(&self) -> Result<VerificationReport> {
        let document = self.manifest.load()?;
        let files = document.files()?;
        let mut report = VerificationReport {
            cases_checked: files.len(),
            ..VerificationReport::default()
        };

        let mut listed = HashSet::with_capacity(files.len());
        for case_id in &files {
            if !listed.insert(case_id.as_str()) {
                report.push(
                    FindingCode::DuplicateCase,
                    Severity::Error,
                    Some(case_id.as_str()),
                    None,
                    "listed more than once in `files`",
                );
            }
        }

        match document.groups()?.into_iter().next() {
            Some((name, members)) if members != files => report.push(
                FindingCode::DefaultGroupOutOfSync,
                Severity::Warning,
                None,
                None,
                format!("group {name:?} does not mirror `files`"),
            ),
            Some(_) => {}
            None => report.push(
                FindingCode::DefaultGroupOutOfSync,
                Severity::Warning,
                None,
                None,
                "manifest has no groups",
            ),
        }

        for case_id in &files {
            if !self.images.exists(case_id) {
                report.push(
                    FindingCode::MissingImage,
                    Severity::Error,
                    Some(case_id.as_str()),
                    None,
                    format!("{} is missing", self.images.archive_path(case_id).display()),
                );
            }
        }
        for directory in self.images.case_directories()? {
            if !listed.contains(directory.as_str()) {
                report.push(
                    FindingCode::UnlistedImage,
                    Severity::Warning,
                    Some(directory.as_str()),
                    None,
                    "image directory is not listed in `files`",
                );
            }
        }

        for mask_name in self.masks.mask_names()? {
            for case_id in self.masks.case_ids(&mask_name)? {
                report.masks_checked += 1;
                if !listed.contains(case_id.as_str()) {
                    report.push(
                        FindingCode::OrphanMask,
                        Severity::Warning,
                        Some(case_id.as_str()),
                        Some(mask_name.as_str()),
                        "mask archive belongs to no listed case",
                    );
                }
                let checked = self
                    .masks
                    .read(&case_id, &mask_name)
                    .and_then(|record| record.check_consistency());
                if let Err(err) = checked {
                    report.push(
                        FindingCode::MaskIntegrity,
                        Severity::Error,
                        Some(case_id.as_str()),
                        Some(mask_name.as_str()),
                        err.to_string(),
                    );
                }
            }
        }

        match report.status() {
            VerificationStatus::Clean => tracing::info!(
                cases = report.cases_checked,
                masks = report.masks_checked,
                "project is consistent"
            ),
            status => tracing::warn!(
                ?status,
                findings = report.findings.len(),
                "project has inconsistencies"
            ),
        }
        Ok(report)
    }
}
