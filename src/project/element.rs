//! Per-case view over the project stores.

use chrono::{DateTime, Local};
use once_cell::unsync::OnceCell;
use tracing::instrument;

use crate::error::Result;
use crate::types::{
    CaseImage, DisplayParams, Mask, MaskRecord, MaskUpdate, PixelSpacing, ValidationState,
};

use super::lifecycle::{Project, name_prefix};

/// One case of a project.
///
/// The image is loaded on first use and cached until the element is renamed. Mask reads always
/// go to disk.
#[derive(Debug)]
pub struct Element<'p> {
    project: &'p Project,
    name: String,
    image: OnceCell<CaseImage>,
}

impl<'p> Element<'p> {
    pub(crate) fn new(project: &'p Project, name: String) -> Self {
        Self {
            project,
            name,
            image: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn name_prefix(&self) -> &str {
        name_prefix(&self.name)
    }

    #[must_use]
    pub fn project(&self) -> &'p Project {
        self.project
    }

    pub fn image(&self) -> Result<&CaseImage> {
        self.image
            .get_or_try_init(|| self.project.images.read(&self.name))
    }

    pub fn pixel_spacing(&self) -> Result<PixelSpacing> {
        Ok(self.image()?.spacing)
    }

    pub fn display_params(&self) -> Result<&DisplayParams> {
        Ok(&self.image()?.display)
    }

    /// Decoded mask archive. `NotFound` when the case has no archive for `mask_name`.
    pub fn mask_record(&self, mask_name: &str) -> Result<MaskRecord> {
        self.project.masks.read(&self.name, mask_name)
    }

    pub fn predicted_mask(&self, mask_name: &str) -> Result<Option<Mask>> {
        Ok(self.mask_record(mask_name)?.predicted)
    }

    /// Current segmentation, with the "unchanged" sentinel resolved to the prediction.
    pub fn current_mask(&self, mask_name: &str) -> Result<Option<Mask>> {
        Ok(self.mask_record(mask_name)?.effective_current().cloned())
    }

    pub fn validated_mask(&self, mask_name: &str) -> Result<Option<Mask>> {
        Ok(self.mask_record(mask_name)?.validation.mask().cloned())
    }

    pub fn validators(&self, mask_name: &str) -> Result<Vec<String>> {
        Ok(self.mask_record(mask_name)?.validation.validators().to_vec())
    }

    /// Validation state; a missing archive reads as unvalidated.
    pub fn validation_state(&self, mask_name: &str) -> Result<ValidationState> {
        match self.mask_record(mask_name) {
            Ok(record) => Ok(record.validation),
            Err(err) if err.is_not_found() => Ok(ValidationState::Unvalidated),
            Err(err) => Err(err),
        }
    }

    /// `false` without an archive or without validators. A validated record whose validated
    /// mask disagrees with the current one is a `DataIntegrity` error.
    #[instrument(skip(self), fields(case = %self.name))]
    pub fn is_validated(&self, mask_name: &str) -> Result<bool> {
        let record = match self.mask_record(mask_name) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };
        if !record.is_validated() {
            return Ok(false);
        }
        record.check_consistency()?;
        Ok(true)
    }

    /// Merge-write `predicted`, keeping every other key of the archive.
    #[instrument(skip(self, predicted), fields(case = %self.name))]
    pub fn set_predicted_mask(&self, mask_name: &str, predicted: Mask) -> Result<()> {
        self.update_mask(mask_name, MaskUpdate::predicted(predicted))
    }

    /// Merge-write the fields set in `update`.
    pub fn update_mask(&self, mask_name: &str, update: MaskUpdate) -> Result<()> {
        self.project.masks.write(&self.name, mask_name, update)
    }

    pub fn mask_last_edit_time(&self, mask_name: &str) -> Result<DateTime<Local>> {
        self.project.masks.last_modified(&self.name, mask_name)
    }

    /// Rename the case everywhere it is stored. On success the element carries the new name
    /// and its cached image is dropped. On failure the element keeps its old name; see
    /// [`Project::rename_element`].
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        self.project.rename_element(&self.name, new_name)?;
        self.name = new_name.to_string();
        self.image = OnceCell::new();
        Ok(())
    }
}
