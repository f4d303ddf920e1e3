//! Renaming a case across the image store, the mask store and the manifest.
//!
//! Steps run in a fixed order: image directory, mask archives, manifest. There is no rollback.
//! Each step is a no-op once it has been applied, so an interrupted rename is finished by
//! running the same steps again with [`Project::complete_rename`].

use tracing::instrument;

use crate::error::{ProjectError, RenameStep, Result};

use super::lifecycle::{Project, check_name};

impl Project {
    /// Rename `old_id` to `new_id`.
    ///
    /// Fails with `Conflict` before touching anything when `new_id` is already listed or already
    /// has an image directory or a mask archive. A failure after the first step has been applied
    /// is reported as [`ProjectError::RenameIncomplete`].
    #[instrument(skip(self))]
    pub fn rename_element(&self, old_id: &str, new_id: &str) -> Result<()> {
        check_name("case", new_id)?;
        if old_id == new_id {
            return Err(ProjectError::conflict(format!(
                "case {old_id:?} is already named {new_id:?}"
            )));
        }

        let listed = self.element_names()?;
        if !listed.iter().any(|name| name == old_id) {
            return Err(ProjectError::not_found(
                "case",
                self.images.case_directory(old_id),
            ));
        }
        if listed.iter().any(|name| name == new_id) {
            return Err(ProjectError::conflict(format!(
                "case {new_id:?} is already listed"
            )));
        }
        if self.images.case_directory(new_id).exists() {
            return Err(ProjectError::conflict(format!(
                "image directory for {new_id:?} already exists"
            )));
        }
        for mask_name in self.masks.mask_names()? {
            if self.masks.archive_path(new_id, &mask_name).exists() {
                return Err(ProjectError::conflict(format!(
                    "mask {mask_name:?} already has an archive for {new_id:?}"
                )));
            }
        }
        if !self.images.case_directory(old_id).is_dir() {
            return Err(ProjectError::not_found(
                "case directory",
                self.images.case_directory(old_id),
            ));
        }

        self.run_rename_steps(old_id, new_id)?;
        tracing::info!("case renamed");
        Ok(())
    }

    /// Finish a rename that stopped part-way. Steps already applied are skipped.
    #[instrument(skip(self))]
    pub fn complete_rename(&self, old_id: &str, new_id: &str) -> Result<()> {
        check_name("case", new_id)?;
        self.run_rename_steps(old_id, new_id)?;
        tracing::info!("rename completed");
        Ok(())
    }

    fn run_rename_steps(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut completed = Vec::with_capacity(3);
        let interrupted = |completed: &[RenameStep], source: ProjectError| {
            if completed.is_empty() {
                return source;
            }
            ProjectError::RenameIncomplete {
                from: old_id.to_string(),
                to: new_id.to_string(),
                completed: completed.to_vec(),
                source: Box::new(source),
            }
        };

        if let Err(err) = self.rename_image_directory(old_id, new_id) {
            return Err(interrupted(&completed, err));
        }
        completed.push(RenameStep::ImageDirectory);

        if let Err(err) = self.rename_mask_archives(old_id, new_id) {
            return Err(interrupted(&completed, err));
        }
        completed.push(RenameStep::MaskArchives);

        if let Err(err) = self.manifest.rename_case_id(old_id, new_id) {
            return Err(interrupted(&completed, err));
        }
        Ok(())
    }

    fn rename_image_directory(&self, old_id: &str, new_id: &str) -> Result<()> {
        let from = self.images.case_directory(old_id);
        let to = self.images.case_directory(new_id);
        match (from.is_dir(), to.exists()) {
            (true, _) => self.images.rename(old_id, new_id),
            (false, true) => {
                tracing::debug!("image directory already moved");
                Ok(())
            }
            (false, false) => Err(ProjectError::not_found("case directory", from)),
        }
    }

    fn rename_mask_archives(&self, old_id: &str, new_id: &str) -> Result<()> {
        for mask_name in self.masks.mask_names()? {
            if self.masks.rename(old_id, new_id, &mask_name)? {
                tracing::debug!(mask = %mask_name, "mask archive renamed");
            }
        }
        Ok(())
    }
}
