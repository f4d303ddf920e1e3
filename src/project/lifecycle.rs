//! Creating and opening project directories.
//!
//! A project is a directory holding `dataset.toml`, the case images under `data/dicoms` and the
//! mask archives under `data/masks`. Nothing is cached on the handle: every call observes the
//! current state of the disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::constants::{
    IMAGES_DIRECTORY, MANIFEST_FILE_NAME, MASKS_DIRECTORY, NAME_PREFIX_SEPARATOR,
};
use crate::error::{ProjectError, Result};
use crate::manifest::{Manifest, ManifestDocument};
use crate::store::{CaseImageStore, MaskStore};
use crate::types::CaseImage;

use super::element::Element;

/// Handle on a project directory.
#[derive(Debug, Clone)]
pub struct Project {
    pub(crate) root: PathBuf,
    pub(crate) manifest: Manifest,
    pub(crate) images: CaseImageStore,
    pub(crate) masks: MaskStore,
}

impl Project {
    fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            manifest: Manifest::new(root.join(MANIFEST_FILE_NAME)),
            images: CaseImageStore::new(root.join(IMAGES_DIRECTORY)),
            masks: MaskStore::new(root.join(MASKS_DIRECTORY)),
        }
    }

    /// Lay out an empty project: both data directories and a manifest with one empty group.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let project = Self::at(root.as_ref());
        if project.manifest.path().exists() {
            return Err(ProjectError::conflict(format!(
                "{} already holds a project",
                project.root.display()
            )));
        }
        fs_err::create_dir_all(project.images.directory())?;
        fs_err::create_dir_all(project.masks.directory())?;
        project.manifest.store(&ManifestDocument::empty())?;
        tracing::info!("project created");
        Ok(project)
    }

    /// Open an existing project. The manifest must exist and parse.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let project = Self::at(root.as_ref());
        project.manifest.load()?;
        Ok(project)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn images_directory(&self) -> &Path {
        self.images.directory()
    }

    #[must_use]
    pub fn masks_directory(&self) -> &Path {
        self.masks.directory()
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        self.manifest.path()
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn image_store(&self) -> &CaseImageStore {
        &self.images
    }

    #[must_use]
    pub fn mask_store(&self) -> &MaskStore {
        &self.masks
    }

    /// Case identifiers in manifest order.
    pub fn element_names(&self) -> Result<Vec<String>> {
        self.manifest.list_case_ids()
    }

    /// One element per manifest entry, in display order.
    pub fn elements(&self) -> Result<Vec<Element<'_>>> {
        let mut names = self.element_names()?;
        sort_for_display(&mut names);
        Ok(names
            .into_iter()
            .map(|name| Element::new(self, name))
            .collect())
    }

    /// Element for a case listed in the manifest.
    pub fn element(&self, case_id: &str) -> Result<Element<'_>> {
        if !self.element_names()?.iter().any(|name| name == case_id) {
            return Err(ProjectError::not_found(
                "case",
                self.images.case_directory(case_id),
            ));
        }
        Ok(Element::new(self, case_id.to_string()))
    }

    /// Mask names present on disk, including ones with no archive yet.
    pub fn mask_names(&self) -> Result<BTreeSet<String>> {
        self.masks.mask_names()
    }

    /// Store the image of a new case and list it in `files` and the default group.
    #[instrument(skip(self, image))]
    pub fn add_case(&self, case_id: &str, image: &CaseImage) -> Result<Element<'_>> {
        check_name("case", case_id)?;
        if self.element_names()?.iter().any(|name| name == case_id) {
            return Err(ProjectError::conflict(format!(
                "case {case_id:?} is already listed"
            )));
        }
        self.images.create(case_id, image)?;
        self.manifest.add_case_id(case_id)?;
        tracing::info!("case added");
        Ok(Element::new(self, case_id.to_string()))
    }
}

/// Part of a case identifier before the first `___`, or the whole identifier.
#[must_use]
pub fn name_prefix(case_id: &str) -> &str {
    case_id
        .split_once(NAME_PREFIX_SEPARATOR)
        .map_or(case_id, |(prefix, _)| prefix)
}

/// Order by prefix length, then prefix. Numeric prefixes without padding sort numerically this
/// way. Ties keep manifest order.
pub fn sort_for_display(case_ids: &mut [String]) {
    case_ids.sort_by(|a, b| {
        let (a, b) = (name_prefix(a), name_prefix(b));
        (a.chars().count(), a).cmp(&(b.chars().count(), b))
    });
}

/// Case and mask names double as directory and file names.
pub(crate) fn check_name(what: &str, name: &str) -> Result<()> {
    let reserved =
        name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']);
    if reserved {
        return Err(ProjectError::conflict(format!(
            "{name:?} cannot be used as a {what} name"
        )));
    }
    Ok(())
}
