//! Mask store: one `data/masks/<mask>/<case>.npz` archive per (case, mask name).
//!
//! Archive keys: `predicted`, `current` (0-d sentinel when unchanged from the prediction),
//! `validated` and `users`. The record is validated exactly when both `validated` and a
//! non-empty `users` list are present.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::instrument;

use crate::constants::ARCHIVE_EXTENSION;
use crate::error::{ProjectError, Result};
use crate::io::{NpyArray, NpzArchive};
use crate::types::{CurrentMask, Mask, MaskRecord, MaskUpdate, ValidationState};

const KEY_PREDICTED: &str = "predicted";
const KEY_CURRENT: &str = "current";
const KEY_VALIDATED: &str = "validated";
const KEY_USERS: &str = "users";

#[derive(Debug, Clone)]
pub struct MaskStore {
    root: PathBuf,
}

impl MaskStore {
    #[must_use]
    pub fn new(masks_directory: impl Into<PathBuf>) -> Self {
        Self {
            root: masks_directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn mask_directory(&self, mask_name: &str) -> PathBuf {
        self.root.join(mask_name)
    }

    #[must_use]
    pub fn archive_path(&self, case_id: &str, mask_name: &str) -> PathBuf {
        self.mask_directory(mask_name)
            .join(format!("{case_id}.{ARCHIVE_EXTENSION}"))
    }

    #[must_use]
    pub fn exists(&self, case_id: &str, mask_name: &str) -> bool {
        self.archive_path(case_id, mask_name).is_file()
    }

    /// Mask names present on disk: the subdirectories of the masks directory. A project
    /// without a masks directory has none.
    pub fn mask_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if !self.root.is_dir() {
            return Ok(names);
        }
        for entry in fs_err::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Case identifiers that have an archive for `mask_name`, sorted.
    pub fn case_ids(&self, mask_name: &str) -> Result<Vec<String>> {
        let dir = self.mask_directory(mask_name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs_err::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Raw archive, for callers that need keys this store does not interpret.
    pub fn read_archive(&self, case_id: &str, mask_name: &str) -> Result<NpzArchive> {
        let path = self.archive_path(case_id, mask_name);
        NpzArchive::read(&path).map_err(|err| {
            if err.is_not_found() {
                ProjectError::not_found("mask archive", &path)
            } else {
                err
            }
        })
    }

    #[instrument(skip(self))]
    pub fn read(&self, case_id: &str, mask_name: &str) -> Result<MaskRecord> {
        let archive = self.read_archive(case_id, mask_name)?;
        decode_record(&archive, &self.archive_path(case_id, mask_name))
    }

    /// Read-modify-write: overlay `update` on the stored archive (or an empty one) and rewrite
    /// the whole file. Keys the update leaves `None`, and keys this store does not know, are
    /// kept as they were.
    #[instrument(skip(self, update), fields(
        predicted = update.predicted.is_some(),
        current = update.current.is_some(),
        validation = update.validation.is_some(),
    ))]
    pub fn write(&self, case_id: &str, mask_name: &str, update: MaskUpdate) -> Result<()> {
        let path = self.archive_path(case_id, mask_name);
        let mut archive = match self.read_archive(case_id, mask_name) {
            Ok(archive) => archive,
            Err(err) if err.is_not_found() => NpzArchive::new(),
            Err(err) => return Err(err),
        };

        if let Some(predicted) = &update.predicted {
            archive.insert(KEY_PREDICTED, NpyArray::from_mask(predicted));
        }
        match &update.current {
            Some(CurrentMask::SameAsPredicted) => {
                archive.insert(KEY_CURRENT, NpyArray::empty_sentinel());
            }
            Some(CurrentMask::Edited(mask)) => {
                archive.insert(KEY_CURRENT, NpyArray::from_mask(mask));
            }
            None => {}
        }
        match &update.validation {
            Some(ValidationState::Validated { validators, mask }) => {
                if validators.is_empty() {
                    return Err(ProjectError::integrity(
                        "a validated mask needs at least one validator",
                    ));
                }
                archive.insert(KEY_VALIDATED, NpyArray::from_mask(mask));
                archive.insert(KEY_USERS, NpyArray::from_strings(validators));
            }
            Some(ValidationState::Unvalidated) => {
                archive.remove(KEY_VALIDATED);
                archive.remove(KEY_USERS);
            }
            None => {}
        }

        fs_err::create_dir_all(self.mask_directory(mask_name))?;
        archive.write(&path)?;
        tracing::debug!(path = %path.display(), "mask archive written");
        Ok(())
    }

    /// Move the archive of `old_case_id` to `new_case_id`. Returns `false` when there was
    /// nothing to move.
    #[instrument(skip(self))]
    pub fn rename(&self, old_case_id: &str, new_case_id: &str, mask_name: &str) -> Result<bool> {
        let from = self.archive_path(old_case_id, mask_name);
        if !from.is_file() {
            return Ok(false);
        }
        let to = self.archive_path(new_case_id, mask_name);
        if to.exists() {
            return Err(ProjectError::conflict(format!(
                "mask archive {} already exists",
                to.display()
            )));
        }
        fs_err::rename(&from, &to)?;
        tracing::debug!(from = %from.display(), to = %to.display(), "mask archive moved");
        Ok(true)
    }

    /// Modification time of the archive.
    pub fn last_modified(&self, case_id: &str, mask_name: &str) -> Result<DateTime<Local>> {
        let path = self.archive_path(case_id, mask_name);
        let metadata = fs_err::metadata(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ProjectError::not_found("mask archive", &path)
            } else {
                err.into()
            }
        })?;
        Ok(DateTime::<Local>::from(metadata.modified()?))
    }
}

fn decode_mask(archive: &NpzArchive, key: &str) -> Result<Option<Mask>> {
    match archive.get(key) {
        Some(array) if !array.is_empty_sentinel() => Ok(Some(array.to_mask()?)),
        _ => Ok(None),
    }
}

pub(crate) fn decode_record(archive: &NpzArchive, path: &Path) -> Result<MaskRecord> {
    let predicted = decode_mask(archive, KEY_PREDICTED)?;
    let current = match archive.get(KEY_CURRENT) {
        Some(array) if array.is_empty_sentinel() => Some(CurrentMask::SameAsPredicted),
        Some(array) => Some(CurrentMask::Edited(array.to_mask()?)),
        None => None,
    };
    let validated = decode_mask(archive, KEY_VALIDATED)?;
    let validators = archive
        .get(KEY_USERS)
        // An empty list carries no dtype worth checking.
        .filter(|users| users.len() > 0)
        .map(NpyArray::to_strings)
        .transpose()?
        .filter(|users| !users.is_empty());

    let (validation, unattributed_validated) = match (validated, validators) {
        (Some(mask), Some(validators)) => (ValidationState::Validated { validators, mask }, None),
        (None, Some(validators)) => {
            return Err(ProjectError::integrity(format!(
                "{} lists validators {validators:?} but has no validated mask",
                path.display()
            )));
        }
        (Some(mask), None) => {
            tracing::warn!(
                path = %path.display(),
                "validated mask without validators; treating record as unvalidated"
            );
            (ValidationState::Unvalidated, Some(mask))
        }
        (None, None) => (ValidationState::Unvalidated, None),
    };

    Ok(MaskRecord {
        predicted,
        current,
        validation,
        unattributed_validated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn store() -> (TempDir, MaskStore) {
        let dir = TempDir::new().unwrap();
        let store = MaskStore::new(dir.path().join("masks"));
        (dir, store)
    }

    #[test]
    fn writing_predicted_keeps_current_and_validation() {
        let (_dir, store) = store();
        let current = array![[true, false], [false, false]];
        store
            .write(
                "c1",
                "muscle",
                MaskUpdate::current(CurrentMask::Edited(current.clone())).with_validation(
                    ValidationState::Validated {
                        validators: vec!["ana".into()],
                        mask: current.clone(),
                    },
                ),
            )
            .unwrap();

        let predicted = array![[true, true], [false, false]];
        store
            .write("c1", "muscle", MaskUpdate::predicted(predicted.clone()))
            .unwrap();

        let record = store.read("c1", "muscle").unwrap();
        assert_eq!(record.predicted, Some(predicted));
        assert_eq!(record.current, Some(CurrentMask::Edited(current.clone())));
        assert_eq!(record.validation.validators(), ["ana".to_string()]);
        assert_eq!(record.validation.mask(), Some(&current));
    }

    #[test]
    fn unknown_keys_survive_a_merge_write() {
        let (_dir, store) = store();
        let mut archive = NpzArchive::new();
        archive.insert("editor_state", NpyArray::from_values(&[7i32]));
        fs_err::create_dir_all(store.mask_directory("muscle")).unwrap();
        archive.write(&store.archive_path("c1", "muscle")).unwrap();

        store
            .write("c1", "muscle", MaskUpdate::predicted(array![[false]]))
            .unwrap();
        let raw = store.read_archive("c1", "muscle").unwrap();
        assert_eq!(raw.keys().collect::<Vec<_>>(), ["editor_state", "predicted"]);
    }

    #[test]
    fn unvalidating_drops_validated_and_users() {
        let (_dir, store) = store();
        let mask = array![[true]];
        store
            .write(
                "c1",
                "muscle",
                MaskUpdate::current(CurrentMask::SameAsPredicted).with_validation(
                    ValidationState::Validated {
                        validators: vec!["ana".into()],
                        mask,
                    },
                ),
            )
            .unwrap();
        store
            .write(
                "c1",
                "muscle",
                MaskUpdate::default().with_validation(ValidationState::Unvalidated),
            )
            .unwrap();
        let raw = store.read_archive("c1", "muscle").unwrap();
        assert!(!raw.contains("validated"));
        assert!(!raw.contains("users"));
        assert_eq!(
            store.read("c1", "muscle").unwrap().current,
            Some(CurrentMask::SameAsPredicted)
        );
    }

    #[test]
    fn validation_without_validators_is_rejected() {
        let (_dir, store) = store();
        let update = MaskUpdate::default().with_validation(ValidationState::Validated {
            validators: Vec::new(),
            mask: array![[true]],
        });
        let err = store.write("c1", "muscle", update).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DataIntegrity);
        assert!(!store.exists("c1", "muscle"));
    }

    #[test]
    fn legacy_validated_without_users_is_unvalidated() {
        let (_dir, store) = store();
        let mut archive = NpzArchive::new();
        archive.insert("predicted", NpyArray::from_mask(&array![[true]]));
        archive.insert("current", NpyArray::empty_sentinel());
        archive.insert("validated", NpyArray::from_mask(&array![[true]]));
        fs_err::create_dir_all(store.mask_directory("muscle")).unwrap();
        archive.write(&store.archive_path("c1", "muscle")).unwrap();

        let record = store.read("c1", "muscle").unwrap();
        assert!(!record.is_validated());
        assert_eq!(record.unattributed_validated, Some(array![[true]]));
    }

    #[test]
    fn users_without_validated_mask_is_an_integrity_error() {
        let (_dir, store) = store();
        let mut archive = NpzArchive::new();
        archive.insert("users", NpyArray::from_strings(&["ana"]));
        fs_err::create_dir_all(store.mask_directory("muscle")).unwrap();
        archive.write(&store.archive_path("c1", "muscle")).unwrap();

        let err = store.read("c1", "muscle").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DataIntegrity);
    }

    #[test]
    fn rename_moves_existing_archives_only() {
        let (_dir, store) = store();
        assert!(!store.rename("c1", "c2", "muscle").unwrap());

        store
            .write("c1", "muscle", MaskUpdate::predicted(array![[true]]))
            .unwrap();
        store
            .write("c3", "muscle", MaskUpdate::predicted(array![[true]]))
            .unwrap();
        assert!(store.rename("c1", "c2", "muscle").unwrap());
        assert_eq!(store.case_ids("muscle").unwrap(), ["c2", "c3"]);

        let err = store.rename("c2", "c3", "muscle").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[test]
    fn mask_names_lists_directories_only() {
        let (dir, store) = store();
        assert!(store.mask_names().unwrap().is_empty());

        fs_err::create_dir_all(store.mask_directory("muscle")).unwrap();
        fs_err::create_dir_all(store.mask_directory("fat")).unwrap();
        fs_err::write(dir.path().join("masks").join("notes.txt"), "x").unwrap();
        assert_eq!(
            store.mask_names().unwrap().into_iter().collect::<Vec<_>>(),
            ["fat", "muscle"]
        );
    }

    #[test]
    fn last_modified_needs_an_archive() {
        let (_dir, store) = store();
        assert!(store.last_modified("c1", "muscle").unwrap_err().is_not_found());
        store
            .write("c1", "muscle", MaskUpdate::predicted(array![[true]]))
            .unwrap();
        assert!(store.last_modified("c1", "muscle").unwrap() <= Local::now());
    }
}
