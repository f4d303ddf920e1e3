//! Case image store: one `data/dicoms/<case>/0.npz` archive per case.
//!
//! Image data is never rewritten by this crate. The only mutations are creating a new case
//! and moving a case directory during a rename.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::constants::IMAGE_ARCHIVE_NAME;
use crate::error::{ProjectError, Result};
use crate::io::{NpyArray, NpzArchive};
use crate::types::{CaseImage, DisplayParams, HuMatrix, PixelSpacing};

const KEY_MATRIX: &str = "matrix";
const KEY_SPACING: &str = "spacing";
const KEY_WINDOWING: &str = "windowing";
const KEY_CROP_X: &str = "crop_x";
const KEY_CROP_Y: &str = "crop_y";
const KEY_SLICE_INFO: &str = "slice_info";

#[derive(Debug, Clone)]
pub struct CaseImageStore {
    root: PathBuf,
}

impl CaseImageStore {
    #[must_use]
    pub fn new(images_directory: impl Into<PathBuf>) -> Self {
        Self {
            root: images_directory.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn case_directory(&self, case_id: &str) -> PathBuf {
        self.root.join(case_id)
    }

    #[must_use]
    pub fn archive_path(&self, case_id: &str) -> PathBuf {
        self.case_directory(case_id).join(IMAGE_ARCHIVE_NAME)
    }

    #[must_use]
    pub fn exists(&self, case_id: &str) -> bool {
        self.archive_path(case_id).is_file()
    }

    #[instrument(skip(self))]
    pub fn read(&self, case_id: &str) -> Result<CaseImage> {
        let path = self.archive_path(case_id);
        let archive = NpzArchive::read(&path).map_err(|err| {
            if err.is_not_found() {
                ProjectError::not_found("case image", &path)
            } else {
                err
            }
        })?;

        let matrix: HuMatrix = archive.require(KEY_MATRIX, &path)?.to_matrix_f64()?;
        let spacing = match archive.require(KEY_SPACING, &path)?.to_f64_values()?.as_slice() {
            [dx, dy, ..] => PixelSpacing::new(*dx, *dy),
            other => {
                return Err(ProjectError::integrity(format!(
                    "{}: spacing holds {} values, expected 2",
                    path.display(),
                    other.len()
                )));
            }
        };
        let display = DisplayParams {
            windowing: optional_pair(&archive, KEY_WINDOWING),
            crop_x: optional_pair(&archive, KEY_CROP_X),
            crop_y: optional_pair(&archive, KEY_CROP_Y),
            slice_info: archive.get(KEY_SLICE_INFO).cloned(),
        };
        tracing::debug!(shape = ?matrix.shape(), "case image loaded");

        Ok(CaseImage {
            matrix,
            spacing,
            display,
        })
    }

    /// Store the archive of a new case. Existing cases are never overwritten.
    #[instrument(skip(self, image))]
    pub fn create(&self, case_id: &str, image: &CaseImage) -> Result<()> {
        let path = self.archive_path(case_id);
        if path.exists() {
            return Err(ProjectError::conflict(format!(
                "case {case_id:?} already has an image at {}",
                path.display()
            )));
        }
        fs_err::create_dir_all(self.case_directory(case_id))?;

        let mut archive = NpzArchive::new();
        archive.insert(KEY_MATRIX, encode_matrix(&image.matrix));
        archive.insert(
            KEY_SPACING,
            NpyArray::from_values(&[image.spacing.dx_mm, image.spacing.dy_mm]),
        );
        let display = &image.display;
        for (key, pair) in [
            (KEY_WINDOWING, display.windowing),
            (KEY_CROP_X, display.crop_x),
            (KEY_CROP_Y, display.crop_y),
        ] {
            if let Some((a, b)) = pair {
                archive.insert(key, NpyArray::from_values(&[a, b]));
            }
        }
        if let Some(slice_info) = &display.slice_info {
            archive.insert(KEY_SLICE_INFO, slice_info.clone());
        }
        archive.write(&path)
    }

    /// Move a case directory. The target must not exist.
    #[instrument(skip(self))]
    pub fn rename(&self, old_case_id: &str, new_case_id: &str) -> Result<()> {
        let from = self.case_directory(old_case_id);
        let to = self.case_directory(new_case_id);
        if !from.is_dir() {
            return Err(ProjectError::not_found("case directory", from));
        }
        if to.exists() {
            return Err(ProjectError::conflict(format!(
                "case directory {} already exists",
                to.display()
            )));
        }
        fs_err::rename(&from, &to)?;
        tracing::debug!(from = %from.display(), to = %to.display(), "case directory moved");
        Ok(())
    }

    /// Names of every case directory on disk, sorted.
    pub fn case_directories(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs_err::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Two-value display entries. Anything malformed is ignored: these never feed a computation.
fn optional_pair(archive: &NpzArchive, key: &str) -> Option<(f64, f64)> {
    let values = archive.get(key)?.to_f64_values().ok()?;
    match values.as_slice() {
        [a, b] => Some((*a, *b)),
        _ => {
            tracing::debug!(key, len = values.len(), "ignoring malformed display entry");
            None
        }
    }
}

/// Integral matrices that fit are stored as `int16`, like scanner output; anything else as
/// `float64`.
#[allow(clippy::cast_possible_truncation)]
fn encode_matrix(matrix: &HuMatrix) -> NpyArray {
    let fits_i16 = matrix.iter().all(|&value| {
        value.fract() == 0.0 && value >= f64::from(i16::MIN) && value <= f64::from(i16::MAX)
    });
    if fits_i16 {
        NpyArray::from_matrix(&matrix.mapv(|value| value as i16))
    } else {
        NpyArray::from_matrix(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DType;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn create_then_read_keeps_display_params() {
        let dir = TempDir::new().unwrap();
        let store = CaseImageStore::new(dir.path());
        let image = CaseImage::new(
            array![[-100.0, 40.0], [60.0, 1000.0]],
            PixelSpacing::new(0.8, 0.8),
        )
        .with_display(DisplayParams {
            windowing: Some((-160.0, 240.0)),
            crop_x: Some((10.0, 90.0)),
            crop_y: None,
            slice_info: Some(NpyArray::from_strings(&["L3"])),
        });
        store.create("1___a", &image).unwrap();

        assert_eq!(store.read("1___a").unwrap(), image);
        let raw = NpzArchive::read(&store.archive_path("1___a")).unwrap();
        assert_eq!(raw.get("matrix").unwrap().dtype(), DType::I16);
    }

    #[test]
    fn fractional_matrices_stay_float() {
        let encoded = encode_matrix(&array![[0.5, 1.0]]);
        assert_eq!(encoded.dtype(), DType::F64);
    }

    #[test]
    fn missing_case_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = CaseImageStore::new(dir.path());
        let err = store.read("ghost").unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }), "{err}");
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = CaseImageStore::new(dir.path());
        let image = CaseImage::new(array![[0.0]], PixelSpacing::new(1.0, 1.0));
        store.create("c", &image).unwrap();
        let err = store.create("c", &image).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let store = CaseImageStore::new(dir.path());
        let image = CaseImage::new(array![[0.0]], PixelSpacing::new(1.0, 1.0));
        store.create("a", &image).unwrap();
        store.create("b", &image).unwrap();

        assert_eq!(
            store.rename("a", "b").unwrap_err().kind(),
            crate::ErrorKind::Conflict
        );
        store.rename("a", "c").unwrap();
        assert!(!store.exists("a"));
        assert!(store.exists("c"));
        assert_eq!(store.case_directories().unwrap(), ["b", "c"]);
    }
}
