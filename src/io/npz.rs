//! NumPy `.npz` archives: a zip container with one `<key>.npy` member per array.
//!
//! Reads accept stored or deflated members. Writes always replace the whole file through a
//! temporary sibling that is renamed into place, so readers never observe a half-written zip.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ProjectError, Result};
use crate::io::npy::NpyArray;

const MEMBER_SUFFIX: &str = ".npy";

/// Ordered key → array bundle. Keys keep their archive order so a rewrite is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NpzArchive {
    entries: Vec<(String, NpyArray)>,
}

impl NpzArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an archive. A missing file surfaces as an I/O `NotFound`.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs_err::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut member = zip.by_index(index)?;
            if member.is_dir() {
                continue;
            }
            let name = member.name().to_string();
            let key = name.strip_suffix(MEMBER_SUFFIX).unwrap_or(&name).to_string();
            let mut buf = Vec::with_capacity(usize::try_from(member.size()).unwrap_or(0));
            member.read_to_end(&mut buf)?;
            let array = NpyArray::parse(&buf).map_err(|err| {
                ProjectError::invalid_array(format!("member {name:?}: {err}"))
            })?;
            entries.push((key, array));
        }
        Ok(Self { entries })
    }

    /// Replace `path` with this archive.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = AtomicWriteFile::open(path)?;
        {
            let mut zip = ZipWriter::new(file.as_file_mut());
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            for (key, array) in &self.entries {
                zip.start_file(format!("{key}{MEMBER_SUFFIX}"), options)?;
                zip.write_all(&array.to_bytes())?;
            }
            zip.finish()?;
        }
        file.commit()?;
        tracing::trace!(path = %path.display(), members = self.entries.len(), "npz written");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&NpyArray> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, array)| array)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace `key`, keeping the position of an existing member.
    pub fn insert(&mut self, key: impl Into<String>, array: NpyArray) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = array,
            None => self.entries.push((key, array)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<NpyArray> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch a member that must be present.
    pub(crate) fn require(&self, key: &str, path: &Path) -> Result<&NpyArray> {
        self.get(key).ok_or_else(|| {
            ProjectError::integrity(format!("{} has no {key:?} entry", path.display()))
        })
    }
}
