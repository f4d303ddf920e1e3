//! Project manifest (`dataset.toml`): case membership and groups.
//!
//! ```toml
//! files = ["3", "5___a", "12___b"]
//!
//! [groups]
//! default = ["3", "5___a", "12___b"]
//! left = ["5___a"]
//! ```
//!
//! `files` is the authoritative membership list. The first group mirrors it; the other groups
//! are free-form subsets. Keys this crate does not know are preserved on rewrite, and the
//! document is always written wholesale.

use std::io::Write;
use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use toml::{Table, Value};
use tracing::instrument;

use crate::constants::DEFAULT_GROUP_NAME;
use crate::error::{ProjectError, Result};

const KEY_FILES: &str = "files";
const KEY_GROUPS: &str = "groups";

/// In-memory copy of the manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    table: Table,
}

impl ManifestDocument {
    /// Empty membership with a single mirrored group.
    #[must_use]
    pub fn empty() -> Self {
        let mut groups = Table::new();
        groups.insert(DEFAULT_GROUP_NAME.to_string(), Value::Array(Vec::new()));
        let mut table = Table::new();
        table.insert(KEY_FILES.to_string(), Value::Array(Vec::new()));
        table.insert(KEY_GROUPS.to_string(), Value::Table(groups));
        Self { table }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let table = text.parse::<Table>()?;
        let document = Self { table };
        // Surface a malformed document at load time rather than on first use.
        document.files()?;
        document.groups()?;
        Ok(document)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&self.table)?)
    }

    /// Case identifiers in stored order.
    pub fn files(&self) -> Result<Vec<String>> {
        let value = self
            .table
            .get(KEY_FILES)
            .ok_or_else(|| ProjectError::integrity("manifest has no `files` list"))?;
        string_list(value, KEY_FILES)
    }

    /// Groups in document order.
    pub fn groups(&self) -> Result<Vec<(String, Vec<String>)>> {
        let Some(groups) = self.groups_table()? else {
            return Ok(Vec::new());
        };
        groups
            .iter()
            .map(|(name, members)| {
                Ok((name.clone(), string_list(members, &format!("groups.{name}"))?))
            })
            .collect()
    }

    /// The group that mirrors `files`: the first one.
    #[must_use]
    pub fn default_group_name(&self) -> Option<&str> {
        match self.table.get(KEY_GROUPS) {
            Some(Value::Table(groups)) => groups.keys().next().map(String::as_str),
            _ => None,
        }
    }

    /// Replace `files` and make the default group mirror it. Other groups are untouched.
    pub fn set_files(&mut self, ids: &[String]) -> Result<()> {
        let list = to_value(ids);
        self.table.insert(KEY_FILES.to_string(), list.clone());

        let groups = self.groups_table_mut()?;
        let default = groups
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string());
        groups.insert(default, list);
        Ok(())
    }

    /// Swap `old_id` for `new_id`.
    ///
    /// `files` loses `old_id` and gains `new_id` at the end. Every secondary group holding
    /// `old_id` gets the same treatment; groups that never held it are left alone. The default
    /// group is then re-mirrored from `files`. Applying the same rename twice changes nothing.
    pub fn rename_case(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        let files = replace_member(self.files()?, old_id, new_id);

        let default = self.default_group_name().map(str::to_string);
        let mut groups = self.groups()?;
        for (name, members) in &mut groups {
            if Some(name.as_str()) == default.as_deref() {
                continue;
            }
            if members.iter().any(|member| member == old_id) {
                *members = replace_member(std::mem::take(members), old_id, new_id);
            }
        }

        let table = self.groups_table_mut()?;
        for (name, members) in groups {
            table.insert(name, to_value(&members));
        }
        self.set_files(&files)
    }

    /// Append a case to `files` and the default group. Returns `false` if already listed.
    pub fn add_case(&mut self, id: &str) -> Result<bool> {
        let mut files = self.files()?;
        if files.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        files.push(id.to_string());
        self.set_files(&files)?;
        Ok(true)
    }

    /// Drop a case from `files` and from every group. Returns `false` if it was not listed.
    pub fn remove_case(&mut self, id: &str) -> Result<bool> {
        let files = self.files()?;
        let kept: Vec<String> = files.iter().filter(|f| *f != id).cloned().collect();
        let removed = kept.len() != files.len();

        let mut groups = self.groups()?;
        for (_, members) in &mut groups {
            members.retain(|member| member != id);
        }
        let table = self.groups_table_mut()?;
        for (name, members) in groups {
            table.insert(name, to_value(&members));
        }
        self.set_files(&kept)?;
        Ok(removed)
    }

    fn groups_table(&self) -> Result<Option<&Table>> {
        match self.table.get(KEY_GROUPS) {
            None => Ok(None),
            Some(Value::Table(groups)) => Ok(Some(groups)),
            Some(other) => Err(ProjectError::integrity(format!(
                "manifest `groups` must be a table, found {}",
                other.type_str()
            ))),
        }
    }

    fn groups_table_mut(&mut self) -> Result<&mut Table> {
        let entry = self
            .table
            .entry(KEY_GROUPS.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        match entry {
            Value::Table(groups) => Ok(groups),
            other => Err(ProjectError::integrity(format!(
                "manifest `groups` must be a table, found {}",
                other.type_str()
            ))),
        }
    }
}

/// Remove every `old` and append `new` unless already present.
fn replace_member(mut members: Vec<String>, old: &str, new: &str) -> Vec<String> {
    members.retain(|member| member != old);
    if !members.iter().any(|member| member == new) {
        members.push(new.to_string());
    }
    members
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(ProjectError::integrity(format!(
            "manifest `{what}` must be a list, found {}",
            value.type_str()
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(id) => Ok(id.clone()),
            other => Err(ProjectError::integrity(format!(
                "manifest `{what}` holds a {} instead of a case name",
                other.type_str()
            ))),
        })
        .collect()
}

fn to_value(ids: &[String]) -> Value {
    Value::Array(ids.iter().cloned().map(Value::String).collect())
}

/// Handle on the manifest file. Every call re-reads the file.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ManifestDocument> {
        let text = fs_err::read_to_string(&self.path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ProjectError::not_found("manifest", &self.path)
            } else {
                err.into()
            }
        })?;
        ManifestDocument::parse(&text)
    }

    /// Replace the manifest file with `document`.
    pub fn store(&self, document: &ManifestDocument) -> Result<()> {
        let text = document.to_toml_string()?;
        let mut file = AtomicWriteFile::open(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.commit()?;
        Ok(())
    }

    pub fn list_case_ids(&self) -> Result<Vec<String>> {
        self.load()?.files()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn replace_case_ids(&self, ids: &[String]) -> Result<()> {
        let mut document = self.load()?;
        document.set_files(ids)?;
        self.store(&document)
    }

    #[instrument(skip(self))]
    pub fn rename_case_id(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut document = self.load()?;
        document.rename_case(old_id, new_id)?;
        self.store(&document)?;
        tracing::debug!("manifest updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn add_case_id(&self, id: &str) -> Result<bool> {
        let mut document = self.load()?;
        let added = document.add_case(id)?;
        if added {
            self.store(&document)?;
        }
        Ok(added)
    }

    #[instrument(skip(self))]
    pub fn remove_case_id(&self, id: &str) -> Result<bool> {
        let mut document = self.load()?;
        let removed = document.remove_case(id)?;
        if removed {
            self.store(&document)?;
        }
        Ok(removed)
    }
}
