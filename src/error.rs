//! Error type shared by every store, the manifest and the measurement engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProjectError>;

/// Coarse classification used by batch operations to decide whether a failure is
/// recoverable, must be surfaced, or aborts the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    DataIntegrity,
    ExternalFailure,
    Io,
}

/// Step of an element rename, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenameStep {
    ImageDirectory,
    MaskArchives,
    Manifest,
}

impl fmt::Display for RenameStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ImageDirectory => "image directory",
            Self::MaskArchives => "mask archives",
            Self::Manifest => "manifest",
        })
    }
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("conflict: {reason}")]
    Conflict { reason: Box<str> },

    #[error("data integrity violation: {reason}")]
    DataIntegrity { reason: Box<str> },

    #[error("external predictor failed: {reason}")]
    ExternalFailure { reason: Box<str> },

    /// A rename stopped after some of its steps had already been applied.
    #[error(
        "rename {from} -> {to} interrupted after {}: {source}",
        describe_completed(completed)
    )]
    RenameIncomplete {
        from: String,
        to: String,
        completed: Vec<RenameStep>,
        #[source]
        source: Box<ProjectError>,
    },

    #[error("invalid array: {reason}")]
    InvalidArray { reason: Box<str> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("manifest parse error: {0}")]
    ManifestDecode(#[from] toml::de::Error),

    #[error("manifest encode error: {0}")]
    ManifestEncode(#[from] toml::ser::Error),
}

fn describe_completed(completed: &[RenameStep]) -> String {
    if completed.is_empty() {
        return "no steps".to_string();
    }
    completed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ProjectError {
    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }

    pub(crate) fn integrity(reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            reason: reason.into().into_boxed_str(),
        }
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into().into_boxed_str(),
        }
    }

    pub(crate) fn external(reason: impl Into<String>) -> Self {
        Self::ExternalFailure {
            reason: reason.into().into_boxed_str(),
        }
    }

    pub(crate) fn invalid_array(reason: impl Into<String>) -> Self {
        Self::InvalidArray {
            reason: reason.into().into_boxed_str(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::DataIntegrity { .. }
            | Self::InvalidArray { .. }
            | Self::Archive(_)
            | Self::ManifestDecode(_)
            | Self::ManifestEncode(_) => ErrorKind::DataIntegrity,
            Self::ExternalFailure { .. } => ErrorKind::ExternalFailure,
            Self::RenameIncomplete { source, .. } => source.kind(),
            Self::Io(err) => match err.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
                _ => ErrorKind::Io,
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
