//! On-disk layout conventions and fixed clinical thresholds.

/// Manifest file at the project root.
pub const MANIFEST_FILE_NAME: &str = "dataset.toml";
/// Case image directories live under `<root>/data/dicoms/<case>/`.
pub const IMAGES_DIRECTORY: &str = "data/dicoms";
/// Mask archives live under `<root>/data/masks/<mask>/<case>.npz`.
pub const MASKS_DIRECTORY: &str = "data/masks";
/// Archive holding the HU matrix inside each case directory.
pub const IMAGE_ARCHIVE_NAME: &str = "0.npz";
/// Extension of every archive in a project.
pub const ARCHIVE_EXTENSION: &str = "npz";
/// Group created by [`crate::Project::create`] to mirror `files`.
pub const DEFAULT_GROUP_NAME: &str = "default";

/// Separates the display prefix from the rest of a case name (`"12___left"` → `"12"`).
pub const NAME_PREFIX_SEPARATOR: &str = "___";

/// Lower bound of the intramuscular adipose tissue band (inclusive).
pub const IMAT_HU_MIN: f64 = -190.0;
/// Upper bound of the intramuscular adipose tissue band (inclusive).
pub const IMAT_HU_MAX: f64 = -31.0;

/// Lower bound of the default restricted range, the skeletal-muscle band.
pub const DEFAULT_RESTRICTED_HU_MIN: f64 = -29.0;
/// Upper bound of the default restricted range.
pub const DEFAULT_RESTRICTED_HU_MAX: f64 = 150.0;

/// Decimal digits kept when values cross the reporting boundary.
pub const REPORT_DECIMALS: usize = 3;
/// Placeholder rendered for every numeric column of an unmeasured case.
pub const UNMEASURED_MARKER: &str = "N/A";
/// Suffix of the report file written next to the manifest.
pub const REPORT_FILE_SUFFIX: &str = "_measurements.csv";
