//! Per-case archive stores.

pub mod image;
pub mod mask;

pub use image::CaseImageStore;
pub use mask::MaskStore;
