//! Project handle, per-case elements and the operations spanning several stores.

mod element;
mod lifecycle;
mod prediction;
mod rename;
mod report;
mod verify;

pub use element::Element;
pub use lifecycle::{Project, name_prefix, sort_for_display};
pub use prediction::{MaskPredictor, PredictionAdapter, PredictorError};
