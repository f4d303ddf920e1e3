//! Physical codecs: NumPy arrays and the `.npz` containers that bundle them.

pub mod npy;
pub mod npz;

pub use npy::{DType, NpyArray, NpyElement};
pub use npz::NpzArchive;
