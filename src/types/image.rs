//! Case image types.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::io::NpyArray;

/// 2-D matrix of Hounsfield Unit values.
pub type HuMatrix = Array2<f64>;

/// Physical size of one pixel, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSpacing {
    pub dx_mm: f64,
    pub dy_mm: f64,
}

impl PixelSpacing {
    #[must_use]
    pub fn new(dx_mm: f64, dy_mm: f64) -> Self {
        Self { dx_mm, dy_mm }
    }

    /// Area covered by one pixel in cm².
    #[must_use]
    pub fn pixel_area_cm2(self) -> f64 {
        self.dx_mm * self.dy_mm / 100.0
    }
}

/// Viewer settings stored beside the matrix. Kept for display only; nothing here feeds a
/// measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayParams {
    /// Min and max HU of the grayscale window.
    pub windowing: Option<(f64, f64)>,
    /// Horizontal crop, start and end percentages.
    pub crop_x: Option<(f64, f64)>,
    /// Vertical crop, start and end percentages.
    pub crop_y: Option<(f64, f64)>,
    /// Uninterpreted slice metadata, carried verbatim.
    pub slice_info: Option<NpyArray>,
}

/// Contents of a case archive.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseImage {
    pub matrix: HuMatrix,
    pub spacing: PixelSpacing,
    pub display: DisplayParams,
}

impl CaseImage {
    #[must_use]
    pub fn new(matrix: HuMatrix, spacing: PixelSpacing) -> Self {
        Self {
            matrix,
            spacing,
            display: DisplayParams::default(),
        }
    }

    #[must_use]
    pub fn with_display(mut self, display: DisplayParams) -> Self {
        self.display = display;
        self
    }
}
