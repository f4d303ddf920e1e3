//! Area and density measurement of a validated mask over its HU matrix.
//!
//! All values keep full precision here; rounding happens when a report is rendered.

use ndarray::{ArrayView2, Zip};

use crate::error::{ProjectError, Result};
use crate::types::{HuRange, Mask, Measurement, PixelSpacing};

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    count: u64,
    sum: f64,
}

impl Tally {
    fn add(&mut self, hu: f64) {
        self.count += 1;
        self.sum += hu;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn area(self, pixel_area_cm2: f64) -> f64 {
        self.count as f64 * pixel_area_cm2
    }
}

/// Measure `mask` over `image`.
///
/// The full region is every masked pixel. The restricted region keeps masked pixels inside
/// `restricted`, and the IMAT region keeps masked pixels inside [`HuRange::IMAT`]. Both ranges
/// are inclusive. A mean over no pixels is `None`.
pub fn measure(
    image: ArrayView2<'_, f64>,
    mask: &Mask,
    spacing: PixelSpacing,
    restricted: HuRange,
) -> Result<Measurement> {
    if image.shape() != mask.shape() {
        return Err(ProjectError::integrity(format!(
            "mask shape {:?} does not match image shape {:?}",
            mask.shape(),
            image.shape()
        )));
    }

    let mut full = Tally::default();
    let mut inside = Tally::default();
    let mut imat = Tally::default();
    Zip::from(image).and(mask).for_each(|&hu, &selected| {
        if !selected {
            return;
        }
        full.add(hu);
        if restricted.contains(hu) {
            inside.add(hu);
        }
        if HuRange::IMAT.contains(hu) {
            imat.add(hu);
        }
    });

    let pixel_area_cm2 = spacing.pixel_area_cm2();
    Ok(Measurement {
        pixel_area_cm2,
        full_area_cm2: full.area(pixel_area_cm2),
        restricted_area_cm2: inside.area(pixel_area_cm2),
        imat_area_cm2: imat.area(pixel_area_cm2),
        full_mean_hu: full.mean(),
        restricted_mean_hu: inside.mean(),
    })
}
