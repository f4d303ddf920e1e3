//! Running an external segmentation model over every case of a project.

use tracing::instrument;

use crate::error::{ProjectError, Result};
use crate::types::{BatchReport, HuMatrix, Mask, MaskUpdate};

use super::lifecycle::{Project, check_name, sort_for_display};

/// Error type returned by a [`MaskPredictor`].
pub type PredictorError = Box<dyn std::error::Error + Send + Sync>;

/// A segmentation model: one mask per image, same order, same shape.
pub trait MaskPredictor {
    fn predict(&mut self, images: &[HuMatrix]) -> std::result::Result<Vec<Mask>, PredictorError>;
}

impl<F> MaskPredictor for F
where
    F: FnMut(&[HuMatrix]) -> std::result::Result<Vec<Mask>, PredictorError>,
{
    fn predict(&mut self, images: &[HuMatrix]) -> std::result::Result<Vec<Mask>, PredictorError> {
        self(images)
    }
}

/// Feeds project images to a predictor and stores the masks it returns as `predicted`.
#[derive(Debug)]
pub struct PredictionAdapter<P> {
    predictor: P,
}

impl<P: MaskPredictor> PredictionAdapter<P> {
    #[must_use]
    pub fn new(predictor: P) -> Self {
        Self { predictor }
    }

    #[must_use]
    pub fn into_inner(self) -> P {
        self.predictor
    }

    /// Predict `mask_name` for every listed case.
    ///
    /// Cases whose image cannot be read are skipped and reported. The predictor is called once
    /// with the remaining images. A predictor error, or output that does not pair one mask of
    /// the right shape with each image, aborts with `ExternalFailure` before anything is
    /// written. Each mask is then merge-written on its own; write failures are reported per
    /// case.
    #[instrument(skip(self, project))]
    pub fn run(&mut self, project: &Project, mask_name: &str) -> Result<BatchReport> {
        check_name("mask", mask_name)?;
        let mut report = BatchReport::default();

        let mut case_ids = Vec::new();
        let mut images = Vec::new();
        let mut listed = project.element_names()?;
        sort_for_display(&mut listed);
        for case_id in listed {
            match project.images.read(&case_id) {
                Ok(image) => {
                    case_ids.push(case_id);
                    images.push(image.matrix);
                }
                Err(err) => report.fail(case_id, err),
            }
        }
        if images.is_empty() {
            tracing::info!("no readable images, predictor not called");
            return Ok(report);
        }

        let masks = self
            .predictor
            .predict(&images)
            .map_err(|err| ProjectError::external(err.to_string()))?;
        if masks.len() != images.len() {
            return Err(ProjectError::external(format!(
                "predictor returned {} masks for {} images",
                masks.len(),
                images.len()
            )));
        }
        for ((case_id, image), mask) in case_ids.iter().zip(&images).zip(&masks) {
            if image.shape() != mask.shape() {
                return Err(ProjectError::external(format!(
                    "predicted mask for {case_id:?} has shape {:?}, image has {:?}",
                    mask.shape(),
                    image.shape()
                )));
            }
        }
        drop(images);

        for (case_id, mask) in case_ids.into_iter().zip(masks) {
            match project
                .masks
                .write(&case_id, mask_name, MaskUpdate::predicted(mask))
            {
                Ok(()) => report.succeeded.push(case_id),
                Err(err) => report.fail(case_id, err),
            }
        }
        tracing::info!(
            written = report.succeeded.len(),
            failed = report.failures.len(),
            "predictions stored"
        );
        Ok(report)
    }
}
