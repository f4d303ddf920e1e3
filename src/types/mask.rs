//! Mask records and the validation state machine.

use ndarray::Array2;

use crate::error::{ProjectError, Result};

/// Boolean segmentation matrix, same shape as the case image.
pub type Mask = Array2<bool>;

/// Latest segmentation of a case.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentMask {
    /// Stored as the empty-shape sentinel: the prediction was kept unchanged.
    SameAsPredicted,
    Edited(Mask),
}

impl CurrentMask {
    /// The matrix this segmentation stands for, resolving the sentinel against `predicted`.
    #[must_use]
    pub fn resolve<'a>(&'a self, predicted: Option<&'a Mask>) -> Option<&'a Mask> {
        match self {
            Self::SameAsPredicted => predicted,
            Self::Edited(mask) => Some(mask),
        }
    }
}

/// Whether a reviewer accepted the segmentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationState {
    #[default]
    Unvalidated,
    Validated {
        validators: Vec<String>,
        mask: Mask,
    },
}

impl ValidationState {
    #[must_use]
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated { .. })
    }

    #[must_use]
    pub fn validators(&self) -> &[String] {
        match self {
            Self::Validated { validators, .. } => validators,
            Self::Unvalidated => &[],
        }
    }

    #[must_use]
    pub fn mask(&self) -> Option<&Mask> {
        match self {
            Self::Validated { mask, .. } => Some(mask),
            Self::Unvalidated => None,
        }
    }
}

/// Decoded mask archive for one (case, mask name) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskRecord {
    pub predicted: Option<Mask>,
    pub current: Option<CurrentMask>,
    pub validation: ValidationState,
    /// A `validated` matrix with no validator list. Seen in older projects; it does not make
    /// the record validated.
    pub unattributed_validated: Option<Mask>,
}

impl MaskRecord {
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validation.is_validated()
    }

    /// Current segmentation with the sentinel resolved to the prediction.
    #[must_use]
    pub fn effective_current(&self) -> Option<&Mask> {
        self.current
            .as_ref()
            .and_then(|current| current.resolve(self.predicted.as_ref()))
    }

    /// A validated mask must equal the current mask, unless the current mask is the sentinel.
    pub fn check_consistency(&self) -> Result<()> {
        let ValidationState::Validated { mask, .. } = &self.validation else {
            return Ok(());
        };
        match &self.current {
            Some(CurrentMask::SameAsPredicted) => Ok(()),
            Some(CurrentMask::Edited(current)) if current == mask => Ok(()),
            Some(CurrentMask::Edited(current)) => Err(ProjectError::integrity(format!(
                "validated mask differs from current mask (shapes {:?} / {:?}, {} differing pixels)",
                mask.shape(),
                current.shape(),
                differing_pixels(mask, current)
            ))),
            None => Err(ProjectError::integrity(
                "validated record has no current mask",
            )),
        }
    }
}

fn differing_pixels(a: &Mask, b: &Mask) -> usize {
    if a.shape() != b.shape() {
        return a.len().max(b.len());
    }
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}

/// Fields to overlay onto a stored record. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskUpdate {
    pub predicted: Option<Mask>,
    pub current: Option<CurrentMask>,
    pub validation: Option<ValidationState>,
}

impl MaskUpdate {
    #[must_use]
    pub fn predicted(mask: Mask) -> Self {
        Self {
            predicted: Some(mask),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn current(mask: CurrentMask) -> Self {
        Self {
            current: Some(mask),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_current(mut self, mask: CurrentMask) -> Self {
        self.current = Some(mask);
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: ValidationState) -> Self {
        self.validation = Some(validation);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicted.is_none() && self.current.is_none() && self.validation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn validated(mask: Mask) -> ValidationState {
        ValidationState::Validated {
            validators: vec!["reviewer".into()],
            mask,
        }
    }

    #[test]
    fn sentinel_current_accepts_any_validated_mask() {
        let record = MaskRecord {
            predicted: Some(array![[true, false]]),
            current: Some(CurrentMask::SameAsPredicted),
            validation: validated(array![[true, false]]),
            unattributed_validated: None,
        };
        assert!(record.check_consistency().is_ok());
        assert_eq!(record.effective_current(), Some(&array![[true, false]]));
    }

    #[test]
    fn edited_current_must_match_validated() {
        let mut record = MaskRecord {
            predicted: None,
            current: Some(CurrentMask::Edited(array![[true, true]])),
            validation: validated(array![[true, true]]),
            unattributed_validated: None,
        };
        assert!(record.check_consistency().is_ok());

        record.current = Some(CurrentMask::Edited(array![[true, false]]));
        let err = record.check_consistency().unwrap_err();
        assert!(err.to_string().contains("1 differing pixels"), "{err}");

        record.current = None;
        assert!(record.check_consistency().is_err());
    }

    #[test]
    fn unvalidated_records_are_always_consistent() {
        let record = MaskRecord {
            current: Some(CurrentMask::Edited(array![[false]])),
            unattributed_validated: Some(array![[true]]),
            ..MaskRecord::default()
        };
        assert!(!record.is_validated());
        assert!(record.check_consistency().is_ok());
        assert!(record.validation.validators().is_empty());
    }
}
