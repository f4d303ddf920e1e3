//! Outcome of operations that run once per element.

use crate::error::{ErrorKind, ProjectError};

/// A case that a batch skipped, with the reason.
#[derive(Debug)]
pub struct ElementFailure {
    pub case_id: String,
    pub error: ProjectError,
}

impl ElementFailure {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Cases processed successfully, in processing order.
    pub succeeded: Vec<String>,
    pub failures: Vec<ElementFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn fail(&mut self, case_id: impl Into<String>, error: ProjectError) {
        let case_id = case_id.into();
        tracing::warn!(case = %case_id, %error, "element skipped");
        self.failures.push(ElementFailure { case_id, error });
    }
}
