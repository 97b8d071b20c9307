//! Viewing role: verifies photographs and shows only authentic ones.

#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::backend::VerifyingKey;
use crate::photograph::Photograph;
use crate::scheduler;
use crate::verifier::{Verdict, Verifier, ViewError};

#[derive(Clone, Debug)]
pub struct Viewer {
    verifier: Verifier,
}

impl Viewer {
    /// Verify every photograph against `verifying_key`.
    pub fn new(verifying_key: Arc<VerifyingKey>) -> Self {
        Self { verifier: Verifier::new(verifying_key) }
    }

    pub fn view(&self, photograph: &Photograph) -> Result<Verdict, ViewError> {
        self.verifier.view(photograph)
    }

    /// The rendered image on a valid verdict, `None` otherwise.
    pub fn show(&self, photograph: &Photograph) -> Result<Option<String>, ViewError> {
        Ok(match self.view(photograph)? {
            Verdict::Valid => Some(photograph.record.image.render()),
            Verdict::Invalid(_) => None,
        })
    }

    pub async fn view_all(&self, photographs: Vec<Photograph>) -> Vec<Result<Verdict, ViewError>> {
        scheduler::view_all(self.verifier.clone(), photographs).await
    }
}
