//! Editing role: holds the lineage key and drives the prover.

#![forbid(unsafe_code)]

use crate::identity::Identity;
use crate::photograph::Photograph;
use crate::prover::{EditError, Prover};
use crate::scheduler;
use crate::transformation::{Transformation, TransformationParameters};

#[derive(Clone, Debug)]
pub struct Editor {
    identity: Identity,
    prover: Prover,
}

impl Editor {
    pub fn new(identity: Identity) -> Self {
        Self { identity, prover: Prover::new() }
    }

    pub fn edit(
        &self,
        photograph: &Photograph,
        transformation: Transformation,
        parameters: &TransformationParameters,
    ) -> Result<Photograph, EditError> {
        self.prover.edit(photograph, transformation, parameters, &self.identity)
    }

    /// [`Editor::edit`] on the blocking worker pool.
    pub async fn edit_async(
        &self,
        photograph: Photograph,
        transformation: Transformation,
        parameters: TransformationParameters,
    ) -> Result<Photograph, EditError> {
        scheduler::edit(self.prover, photograph, transformation, parameters, self.identity.clone()).await
    }
}
