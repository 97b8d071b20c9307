//! Transformation catalog
//!
//! The catalog is a closed set: every entry pairs an out-of-circuit
//! [`Transformation::apply`] with an in-circuit admissibility relation between
//! the input and output records. The compliance predicate evaluates the
//! relation of *every* entry and keeps the one picked by a one-hot selector, so
//! adding an entry changes the compiled circuit (and therefore the keys).

#![forbid(unsafe_code)]

use std::fmt;

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

use crate::identity::{verify_signature_gadget, SignatureVar};
use crate::image::Image;
use crate::record::RecordVar;
use crate::F;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransformationError {
    #[error("parameters for `{parameters}` cannot drive the `{transformation}` transformation")]
    ParameterMismatch { transformation: Transformation, parameters: Transformation },
    #[error("unknown transformation `{0}`")]
    Unknown(String),
}

/// Entries of the catalog. Order is the selector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    /// No-op edit: the pixel content must be unchanged.
    Identity,
}

/// Catalog in selector order.
pub const CATALOG: [Transformation; 1] = [Transformation::Identity];

/// Transformation-specific payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationParameters {
    Identity,
}

impl Transformation {
    pub fn index(self) -> usize {
        match self {
            Transformation::Identity => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transformation::Identity => "identity",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TransformationError> {
        CATALOG
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| TransformationError::Unknown(name.to_string()))
    }

    pub fn default_parameters(self) -> TransformationParameters {
        match self {
            Transformation::Identity => TransformationParameters::Identity,
        }
    }

    /// One-hot selector over [`CATALOG`].
    pub fn selector_flags(self) -> Vec<bool> {
        CATALOG.iter().map(|t| *t == self).collect()
    }

    /// Apply the transformation out of circuit.
    pub fn apply(self, image: &Image, params: &TransformationParameters) -> Result<Image, TransformationError> {
        if params.transformation() != self {
            return Err(TransformationError::ParameterMismatch {
                transformation: self,
                parameters: params.transformation(),
            });
        }
        match (self, params) {
            (Transformation::Identity, TransformationParameters::Identity) => Ok(image.clone()),
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TransformationParameters {
    pub fn transformation(&self) -> Transformation {
        match self {
            TransformationParameters::Identity => Transformation::Identity,
        }
    }
}

// ---------------------------------------------------------------------------
// Circuit side
// ---------------------------------------------------------------------------

/// Secret parameter wires for one catalog entry.
#[derive(Clone, Debug)]
pub enum ParametersVar {
    /// No wires.
    Identity,
}

impl ParametersVar {
    /// Allocate parameter wires for every catalog entry. The entry matching
    /// `params` gets the real payload, the others their defaults, so the
    /// allocation count never depends on which entry is selected.
    pub fn alloc_catalog(
        _cs: &ConstraintSystemRef<F>,
        params: &TransformationParameters,
    ) -> Result<Vec<ParametersVar>, SynthesisError> {
        Ok(CATALOG
            .iter()
            .map(|t| {
                let p = if *t == params.transformation() { params.clone() } else { t.default_parameters() };
                match p {
                    TransformationParameters::Identity => ParametersVar::Identity,
                }
            })
            .collect())
    }
}

/// Wires one admissibility relation may read.
pub struct StepVars<'a> {
    pub input: &'a RecordVar,
    pub output: &'a RecordVar,
    /// In-circuit digest of `input.image`.
    pub input_digest: &'a FpVar<F>,
    /// In-circuit digest of `output.image`.
    pub output_digest: &'a FpVar<F>,
    pub signature: &'a SignatureVar,
    /// `signature` verifies over `output_digest` under the output key.
    pub signed_output: &'a Boolean<F>,
}

/// Boolean admissibility wire of every catalog entry, in catalog order.
pub fn admissibility_checks(
    step: &StepVars<'_>,
    params: &[ParametersVar],
) -> Result<Vec<Boolean<F>>, SynthesisError> {
    params
        .iter()
        .map(|p| match p {
            ParametersVar::Identity => identity_admissible(step),
        })
        .collect()
}

/// The same signature must verify over both digests under the respective
/// keys. A signature binds one digest, so this forces equal pixel content.
fn identity_admissible(step: &StepVars<'_>) -> Result<Boolean<F>, SynthesisError> {
    let over_input = verify_signature_gadget(step.input_digest, step.signature, &step.input.public_key)?;
    over_input.and(step.signed_output)
}

/// `Σ flag_i · check_i == 1`, gated on the flags being one-hot.
pub fn select_admissible(flags: &[Boolean<F>], checks: &[Boolean<F>]) -> Result<Boolean<F>, SynthesisError> {
    let mut total = FpVar::<F>::zero();
    let mut selected = FpVar::<F>::zero();
    for (f, c) in flags.iter().zip(checks) {
        total += FpVar::from(f.clone());
        selected += FpVar::from(f.and(c)?);
    }
    let one = FpVar::<F>::one();
    total.is_eq(&one)?.and(&selected.is_eq(&one)?)
}
