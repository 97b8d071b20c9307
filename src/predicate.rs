//! Compliance predicate
//!
//! One fixed circuit covers both provenance steps, chosen by the secret
//! discriminant `case_1`:
//!
//! - **genesis conversion** (`case_1 = 1`): the output record is at its anchor
//!   (`original_hash == digest(image)`) and the signature verifies over that
//!   digest under the output key;
//! - **chained edit** (`case_1 = 0`): the key and anchor carry over from the
//!   input, the signature verifies over the output digest, and the catalog
//!   entry picked by the one-hot selector admits the step.
//!
//! Both branches are synthesized on every witness and combined with
//! `Boolean::select`; the result is the single `compliance` assertion.
//!
//! Public inputs are the output record followed by the signature `(R.x, R.y,
//! s)` (see [`crate::record`]). [`public_inputs`] rebuilds them through the
//! same allocation routine the circuit uses.

#![forbid(unsafe_code)]

use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystem, ConstraintSystemRef, SynthesisError};

use crate::circuit::{self, Assertion, Circuit, CircuitError, CircuitShape};
use crate::identity::{verify_signature_gadget, Signature, SignatureVar};
use crate::record::{ProvenanceRecord, RecordVar};
use crate::transformation::{
    admissibility_checks, select_admissible, ParametersVar, StepVars, Transformation,
    TransformationParameters, CATALOG,
};
use crate::F;

/// Label of the one top-level assertion.
pub const COMPLIANCE: &str = "compliance";

/// Everything one proof-generation call consumes.
#[derive(Clone, Debug)]
pub struct CompliancePredicateWitness {
    /// Previous record; a placeholder at genesis conversion. Always secret.
    pub input: ProvenanceRecord,
    /// Public.
    pub output: ProvenanceRecord,
    /// Signature over `digest(output.image)`. Public.
    pub signature: Signature,
    /// Secret.
    pub parameters: TransformationParameters,
    /// One-hot over the catalog. Secret.
    pub flags: Vec<bool>,
    /// Secret discriminant.
    pub case_1: bool,
}

impl CompliancePredicateWitness {
    /// Genesis conversion of a bare signature into the first proof.
    pub fn genesis(record: ProvenanceRecord, signature: Signature) -> Self {
        let t = Transformation::Identity;
        Self {
            input: ProvenanceRecord::placeholder(),
            output: record,
            signature,
            parameters: t.default_parameters(),
            flags: t.selector_flags(),
            case_1: true,
        }
    }

    /// One chained edit from `input` to `output`.
    pub fn chained(
        input: ProvenanceRecord,
        output: ProvenanceRecord,
        signature: Signature,
        parameters: TransformationParameters,
    ) -> Self {
        let flags = parameters.transformation().selector_flags();
        Self { input, output, signature, parameters, flags, case_1: false }
    }

    /// Witness used only to lay out the circuit.
    pub fn placeholder() -> Self {
        Self::genesis(ProvenanceRecord::placeholder(), Signature::placeholder())
    }
}

/// Allocate the public part of the statement, in statement order.
fn alloc_statement(
    cs: &ConstraintSystemRef<F>,
    output: &ProvenanceRecord,
    signature: &Signature,
) -> Result<(RecordVar, SignatureVar), CircuitError> {
    let out = RecordVar::alloc(cs, AllocationMode::Input, output)?;
    let sig = SignatureVar::alloc(cs, AllocationMode::Input, signature)?;
    Ok((out, sig))
}

impl Circuit for CompliancePredicateWitness {
    fn define(&self, cs: ConstraintSystemRef<F>) -> Result<Vec<Assertion>, CircuitError> {
        if self.flags.len() != CATALOG.len() {
            return Err(CircuitError::SelectorWidth { expected: CATALOG.len(), got: self.flags.len() });
        }
        let (output, signature) = alloc_statement(&cs, &self.output, &self.signature)?;

        let input = RecordVar::alloc(&cs, AllocationMode::Witness, &self.input)?;
        let params = ParametersVar::alloc_catalog(&cs, &self.parameters)?;
        let flags = self
            .flags
            .iter()
            .map(|f| Boolean::new_witness(cs.clone(), || Ok(*f)))
            .collect::<Result<Vec<_>, _>>()?;
        let case_1 = Boolean::new_witness(cs.clone(), || Ok(self.case_1))?;

        let output_digest = output.image.digest()?;
        let input_digest = input.image.digest()?;
        let signed_output = verify_signature_gadget(&output_digest, &signature, &output.public_key)?;
        let in_place = output.image.positions_ok()?;

        // Genesis conversion.
        let anchored = output.original_hash.is_eq(&output_digest)?;
        let ok_1 = Boolean::kary_and(&[anchored, signed_output.clone(), in_place.clone()])?;

        // Chained edit.
        let same_key = input.public_key.is_eq(&output.public_key)?;
        let same_anchor = input.original_hash.is_eq(&output.original_hash)?;
        let step = StepVars {
            input: &input,
            output: &output,
            input_digest: &input_digest,
            output_digest: &output_digest,
            signature: &signature,
            signed_output: &signed_output,
        };
        let checks = admissibility_checks(&step, &params)?;
        let admitted = select_admissible(&flags, &checks)?;
        let ok_2 = Boolean::kary_and(&[same_key, same_anchor, signed_output, in_place, admitted])?;

        let ok = case_1.select(&ok_1, &ok_2)?;
        Ok(vec![Assertion::new(COMPLIANCE, ok)])
    }
}

/// Lay out the predicate over a placeholder witness.
pub fn compile() -> Result<CircuitShape, CircuitError> {
    circuit::shape_of(&CompliancePredicateWitness::placeholder())
}

/// The public-input vector a proof for `(output, signature)` is bound to.
pub fn public_inputs(output: &ProvenanceRecord, signature: &Signature) -> Result<Vec<F>, CircuitError> {
    let cs = ConstraintSystem::<F>::new_ref();
    alloc_statement(&cs, output, signature)?;
    let inner = cs.borrow().ok_or(SynthesisError::MissingCS)?;
    Ok(inner.instance_assignment[1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::image::{Image, PixelLocation};
    use ark_relations::r1cs::SynthesisMode;
    use rand::{rngs::StdRng, SeedableRng};

    fn genesis() -> (Identity, ProvenanceRecord, Signature) {
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(21));
        let img = Image::random(&mut StdRng::seed_from_u64(22));
        let (_, sig) = id.sign_image(&img);
        (id.clone(), ProvenanceRecord::genesis(img, id.public_key(), sig), sig)
    }

    /// Whether `compliance` holds, and the instance the system was built with.
    fn evaluate(w: &CompliancePredicateWitness) -> (bool, Vec<F>) {
        let cs = ConstraintSystem::<F>::new_ref();
        let assertions = circuit::synthesize(w, cs.clone()).unwrap();
        assert_eq!(assertions.len(), 1);
        assert_eq!(assertions[0].label, COMPLIANCE);
        let holds = assertions[0].holds.value().unwrap();
        assert_eq!(holds, cs.is_satisfied().unwrap());
        let instance = cs.borrow().unwrap().instance_assignment[1..].to_vec();
        (holds, instance)
    }

    #[test]
    fn genesis_conversion_is_satisfied() {
        let (_, z, sig) = genesis();
        let (holds, instance) = evaluate(&CompliancePredicateWitness::genesis(z.clone(), sig));
        assert!(holds);
        assert_eq!(instance, public_inputs(&z, &sig).unwrap());
    }

    #[test]
    fn identity_edit_is_satisfied() {
        let (id, z, _) = genesis();
        let (_, sig) = id.sign_image(&z.image);
        let w = CompliancePredicateWitness::chained(
            z.clone(),
            z.with_image(z.image.clone()),
            sig,
            TransformationParameters::Identity,
        );
        assert!(evaluate(&w).0);
    }

    #[test]
    fn shape_does_not_depend_on_the_witness() {
        let (id, z, sig) = genesis();
        let compiled = compile().unwrap();
        let proving = SynthesisMode::Prove { construct_matrices: true };
        let g = circuit::shape_in_mode(&CompliancePredicateWitness::genesis(z.clone(), sig), proving).unwrap();
        let (_, sig2) = id.sign_image(&z.image);
        let chained =
            CompliancePredicateWitness::chained(z.clone(), z.clone(), sig2, TransformationParameters::Identity);
        let c = circuit::shape_in_mode(&chained, proving).unwrap();
        assert_eq!(compiled, g);
        assert_eq!(compiled, c);
        assert_eq!(compiled.num_public, public_inputs(&z, &sig).unwrap().len());
    }

    #[test]
    fn changed_pixels_violate_identity_edit() {
        let (id, z, _) = genesis();
        let changed = z.image.with_pixel(PixelLocation::new(1, 1), [1, 2, 3]).unwrap();
        let (_, sig) = id.sign_image(&changed);
        let w = CompliancePredicateWitness::chained(
            z.clone(),
            z.with_image(changed),
            sig,
            TransformationParameters::Identity,
        );
        assert!(!evaluate(&w).0);
    }

    #[test]
    fn key_takeover_is_rejected() {
        let (_, z, _) = genesis();
        let thief = Identity::generate_with(&mut StdRng::seed_from_u64(99));
        let (_, sig) = thief.sign_image(&z.image);
        let mut out = z.with_image(z.image.clone());
        out.public_key = thief.public_key();
        let w = CompliancePredicateWitness::chained(z, out, sig, TransformationParameters::Identity);
        assert!(!evaluate(&w).0);
    }

    #[test]
    fn anchor_rewrite_is_rejected() {
        let (id, z, _) = genesis();
        let (_, sig) = id.sign_image(&z.image);
        let mut out = z.with_image(z.image.clone());
        out.original_hash = Image::white().digest();
        let w = CompliancePredicateWitness::chained(z, out, sig, TransformationParameters::Identity);
        assert!(!evaluate(&w).0);
    }

    #[test]
    fn genesis_requires_anchor_at_image() {
        let (id, z, _) = genesis();
        let moved = z.with_image(Image::white());
        let (_, sig) = id.sign_image(&moved.image);
        assert!(!evaluate(&CompliancePredicateWitness::genesis(moved, sig)).0);
    }

    #[test]
    fn genesis_under_the_placeholder_key_is_rejected() {
        let img = Image::white();
        let record = ProvenanceRecord::genesis(img, crate::identity::PublicKey::placeholder(), Signature::placeholder());
        assert!(!evaluate(&CompliancePredicateWitness::genesis(record, Signature::placeholder())).0);
    }

    #[test]
    fn wrong_selector_width_is_an_error() {
        let mut w = CompliancePredicateWitness::placeholder();
        w.flags.push(false);
        let cs = ConstraintSystem::<F>::new_ref();
        assert!(matches!(
            w.define(cs),
            Err(CircuitError::SelectorWidth { expected, got }) if expected == CATALOG.len() && got == CATALOG.len() + 1
        ));
    }
}
