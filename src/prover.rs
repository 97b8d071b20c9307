//! Edit engine
//!
//! [`Prover::edit`] advances a photograph by one step:
//!
//! - **genesis state** (no PCD proof yet): the record is left untouched and
//!   the bare signature is converted into the first proof;
//! - **chained state**: the transformation is applied out of circuit, the
//!   signer signs the new digest, and a proof of the step is generated.
//!
//! Witness assembly ([`Prover::genesis_witness`], [`Prover::chained_witness`])
//! and proof generation ([`Prover::prove`]) are separate calls so the two
//! stages can be driven independently.

#![forbid(unsafe_code)]

use tracing::{debug, info, warn};

use crate::backend::{Groth16Backend, PcdProof, ProofBackend, ProofGenerationError, ProvingKey};
use crate::identity::{Identity, SigningError};
use crate::photograph::{Photograph, Proof};
use crate::predicate::CompliancePredicateWitness;
use crate::transformation::{Transformation, TransformationError, TransformationParameters};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Transformation(#[from] TransformationError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    ProofGeneration(#[from] ProofGenerationError),
    #[error("edit worker failed: {0}")]
    Worker(String),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Prover {
    backend: Groth16Backend,
}

impl Prover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform one edit. On error the input photograph is untouched and
    /// remains the current state of its chain.
    pub fn edit(
        &self,
        photograph: &Photograph,
        transformation: Transformation,
        parameters: &TransformationParameters,
        signer: &Identity,
    ) -> Result<Photograph, EditError> {
        let keys = photograph.keys();

        if photograph.is_genesis() {
            let witness = Self::genesis_witness(photograph);
            let pcd_proof = self.prove(&keys.proving, &witness)?;
            info!(digest = %photograph.record.original_hash.short_hex(), "converted bootstrap signature into a PCD proof");
            let proof = Proof { pcd_proof: Some(pcd_proof), signature: photograph.proof.signature };
            return Ok(Photograph::new(photograph.record.clone(), proof, &keys));
        }

        let witness = self.chained_witness(photograph, transformation, parameters, signer)?;
        let pcd_proof = self.prove(&keys.proving, &witness)?;
        info!(
            transformation = %transformation,
            digest = %witness.output.image.digest().short_hex(),
            "proved edit"
        );
        let proof = Proof { pcd_proof: Some(pcd_proof), signature: witness.signature };
        Ok(Photograph::new(witness.output, proof, &keys))
    }

    /// Genesis-conversion witness for a photograph in bootstrap state.
    pub fn genesis_witness(photograph: &Photograph) -> CompliancePredicateWitness {
        CompliancePredicateWitness::genesis(photograph.record.clone(), photograph.proof.signature)
    }

    /// Apply `transformation`, sign the result and assemble the chained-edit
    /// witness. The signer must hold the record's key.
    pub fn chained_witness(
        &self,
        photograph: &Photograph,
        transformation: Transformation,
        parameters: &TransformationParameters,
        signer: &Identity,
    ) -> Result<CompliancePredicateWitness, EditError> {
        let input = &photograph.record;
        let got = signer.public_key();
        if got != input.public_key {
            warn!(expected = %input.public_key, got = %got, "edit requested by a foreign signer");
            return Err(SigningError::UnauthorizedSigner { expected: input.public_key, got }.into());
        }

        let new_image = transformation.apply(&input.image, parameters)?;
        let (digest, signature) = signer.sign_image(&new_image);
        debug!(transformation = %transformation, digest = %digest.short_hex(), "signed edited image");

        Ok(CompliancePredicateWitness::chained(
            input.clone(),
            input.with_image(new_image),
            signature,
            parameters.clone(),
        ))
    }

    pub fn prove(
        &self,
        pk: &ProvingKey,
        witness: &CompliancePredicateWitness,
    ) -> Result<PcdProof, ProofGenerationError> {
        self.backend.prove(pk, witness, &mut rand::rngs::OsRng).map_err(|e| {
            warn!(error = %e, case_1 = witness.case_1, "proof generation failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Image, PixelLocation};
    use crate::keys;
    use crate::record::ProvenanceRecord;
    use rand::{rngs::StdRng, SeedableRng};

    fn genesis(seed: u64) -> (Identity, Photograph) {
        let keys = keys::global_or_generate().unwrap();
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(seed));
        let img = Image::random(&mut StdRng::seed_from_u64(seed + 1));
        let (_, sig) = id.sign_image(&img);
        let record = ProvenanceRecord::genesis(img, id.public_key(), sig);
        (id, Photograph::new(record, Proof { pcd_proof: None, signature: sig }, &keys))
    }

    #[test]
    fn first_edit_only_upgrades_the_evidence() {
        let (id, p0) = genesis(41);
        let p1 = Prover::new()
            .edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id)
            .unwrap();
        assert!(!p1.is_genesis());
        assert_eq!(p1.record, p0.record);
        assert_eq!(p1.proof.signature, p0.proof.signature);
        assert!(p0.is_genesis());
    }

    #[test]
    fn chained_edit_keeps_key_and_anchor() {
        let (id, p0) = genesis(43);
        let prover = Prover::new();
        let p1 = prover.edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id).unwrap();
        let p2 = prover.edit(&p1, Transformation::Identity, &TransformationParameters::Identity, &id).unwrap();
        assert_eq!(p2.record.public_key, p0.record.public_key);
        assert_eq!(p2.record.original_hash, p0.record.original_hash);
        assert_eq!(p2.record.image, p0.record.image);
        // Signing is deterministic and the pixels are unchanged.
        assert_eq!(p2.proof.signature, p0.record.original_signature);
    }

    #[test]
    fn foreign_signer_is_refused_before_proving() {
        let (id, p0) = genesis(45);
        let prover = Prover::new();
        let p1 = prover.edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id).unwrap();
        let thief = Identity::generate_with(&mut StdRng::seed_from_u64(999));
        let err = prover
            .edit(&p1, Transformation::Identity, &TransformationParameters::Identity, &thief)
            .unwrap_err();
        assert!(matches!(err, EditError::Signing(SigningError::UnauthorizedSigner { .. })));
    }

    #[test]
    fn mutation_between_signing_and_proving_is_unprovable() {
        let (id, p0) = genesis(47);
        let prover = Prover::new();
        let p1 = prover.edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id).unwrap();

        let mut witness = prover
            .chained_witness(&p1, Transformation::Identity, &TransformationParameters::Identity, &id)
            .unwrap();
        let loc = PixelLocation::new(2, 2);
        let old = witness.output.image.pixel(loc).unwrap().rgb;
        witness.output.image = witness.output.image.with_pixel(loc, [old[0] ^ 1, old[1], old[2]]).unwrap();

        let err = prover.prove(&p1.proving_key, &witness).unwrap_err();
        assert!(matches!(err, ProofGenerationError::Unsatisfied { constraint: "compliance" }));
    }

    #[test]
    fn tampered_genesis_cannot_be_converted() {
        let (id, mut p0) = genesis(49);
        p0.record.image = Image::white();
        let err = Prover::new()
            .edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id)
            .unwrap_err();
        assert!(matches!(err, EditError::ProofGeneration(ProofGenerationError::Unsatisfied { .. })));
    }
}
