//! View engine
//!
//! [`Verifier::view`] decides whether a photograph's record is backed by its
//! evidence, using nothing but the photograph itself and a verifying key the
//! viewer trusts. The key a photograph carries is never consulted:
//!
//! 1. the bootstrap signature must verify over `original_hash` under the
//!    record's key, whatever state the photograph is in;
//! 2. in genesis state, the record must sit at its anchor and the current
//!    signature must verify over the image digest;
//! 3. otherwise the public inputs are rebuilt from the record and signature
//!    and the PCD proof is verified against them.
//!
//! "The evidence does not hold" is a [`Verdict::Invalid`], not an error.
//! [`ViewError`] is reserved for inputs that cannot be checked at all.

#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{Groth16Backend, ProofBackend, ProofVerificationError, VerifyingKey};
use crate::circuit::CircuitError;
use crate::identity::{self, SignatureError};
use crate::photograph::Photograph;
use crate::predicate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Rejection),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Why the evidence does not hold.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("original signature does not verify over the original hash")]
    OriginalSignature,
    #[error("genesis record is not at its anchor")]
    NotAtAnchor,
    #[error("current signature does not verify over the image digest")]
    CurrentSignature,
    #[error("proof: {0}")]
    Proof(ProofVerificationError),
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("record public key is not a valid curve point")]
    MalformedPublicKey,
    #[error("verifying key is malformed")]
    MalformedVerifyingKey,
    #[error("statement encoding: {0}")]
    Encoding(#[from] CircuitError),
    #[error("view worker failed: {0}")]
    Worker(String),
}

#[derive(Clone, Debug)]
pub struct Verifier {
    backend: Groth16Backend,
    verifying_key: Arc<VerifyingKey>,
}

impl Verifier {
    /// Verify every proof against `verifying_key`.
    pub fn new(verifying_key: Arc<VerifyingKey>) -> Self {
        Self { backend: Groth16Backend, verifying_key }
    }

    pub fn view(&self, photograph: &Photograph) -> Result<Verdict, ViewError> {
        let verdict = self.check(photograph)?;
        match &verdict {
            Verdict::Valid => info!(digest = %photograph.record.image.digest().short_hex(), "photograph verified"),
            Verdict::Invalid(why) => warn!(reason = %why, "photograph rejected"),
        }
        Ok(verdict)
    }

    fn check(&self, photograph: &Photograph) -> Result<Verdict, ViewError> {
        let record = &photograph.record;

        let bootstrap = identity::verify(&record.public_key, &record.original_signature, &record.original_hash);
        if let Some(verdict) = signature_outcome(bootstrap, Rejection::OriginalSignature)? {
            return Ok(verdict);
        }

        let Some(pcd_proof) = &photograph.proof.pcd_proof else {
            debug!("genesis state: checking the bare signature");
            if !record.is_at_anchor() {
                return Ok(Verdict::Invalid(Rejection::NotAtAnchor));
            }
            let current = identity::verify(&record.public_key, &photograph.proof.signature, &record.image.digest());
            return Ok(signature_outcome(current, Rejection::CurrentSignature)?.unwrap_or(Verdict::Valid));
        };

        let public_inputs = predicate::public_inputs(record, &photograph.proof.signature)?;
        match self.backend.verify(&self.verifying_key, pcd_proof, &public_inputs) {
            Ok(()) => Ok(Verdict::Valid),
            Err(ProofVerificationError::MalformedKey) => Err(ViewError::MalformedVerifyingKey),
            Err(e) => Ok(Verdict::Invalid(Rejection::Proof(e))),
        }
    }
}

/// `None` when the signature holds, a rejection when it does not.
fn signature_outcome(
    result: Result<(), SignatureError>,
    rejection: Rejection,
) -> Result<Option<Verdict>, ViewError> {
    match result {
        Ok(()) => Ok(None),
        Err(SignatureError::Mismatch) => Ok(Some(Verdict::Invalid(rejection))),
        Err(SignatureError::MalformedKey) => Err(ViewError::MalformedPublicKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{statement_digest, PublicInputMismatchError};
    use crate::identity::{Identity, PublicKey};
    use crate::image::Image;
    use crate::keys;
    use crate::photograph::Proof;
    use crate::prover::Prover;
    use crate::record::ProvenanceRecord;
    use crate::transformation::{Transformation, TransformationParameters};
    use rand::{rngs::StdRng, SeedableRng};

    fn verifier() -> Verifier {
        Verifier::new(keys::global_or_generate().unwrap().verifying)
    }

    fn genesis(seed: u64) -> (Identity, Photograph) {
        let keys = keys::global_or_generate().unwrap();
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(seed));
        let img = Image::random(&mut StdRng::seed_from_u64(seed + 1));
        let (_, sig) = id.sign_image(&img);
        let record = ProvenanceRecord::genesis(img, id.public_key(), sig);
        (id, Photograph::new(record, Proof { pcd_proof: None, signature: sig }, &keys))
    }

    fn upgraded(seed: u64) -> (Identity, Photograph) {
        let (id, p0) = genesis(seed);
        let p1 = Prover::new()
            .edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id)
            .unwrap();
        (id, p1)
    }

    #[test]
    fn genesis_state_verifies() {
        let (_, p0) = genesis(51);
        assert_eq!(verifier().view(&p0).unwrap(), Verdict::Valid);
    }

    #[test]
    fn genesis_state_with_swapped_image_is_not_at_anchor() {
        let (id, mut p0) = genesis(53);
        p0.record.image = Image::black();
        p0.proof.signature = id.sign_image(&p0.record.image).1;
        assert_eq!(verifier().view(&p0).unwrap(), Verdict::Invalid(Rejection::NotAtAnchor));
    }

    #[test]
    fn bootstrap_signature_is_checked_even_with_a_proof() {
        let (_, mut p1) = upgraded(55);
        p1.record.original_signature.0[0] ^= 1;
        assert_eq!(verifier().view(&p1).unwrap(), Verdict::Invalid(Rejection::OriginalSignature));
    }

    #[test]
    fn swapped_signature_breaks_public_inputs() {
        let (_, mut p1) = upgraded(57);
        let other = Identity::generate_with(&mut StdRng::seed_from_u64(58));
        p1.proof.signature = other.sign_image(&p1.record.image).1;
        assert_eq!(
            verifier().view(&p1).unwrap(),
            Verdict::Invalid(Rejection::Proof(ProofVerificationError::PublicInputs(PublicInputMismatchError::Digest)))
        );
    }

    #[test]
    fn carried_verifying_key_is_ignored() {
        let (_, mut p1) = upgraded(59);
        p1.verifying_key = keys::independent_keys().verifying;
        assert_eq!(verifier().view(&p1).unwrap(), Verdict::Valid);
    }

    #[test]
    fn chain_proven_under_rogue_keys_is_rejected() {
        let rogue = keys::independent_keys();
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(60));
        let img = Image::random(&mut StdRng::seed_from_u64(61));
        let (_, sig) = id.sign_image(&img);
        let record = ProvenanceRecord::genesis(img, id.public_key(), sig);
        let p0 = Photograph::new(record, Proof { pcd_proof: None, signature: sig }, &rogue);
        let p1 = Prover::new()
            .edit(&p0, Transformation::Identity, &TransformationParameters::Identity, &id)
            .unwrap();

        assert_eq!(Verifier::new(rogue.verifying).view(&p1).unwrap(), Verdict::Valid);
        assert_eq!(
            verifier().view(&p1).unwrap(),
            Verdict::Invalid(Rejection::Proof(ProofVerificationError::Rejected))
        );
    }

    #[test]
    fn rebound_statement_digest_does_not_carry_a_proof_to_other_pixels() {
        let (id, mut p1) = upgraded(63);
        p1.record.image = Image::black();
        p1.proof.signature = id.sign_image(&p1.record.image).1;
        let inputs = predicate::public_inputs(&p1.record, &p1.proof.signature).unwrap();
        let proof = p1.proof.pcd_proof.as_mut().unwrap();
        proof.statement_digest = statement_digest(&proof.header, &inputs);
        assert_eq!(
            verifier().view(&p1).unwrap(),
            Verdict::Invalid(Rejection::Proof(ProofVerificationError::Rejected))
        );
    }

    #[test]
    fn malformed_public_key_is_an_operational_error() {
        let (_, mut p0) = genesis(61);
        p0.record.public_key = PublicKey([0xff; 32]);
        assert!(matches!(verifier().view(&p0), Err(ViewError::MalformedPublicKey)));
    }
}
