//! Provenance record `Z` and its circuit twin.
//!
//! `Z = (image, public_key, original_signature, original_hash)`. The
//! `original_hash` is fixed when the record is first created and every record
//! derived from it via [`ProvenanceRecord::with_image`] carries it unchanged.
//!
//! ## Public-input layout
//! When a record is allocated as a public input, its wires appear in this
//! order, which is therefore part of the proof statement:
//!
//! ```text
//! image:               N² × (r, g, b, x, y)
//! public_key:          (x, y) affine coordinates
//! original_signature:  (R.x, R.y, s)
//! original_hash:       1 field element
//! ```

#![forbid(unsafe_code)]

use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::ConstraintSystemRef;

use crate::circuit::CircuitError;
use crate::identity::{PublicKey, PublicKeyVar, Signature, SignatureVar};
use crate::image::{Digest, Image};
use crate::image_var::ImageVar;
use crate::F;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvenanceRecord {
    pub image: Image,
    /// Key authorized over this record's lineage.
    pub public_key: PublicKey,
    /// Bootstrap signature over `original_hash`.
    pub original_signature: Signature,
    /// Digest of the first image of the lineage; never changes.
    pub original_hash: Digest,
}

impl ProvenanceRecord {
    /// Record for a freshly captured image: the anchor is the image itself.
    pub fn genesis(image: Image, public_key: PublicKey, original_signature: Signature) -> Self {
        let original_hash = image.digest();
        Self { image, public_key, original_signature, original_hash }
    }

    /// Successor record: new image, same key, same anchor.
    pub fn with_image(&self, image: Image) -> Self {
        Self {
            image,
            public_key: self.public_key,
            original_signature: self.original_signature,
            original_hash: self.original_hash,
        }
    }

    /// Stand-in for an absent input record (genesis conversion) and for
    /// compiling the predicate. Never satisfies any signature check.
    pub fn placeholder() -> Self {
        Self {
            image: Image::black(),
            public_key: PublicKey::placeholder(),
            original_signature: Signature::placeholder(),
            original_hash: Digest(F::zero()),
        }
    }

    /// `original_hash == digest(image)`: the record is still at its anchor.
    pub fn is_at_anchor(&self) -> bool {
        self.original_hash == self.image.digest()
    }
}

#[derive(Clone, Debug)]
pub struct RecordVar {
    pub image: ImageVar,
    pub public_key: PublicKeyVar,
    pub original_signature: SignatureVar,
    pub original_hash: FpVar<F>,
}

impl RecordVar {
    pub fn alloc(
        cs: &ConstraintSystemRef<F>,
        mode: AllocationMode,
        record: &ProvenanceRecord,
    ) -> Result<Self, CircuitError> {
        let image = ImageVar::alloc(cs, mode, &record.image)?;
        let public_key = PublicKeyVar::alloc(cs, mode, &record.public_key)?;
        let original_signature = SignatureVar::alloc(cs, mode, &record.original_signature)?;
        let original_hash = FpVar::new_variable(cs.clone(), || Ok(record.original_hash.0), mode)?;
        Ok(Self { image, public_key, original_signature, original_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::N2;
    use ark_relations::r1cs::ConstraintSystem;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn successors_keep_key_and_anchor() {
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(1));
        let img = Image::random(&mut StdRng::seed_from_u64(2));
        let (_, sig) = id.sign_image(&img);
        let z0 = ProvenanceRecord::genesis(img, id.public_key(), sig);
        assert!(z0.is_at_anchor());

        let z1 = z0.with_image(Image::white());
        assert_eq!(z1.public_key, z0.public_key);
        assert_eq!(z1.original_hash, z0.original_hash);
        assert_eq!(z1.original_signature, z0.original_signature);
        assert!(!z1.is_at_anchor());
    }

    #[test]
    fn public_layout_is_image_key_signature_hash() {
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(3));
        let (_, sig) = id.sign_image(&Image::white());
        let z = ProvenanceRecord::genesis(Image::white(), id.public_key(), sig);
        let cs = ConstraintSystem::<F>::new_ref();
        RecordVar::alloc(&cs, AllocationMode::Input, &z).unwrap();
        let publics = cs.borrow().unwrap().instance_assignment[1..].to_vec();
        assert_eq!(publics.len(), N2 * 5 + 2 + 3 + 1);
        assert_eq!(&publics[..N2 * 5], z.image.field_elements().as_slice());
        assert_eq!(publics[publics.len() - 1], z.original_hash.0);
    }
}
