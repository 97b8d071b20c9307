//! Participant identities: EdDSA over the BN254-embedded twisted Edwards curve
//!
//! Keys live on `ark-ed-on-bn254` (BabyJubjub-style, base field = the BN254
//! scalar field), so signatures are cheap to verify inside the predicate. A
//! signature over digest `m` under key `A = a·G` is `(R, s)` with
//!
//! ```text
//! e = MiMC(R.x, R.y, A.x, A.y, m)
//! 8·s·G == 8·(R + e·A)
//! ```
//!
//! Nonces are derived from the identity seed and the digest, so signing is
//! deterministic.
//!
//! Signing input is always an [`Image`]: [`Identity::sign_image`] computes the
//! digest itself and signs exactly that field element. Verification takes the
//! digest the verifier recomputed. [`verify_signature_gadget`] is the
//! in-circuit twin of [`verify`] and binds to the digest wire it is given.
//!
//! ## Encodings
//! A public key is the 32-byte compressed point. A signature is the compressed
//! `R` followed by `s` as a canonical little-endian scalar. Both serialize as
//! lowercase hex strings. Secret keys never implement `Serialize`, `Debug` or
//! `Display`.

#![forbid(unsafe_code)]

use std::fmt;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::constraints::EdwardsVar;
use ark_ed_on_bn254::{EdwardsAffine, EdwardsProjective, Fr as Scalar};
use ark_ff::{BigInteger, One, PrimeField, Zero};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::circuit::{mimc_hash, CircuitError};
use crate::image::{Digest, Image};
use crate::mimc;
use crate::F;

/// `log2` of the curve cofactor (8).
const COFACTOR_BITS: usize = 3;

const SECRET_CONTEXT: &str = "photoproof 2024 identity secret scalar";
const NONCE_CONTEXT: &str = "photoproof 2024 eddsa nonce";

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signer {got} is not authorized over this lineage (expected {expected})")]
    UnauthorizedSigner { expected: PublicKey, got: PublicKey },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("public key bytes are not a valid subgroup point")]
    MalformedKey,
    #[error("signature does not verify over the digest")]
    Mismatch,
}

// ---------------------------------------------------------------------------
// PublicKey / Signature
// ---------------------------------------------------------------------------

/// A compressed curve point (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

/// Compressed `R` followed by the scalar `s` (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

fn identity_point() -> EdwardsAffine {
    EdwardsAffine::new_unchecked(F::zero(), F::one())
}

fn is_identity(p: &EdwardsAffine) -> bool {
    p.x.is_zero() && p.y.is_one()
}

fn decode_point(bytes: &[u8]) -> Option<EdwardsAffine> {
    EdwardsAffine::deserialize_compressed(bytes).ok()
}

fn encode_point(p: &EdwardsAffine, out: &mut [u8]) {
    p.serialize_compressed(out).expect("a curve point compresses to 32 bytes");
}

/// Challenge as a base-field element; reduced mod ℓ only when signing.
fn challenge(r: &EdwardsAffine, a: &EdwardsAffine, digest: &Digest) -> F {
    mimc::hash_elements(&[r.x, r.y, a.x, a.y, digest.0])
}

fn wide_hash(context: &str, parts: &[&[u8]]) -> [u8; 64] {
    let mut h = blake3::Hasher::new_derive_key(context);
    for p in parts {
        h.update(p);
    }
    let mut out = [0u8; 64];
    h.finalize_xof().fill(&mut out);
    out
}

impl PublicKey {
    fn from_point(p: &EdwardsAffine) -> Self {
        let mut out = [0u8; 32];
        encode_point(p, &mut out);
        Self(out)
    }

    /// Decode to a usable verification key; the identity point is refused.
    fn to_point(&self) -> Result<EdwardsAffine, SignatureError> {
        match decode_point(&self.0) {
            Some(p) if !is_identity(&p) => Ok(p),
            _ => Err(SignatureError::MalformedKey),
        }
    }

    /// The identity point. No signature verifies under it.
    pub fn placeholder() -> Self {
        Self::from_point(&identity_point())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        Self::from_slice(&hex::decode(s.trim()).ok()?)
    }
}

impl Signature {
    fn from_parts(r: &EdwardsAffine, s: &Scalar) -> Self {
        let mut out = [0u8; 64];
        encode_point(r, &mut out[..32]);
        s.serialize_compressed(&mut out[32..]).expect("a scalar encodes to 32 bytes");
        Self(out)
    }

    fn to_parts(&self) -> Option<(EdwardsAffine, Scalar)> {
        let r = decode_point(&self.0[..32])?;
        let s = Scalar::deserialize_compressed(&self.0[32..]).ok()?;
        Some((r, s))
    }

    /// `(R, s) = (O, 0)`.
    pub fn placeholder() -> Self {
        Self::from_parts(&identity_point(), &Scalar::zero())
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        Self::from_slice(&hex::decode(s.trim()).ok()?)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", &self.to_hex()[..8])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("public key must be 32 bytes of hex"))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("signature must be 64 bytes of hex"))
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A signing identity (camera or editor).
#[derive(Clone)]
pub struct Identity {
    seed: [u8; 32],
    secret: Scalar,
    public: EdwardsAffine,
}

impl Identity {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rngs::OsRng)
    }

    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let secret = Scalar::from_le_bytes_mod_order(&wide_hash(SECRET_CONTEXT, &[&seed[..]]));
        let public = (EdwardsAffine::generator() * secret).into_affine();
        Self { seed: *seed, secret, public }
    }

    /// Secret seed, for persisting the identity to a key file.
    pub fn to_seed(&self) -> [u8; 32] {
        self.seed
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(&self.public)
    }

    /// Digest `image` and sign exactly that digest.
    pub fn sign_image(&self, image: &Image) -> (Digest, Signature) {
        let digest = image.digest();
        let sig = self.sign_digest(&digest);
        (digest, sig)
    }

    fn sign_digest(&self, digest: &Digest) -> Signature {
        let nonce = wide_hash(NONCE_CONTEXT, &[&self.seed[..], &digest.to_bytes()[..]]);
        let r = Scalar::from_le_bytes_mod_order(&nonce);
        let big_r = (EdwardsAffine::generator() * r).into_affine();
        let e = to_scalar(&challenge(&big_r, &self.public, digest));
        Signature::from_parts(&big_r, &(r + e * self.secret))
    }
}

fn to_scalar(e: &F) -> Scalar {
    Scalar::from_le_bytes_mod_order(&e.into_bigint().to_bytes_le())
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("public_key", &self.public_key()).finish_non_exhaustive()
    }
}

/// Out-of-circuit verification of `sig` over `digest` under `pk`.
pub fn verify(pk: &PublicKey, sig: &Signature, digest: &Digest) -> Result<(), SignatureError> {
    let a = pk.to_point()?;
    let (r, s) = sig.to_parts().ok_or(SignatureError::Mismatch)?;
    let e = challenge(&r, &a, digest);
    let mut diff = EdwardsAffine::generator() * s - (a.mul_bigint(e.into_bigint()) + r);
    for _ in 0..COFACTOR_BITS {
        diff = diff + diff;
    }
    if is_identity(&diff.into_affine()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

// ---------------------------------------------------------------------------
// Circuit twins
// ---------------------------------------------------------------------------

fn alloc_point(
    cs: &ConstraintSystemRef<F>,
    point: EdwardsAffine,
    mode: AllocationMode,
) -> Result<EdwardsVar, SynthesisError> {
    <EdwardsVar as AllocVar<EdwardsProjective, F>>::new_variable(cs.clone(), || Ok(point.into_group()), mode)
}

#[derive(Clone, Debug)]
pub struct PublicKeyVar(pub EdwardsVar);

/// `R` as a point and `s` as a base-field wire (`s < ℓ < p`).
#[derive(Clone, Debug)]
pub struct SignatureVar {
    pub r: EdwardsVar,
    pub s: FpVar<F>,
}

impl PublicKeyVar {
    pub fn alloc(
        cs: &ConstraintSystemRef<F>,
        mode: AllocationMode,
        pk: &PublicKey,
    ) -> Result<Self, CircuitError> {
        let point = decode_point(&pk.0).ok_or(CircuitError::Malformed("public key"))?;
        Ok(Self(alloc_point(cs, point, mode)?))
    }

    pub fn is_eq(&self, other: &PublicKeyVar) -> Result<Boolean<F>, SynthesisError> {
        self.0.is_eq(&other.0)
    }
}

impl SignatureVar {
    pub fn alloc(
        cs: &ConstraintSystemRef<F>,
        mode: AllocationMode,
        sig: &Signature,
    ) -> Result<Self, CircuitError> {
        let (r, s) = sig.to_parts().ok_or(CircuitError::Malformed("signature"))?;
        let s = F::from_le_bytes_mod_order(&s.into_bigint().to_bytes_le());
        Ok(Self {
            r: alloc_point(cs, r, mode)?,
            s: FpVar::new_variable(cs.clone(), || Ok(s), mode)?,
        })
    }
}

/// Boolean wire: `sig` is a valid signature over the digest wire under `pk`,
/// and `pk` is not the identity point.
pub fn verify_signature_gadget(
    digest: &FpVar<F>,
    sig: &SignatureVar,
    pk: &PublicKeyVar,
) -> Result<Boolean<F>, SynthesisError> {
    let e = mimc_hash(&[sig.r.x.clone(), sig.r.y.clone(), pk.0.x.clone(), pk.0.y.clone(), digest.clone()])?;
    let generator = EdwardsVar::constant(EdwardsAffine::generator().into_group());
    let s_g = generator.scalar_mul_le(sig.s.to_bits_le()?.iter())?;
    let e_a = pk.0.scalar_mul_le(e.to_bits_le()?.iter())?;
    let mut diff = s_g - (sig.r.clone() + e_a);
    for _ in 0..COFACTOR_BITS {
        diff = diff.double()?;
    }
    let holds = diff.is_eq(&EdwardsVar::zero())?;
    let degenerate = pk.0.is_eq(&EdwardsVar::zero())?;
    holds.and(&degenerate.not())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;
    use rand::{rngs::StdRng, SeedableRng};

    fn identity(seed: u64) -> Identity {
        Identity::generate_with(&mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn sign_then_verify_over_recomputed_digest() {
        let id = identity(1);
        let img = Image::random(&mut StdRng::seed_from_u64(9));
        let (digest, sig) = id.sign_image(&img);
        assert_eq!(digest, img.digest());
        assert_eq!(verify(&id.public_key(), &sig, &img.digest()), Ok(()));
    }

    #[test]
    fn wrong_key_or_digest_is_a_mismatch() {
        let (a, b) = (identity(1), identity(2));
        let (_, sig) = a.sign_image(&Image::white());
        assert_eq!(verify(&b.public_key(), &sig, &Image::white().digest()), Err(SignatureError::Mismatch));
        assert_eq!(verify(&a.public_key(), &sig, &Image::black().digest()), Err(SignatureError::Mismatch));
    }

    #[test]
    fn tampered_scalar_or_garbage_bytes_are_rejected() {
        let id = identity(7);
        let (digest, sig) = id.sign_image(&Image::white());
        let mut bumped = sig;
        bumped.0[40] ^= 1;
        assert_eq!(verify(&id.public_key(), &bumped, &digest), Err(SignatureError::Mismatch));
        assert_eq!(verify(&id.public_key(), &Signature([0xff; 64]), &digest), Err(SignatureError::Mismatch));
        assert_eq!(verify(&PublicKey([0xff; 32]), &sig, &digest), Err(SignatureError::MalformedKey));
    }

    #[test]
    fn identity_point_is_not_a_key() {
        let placeholder = PublicKey::placeholder();
        let digest = Image::black().digest();
        assert_eq!(
            verify(&placeholder, &Signature::placeholder(), &digest),
            Err(SignatureError::MalformedKey)
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let id = identity(3);
        let (_, s1) = id.sign_image(&Image::black());
        let (_, s2) = id.sign_image(&Image::black());
        assert_eq!(s1, s2);
    }

    #[test]
    fn seed_roundtrip_preserves_public_key() {
        let id = identity(4);
        assert_eq!(Identity::from_seed(&id.to_seed()).public_key(), id.public_key());
    }

    #[test]
    fn gadget_agrees_with_plain_verification() {
        let id = identity(5);
        let (digest, sig) = id.sign_image(&Image::white());

        let cs = ConstraintSystem::<F>::new_ref();
        let pk_var = PublicKeyVar::alloc(&cs, AllocationMode::Input, &id.public_key()).unwrap();
        let sig_var = SignatureVar::alloc(&cs, AllocationMode::Input, &sig).unwrap();
        let good = FpVar::new_witness(cs.clone(), || Ok(digest.0)).unwrap();
        let bad = FpVar::new_witness(cs.clone(), || Ok(Image::black().digest().0)).unwrap();
        assert!(verify_signature_gadget(&good, &sig_var, &pk_var).unwrap().value().unwrap());
        assert!(!verify_signature_gadget(&bad, &sig_var, &pk_var).unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn gadget_refuses_the_identity_key() {
        let cs = ConstraintSystem::<F>::new_ref();
        let pk_var = PublicKeyVar::alloc(&cs, AllocationMode::Witness, &PublicKey::placeholder()).unwrap();
        let sig_var = SignatureVar::alloc(&cs, AllocationMode::Witness, &Signature::placeholder()).unwrap();
        let digest = FpVar::new_witness(cs.clone(), || Ok(Image::black().digest().0)).unwrap();
        assert!(!verify_signature_gadget(&digest, &sig_var, &pk_var).unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn serde_uses_hex() {
        let pk = identity(6).public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_hex()));
        assert_eq!(serde_json::from_str::<PublicKey>(&json).unwrap(), pk);
    }
}
