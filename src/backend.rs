//! Proof backend
//!
//! [`ProofBackend`] is the seam between the provenance protocol and the proof
//! system: compile a circuit to its shape, derive a key pair for it, prove a
//! witness, verify a proof against public inputs. Callers treat proofs and
//! keys as opaque values.
//!
//! ## `Groth16Backend`
//! The default backend is Groth16 over BN254 (`ark-groth16`), with a
//! circuit-specific setup. A proof carries, besides the three group elements:
//!
//! 1. **Header**: `(version, circuit digest, num_public)`, absorbed first.
//! 2. **Statement digest**: transcript digest of the public-input vector,
//!    absorbed as one length-delimited item after the header.
//!
//! Both are checked before the pairing equation, so a proof for another
//! circuit or another statement is reported precisely. Soundness rests on the
//! pairing check alone; the proving key holds no secret.
//!
//! ## Encoding
//! Proofs and keys use Arkworks canonical compressed encodings, framed with an
//! 8-byte magic and a big-endian `u16` version (see [`encode_framed`]).

#![forbid(unsafe_code)]

use std::fmt;

use ark_bn254::Bn254;
use ark_groth16::Groth16;
use ark_r1cs_std::R1CSVar;
use ark_relations::r1cs::{ConstraintSystem, SynthesisError};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::circuit::{self, Circuit, CircuitError, CircuitShape, Synthesizer};
use crate::transcript::{FsLabel, Transcript};
use crate::F;

/// Current proof header version.
pub const PROOF_VERSION: u16 = 2;
/// Magic for framed proofs.
pub const PROOF_MAGIC: &[u8; 8] = b"PPPROOF\0";

/// Label reported when the witness breaks a constraint below the top-level
/// assertions.
pub const WELL_FORMED: &str = "well_formed";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProofGenerationError {
    #[error("witness violates constraint `{constraint}`")]
    Unsatisfied { constraint: &'static str },
    #[error("circuit construction failed: {0}")]
    Circuit(#[from] CircuitError),
    #[error("circuit layout does not match the proving key")]
    ShapeMismatch,
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublicInputMismatchError {
    #[error("expected {expected} public inputs, got {got}")]
    Count { expected: usize, got: usize },
    #[error("public inputs differ from the ones the proof is bound to")]
    Digest,
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProofVerificationError {
    #[error("unsupported proof version {0}")]
    Version(u16),
    #[error("proof was produced for a different circuit")]
    KeyMismatch,
    #[error(transparent)]
    PublicInputs(#[from] PublicInputMismatchError),
    #[error("proof does not verify under the trusted key")]
    Rejected,
    #[error("verifying key is malformed")]
    MalformedKey,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("input too short for a framed object")]
    Truncated,
    #[error("bad magic (expected {expected:?})")]
    BadMagic { expected: String },
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    #[error("deserialize: {0}")]
    Deserialize(String),
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

pub trait ProofBackend: Send + Sync {
    type ProvingKey: Send + Sync;
    type VerifyingKey: Clone + Send + Sync;
    type Proof: Clone + Send + Sync;

    /// Lay the circuit out; the witness it carries only needs to be well-formed.
    fn compile(&self, circuit: &dyn Circuit) -> Result<CircuitShape, ProofGenerationError>;

    fn setup<R: RngCore + CryptoRng>(
        &self,
        circuit: &dyn Circuit,
        rng: &mut R,
    ) -> Result<(Self::ProvingKey, Self::VerifyingKey), ProofGenerationError>;

    fn prove<R: RngCore + CryptoRng>(
        &self,
        pk: &Self::ProvingKey,
        circuit: &dyn Circuit,
        rng: &mut R,
    ) -> Result<Self::Proof, ProofGenerationError>;

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[F],
    ) -> Result<(), ProofVerificationError>;
}

// ---------------------------------------------------------------------------
// Keys and proofs
// ---------------------------------------------------------------------------

#[derive(Clone, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProvingKey {
    pub shape: CircuitShape,
    groth16: ark_groth16::ProvingKey<Bn254>,
}

#[derive(Clone, PartialEq, CanonicalSerialize, CanonicalDeserialize)]
pub struct VerifyingKey {
    pub shape: CircuitShape,
    pub groth16: ark_groth16::VerifyingKey<Bn254>,
}

impl fmt::Debug for ProvingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvingKey").field("shape", &self.shape).finish_non_exhaustive()
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey").field("shape", &self.shape).finish_non_exhaustive()
    }
}

impl ProvingKey {
    /// The verifying key matching this proving key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey { shape: self.shape.clone(), groth16: self.groth16.vk.clone() }
    }
}

/// Header bound into the transcript before the statement.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProofHeader {
    pub version: u16,
    pub circuit_digest: [u8; 32],
    pub num_public: u32,
}

impl ProofHeader {
    fn for_shape(shape: &CircuitShape) -> Self {
        Self { version: PROOF_VERSION, circuit_digest: shape.digest, num_public: shape.num_public as u32 }
    }
}

#[derive(Clone, Debug, PartialEq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PcdProof {
    pub header: ProofHeader,
    /// Transcript digest after absorbing the public inputs.
    pub statement_digest: [u8; 32],
    pub groth16: ark_groth16::Proof<Bn254>,
}

impl PcdProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_framed(PROOF_MAGIC, PROOF_VERSION, self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        decode_framed(PROOF_MAGIC, PROOF_VERSION, bytes)
    }
}

/// Transcript digest of a header followed by public inputs.
pub fn statement_digest(header: &ProofHeader, public_inputs: &[F]) -> [u8; 32] {
    let mut t = Transcript::new("photoproof.pcd");
    let mut hdr = Vec::new();
    header.serialize_compressed(&mut hdr).expect("serialize header");
    t.absorb_bytes_l(FsLabel::ProtocolHeader, &hdr);
    t.absorb_scalars_l(FsLabel::PublicInputs, public_inputs);
    t.digest()
}

// ---------------------------------------------------------------------------
// Groth16Backend
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
pub struct Groth16Backend;

/// Synthesize `circuit` over its witness and check it against `shape`.
/// Returns the public inputs it assigns.
fn evaluate(circuit: &dyn Circuit, shape: &CircuitShape) -> Result<Vec<F>, ProofGenerationError> {
    let cs = ConstraintSystem::<F>::new_ref();
    let assertions = circuit::synthesize(circuit, cs.clone())?;
    if cs.num_instance_variables() - 1 != shape.num_public
        || cs.num_witness_variables() != shape.num_secret
        || cs.num_constraints() != shape.num_constraints
    {
        return Err(ProofGenerationError::ShapeMismatch);
    }
    for a in &assertions {
        if !a.holds.value().map_err(CircuitError::from)? {
            return Err(ProofGenerationError::Unsatisfied { constraint: a.label });
        }
    }
    if !cs.is_satisfied().map_err(CircuitError::from)? {
        return Err(ProofGenerationError::Unsatisfied { constraint: WELL_FORMED });
    }
    let inner = cs.borrow().ok_or(CircuitError::Synthesis(SynthesisError::MissingCS))?;
    Ok(inner.instance_assignment[1..].to_vec())
}

impl ProofBackend for Groth16Backend {
    type ProvingKey = ProvingKey;
    type VerifyingKey = VerifyingKey;
    type Proof = PcdProof;

    fn compile(&self, circuit: &dyn Circuit) -> Result<CircuitShape, ProofGenerationError> {
        let shape = circuit::shape_of(circuit)?;
        debug!(
            num_public = shape.num_public,
            num_secret = shape.num_secret,
            num_constraints = shape.num_constraints,
            "compiled circuit"
        );
        Ok(shape)
    }

    fn setup<R: RngCore + CryptoRng>(
        &self,
        circuit: &dyn Circuit,
        rng: &mut R,
    ) -> Result<(ProvingKey, VerifyingKey), ProofGenerationError> {
        let shape = self.compile(circuit)?;
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(Synthesizer(circuit), rng)
            .map_err(CircuitError::from)?;
        Ok((ProvingKey { shape: shape.clone(), groth16: pk }, VerifyingKey { shape, groth16: vk }))
    }

    fn prove<R: RngCore + CryptoRng>(
        &self,
        pk: &ProvingKey,
        circuit: &dyn Circuit,
        rng: &mut R,
    ) -> Result<PcdProof, ProofGenerationError> {
        let public_inputs = evaluate(circuit, &pk.shape)?;
        let groth16 =
            Groth16::<Bn254>::prove(&pk.groth16, Synthesizer(circuit), rng).map_err(CircuitError::from)?;
        let header = ProofHeader::for_shape(&pk.shape);
        let statement_digest = statement_digest(&header, &public_inputs);
        Ok(PcdProof { header, statement_digest, groth16 })
    }

    fn verify(&self, vk: &VerifyingKey, proof: &PcdProof, public_inputs: &[F]) -> Result<(), ProofVerificationError> {
        if proof.header.version != PROOF_VERSION {
            return Err(ProofVerificationError::Version(proof.header.version));
        }
        if proof.header != ProofHeader::for_shape(&vk.shape) {
            return Err(ProofVerificationError::KeyMismatch);
        }
        if public_inputs.len() != vk.shape.num_public {
            return Err(PublicInputMismatchError::Count {
                expected: vk.shape.num_public,
                got: public_inputs.len(),
            }
            .into());
        }
        if statement_digest(&proof.header, public_inputs) != proof.statement_digest {
            return Err(PublicInputMismatchError::Digest.into());
        }
        match Groth16::<Bn254>::verify(&vk.groth16, public_inputs, &proof.groth16) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProofVerificationError::Rejected),
            Err(_) => Err(ProofVerificationError::MalformedKey),
        }
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// `magic ‖ u16_be(version) ‖ compressed(value)`.
pub fn encode_framed<T: CanonicalSerialize>(magic: &[u8; 8], version: u16, value: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + value.compressed_size());
    out.extend_from_slice(magic);
    out.extend_from_slice(&version.to_be_bytes());
    value.serialize_compressed(&mut out).expect("serialize into Vec");
    out
}

pub fn decode_framed<T: CanonicalDeserialize>(
    magic: &[u8; 8],
    version: u16,
    bytes: &[u8],
) -> Result<T, EncodingError> {
    decode_framed_with(magic, version, bytes, Validate::Yes)
}

/// [`decode_framed`] with explicit point validation. Skipping validation is
/// only for large local files whose consistency is checked another way.
pub fn decode_framed_with<T: CanonicalDeserialize>(
    magic: &[u8; 8],
    version: u16,
    bytes: &[u8],
    validate: Validate,
) -> Result<T, EncodingError> {
    if bytes.len() < 10 {
        return Err(EncodingError::Truncated);
    }
    let (head, mut payload) = bytes.split_at(10);
    if &head[..8] != magic {
        return Err(EncodingError::BadMagic { expected: String::from_utf8_lossy(magic).into_owned() });
    }
    let file_ver = u16::from_be_bytes([head[8], head[9]]);
    if file_ver != version {
        return Err(EncodingError::UnsupportedVersion(file_ver));
    }
    T::deserialize_with_mode(&mut payload, Compress::Yes, validate)
        .map_err(|e| EncodingError::Deserialize(e.to_string()))
}
