//! Proving/verifying key material
//!
//! Keys are produced once per compiled predicate ([`generate`]) and then
//! shared read-only by every photograph of every chain through [`PcdKeys`].
//! A process may install one key pair in a global slot ([`install_global`]);
//! the slot is init-once, so keys can never be swapped mid-lifetime.
//!
//! # File format
//!
//! `pcd.pk` and `pcd.vk` hold `magic ‖ u16_be(version) ‖ compressed(key)`.
//! Loading validates magic, version, that the proving and verifying halves
//! belong together, and that they match the predicate compiled by this build.
//! Points in the (large) proving key are decoded without subgroup checks; the
//! halves-belong-together check covers the verifying part it embeds.
//! `identity.key` holds a device's identity seed in the same framing.

#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::{Arc, OnceLock};

use ark_serialize::Validate;
use rand::{CryptoRng, RngCore};
use tracing::info;

use crate::backend::{
    decode_framed, decode_framed_with, encode_framed, EncodingError, Groth16Backend, ProofBackend,
    ProofGenerationError, ProvingKey, VerifyingKey,
};
use crate::identity::Identity;
use crate::predicate::CompliancePredicateWitness;

pub const PK_MAGIC: &[u8; 8] = b"PPPKEY\0\0";
pub const VK_MAGIC: &[u8; 8] = b"PPVKEY\0\0";
pub const ID_MAGIC: &[u8; 8] = b"PPIDKEY\0";
pub const KEY_FILE_VERSION: u16 = 2;

pub const PK_FILE: &str = "pcd.pk";
pub const VK_FILE: &str = "pcd.vk";
pub const IDENTITY_FILE: &str = "identity.key";

#[derive(Debug, thiserror::Error)]
pub enum KeyIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key file {file}: {source}")]
    Encoding { file: &'static str, source: EncodingError },
    #[error("proving and verifying keys do not belong together")]
    Mismatched,
    #[error("keys were generated for a different predicate")]
    Stale,
    #[error("global keys are already installed")]
    AlreadyInstalled,
    #[error("global keys have not been installed")]
    NotInstalled,
    #[error(transparent)]
    Generation(#[from] ProofGenerationError),
}

/// The key pair of one compiled predicate.
#[derive(Clone, Debug)]
pub struct PcdKeys {
    pub proving: Arc<ProvingKey>,
    pub verifying: Arc<VerifyingKey>,
}

impl PcdKeys {
    fn from_parts(proving: ProvingKey, verifying: VerifyingKey) -> Result<Self, KeyIoError> {
        if proving.verifying_key() != verifying {
            return Err(KeyIoError::Mismatched);
        }
        Ok(Self { proving: Arc::new(proving), verifying: Arc::new(verifying) })
    }
}

/// Compile the predicate and run Groth16 setup for it.
pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Result<PcdKeys, KeyIoError> {
    let (pk, vk) = Groth16Backend.setup(&CompliancePredicateWitness::placeholder(), rng)?;
    let shape = &vk.shape;
    info!(
        num_public = shape.num_public,
        num_constraints = shape.num_constraints,
        circuit = %hex::encode(&shape.digest[..8]),
        "generated PCD keys"
    );
    PcdKeys::from_parts(pk, vk)
}

pub fn generate() -> Result<PcdKeys, KeyIoError> {
    generate_with(&mut rand::rngs::OsRng)
}

// ------------------------------ Global slot ------------------------------

fn slot() -> &'static OnceLock<PcdKeys> {
    static KEYS: OnceLock<PcdKeys> = OnceLock::new();
    &KEYS
}

/// Install the process-wide key pair. Fails if one is already installed.
pub fn install_global(keys: PcdKeys) -> Result<PcdKeys, KeyIoError> {
    slot().set(keys).map_err(|_| KeyIoError::AlreadyInstalled)?;
    global()
}

/// The installed key pair.
pub fn global() -> Result<PcdKeys, KeyIoError> {
    slot().get().cloned().ok_or(KeyIoError::NotInstalled)
}

/// The installed key pair, generating and installing one on first use.
pub fn global_or_generate() -> Result<PcdKeys, KeyIoError> {
    if let Some(keys) = slot().get() {
        return Ok(keys.clone());
    }
    let fresh = generate()?;
    // Another thread may have won the race; either way the slot is now set.
    let _ = slot().set(fresh);
    global()
}

// ------------------------------ File I/O ------------------------------

/// Write `pcd.pk` and `pcd.vk` into `dir`, creating it if needed.
pub fn save(dir: impl AsRef<Path>, keys: &PcdKeys) -> Result<(), KeyIoError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(PK_FILE), encode_framed(PK_MAGIC, KEY_FILE_VERSION, keys.proving.as_ref()))?;
    std::fs::write(dir.join(VK_FILE), encode_framed(VK_MAGIC, KEY_FILE_VERSION, keys.verifying.as_ref()))?;
    Ok(())
}

/// Load and validate both halves from `dir`.
pub fn load(dir: impl AsRef<Path>) -> Result<PcdKeys, KeyIoError> {
    let dir = dir.as_ref();
    let bytes = std::fs::read(dir.join(PK_FILE))?;
    let proving: ProvingKey = decode_framed_with(PK_MAGIC, KEY_FILE_VERSION, &bytes, Validate::No)
        .map_err(|source| KeyIoError::Encoding { file: PK_FILE, source })?;
    let verifying = load_verifying(dir)?;
    let keys = PcdKeys::from_parts(proving, verifying)?;
    check_current(&keys.verifying)?;
    Ok(keys)
}

/// Load only `pcd.vk`, for parties that never prove.
pub fn load_verifying(dir: impl AsRef<Path>) -> Result<VerifyingKey, KeyIoError> {
    let bytes = std::fs::read(dir.as_ref().join(VK_FILE))?;
    let vk: VerifyingKey = decode_framed(VK_MAGIC, KEY_FILE_VERSION, &bytes)
        .map_err(|source| KeyIoError::Encoding { file: VK_FILE, source })?;
    check_current(&vk)?;
    Ok(vk)
}

/// Write a signing identity to `path`. The file holds secret material.
pub fn save_identity(path: impl AsRef<Path>, identity: &Identity) -> Result<(), KeyIoError> {
    std::fs::write(path, encode_framed(ID_MAGIC, KEY_FILE_VERSION, &identity.to_seed()))?;
    Ok(())
}

pub fn load_identity(path: impl AsRef<Path>) -> Result<Identity, KeyIoError> {
    let seed: [u8; 32] = decode_framed(ID_MAGIC, KEY_FILE_VERSION, &std::fs::read(path)?)
        .map_err(|source| KeyIoError::Encoding { file: IDENTITY_FILE, source })?;
    Ok(Identity::from_seed(&seed))
}

fn check_current(vk: &VerifyingKey) -> Result<(), KeyIoError> {
    let shape = Groth16Backend.compile(&CompliancePredicateWitness::placeholder())?;
    if vk.shape != shape {
        return Err(KeyIoError::Stale);
    }
    Ok(())
}

/// A second key pair for the same predicate, independent of the global one.
#[cfg(test)]
pub(crate) fn independent_keys() -> PcdKeys {
    static KEYS: OnceLock<PcdKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        use rand::SeedableRng;
        generate_with(&mut rand::rngs::StdRng::seed_from_u64(0x5eed)).unwrap()
    })
    .clone()
}
