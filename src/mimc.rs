//! MiMC over BN254 (Miyaguchi–Preneel), plain implementation
//!
//! The image digest is a MiMC sponge over the BN254 scalar field: the message
//! is a byte stream of 32-byte **big-endian canonical** field encodings, each
//! block is parsed back into a field element, and blocks are folded as
//!
//! ```text
//! h_0 = 0
//! h_{i+1} = E_{h_i}(m_i) + h_i + m_i
//! E_k(x)  = (… ((x + k + c_0)^5 + k + c_1)^5 …)^5 + k      (MIMC_ROUNDS rounds)
//! ```
//!
//! The circuit twin lives in [`crate::circuit::mimc_hash`]
//! and must agree with this module bit-for-bit; both read their round
//! constants from [`round_constants`].

#![forbid(unsafe_code)]

use std::sync::OnceLock;

use ark_ff::{BigInteger, Field, PrimeField, Zero};

use crate::transcript::{FsLabel, Transcript};
use crate::F;

/// Number of rounds of the MiMC permutation (x^5 over BN254).
pub const MIMC_ROUNDS: usize = 110;

/// Width in bytes of one absorbed block (one field element, big-endian).
pub const BLOCK_SIZE: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MimcError {
    #[error("message length {0} is not a multiple of the 32-byte block size")]
    Unaligned(usize),
    #[error("block {0} is not a canonical field encoding")]
    NonCanonical(usize),
}

/// Round constants, derived once from a fixed seed.
pub fn round_constants() -> &'static [F] {
    static CONSTS: OnceLock<Vec<F>> = OnceLock::new();
    CONSTS.get_or_init(|| {
        let mut t = Transcript::new("mimc-bn254");
        t.absorb_bytes_l(FsLabel::RoundConstants, b"seed");
        t.challenge_points_l(FsLabel::RoundConstants, MIMC_ROUNDS)
    })
}

#[inline]
fn pow5(x: F) -> F {
    let x2 = x.square();
    x2.square() * x
}

/// The keyed MiMC permutation `E_k(x)`.
pub fn encrypt(key: F, msg: F) -> F {
    let mut x = msg;
    for c in round_constants() {
        x = pow5(x + key + c);
    }
    x + key
}

/// Miyaguchi–Preneel compression of one block into the chaining value.
#[inline]
pub fn compress(h: F, m: F) -> F {
    encrypt(h, m) + h + m
}

/// 32-byte big-endian canonical encoding of a field element.
pub fn field_to_be_bytes(f: &F) -> [u8; 32] {
    let v = f.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - v.len()..].copy_from_slice(&v);
    out
}

/// Parse a 32-byte big-endian encoding; `None` unless it is canonical (< p).
pub fn field_from_be_bytes(bytes: &[u8; 32]) -> Option<F> {
    let f = F::from_be_bytes_mod_order(bytes);
    (field_to_be_bytes(&f) == *bytes).then_some(f)
}

/// Streaming MiMC hasher over a byte message.
#[derive(Clone, Debug, Default)]
pub struct Mimc {
    data: Vec<u8>,
}

impl Mimc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw message bytes. Blocks are only parsed in [`Mimc::sum`].
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append one field element as its big-endian canonical encoding.
    pub fn write_field(&mut self, f: &F) {
        self.write(&field_to_be_bytes(f));
    }

    /// Fold all written blocks and return the chaining value.
    pub fn sum(&self) -> Result<F, MimcError> {
        if self.data.len() % BLOCK_SIZE != 0 {
            return Err(MimcError::Unaligned(self.data.len()));
        }
        let mut h = F::zero();
        for (i, chunk) in self.data.chunks_exact(BLOCK_SIZE).enumerate() {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            let m = field_from_be_bytes(&block).ok_or(MimcError::NonCanonical(i))?;
            h = compress(h, m);
        }
        Ok(h)
    }
}

/// Hash a sequence of field elements directly (no byte round-trip).
pub fn hash_elements(xs: &[F]) -> F {
    xs.iter().fold(F::zero(), |h, m| compress(h, *m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn byte_stream_matches_element_folding() {
        let mut rng = StdRng::seed_from_u64(7);
        let xs: Vec<F> = (0..9).map(|_| F::rand(&mut rng)).collect();
        let mut h = Mimc::new();
        for x in &xs {
            h.write_field(x);
        }
        assert_eq!(h.sum().unwrap(), hash_elements(&xs));
    }

    #[test]
    fn rejects_unaligned_and_non_canonical() {
        let mut h = Mimc::new();
        h.write(&[1u8; 31]);
        assert_eq!(h.sum(), Err(MimcError::Unaligned(31)));

        let mut h = Mimc::new();
        h.write_field(&F::from(3u64));
        h.write(&[0xffu8; 32]);
        assert_eq!(h.sum(), Err(MimcError::NonCanonical(1)));
    }

    #[test]
    fn encoding_roundtrips_and_is_big_endian() {
        let bytes = field_to_be_bytes(&F::from(0x0102u64));
        assert_eq!(&bytes[30..], &[0x01, 0x02]);
        assert!(bytes[..30].iter().all(|b| *b == 0));
        assert_eq!(field_from_be_bytes(&bytes), Some(F::from(0x0102u64)));
    }

    #[test]
    fn constants_are_stable() {
        assert_eq!(round_constants().len(), MIMC_ROUNDS);
        assert_eq!(round_constants(), round_constants());
        assert_ne!(hash_elements(&[F::from(1u64)]), hash_elements(&[F::from(2u64)]));
    }
}
