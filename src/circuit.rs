//! R1CS circuits over BN254
//!
//! Circuits in this crate are written once, against an arkworks
//! [`ConstraintSystemRef`], and the same `define` code serves three purposes:
//!
//! - **compile**: synthesize in setup mode to obtain the fixed
//!   [`CircuitShape`] (public/secret counts, constraint count, and a digest of
//!   the constraint matrices);
//! - **prove**: synthesize over the real witness; each top-level
//!   [`Assertion`] is reported by label when it does not hold, before any
//!   proving work starts;
//! - **public-input reconstruction**: synthesize only the public allocations
//!   so a verifier rebuilds the exact vector the prover bound.
//!
//! [`Synthesizer`] adapts any [`Circuit`] to `ConstraintSynthesizer`, which is
//! what the Groth16 backend consumes.

#![forbid(unsafe_code)]

use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, OptimizationGoal,
    SynthesisError, SynthesisMode,
};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use blake3::Hasher;

use crate::mimc;
use crate::F;

#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    #[error("selector has {got} flags but the catalog has {expected} entries")]
    SelectorWidth { expected: usize, got: usize },
    #[error("{0} is not a valid curve encoding")]
    Malformed(&'static str),
    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Witness-independent description of a compiled circuit.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct CircuitShape {
    pub num_public: usize,
    pub num_secret: usize,
    pub num_constraints: usize,
    /// BLAKE3 digest over the A/B/C matrices and counts.
    pub digest: [u8; 32],
}

/// A named boolean the circuit requires to be true.
#[derive(Clone, Debug)]
pub struct Assertion {
    pub label: &'static str,
    pub holds: Boolean<F>,
}

impl Assertion {
    pub fn new(label: &'static str, holds: Boolean<F>) -> Self {
        Self { label, holds }
    }
}

/// A relation that can lay itself out in a constraint system.
///
/// `define` allocates and wires everything, and returns the top-level
/// assertions unenforced; [`synthesize`] enforces them.
pub trait Circuit {
    fn define(&self, cs: ConstraintSystemRef<F>) -> Result<Vec<Assertion>, CircuitError>;
}

/// Define `circuit` in `cs` and enforce each of its assertions.
pub fn synthesize<C: Circuit + ?Sized>(
    circuit: &C,
    cs: ConstraintSystemRef<F>,
) -> Result<Vec<Assertion>, CircuitError> {
    let assertions = circuit.define(cs)?;
    for a in &assertions {
        a.holds.enforce_equal(&Boolean::TRUE)?;
    }
    Ok(assertions)
}

/// `ConstraintSynthesizer` view of a [`Circuit`].
pub struct Synthesizer<'a, C: ?Sized>(pub &'a C);

impl<C: Circuit + ?Sized> ConstraintSynthesizer<F> for Synthesizer<'_, C> {
    fn generate_constraints(self, cs: ConstraintSystemRef<F>) -> Result<(), SynthesisError> {
        match synthesize(self.0, cs) {
            Ok(_) => Ok(()),
            Err(CircuitError::Synthesis(e)) => Err(e),
            Err(_) => Err(SynthesisError::Unsatisfiable),
        }
    }
}

/// Compile `circuit` to its shape. Only the layout is synthesized.
pub fn shape_of<C: Circuit + ?Sized>(circuit: &C) -> Result<CircuitShape, CircuitError> {
    shape_in_mode(circuit, SynthesisMode::Setup)
}

pub(crate) fn shape_in_mode<C: Circuit + ?Sized>(
    circuit: &C,
    mode: SynthesisMode,
) -> Result<CircuitShape, CircuitError> {
    let cs = ConstraintSystem::<F>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(mode);
    synthesize(circuit, cs.clone())?;
    cs.finalize();
    let matrices = cs.to_matrices().ok_or(SynthesisError::MissingCS)?;

    let mut h = Hasher::new();
    h.update(b"PHOTOPROOF.layout.v2");
    for m in [&matrices.a, &matrices.b, &matrices.c] {
        absorb_matrix(&mut h, m);
    }
    h.update(b"counts:");
    h.update(&(matrices.num_instance_variables as u64).to_be_bytes());
    h.update(&(matrices.num_witness_variables as u64).to_be_bytes());
    h.update(&(matrices.num_constraints as u64).to_be_bytes());

    Ok(CircuitShape {
        // The constant `one` occupies instance slot 0.
        num_public: matrices.num_instance_variables - 1,
        num_secret: matrices.num_witness_variables,
        num_constraints: matrices.num_constraints,
        digest: *h.finalize().as_bytes(),
    })
}

fn absorb_matrix(h: &mut Hasher, m: &[Vec<(F, usize)>]) {
    h.update(&(m.len() as u64).to_be_bytes());
    for row in m {
        h.update(&(row.len() as u64).to_be_bytes());
        for (coeff, index) in row {
            h.update(&coeff.into_bigint().to_bytes_be());
            h.update(&(*index as u64).to_be_bytes());
        }
    }
}

/// In-circuit MiMC over already-allocated field wires. Mirrors
/// [`mimc::hash_elements`] and [`mimc::Mimc::sum`] exactly.
pub fn mimc_hash(inputs: &[FpVar<F>]) -> Result<FpVar<F>, SynthesisError> {
    let mut h = FpVar::<F>::zero();
    for m in inputs {
        h = mimc_compress(&h, m)?;
    }
    Ok(h)
}

fn mimc_compress(h: &FpVar<F>, m: &FpVar<F>) -> Result<FpVar<F>, SynthesisError> {
    let mut x = m.clone();
    for c in mimc::round_constants() {
        let t = &x + h + *c;
        x = t.square()?.square()? * &t;
    }
    Ok(x + h + h + m)
}
