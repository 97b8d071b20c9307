//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! `photoproof` implements proof-carrying-data provenance for photographs. A
//! camera signs a freshly captured image; every later edit carries a proof
//! that it applied a permitted transformation to a previously attested image,
//! without disclosing that earlier image. A viewer checks the final
//! photograph with nothing but the photograph and a verifying key it trusts.
//!
//! ## Invariants
//!
//! - **Field.** All circuit values live in `ark_bn254::Fr` (`F` in this
//!   crate). Image digests are MiMC over the same field, and the plain and
//!   in-circuit digests agree bit for bit.
//!
//! - **Proofs.** Each edit is a Groth16 proof over BN254 for the compliance
//!   predicate. Signatures are EdDSA over the embedded Baby Jubjub curve with
//!   a MiMC challenge, so the predicate checks them natively.
//!
//! - **Trusted key.** Viewers are built around a verifying key and never use
//!   the one a photograph carries.
//!
//! - **Anchors.** Across any number of edits a record's `public_key` and
//!   `original_hash` never change; the compliance predicate enforces both on
//!   every chained step.
//!
//! - **One circuit.** Genesis conversion and chained edits are two branches of
//!   one fixed predicate. Both branches are always evaluated, so the compiled
//!   shape (and therefore the key pair) is independent of the witness.
//!
//! - **Values, not state.** `edit` and `view` take photographs by reference
//!   and return new values; key material is shared read-only via `Arc`.
//!
//! ## Roles
//!
//! ```no_run
//! use photoproof::{keys, Camera, Editor, Image, Transformation, TransformationParameters, Viewer};
//!
//! let keys = keys::global_or_generate()?;
//! let viewer = Viewer::new(keys.verifying.clone());
//! let mut camera = Camera::new(photoproof::Identity::generate(), keys);
//! let editor = Editor::new(camera.identity().clone());
//!
//! let p0 = camera.capture(Image::white());
//! let p1 = editor.edit(&p0, Transformation::Identity, &TransformationParameters::Identity)?;
//! assert!(viewer.view(&p1)?.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Fiat–Shamir style transcript (domain-separated hashing, hash→field).
pub mod transcript;
/// MiMC-BN254 digest function.
pub mod mimc;
/// R1CS circuit seam, layout digests, and the MiMC gadget.
pub mod circuit;
/// Pixels, images, and image digests.
pub mod image;
/// Circuit twin of the image model.
pub mod image_var;
/// Signing identities and the in-circuit signature gadget.
pub mod identity;
/// Provenance record `Z`.
pub mod record;
/// Closed catalog of admissible transformations.
pub mod transformation;
/// The two-case compliance predicate.
pub mod predicate;
/// Proof backend seam and the Groth16 backend.
pub mod backend;
/// Key generation, global key slot, key files.
pub mod keys;
/// Photograph state and JSON interchange.
pub mod photograph;
/// Edit engine.
pub mod prover;
/// View engine.
pub mod verifier;
/// Blocking-pool offload of edits and views.
pub mod scheduler;
/// Capture role.
pub mod camera;
/// Edit role.
pub mod editor;
/// View role.
pub mod viewer;
/// Environment configuration and tracing setup.
pub mod config;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Scalar field used across the crate.
pub type F = ark_bn254::Fr;

/// Grid side length.
pub const N: usize = 5;

/// Pixels per image.
pub const N2: usize = N * N;

pub use camera::Camera;
pub use editor::Editor;
pub use viewer::Viewer;

pub use identity::{Identity, PublicKey, Signature, SigningError};
pub use image::{Digest, Image, ImageConstructionError, Pixel, PixelLocation};
pub use photograph::{Photograph, Proof};
pub use record::ProvenanceRecord;
pub use transformation::{Transformation, TransformationError, TransformationParameters};

pub use backend::{Groth16Backend, ProofGenerationError, ProofVerificationError, PublicInputMismatchError};
pub use prover::{EditError, Prover};
pub use verifier::{Rejection, Verdict, Verifier, ViewError};
