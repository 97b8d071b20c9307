//! Circuit twin of the image model.
//!
//! [`ImageVar::alloc`] is the lossless `to_circuit_representation` mapping:
//! every channel and coordinate becomes one field wire, in the same row-major
//! `(r, g, b, x, y)` order the plain digest absorbs. [`ImageVar::digest`] must
//! agree with [`Image::digest`] on every image.

#![forbid(unsafe_code)]

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::circuit::mimc_hash;
use crate::image::Image;
use crate::{F, N};

#[derive(Clone, Debug)]
pub struct PixelLocationVar {
    pub x: FpVar<F>,
    pub y: FpVar<F>,
}

impl PixelLocationVar {
    /// `y·N + x` as a linear combination.
    pub fn to_1d_index(&self) -> FpVar<F> {
        &self.y * F::from(N as u64) + &self.x
    }
}

#[derive(Clone, Debug)]
pub struct PixelVar {
    pub rgb: [FpVar<F>; 3],
    pub loc: PixelLocationVar,
}

#[derive(Clone, Debug)]
pub struct ImageVar {
    pub pixels: Vec<PixelVar>,
}

impl ImageVar {
    /// Allocate every pixel component with the given mode.
    pub fn alloc(
        cs: &ConstraintSystemRef<F>,
        mode: AllocationMode,
        image: &Image,
    ) -> Result<Self, SynthesisError> {
        let wire = |v: u64| FpVar::new_variable(cs.clone(), || Ok(F::from(v)), mode);
        let pixels = image
            .pixels()
            .iter()
            .map(|px| {
                Ok(PixelVar {
                    rgb: [
                        wire(px.rgb[0] as u64)?,
                        wire(px.rgb[1] as u64)?,
                        wire(px.rgb[2] as u64)?,
                    ],
                    loc: PixelLocationVar { x: wire(px.loc.x)?, y: wire(px.loc.y)? },
                })
            })
            .collect::<Result<Vec<_>, SynthesisError>>()?;
        Ok(Self { pixels })
    }

    /// Flattened wires in digest order.
    pub fn wires(&self) -> Vec<FpVar<F>> {
        let mut out = Vec::with_capacity(self.pixels.len() * 5);
        for px in &self.pixels {
            out.extend_from_slice(&px.rgb);
            out.push(px.loc.x.clone());
            out.push(px.loc.y.clone());
        }
        out
    }

    /// In-circuit MiMC digest.
    pub fn digest(&self) -> Result<FpVar<F>, SynthesisError> {
        mimc_hash(&self.wires())
    }

    /// Boolean wire: every pixel sits at its row-major position.
    pub fn positions_ok(&self) -> Result<Boolean<F>, SynthesisError> {
        let checks = self
            .pixels
            .iter()
            .enumerate()
            .map(|(i, px)| px.loc.to_1d_index().is_eq(&FpVar::constant(F::from(i as u64))))
            .collect::<Result<Vec<_>, _>>()?;
        Boolean::kary_and(&checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Digest, PixelLocation};
    use crate::N2;
    use ark_relations::r1cs::{ConstraintSystem, SynthesisMode};
    use rand::{rngs::StdRng, SeedableRng};

    /// Digest of `image` computed through its circuit representation.
    fn circuit_digest(image: &Image) -> Digest {
        let cs = ConstraintSystem::<F>::new_ref();
        cs.set_mode(SynthesisMode::Prove { construct_matrices: false });
        let var = ImageVar::alloc(&cs, AllocationMode::Witness, image).unwrap();
        Digest(var.digest().unwrap().value().unwrap())
    }

    #[test]
    fn plain_and_circuit_digests_agree_on_random_images() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..1000 {
            let img = Image::random(&mut rng);
            assert_eq!(img.digest(), circuit_digest(&img));
        }
    }

    #[test]
    fn plain_and_circuit_digests_agree_on_fills() {
        for img in [Image::black(), Image::white(), Image::filled([1, 2, 3])] {
            assert_eq!(img.digest(), circuit_digest(&img));
        }
    }

    #[test]
    fn representation_is_lossless() {
        let img = Image::from_fn(|loc| [loc.x as u8, loc.y as u8, 7]);
        let cs = ConstraintSystem::<F>::new_ref();
        let var = ImageVar::alloc(&cs, AllocationMode::Input, &img).unwrap();
        assert_eq!(var.pixels.len(), N2);
        let publics = cs.borrow().unwrap().instance_assignment[1..].to_vec();
        assert_eq!(publics, img.field_elements());
        let px = &var.pixels[PixelLocation::new(2, 3).to_1d_index() as usize];
        assert_eq!(px.rgb[0].value().unwrap(), F::from(2u64));
        assert_eq!(px.loc.y.value().unwrap(), F::from(3u64));
        assert!(var.positions_ok().unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }
}
