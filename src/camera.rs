//! Capturing device: signs fresh images and keeps every photograph it took.

#![forbid(unsafe_code)]

use rand::Rng;
use tracing::info;

use crate::identity::{Identity, PublicKey};
use crate::image::Image;
use crate::keys::PcdKeys;
use crate::photograph::{Photograph, Proof};
use crate::record::ProvenanceRecord;

#[derive(Debug)]
pub struct Camera {
    identity: Identity,
    keys: PcdKeys,
    roll: Vec<Photograph>,
}

impl Camera {
    pub fn new(identity: Identity, keys: PcdKeys) -> Self {
        Self { identity, keys, roll: Vec::new() }
    }

    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// The device identity, for handing to an editor of this camera's lineage.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sign `image` and return its genesis photograph.
    pub fn capture(&mut self, image: Image) -> Photograph {
        let (digest, signature) = self.identity.sign_image(&image);
        let record = ProvenanceRecord::genesis(image, self.identity.public_key(), signature);
        let photograph = Photograph::new(record, Proof { pcd_proof: None, signature }, &self.keys);
        info!(digest = %digest.short_hex(), roll = self.roll.len() + 1, "captured photograph");
        self.roll.push(photograph.clone());
        photograph
    }

    /// Capture a uniformly random image.
    pub fn capture_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Photograph {
        self.capture(Image::random(rng))
    }

    /// Every photograph captured so far, oldest first.
    pub fn roll(&self) -> &[Photograph] {
        &self.roll
    }
}
