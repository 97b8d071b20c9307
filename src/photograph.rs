//! Photograph state and its interchange layout
//!
//! A [`Photograph`] is a value: every successful edit yields a new one and the
//! previous one stays valid. Keys are held by `Arc` and shared by the whole
//! chain.
//!
//! The JSON interchange form ([`PhotographFile`]) carries:
//!
//! ```text
//! image:              [[r, g, b], [x, y]] × N²   (coordinates as u32)
//! public_key:         hex
//! original_signature: hex
//! original_hash:      hex (32-byte big-endian field encoding)
//! pcd_proof:          base64 of the framed proof, or null
//! current_signature:  hex
//! ```

#![forbid(unsafe_code)]

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::backend::{EncodingError, PcdProof, ProvingKey, VerifyingKey};
use crate::identity::{PublicKey, Signature};
use crate::image::{Digest, Image, ImageConstructionError, Pixel, PixelLocation};
use crate::keys::PcdKeys;
use crate::record::ProvenanceRecord;

#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("proof is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("proof: {0}")]
    Proof(#[from] EncodingError),
    #[error("image: {0}")]
    Image(#[from] ImageConstructionError),
}

/// Evidence attached to a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Proof {
    /// `None` until the first edit converts the bare signature.
    pub pcd_proof: Option<PcdProof>,
    /// Signature over the digest of the record's current image.
    pub signature: Signature,
}

#[derive(Clone, Debug)]
pub struct Photograph {
    pub record: ProvenanceRecord,
    pub proof: Proof,
    pub proving_key: Arc<ProvingKey>,
    /// Key the chain is proven under. Viewers never consult it; they check
    /// proofs against a verifying key they trust.
    pub verifying_key: Arc<VerifyingKey>,
}

impl Photograph {
    pub fn new(record: ProvenanceRecord, proof: Proof, keys: &PcdKeys) -> Self {
        Self {
            record,
            proof,
            proving_key: Arc::clone(&keys.proving),
            verifying_key: Arc::clone(&keys.verifying),
        }
    }

    pub fn keys(&self) -> PcdKeys {
        PcdKeys { proving: Arc::clone(&self.proving_key), verifying: Arc::clone(&self.verifying_key) }
    }

    /// Only a raw signature exists yet.
    pub fn is_genesis(&self) -> bool {
        self.proof.pcd_proof.is_none()
    }

    pub fn to_file(&self) -> PhotographFile {
        PhotographFile {
            image: self
                .record
                .image
                .pixels()
                .iter()
                .map(|p| (p.rgb, (p.loc.x as u32, p.loc.y as u32)))
                .collect(),
            public_key: self.record.public_key,
            original_signature: self.record.original_signature,
            original_hash: self.record.original_hash,
            pcd_proof: self
                .proof
                .pcd_proof
                .as_ref()
                .map(|p| base64::engine::general_purpose::STANDARD.encode(p.to_bytes())),
            current_signature: self.proof.signature,
        }
    }

    pub fn from_file(file: PhotographFile, keys: &PcdKeys) -> Result<Self, InterchangeError> {
        let pixels = file
            .image
            .into_iter()
            .map(|(rgb, (x, y))| Pixel { rgb, loc: PixelLocation::new(x as u64, y as u64) })
            .collect();
        let image = Image::from_pixels(pixels)?;
        let pcd_proof = match file.pcd_proof {
            Some(b64) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim())?;
                Some(PcdProof::from_bytes(&bytes)?)
            }
            None => None,
        };
        let record = ProvenanceRecord {
            image,
            public_key: file.public_key,
            original_signature: file.original_signature,
            original_hash: file.original_hash,
        };
        Ok(Self::new(record, Proof { pcd_proof, signature: file.current_signature }, keys))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_file()).expect("serialize photograph")
    }

    pub fn from_json(json: &str, keys: &PcdKeys) -> Result<Self, InterchangeError> {
        Self::from_file(serde_json::from_str(json)?, keys)
    }
}

/// `([r, g, b], (x, y))`.
pub type PixelEntry = ([u8; 3], (u32, u32));

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotographFile {
    pub image: Vec<PixelEntry>,
    pub public_key: PublicKey,
    pub original_signature: Signature,
    pub original_hash: Digest,
    pub pcd_proof: Option<String>,
    pub current_signature: Signature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::keys;
    use crate::N2;
    use rand::{rngs::StdRng, SeedableRng};

    fn genesis(keys: &PcdKeys) -> Photograph {
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(31));
        let img = Image::random(&mut StdRng::seed_from_u64(32));
        let (_, sig) = id.sign_image(&img);
        let record = ProvenanceRecord::genesis(img, id.public_key(), sig);
        Photograph::new(record, Proof { pcd_proof: None, signature: sig }, keys)
    }

    #[test]
    fn json_roundtrip_of_genesis_state() {
        let keys = keys::global_or_generate().unwrap();
        let p = genesis(&keys);
        let back = Photograph::from_json(&p.to_json(), &keys).unwrap();
        assert_eq!(back.record, p.record);
        assert_eq!(back.proof, p.proof);
        assert!(back.is_genesis());
        assert!(Arc::ptr_eq(&back.verifying_key, &keys.verifying));
    }

    #[test]
    fn layout_field_names_and_coordinate_width() {
        let keys = keys::global_or_generate().unwrap();
        let value: serde_json::Value = serde_json::from_str(&genesis(&keys).to_json()).unwrap();
        for field in ["image", "public_key", "original_signature", "original_hash", "pcd_proof", "current_signature"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["image"].as_array().unwrap().len(), N2);
        assert_eq!(value["image"][6][1], serde_json::json!([1, 1]));
        assert!(value["pcd_proof"].is_null());
    }

    #[test]
    fn misplaced_pixel_is_rejected() {
        let keys = keys::global_or_generate().unwrap();
        let mut file = genesis(&keys).to_file();
        file.image.swap(0, 1);
        assert!(matches!(Photograph::from_file(file, &keys), Err(InterchangeError::Image(_))));
    }

    #[test]
    fn garbage_proof_is_rejected() {
        let keys = keys::global_or_generate().unwrap();
        let mut file = genesis(&keys).to_file();
        file.pcd_proof = Some("!!!".into());
        assert!(matches!(Photograph::from_file(file.clone(), &keys), Err(InterchangeError::Base64(_))));
        file.pcd_proof = Some(base64::engine::general_purpose::STANDARD.encode(b"0123456789abc"));
        assert!(matches!(Photograph::from_file(file, &keys), Err(InterchangeError::Proof(_))));
    }
}
