//! Image model: pixels on a fixed `N × N` grid and their digest
//!
//! An [`Image`] is immutable once constructed: every constructor validates
//! that it holds exactly `N²` pixels and that pixel `i` sits at
//! `(i mod N, i div N)`, so row-major order and location always agree.
//!
//! The digest absorbs, per pixel in row-major order, `r, g, b, x, y`, each as
//! a 32-byte big-endian field encoding, into the MiMC hasher of
//! [`crate::mimc`]. The in-circuit twin in [`crate::image_var`] computes the
//! same value over circuit wires.

#![forbid(unsafe_code)]

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::mimc::{self, Mimc};
use crate::{F, N, N2};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageConstructionError {
    #[error("image must hold {expected} pixels, got {got}")]
    PixelCount { expected: usize, got: usize },
    #[error("pixel {index} claims location ({x}, {y}), outside the grid")]
    OutOfBounds { index: usize, x: u64, y: u64 },
    #[error("pixel {index} claims location ({x}, {y}) but row-major order places it elsewhere")]
    Misplaced { index: usize, x: u64, y: u64 },
}

/// Position of a pixel on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelLocation {
    pub x: u64,
    pub y: u64,
}

impl PixelLocation {
    pub fn new(x: u64, y: u64) -> Self {
        Self { x, y }
    }

    /// Location of the pixel stored at row-major index `i`.
    pub fn from_index(i: usize) -> Self {
        Self { x: (i % N) as u64, y: (i / N) as u64 }
    }

    /// `y·N + x`.
    #[inline]
    pub fn to_1d_index(&self) -> u64 {
        self.y * N as u64 + self.x
    }

    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.x < N as u64 && self.y < N as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub rgb: [u8; 3],
    pub loc: PixelLocation,
}

/// A fixed-size `N × N` image in row-major order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Image {
    pixels: Box<[Pixel]>,
}

impl Image {
    /// Validate and wrap a row-major pixel vector.
    pub fn from_pixels(pixels: Vec<Pixel>) -> Result<Self, ImageConstructionError> {
        if pixels.len() != N2 {
            return Err(ImageConstructionError::PixelCount { expected: N2, got: pixels.len() });
        }
        for (index, px) in pixels.iter().enumerate() {
            let PixelLocation { x, y } = px.loc;
            if !px.loc.in_bounds() {
                return Err(ImageConstructionError::OutOfBounds { index, x, y });
            }
            if px.loc.to_1d_index() != index as u64 {
                return Err(ImageConstructionError::Misplaced { index, x, y });
            }
        }
        Ok(Self { pixels: pixels.into_boxed_slice() })
    }

    /// Build an image by asking `f` for the colour at every location.
    pub fn from_fn(mut f: impl FnMut(PixelLocation) -> [u8; 3]) -> Self {
        let pixels = (0..N2)
            .map(|i| {
                let loc = PixelLocation::from_index(i);
                Pixel { rgb: f(loc), loc }
            })
            .collect::<Vec<_>>();
        Self { pixels: pixels.into_boxed_slice() }
    }

    pub fn filled(rgb: [u8; 3]) -> Self {
        Self::from_fn(|_| rgb)
    }

    pub fn black() -> Self {
        Self::filled([0, 0, 0])
    }

    pub fn white() -> Self {
        Self::filled([255, 255, 255])
    }

    /// Uniformly random colours.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_fn(|_| [rng.gen(), rng.gen(), rng.gen()])
    }

    #[inline]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixel(&self, loc: PixelLocation) -> Option<&Pixel> {
        if !loc.in_bounds() {
            return None;
        }
        self.pixels.get(loc.to_1d_index() as usize)
    }

    /// A new image equal to `self` except for one pixel's colour.
    pub fn with_pixel(&self, loc: PixelLocation, rgb: [u8; 3]) -> Result<Self, ImageConstructionError> {
        if !loc.in_bounds() {
            return Err(ImageConstructionError::OutOfBounds {
                index: loc.to_1d_index() as usize,
                x: loc.x,
                y: loc.y,
            });
        }
        let mut pixels = self.pixels.to_vec();
        pixels[loc.to_1d_index() as usize].rgb = rgb;
        Ok(Self { pixels: pixels.into_boxed_slice() })
    }

    /// The five field values absorbed per pixel, in digest order.
    pub fn field_elements(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(N2 * 5);
        for px in self.pixels.iter() {
            out.push(F::from(px.rgb[0] as u64));
            out.push(F::from(px.rgb[1] as u64));
            out.push(F::from(px.rgb[2] as u64));
            out.push(F::from(px.loc.x));
            out.push(F::from(px.loc.y));
        }
        out
    }

    /// MiMC digest over the big-endian encodings of `(r, g, b, x, y)` per pixel.
    pub fn digest(&self) -> Digest {
        let mut h = Mimc::new();
        for f in self.field_elements() {
            h.write_field(&f);
        }
        // Every block is the canonical encoding of a small integer.
        Digest(h.sum().expect("pixel encodings are canonical blocks"))
    }

    /// Row-wise `(r,g,b)` listing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.pixels.chunks(N) {
            let cells: Vec<String> =
                row.iter().map(|p| format!("({},{},{})", p.rgb[0], p.rgb[1], p.rgb[2])).collect();
            out.push('[');
            out.push_str(&cells.join(", "));
            out.push_str("]\n");
        }
        out
    }
}

// Pixel content never appears in Debug output.
impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({}x{}, digest {})", N, N, self.digest().short_hex())
    }
}

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// Image digest: one BN254 scalar.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub F);

impl Digest {
    /// 32-byte big-endian canonical encoding; this is what gets signed.
    pub fn to_bytes(&self) -> [u8; 32] {
        mimc::field_to_be_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        mimc::field_from_be_bytes(&arr).map(Digest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim()).ok()?;
        Self::from_bytes(&bytes)
    }

    /// First 8 hex characters, for log lines.
    pub fn short_hex(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(8);
        s
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}…)", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("digest must be 32-byte canonical hex"))
    }
}
