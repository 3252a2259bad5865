//! Texture images and filtering.
//!
//! A texture is either a floating-point (HDR, linear) image or a
//! byte-encoded (LDR, sRGB) image; the tagged variant guarantees exactly one
//! representation is populated. Sampling supports bilinear or nearest
//! filtering, tiling or clamp-to-edge addressing, and optional sRGB decode
//! for LDR texels.

use glam::{Vec2, Vec4};
use thiserror::Error;

/// Errors raised when constructing textures.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture data has {actual} texels, expected {expected} ({width}x{height})")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("texture dimensions are zero")]
    ZeroSize,
}

/// Texel storage: exactly one representation per texture.
#[derive(Clone, Debug)]
pub enum TexelData {
    /// Linear floating-point RGBA.
    Hdr(Vec<Vec4>),
    /// sRGB-encoded 8-bit RGBA.
    Ldr(Vec<[u8; 4]>),
}

/// A 2D image usable as a material or environment map.
#[derive(Clone, Debug)]
pub struct Texture {
    width: usize,
    height: usize,
    data: TexelData,
}

impl Texture {
    /// Create an HDR texture from linear RGBA texels in row-major order.
    pub fn new_hdr(width: usize, height: usize, texels: Vec<Vec4>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize);
        }
        if texels.len() != width * height {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected: width * height,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: TexelData::Hdr(texels),
        })
    }

    /// Create an LDR texture from sRGB-encoded RGBA bytes in row-major order.
    pub fn new_ldr(
        width: usize,
        height: usize,
        texels: Vec<[u8; 4]>,
    ) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize);
        }
        if texels.len() != width * height {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected: width * height,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: TexelData::Ldr(texels),
        })
    }

    /// Create a 1x1 constant-color HDR texture.
    pub fn solid(color: Vec4) -> Self {
        Self {
            width: 1,
            height: 1,
            data: TexelData::Hdr(vec![color]),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &TexelData {
        &self.data
    }

    /// Fetch one texel as linear RGBA.
    ///
    /// LDR texels are converted byte to float and sRGB-decoded unless
    /// `ldr_as_linear` is set (alpha is always linear).
    pub fn lookup(&self, i: usize, j: usize, ldr_as_linear: bool) -> Vec4 {
        let idx = j * self.width + i;
        match &self.data {
            TexelData::Hdr(texels) => texels[idx],
            TexelData::Ldr(texels) => {
                let rgba = byte_to_float(texels[idx]);
                if ldr_as_linear {
                    rgba
                } else {
                    Vec4::new(
                        srgb_to_linear(rgba.x),
                        srgb_to_linear(rgba.y),
                        srgb_to_linear(rgba.z),
                        rgba.w,
                    )
                }
            }
        }
    }

    /// Sample the texture at a UV coordinate.
    ///
    /// Addressing tiles by default; `clamp_to_edge` clamps UVs to [0, 1].
    /// Filtering is bilinear unless `no_interpolation` selects nearest.
    pub fn sample(
        &self,
        uv: Vec2,
        ldr_as_linear: bool,
        no_interpolation: bool,
        clamp_to_edge: bool,
    ) -> Vec4 {
        let width = self.width as f32;
        let height = self.height as f32;

        // normalized coordinates, tiled or clamped
        let (s, t) = if clamp_to_edge {
            (
                uv.x.clamp(0.0, 1.0) * width,
                uv.y.clamp(0.0, 1.0) * height,
            )
        } else {
            let mut s = (uv.x % 1.0) * width;
            if s < 0.0 {
                s += width;
            }
            let mut t = (uv.y % 1.0) * height;
            if t < 0.0 {
                t += height;
            }
            (s, t)
        };

        // texel coordinates and residuals
        let i = (s as usize).min(self.width - 1);
        let j = (t as usize).min(self.height - 1);
        let ii = (i + 1) % self.width;
        let jj = (j + 1) % self.height;
        let u = s - i as f32;
        let v = t - j as f32;

        if no_interpolation {
            return self.lookup(i, j, ldr_as_linear);
        }

        self.lookup(i, j, ldr_as_linear) * (1.0 - u) * (1.0 - v)
            + self.lookup(i, jj, ldr_as_linear) * (1.0 - u) * v
            + self.lookup(ii, j, ldr_as_linear) * u * (1.0 - v)
            + self.lookup(ii, jj, ldr_as_linear) * u * v
    }
}

/// Convert an 8-bit RGBA texel to floats in [0, 1].
#[inline]
fn byte_to_float(texel: [u8; 4]) -> Vec4 {
    Vec4::new(
        texel[0] as f32 / 255.0,
        texel[1] as f32 / 255.0,
        texel[2] as f32 / 255.0,
        texel[3] as f32 / 255.0,
    )
}

/// Convert an sRGB-encoded channel to linear.
#[inline]
pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}
