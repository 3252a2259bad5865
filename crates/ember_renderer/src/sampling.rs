//! Random draws and direction sampling.
//!
//! The renderer threads one PCG32 generator per pixel through the whole
//! recursive shading call chain; these helpers are the only way samples are
//! drawn from it, so results are reproducible for a given seed regardless of
//! pixel scheduling.

use ember_math::{basis_fromz, Vec2, Vec3};
use rand::RngCore;

/// Uniform float in [0, 1).
///
/// Bit trick: the mantissa of a float in [1, 2) is filled with random bits,
/// then 1 is subtracted.
#[inline]
pub fn rand1f(rng: &mut dyn RngCore) -> f32 {
    f32::from_bits(0x3f80_0000 | (rng.next_u32() >> 9)) - 1.0
}

/// Two uniform floats in [0, 1).
#[inline]
pub fn rand2f(rng: &mut dyn RngCore) -> Vec2 {
    let x = rand1f(rng);
    let y = rand1f(rng);
    Vec2::new(x, y)
}

/// Uniform integer in [0, n).
#[inline]
pub fn rand1i(rng: &mut dyn RngCore, n: u32) -> u32 {
    rng.next_u32() % n
}

/// Uniform direction on the hemisphere around `normal` (pdf 1 / 2pi).
pub fn sample_hemisphere(normal: Vec3, ruv: Vec2) -> Vec3 {
    use std::f32::consts::PI;

    let z = ruv.y;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * ruv.x;
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), z);
    basis_fromz(normal) * local
}
