// Transform utilities for Mat4 and direction math shared by the renderer.
//
// glam::Mat4 already provides transform_point3() / transform_vector3() /
// inverse(); the extension trait adds the ray-tracing specific pieces.

use crate::{Aabb, Mat3, Mat4, Ray, Vec3};

/// Extension trait for Mat4 with ray-tracing transform utilities.
pub trait Mat4Ext {
    /// Transform a direction: rotate/scale without translation, then
    /// renormalize.
    fn transform_direction(&self, direction: Vec3) -> Vec3;

    /// Transform an axis-aligned bounding box by taking the bounds of all
    /// 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a ray: origin as a point, direction as a vector.
    ///
    /// The direction is NOT normalized so that the `[tmin, tmax]` range keeps
    /// measuring the same parametric distances on both sides of the
    /// transform.
    fn transform_ray(&self, ray: &Ray) -> Ray;
}

impl Mat4Ext for Mat4 {
    fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.transform_vector3(direction).normalize()
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let corners = [
            Vec3::new(aabb.min.x, aabb.min.y, aabb.min.z),
            Vec3::new(aabb.max.x, aabb.min.y, aabb.min.z),
            Vec3::new(aabb.min.x, aabb.max.y, aabb.min.z),
            Vec3::new(aabb.max.x, aabb.max.y, aabb.min.z),
            Vec3::new(aabb.min.x, aabb.min.y, aabb.max.z),
            Vec3::new(aabb.max.x, aabb.min.y, aabb.max.z),
            Vec3::new(aabb.min.x, aabb.max.y, aabb.max.z),
            Vec3::new(aabb.max.x, aabb.max.y, aabb.max.z),
        ];

        let mut result = Aabb::EMPTY;
        for corner in corners {
            result = result.merge_point(self.transform_point3(corner));
        }
        result
    }

    fn transform_ray(&self, ray: &Ray) -> Ray {
        Ray::with_bounds(
            self.transform_point3(ray.origin),
            self.transform_vector3(ray.direction),
            ray.tmin,
            ray.tmax,
        )
    }
}

/// Component of `a` orthogonal to `b`, normalized.
#[inline]
pub fn orthonormalize(a: Vec3, b: Vec3) -> Vec3 {
    (a - b * a.dot(b)).normalize()
}

/// Reflect an outgoing direction `w` about a normal `n`.
///
/// Both the argument and the result point away from the surface.
#[inline]
pub fn reflect(w: Vec3, n: Vec3) -> Vec3 {
    -w + 2.0 * n.dot(w) * n
}

/// Refract an outgoing direction `w` through a surface with normal `n` and
/// inverse relative index of refraction `inv_eta`.
///
/// Returns the zero vector on total internal reflection.
#[inline]
pub fn refract(w: Vec3, n: Vec3, inv_eta: f32) -> Vec3 {
    let cosine = n.dot(w);
    let k = 1.0 + inv_eta * inv_eta * (cosine * cosine - 1.0);
    if k < 0.0 {
        return Vec3::ZERO;
    }
    -w * inv_eta + (inv_eta * cosine - k.sqrt()) * n
}

/// Build an orthonormal basis whose Z column is `z` (assumed unit length).
///
/// Branchless construction from Duff et al., "Building an Orthonormal
/// Basis, Revisited".
pub fn basis_fromz(z: Vec3) -> Mat3 {
    let sign = 1.0_f32.copysign(z.z);
    let a = -1.0 / (sign + z.z);
    let b = z.x * z.y * a;
    let x = Vec3::new(1.0 + sign * z.x * z.x * a, sign * b, -sign * z.x);
    let y = Vec3::new(b, sign + z.y * z.y * a, -z.y);
    Mat3::from_cols(x, y, z)
}
