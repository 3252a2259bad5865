// Re-export glam for convenience
pub use glam::*;

// Ember math types
mod aabb;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use ray::{Ray, RAY_EPS};
pub use transform::{basis_fromz, orthonormalize, reflect, refract, Mat4Ext};
