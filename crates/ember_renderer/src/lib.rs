//! Ember Renderer - CPU path tracing core.
//!
//! A Monte Carlo path tracer over the `ember_core` scene model:
//!
//! - Two-level bounding volume hierarchy (per-shape trees plus an
//!   instance-level tree), built once and shared read-only by all workers.
//! - Allocation-free stack-based traversal with closest-hit and any-hit
//!   queries over point, line, and triangle primitives.
//! - A family of shaders selected once per render, from full stochastic
//!   path tracing down to flat debug visualizations.
//! - A progressive sampling loop with one deterministic RNG stream per
//!   pixel, parallelized with rayon.

pub mod bvh;
pub mod eval;
pub mod intersect;
pub mod renderer;
pub mod sampling;
pub mod shading;

pub use bvh::{build_shape_bvh, BvhNode, BvhTree, SceneBvh, BVH_MAX_PRIMS};
pub use eval::{
    eval_camera, eval_environment, eval_material, eval_normal, eval_position,
    eval_shading_normal, eval_texcoord, eval_texture, MaterialPoint,
};
pub use intersect::{
    intersect_instance, intersect_scene, intersect_shape, SceneIntersection, ShapeIntersection,
};
pub use renderer::{render_sample, render_samples, RenderParams, RenderState};
pub use shading::{shader_func, RenderError, ShaderFn, ShaderKind};

/// Re-export the math and scene types used throughout the public API.
pub use ember_core::{Camera, Elements, Environment, Instance, Material, Scene, Texture};
pub use ember_math::{Aabb, Mat4, Ray, Vec2, Vec3, Vec4};
