//! Ember Core - scene model for the offline renderer.
//!
//! This crate provides the pure-data scene representation:
//!
//! - **Scene arena**: `Scene` owns flat vectors of cameras, textures,
//!   shapes, materials, instances, and environments; entities reference
//!   each other by index.
//! - **Textures**: HDR or sRGB-encoded LDR images with bilinear/nearest
//!   sampling and tiling or clamp-to-edge addressing.
//!
//! The acceleration structures and all rendering algorithms live in
//! `ember_renderer`; a scene stays read-only while sampling runs.

pub mod scene;
pub mod texture;

// Re-export commonly used types
pub use scene::{Camera, Elements, Environment, Instance, Material, Scene, SceneError, Shape};
pub use texture::{TexelData, Texture, TextureError};
