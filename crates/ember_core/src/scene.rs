//! Scene model for the offline renderer.
//!
//! A `Scene` is an arena of typed entity vectors. Entities never hold
//! pointers to each other: instances refer to one shape and one material by
//! index, and materials/environments refer to textures by optional index, so
//! many instances can share one shape or material without any lifetime
//! bookkeeping. Dropping the scene drops everything it owns.

use glam::{Mat4, Vec2, Vec3};
use thiserror::Error;

use crate::texture::Texture;

/// Errors found by [`Scene::validate`].
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("instance {instance} references missing shape {shape}")]
    BadShapeRef { instance: usize, shape: usize },

    #[error("instance {instance} references missing material {material}")]
    BadMaterialRef { instance: usize, material: usize },

    #[error("{owner} references missing texture {texture}")]
    BadTextureRef { owner: String, texture: usize },

    #[error("shape {shape}: vertex index {index} out of bounds ({count} vertices)")]
    VertexIndexOutOfBounds {
        shape: usize,
        index: u32,
        count: usize,
    },

    #[error("shape {shape}: {array} has {len} entries, expected {expected}")]
    VertexArrayMismatch {
        shape: usize,
        array: &'static str,
        len: usize,
        expected: usize,
    },
}

/// A camera placed in the scene.
///
/// `frame` maps camera space (looking down -Z) to world space. Only the
/// pinhole model is used for ray generation; aperture and focus are carried
/// as data for loaders that store them.
#[derive(Clone, Debug)]
pub struct Camera {
    pub frame: Mat4,
    /// Focal length in meters.
    pub lens: f32,
    /// Physical film size in meters (width, height).
    pub film: Vec2,
    pub aperture: f32,
    pub focus: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            frame: Mat4::IDENTITY,
            lens: 0.050,
            film: Vec2::new(0.036, 0.024),
            aperture: 0.0,
            focus: 10000.0,
        }
    }
}

impl Camera {
    /// Set the lens and derive the film plane from an aspect ratio, keeping
    /// `film` as the long edge.
    pub fn set_lens(&mut self, lens: f32, aspect: f32, film: f32) {
        self.lens = lens;
        self.film = if aspect >= 1.0 {
            Vec2::new(film, film / aspect)
        } else {
            Vec2::new(film * aspect, film)
        };
    }

    /// Film aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.film.x / self.film.y
    }
}

/// Element topology of a shape: exactly one kind is populated.
#[derive(Clone, Debug)]
pub enum Elements {
    /// Sphere-like points, indexing into the vertex arrays.
    Points(Vec<u32>),
    /// Capsule-like segments.
    Lines(Vec<[u32; 2]>),
    /// Triangles.
    Triangles(Vec<[u32; 3]>),
}

impl Elements {
    /// Number of elements of whichever kind is populated.
    pub fn len(&self) -> usize {
        match self {
            Elements::Points(points) => points.len(),
            Elements::Lines(lines) => lines.len(),
            Elements::Triangles(triangles) => triangles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Elements {
    fn default() -> Self {
        Elements::Triangles(Vec::new())
    }
}

/// A mesh-like primitive container: one element topology plus parallel
/// per-vertex arrays.
///
/// `normals`, `texcoords`, and `radius` may be empty; when present they must
/// run parallel to `positions`. `radius` is required for points and lines.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    pub elements: Elements,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub radius: Vec<f32>,
}

/// A bundle of reflectance parameters, each pairable with a texture for
/// spatial variation.
#[derive(Clone, Debug)]
pub struct Material {
    pub color: Vec3,
    pub color_tex: Option<usize>,
    pub emission: Vec3,
    pub emission_tex: Option<usize>,
    pub specular: f32,
    pub specular_tex: Option<usize>,
    pub metallic: f32,
    pub metallic_tex: Option<usize>,
    pub roughness: f32,
    pub roughness_tex: Option<usize>,
    pub transmission: f32,
    pub transmission_tex: Option<usize>,
    pub opacity: f32,
    pub opacity_tex: Option<usize>,
    pub ior: f32,
    pub scattering: Vec3,
    pub scattering_tex: Option<usize>,
    pub scanisotropy: f32,
    pub trdepth: f32,
    /// Thin surface vs volumetric dielectric.
    pub thin: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ZERO,
            color_tex: None,
            emission: Vec3::ZERO,
            emission_tex: None,
            specular: 0.0,
            specular_tex: None,
            metallic: 0.0,
            metallic_tex: None,
            roughness: 0.0,
            roughness_tex: None,
            transmission: 0.0,
            transmission_tex: None,
            opacity: 1.0,
            opacity_tex: None,
            ior: 1.5,
            scattering: Vec3::ZERO,
            scattering_tex: None,
            scanisotropy: 0.0,
            trdepth: 0.01,
            thin: true,
        }
    }
}

/// Placement of a shared shape + material pair in world space.
#[derive(Clone, Debug)]
pub struct Instance {
    pub frame: Mat4,
    pub shape: usize,
    pub material: usize,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            frame: Mat4::IDENTITY,
            shape: 0,
            material: 0,
        }
    }
}

/// An environment light surrounding the scene.
#[derive(Clone, Debug)]
pub struct Environment {
    pub frame: Mat4,
    pub emission: Vec3,
    pub emission_tex: Option<usize>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            frame: Mat4::IDENTITY,
            emission: Vec3::ZERO,
            emission_tex: None,
        }
    }
}

/// A complete scene: flat arenas of every entity kind.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub cameras: Vec<Camera>,
    pub textures: Vec<Texture>,
    pub shapes: Vec<Shape>,
    pub materials: Vec<Material>,
    pub instances: Vec<Instance>,
    pub environments: Vec<Environment>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a default camera and return its index.
    pub fn add_camera(&mut self) -> usize {
        self.cameras.push(Camera::default());
        self.cameras.len() - 1
    }

    /// Add a texture and return its index.
    pub fn add_texture(&mut self, texture: Texture) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Add a default shape and return its index.
    pub fn add_shape(&mut self) -> usize {
        self.shapes.push(Shape::default());
        self.shapes.len() - 1
    }

    /// Add a default material and return its index.
    pub fn add_material(&mut self) -> usize {
        self.materials.push(Material::default());
        self.materials.len() - 1
    }

    /// Add a default instance and return its index.
    pub fn add_instance(&mut self) -> usize {
        self.instances.push(Instance::default());
        self.instances.len() - 1
    }

    /// Add a default environment and return its index.
    pub fn add_environment(&mut self) -> usize {
        self.environments.push(Environment::default());
        self.environments.len() - 1
    }

    /// Check every cross-reference and index array.
    ///
    /// Loaders are expected to hand the renderer a scene for which this
    /// passes; the render path itself indexes without rechecking.
    pub fn validate(&self) -> Result<(), SceneError> {
        for (idx, instance) in self.instances.iter().enumerate() {
            if instance.shape >= self.shapes.len() {
                return Err(SceneError::BadShapeRef {
                    instance: idx,
                    shape: instance.shape,
                });
            }
            if instance.material >= self.materials.len() {
                return Err(SceneError::BadMaterialRef {
                    instance: idx,
                    material: instance.material,
                });
            }
        }

        for (idx, material) in self.materials.iter().enumerate() {
            for tex in [
                material.color_tex,
                material.emission_tex,
                material.specular_tex,
                material.metallic_tex,
                material.roughness_tex,
                material.transmission_tex,
                material.opacity_tex,
                material.scattering_tex,
            ]
            .into_iter()
            .flatten()
            {
                if tex >= self.textures.len() {
                    return Err(SceneError::BadTextureRef {
                        owner: format!("material {idx}"),
                        texture: tex,
                    });
                }
            }
        }

        for (idx, environment) in self.environments.iter().enumerate() {
            if let Some(tex) = environment.emission_tex {
                if tex >= self.textures.len() {
                    return Err(SceneError::BadTextureRef {
                        owner: format!("environment {idx}"),
                        texture: tex,
                    });
                }
            }
        }

        for (idx, shape) in self.shapes.iter().enumerate() {
            self.validate_shape(idx, shape)?;
        }

        Ok(())
    }

    fn validate_shape(&self, idx: usize, shape: &Shape) -> Result<(), SceneError> {
        let count = shape.positions.len();

        let check_index = |index: u32| -> Result<(), SceneError> {
            if index as usize >= count {
                Err(SceneError::VertexIndexOutOfBounds {
                    shape: idx,
                    index,
                    count,
                })
            } else {
                Ok(())
            }
        };

        let mut needs_radius = false;
        match &shape.elements {
            Elements::Points(points) => {
                needs_radius = true;
                for &p in points {
                    check_index(p)?;
                }
            }
            Elements::Lines(lines) => {
                needs_radius = true;
                for l in lines {
                    check_index(l[0])?;
                    check_index(l[1])?;
                }
            }
            Elements::Triangles(triangles) => {
                for t in triangles {
                    check_index(t[0])?;
                    check_index(t[1])?;
                    check_index(t[2])?;
                }
            }
        }

        if !shape.normals.is_empty() && shape.normals.len() != count {
            return Err(SceneError::VertexArrayMismatch {
                shape: idx,
                array: "normals",
                len: shape.normals.len(),
                expected: count,
            });
        }
        if !shape.texcoords.is_empty() && shape.texcoords.len() != count {
            return Err(SceneError::VertexArrayMismatch {
                shape: idx,
                array: "texcoords",
                len: shape.texcoords.len(),
                expected: count,
            });
        }
        if (needs_radius && !shape.elements.is_empty()) || !shape.radius.is_empty() {
            if shape.radius.len() != count {
                return Err(SceneError::VertexArrayMismatch {
                    shape: idx,
                    array: "radius",
                    len: shape.radius.len(),
                    expected: count,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_arena_ids() {
        let mut scene = Scene::new();
        assert_eq!(scene.add_camera(), 0);
        assert_eq!(scene.add_material(), 0);
        assert_eq!(scene.add_material(), 1);
        assert_eq!(scene.add_shape(), 0);
        assert_eq!(scene.add_instance(), 0);

        scene.instances[0].shape = 0;
        scene.instances[0].material = 1;
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_refs() {
        let mut scene = Scene::new();
        scene.add_shape();
        scene.add_material();
        let inst = scene.add_instance();

        scene.instances[inst].shape = 3;
        assert!(matches!(
            scene.validate(),
            Err(SceneError::BadShapeRef { .. })
        ));

        scene.instances[inst].shape = 0;
        scene.instances[inst].material = 7;
        assert!(matches!(
            scene.validate(),
            Err(SceneError::BadMaterialRef { .. })
        ));

        scene.instances[inst].material = 0;
        scene.materials[0].color_tex = Some(0);
        assert!(matches!(
            scene.validate(),
            Err(SceneError::BadTextureRef { .. })
        ));
    }

    #[test]
    fn test_validate_shape_indices() {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 3]]);
        assert!(matches!(
            scene.validate(),
            Err(SceneError::VertexIndexOutOfBounds { .. })
        ));

        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 2]]);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_validate_radius_required_for_points() {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions = vec![Vec3::ZERO];
        scene.shapes[shape].elements = Elements::Points(vec![0]);
        assert!(matches!(
            scene.validate(),
            Err(SceneError::VertexArrayMismatch { array: "radius", .. })
        ));

        scene.shapes[shape].radius = vec![0.1];
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_camera_lens_aspect() {
        let mut camera = Camera::default();
        camera.set_lens(0.05, 3.0, 0.036);
        assert!((camera.film.x - 0.036).abs() < 1e-6);
        assert!((camera.film.y - 0.012).abs() < 1e-6);
        assert!((camera.aspect() - 3.0).abs() < 1e-5);

        camera.set_lens(0.05, 0.5, 0.036);
        assert!((camera.film.y - 0.036).abs() < 1e-6);
        assert!((camera.film.x - 0.018).abs() < 1e-6);
    }

    #[test]
    fn test_elements_len() {
        assert_eq!(Elements::Points(vec![0, 1, 2]).len(), 3);
        assert_eq!(Elements::Lines(vec![[0, 1]]).len(), 1);
        assert!(Elements::default().is_empty());
    }
}
