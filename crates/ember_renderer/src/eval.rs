//! Scene evaluation: cameras, surfaces, materials, textures, environments.
//!
//! These functions turn an intersection record (instance, element,
//! parametric uv) into world-space shading attributes, selecting the
//! interpolation formula by the shape's element topology.

use ember_core::{Camera, Elements, Instance, Scene, Shape};
use ember_math::{orthonormalize, Mat4Ext, Ray, Vec2, Vec3, Vec4};

/// Material parameters evaluated at one surface point: each scalar/vector
/// modulated by its optional texture.
#[derive(Debug, Clone, Copy)]
pub struct MaterialPoint {
    pub color: Vec4,
    pub emission: Vec3,
    pub opacity: f32,
    pub transmission: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub specular: f32,
    pub thin: bool,
}

/// Generate a camera ray through an image-plane coordinate in [0, 1]^2.
///
/// Pinhole model: the ray starts at the camera frame's origin and passes
/// through the film point at the lens distance, flipped into the camera's
/// -Z viewing convention.
pub fn eval_camera(camera: &Camera, image_uv: Vec2) -> Ray {
    let q = Vec3::new(
        camera.film.x * (0.5 - image_uv.x),
        camera.film.y * (image_uv.y - 0.5),
        camera.lens,
    );
    let direction = (-q).normalize();
    Ray::new(
        camera.frame.transform_point3(Vec3::ZERO),
        camera.frame.transform_direction(direction),
    )
}

/// Evaluate an optional texture at a UV coordinate; a missing texture is a
/// neutral white sample.
pub fn eval_texture(
    scene: &Scene,
    texture: Option<usize>,
    uv: Vec2,
    ldr_as_linear: bool,
    no_interpolation: bool,
    clamp_to_edge: bool,
) -> Vec4 {
    match texture {
        Some(texture) => {
            scene.textures[texture].sample(uv, ldr_as_linear, no_interpolation, clamp_to_edge)
        }
        None => Vec4::ONE,
    }
}

/// Interpolated position on a shape, in shape-local space.
pub fn eval_shape_position(shape: &Shape, element: usize, uv: Vec2) -> Vec3 {
    match &shape.elements {
        Elements::Triangles(triangles) => {
            let t = triangles[element];
            interpolate_triangle(
                shape.positions[t[0] as usize],
                shape.positions[t[1] as usize],
                shape.positions[t[2] as usize],
                uv,
            )
        }
        Elements::Lines(lines) => {
            let l = lines[element];
            interpolate_line(
                shape.positions[l[0] as usize],
                shape.positions[l[1] as usize],
                uv.x,
            )
        }
        Elements::Points(points) => shape.positions[points[element] as usize],
    }
}

/// Flat geometric normal of one element, in shape-local space: triangle
/// plane normal, line tangent, or a fixed up direction for points.
pub fn eval_element_normal(shape: &Shape, element: usize) -> Vec3 {
    match &shape.elements {
        Elements::Triangles(triangles) => {
            let t = triangles[element];
            triangle_normal(
                shape.positions[t[0] as usize],
                shape.positions[t[1] as usize],
                shape.positions[t[2] as usize],
            )
        }
        Elements::Lines(lines) => {
            let l = lines[element];
            (shape.positions[l[1] as usize] - shape.positions[l[0] as usize]).normalize()
        }
        Elements::Points(_) => Vec3::Z,
    }
}

/// Interpolated shading normal in shape-local space; falls back to the flat
/// element normal when the shape stores no normals.
pub fn eval_shape_normal(shape: &Shape, element: usize, uv: Vec2) -> Vec3 {
    if shape.normals.is_empty() {
        return eval_element_normal(shape, element);
    }
    match &shape.elements {
        Elements::Triangles(triangles) => {
            let t = triangles[element];
            interpolate_triangle(
                shape.normals[t[0] as usize],
                shape.normals[t[1] as usize],
                shape.normals[t[2] as usize],
                uv,
            )
            .normalize()
        }
        Elements::Lines(lines) => {
            let l = lines[element];
            interpolate_line(
                shape.normals[l[0] as usize],
                shape.normals[l[1] as usize],
                uv.x,
            )
            .normalize()
        }
        Elements::Points(points) => shape.normals[points[element] as usize].normalize(),
    }
}

/// Interpolated texture coordinate; defaults to the raw parametric uv when
/// the shape stores no texcoords.
pub fn eval_shape_texcoord(shape: &Shape, element: usize, uv: Vec2) -> Vec2 {
    if shape.texcoords.is_empty() {
        return uv;
    }
    match &shape.elements {
        Elements::Triangles(triangles) => {
            let t = triangles[element];
            interpolate_triangle(
                shape.texcoords[t[0] as usize],
                shape.texcoords[t[1] as usize],
                shape.texcoords[t[2] as usize],
                uv,
            )
        }
        Elements::Lines(lines) => {
            let l = lines[element];
            interpolate_line(
                shape.texcoords[l[0] as usize],
                shape.texcoords[l[1] as usize],
                uv.x,
            )
        }
        Elements::Points(points) => shape.texcoords[points[element] as usize],
    }
}

/// World-space position of a hit.
pub fn eval_position(scene: &Scene, instance: &Instance, element: usize, uv: Vec2) -> Vec3 {
    instance
        .frame
        .transform_point3(eval_shape_position(&scene.shapes[instance.shape], element, uv))
}

/// World-space shading normal of a hit, before any facing correction.
pub fn eval_normal(scene: &Scene, instance: &Instance, element: usize, uv: Vec2) -> Vec3 {
    instance
        .frame
        .transform_direction(eval_shape_normal(&scene.shapes[instance.shape], element, uv))
}

/// World-space texture coordinate of a hit.
pub fn eval_texcoord(scene: &Scene, instance: &Instance, element: usize, uv: Vec2) -> Vec2 {
    eval_shape_texcoord(&scene.shapes[instance.shape], element, uv)
}

/// World-space shading normal corrected to face the incoming ray.
///
/// Points always look at the viewer, line normals are the viewing direction
/// orthogonalized against the tangent, and triangle normals flip to the
/// front-facing side.
pub fn eval_shading_normal(
    scene: &Scene,
    instance: &Instance,
    element: usize,
    uv: Vec2,
    direction: Vec3,
) -> Vec3 {
    let shape = &scene.shapes[instance.shape];
    let normal = eval_normal(scene, instance, element, uv);
    match &shape.elements {
        Elements::Points(_) => -direction,
        Elements::Lines(_) => orthonormalize(-direction, normal),
        Elements::Triangles(_) => {
            if (-direction).dot(normal) < 0.0 {
                -normal
            } else {
                normal
            }
        }
    }
}

/// Material parameters at a surface point, with the standard
/// scalar-times-texture modulation.
pub fn eval_material(scene: &Scene, instance: &Instance, texcoord: Vec2) -> MaterialPoint {
    let material = &scene.materials[instance.material];
    MaterialPoint {
        color: Vec4::new(material.color.x, material.color.y, material.color.z, 1.0)
            * eval_texture(scene, material.color_tex, texcoord, false, false, false),
        emission: material.emission
            * eval_texture(scene, material.emission_tex, texcoord, false, false, false)
                .truncate(),
        opacity: material.opacity
            * eval_texture(scene, material.opacity_tex, texcoord, false, false, false).x,
        transmission: material.transmission
            * eval_texture(scene, material.transmission_tex, texcoord, false, false, false).x,
        roughness: material.roughness
            * eval_texture(scene, material.roughness_tex, texcoord, false, false, false).x,
        metallic: material.metallic
            * eval_texture(scene, material.metallic_tex, texcoord, false, false, false).x,
        specular: material.specular
            * eval_texture(scene, material.specular_tex, texcoord, false, false, false).x,
        thin: material.thin,
    }
}

/// Total environment radiance along a direction: the sum over all
/// environment lights of emission times the emission texture sampled at the
/// direction's equirectangular coordinates in the environment frame.
pub fn eval_environment(scene: &Scene, direction: Vec3) -> Vec3 {
    use std::f32::consts::PI;

    let mut emission = Vec3::ZERO;
    for environment in &scene.environments {
        let wl = environment.frame.inverse().transform_direction(direction);
        let mut texcoord = Vec2::new(
            wl.z.atan2(wl.x) / (2.0 * PI),
            wl.y.clamp(-1.0, 1.0).acos() / PI,
        );
        if texcoord.x < 0.0 {
            texcoord.x += 1.0;
        }
        emission += environment.emission
            * eval_texture(scene, environment.emission_tex, texcoord, false, false, false)
                .truncate();
    }
    emission
}

#[inline]
fn interpolate_triangle<T>(p0: T, p1: T, p2: T, uv: Vec2) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    p0 * (1.0 - uv.x - uv.y) + p1 * uv.x + p2 * uv.y
}

#[inline]
fn interpolate_line<T>(p0: T, p1: T, u: f32) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    p0 * (1.0 - u) + p1 * u
}

#[inline]
fn triangle_normal(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    (p1 - p0).cross(p2 - p0).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::Texture;
    use ember_math::Mat4;

    fn quad_scene() -> Scene {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        scene.shapes[shape].texcoords = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 3], [3, 1, 2]]);
        scene.add_material();
        scene.add_instance();
        scene
    }

    #[test]
    fn test_eval_camera_center_ray() {
        let camera = Camera::default();
        let ray = eval_camera(&camera, Vec2::new(0.5, 0.5));
        assert!((ray.origin - Vec3::ZERO).length() < 1e-6);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);

        // off-center horizontal: image x > 0.5 maps to camera-space -X,
        // flipped to +X... the film is mirrored through the pinhole
        let ray = eval_camera(&camera, Vec2::new(1.0, 0.5));
        assert!(ray.direction.x > 0.0);
        assert!(ray.direction.z < 0.0);
    }

    #[test]
    fn test_eval_camera_transformed() {
        let mut camera = Camera::default();
        camera.frame = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let ray = eval_camera(&camera, Vec2::new(0.5, 0.5));
        assert!((ray.origin - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-6);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_eval_position_interpolation() {
        let scene = quad_scene();
        let instance = &scene.instances[0];

        // barycentric corners of the first triangle
        let p = eval_position(&scene, instance, 0, Vec2::new(0.0, 0.0));
        assert!((p - Vec3::new(-1.0, -1.0, 0.0)).length() < 1e-6);
        let p = eval_position(&scene, instance, 0, Vec2::new(1.0, 0.0));
        assert!((p - Vec3::new(1.0, -1.0, 0.0)).length() < 1e-6);
        let p = eval_position(&scene, instance, 0, Vec2::new(0.0, 1.0));
        assert!((p - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_eval_normal_element_fallback() {
        let scene = quad_scene();
        let instance = &scene.instances[0];
        let n = eval_normal(&scene, instance, 0, Vec2::new(0.3, 0.3));
        assert!((n - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_eval_shading_normal_faces_ray() {
        let scene = quad_scene();
        let instance = &scene.instances[0];

        // ray hits the back side; normal flips toward the viewer
        let n = eval_shading_normal(&scene, instance, 0, Vec2::new(0.3, 0.3), Vec3::Z);
        assert!((n - Vec3::NEG_Z).length() < 1e-5);
        let n = eval_shading_normal(&scene, instance, 0, Vec2::new(0.3, 0.3), Vec3::NEG_Z);
        assert!((n - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_eval_normal_transformed_instance() {
        use std::f32::consts::FRAC_PI_2;
        let mut scene = quad_scene();
        scene.instances[0].frame = Mat4::from_rotation_y(FRAC_PI_2);
        let instance = &scene.instances[0];
        let n = eval_normal(&scene, instance, 0, Vec2::new(0.3, 0.3));
        assert!((n - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_eval_texcoord() {
        let scene = quad_scene();
        let instance = &scene.instances[0];
        let uv = eval_texcoord(&scene, instance, 0, Vec2::new(1.0, 0.0));
        assert!((uv - Vec2::new(1.0, 0.0)).length() < 1e-6);

        // shapes without texcoords return the raw parametric uv
        let mut scene = quad_scene();
        scene.shapes[0].texcoords.clear();
        let instance = &scene.instances[0];
        let uv = eval_texcoord(&scene, instance, 0, Vec2::new(0.25, 0.5));
        assert!((uv - Vec2::new(0.25, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_eval_material_modulation() {
        let mut scene = quad_scene();
        let tex = scene.add_texture(Texture::solid(Vec4::new(0.5, 0.5, 0.5, 1.0)));
        scene.materials[0].color = Vec3::ONE;
        scene.materials[0].color_tex = Some(tex);
        scene.materials[0].opacity = 0.8;

        let instance = &scene.instances[0];
        let point = eval_material(&scene, instance, Vec2::ZERO);
        assert!((point.color.truncate() - Vec3::splat(0.5)).length() < 1e-5);
        assert!((point.opacity - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_eval_environment_directions() {
        let mut scene = Scene::new();
        let env = scene.add_environment();
        scene.environments[env].emission = Vec3::ONE;

        // constant environment: any direction returns the emission
        let e = eval_environment(&scene, Vec3::new(0.3, -0.7, 0.2).normalize());
        assert!((e - Vec3::ONE).length() < 1e-6);

        // two environments accumulate
        let env2 = scene.add_environment();
        scene.environments[env2].emission = Vec3::splat(0.5);
        let e = eval_environment(&scene, Vec3::Y);
        assert!((e - Vec3::splat(1.5)).length() < 1e-6);
    }

    #[test]
    fn test_eval_environment_equirectangular() {
        // 2x1 texture: left half red, right half green; +X maps to u=0
        let mut scene = Scene::new();
        let tex = scene.add_texture(
            Texture::new_hdr(
                2,
                1,
                vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0)],
            )
            .unwrap(),
        );
        let env = scene.add_environment();
        scene.environments[env].emission = Vec3::ONE;
        scene.environments[env].emission_tex = Some(tex);

        let e = eval_environment(&scene, Vec3::X);
        assert!(e.x > e.y);
        let e = eval_environment(&scene, Vec3::NEG_X);
        assert!(e.y > e.x);
    }

    #[test]
    fn test_missing_texture_is_white() {
        let scene = Scene::new();
        let sample = eval_texture(&scene, None, Vec2::new(0.4, 0.9), false, false, false);
        assert_eq!(sample, Vec4::ONE);
    }
}
