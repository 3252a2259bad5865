//! Shader family and shading math.
//!
//! A shader is a pure function from (scene, ray, bounce, rng, params) to
//! radiance. The closed set of shaders is selected once per render through
//! [`shader_func`]; per-ray code never branches on the shader kind.
//!
//! `shade_path_trace` is the reference transport shader: stochastic path
//! tracing with material-dependent sampling and a hard bounce cap. The rest
//! are single-intersection debug or stylized views that reuse the same
//! intersection and evaluation primitives.

use std::fmt;
use std::str::FromStr;

use ember_core::Scene;
use ember_math::{reflect, refract, Ray, Vec3, Vec4};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bvh::SceneBvh;
use crate::eval::{
    eval_environment, eval_material, eval_normal, eval_position, eval_shading_normal,
    eval_texcoord, eval_texture,
};
use crate::intersect::intersect_scene;
use crate::renderer::RenderParams;
use crate::sampling::{rand1f, rand2f, sample_hemisphere};

/// Errors from renderer configuration.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown shader kind: {0}")]
    UnknownShader(String),
}

/// The closed set of shader variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderKind {
    /// Stochastic path tracing (the reference transport shader).
    PathTrace,
    /// Diffuse shading lit from the camera.
    Eyelight,
    /// World normal as color.
    Normal,
    /// Texture coordinates as color.
    Texcoord,
    /// Flat material color.
    Color,
    /// Quantized intensity bands with a saturation/contrast boost.
    Toon,
    /// Snow-cover blend driven by a normal-derived mask.
    Snow,
}

impl ShaderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderKind::PathTrace => "pathtrace",
            ShaderKind::Eyelight => "eyelight",
            ShaderKind::Normal => "normal",
            ShaderKind::Texcoord => "texcoord",
            ShaderKind::Color => "color",
            ShaderKind::Toon => "toon",
            ShaderKind::Snow => "snow",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShaderKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pathtrace" => Ok(ShaderKind::PathTrace),
            "eyelight" => Ok(ShaderKind::Eyelight),
            "normal" => Ok(ShaderKind::Normal),
            "texcoord" => Ok(ShaderKind::Texcoord),
            "color" => Ok(ShaderKind::Color),
            "toon" => Ok(ShaderKind::Toon),
            "snow" => Ok(ShaderKind::Snow),
            other => Err(RenderError::UnknownShader(other.to_string())),
        }
    }
}

/// Signature shared by every shader.
pub type ShaderFn =
    fn(&Scene, &SceneBvh, &Ray, u32, &mut dyn RngCore, &RenderParams) -> Vec4;

/// Resolve a shader kind to its function, once per render.
pub fn shader_func(kind: ShaderKind) -> ShaderFn {
    match kind {
        ShaderKind::PathTrace => shade_path_trace,
        ShaderKind::Eyelight => shade_eyelight,
        ShaderKind::Normal => shade_normal,
        ShaderKind::Texcoord => shade_texcoord,
        ShaderKind::Color => shade_color,
        ShaderKind::Toon => shade_toon,
        ShaderKind::Snow => shade_snow,
    }
}

/// Stochastic path tracing with material-dependent sampling.
fn shade_path_trace(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    bounce: u32,
    rng: &mut dyn RngCore,
    params: &RenderParams,
) -> Vec4 {
    use std::f32::consts::PI;

    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return eval_environment(scene, ray.direction).extend(1.0);
    };

    let instance = &scene.instances[isec.instance];
    let position = eval_position(scene, instance, isec.element, isec.uv);
    let normal = eval_shading_normal(scene, instance, isec.element, isec.uv, ray.direction);
    let texcoord = eval_texcoord(scene, instance, isec.element, isec.uv);
    let material = eval_material(scene, instance, texcoord);
    let outgoing = -ray.direction;

    // opacity cutout: pass through unattenuated without consuming a bounce
    if rand1f(rng) > material.opacity {
        let next = Ray::new(position, ray.direction);
        return shade_path_trace(scene, bvh, &next, bounce, rng, params);
    }

    let mut radiance = material.emission;
    if bounce >= params.bounces {
        return radiance.extend(1.0);
    }

    let color = material.color.truncate();

    if material.transmission > 0.0 && !material.thin {
        // volumetric dielectric: Fresnel choice of reflection or refraction
        if rand1f(rng) < fresnel_schlick(Vec3::splat(0.04), normal, outgoing).x {
            let incoming = reflect(outgoing, normal);
            let next = Ray::new(position, incoming);
            radiance += shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate();
        } else {
            let incoming = refract(outgoing, normal, 1.0 / reflectivity_to_eta(color).x);
            let next = Ray::new(position, incoming);
            radiance +=
                color * shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate();
        }
    } else if material.transmission > 0.0 {
        // thin surface: reflection or tinted straight pass-through
        if rand1f(rng) < fresnel_schlick(Vec3::splat(0.04), normal, outgoing).x {
            let incoming = reflect(outgoing, normal);
            let next = Ray::new(position, incoming);
            radiance += shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate();
        } else {
            let next = Ray::new(position, ray.direction);
            radiance +=
                color * shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate();
        }
    } else if material.metallic > 0.0 && material.roughness == 0.0 {
        // polished metal: deterministic mirror weighted by Fresnel
        let incoming = reflect(outgoing, normal);
        let next = Ray::new(position, incoming);
        radiance += fresnel_schlick(color, normal, outgoing)
            * shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate();
    } else if material.metallic > 0.0 {
        // rough metal: microfacet lobe over a uniform hemisphere sample
        let roughness = material.roughness * material.roughness;
        let incoming = sample_hemisphere(normal, rand2f(rng));
        let halfway = (outgoing + incoming).normalize();
        let next = Ray::new(position, incoming);
        radiance += (2.0 * PI)
            * fresnel_schlick(color, halfway, outgoing)
            * microfacet_distribution(roughness, normal, halfway)
            * microfacet_shadowing(roughness, normal, halfway, outgoing, incoming)
            / (4.0 * normal.dot(outgoing) * normal.dot(incoming))
            * (shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate()
                * normal.dot(incoming));
    } else if material.specular > 0.0 {
        // rough plastic: diffuse and microfacet lobes mixed at the halfway
        // vector's Fresnel term
        let roughness = material.roughness * material.roughness;
        let incoming = sample_hemisphere(normal, rand2f(rng));
        let halfway = (outgoing + incoming).normalize();
        let fresnel = fresnel_schlick(Vec3::splat(0.04), halfway, outgoing).x;
        let next = Ray::new(position, incoming);
        radiance += (2.0 * PI)
            * (color / PI * (1.0 - fresnel)
                + Vec3::splat(
                    fresnel
                        * microfacet_distribution(roughness, normal, halfway)
                        * microfacet_shadowing(roughness, normal, halfway, outgoing, incoming)
                        / (4.0 * normal.dot(outgoing) * normal.dot(incoming)),
                ))
            * shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate()
            * normal.dot(incoming);
    } else {
        // matte: Lambertian lobe over a uniform hemisphere sample
        let incoming = sample_hemisphere(normal, rand2f(rng));
        let next = Ray::new(position, incoming);
        radiance += (2.0 * PI) * color / PI
            * (shade_path_trace(scene, bvh, &next, bounce + 1, rng, params).truncate()
                * normal.dot(incoming));
    }

    radiance.extend(1.0)
}

/// Diffuse shading as if lit from the camera.
fn shade_eyelight(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    _bounce: u32,
    _rng: &mut dyn RngCore,
    _params: &RenderParams,
) -> Vec4 {
    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return Vec4::ZERO;
    };
    let instance = &scene.instances[isec.instance];
    let normal = eval_normal(scene, instance, isec.element, isec.uv);
    let color = scene.materials[instance.material].color * normal.dot(-ray.direction);
    color.extend(1.0)
}

/// World normal mapped to color.
fn shade_normal(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    _bounce: u32,
    _rng: &mut dyn RngCore,
    _params: &RenderParams,
) -> Vec4 {
    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return Vec4::ZERO;
    };
    let instance = &scene.instances[isec.instance];
    let normal = eval_normal(scene, instance, isec.element, isec.uv);
    (normal * 0.5 + 0.5).extend(1.0)
}

/// Texture coordinates mapped to the RG channels.
fn shade_texcoord(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    _bounce: u32,
    _rng: &mut dyn RngCore,
    _params: &RenderParams,
) -> Vec4 {
    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return Vec4::ZERO;
    };
    let instance = &scene.instances[isec.instance];
    let texcoord = eval_texcoord(scene, instance, isec.element, isec.uv);
    Vec4::new(texcoord.x % 1.0, texcoord.y % 1.0, 0.0, 1.0)
}

/// Flat material color.
fn shade_color(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    _bounce: u32,
    _rng: &mut dyn RngCore,
    _params: &RenderParams,
) -> Vec4 {
    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return Vec4::ZERO;
    };
    let instance = &scene.instances[isec.instance];
    scene.materials[instance.material].color.extend(1.0)
}

/// Cartoon shading: discrete intensity bands plus a saturation and
/// contrast boost.
fn shade_toon(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    _bounce: u32,
    _rng: &mut dyn RngCore,
    _params: &RenderParams,
) -> Vec4 {
    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return Vec4::ZERO;
    };
    let instance = &scene.instances[isec.instance];
    let material = &scene.materials[instance.material];
    let normal = eval_normal(scene, instance, isec.element, isec.uv);
    let texcoord = eval_texcoord(scene, instance, isec.element, isec.uv);
    let mut color = material.color
        * eval_texture(scene, material.color_tex, texcoord, false, false, false).truncate();

    let intensity = (-ray.direction).dot(normal).max(0.0);
    if intensity > 0.98 {
        color *= 0.8;
    } else if intensity > 0.75 {
        color *= 0.7;
    } else if intensity > 0.5 {
        color *= Vec3::new(0.6, 0.5, 0.5);
    }

    // saturation and contrast boost
    let grey = (color.x + color.y + color.z) / 3.0;
    color = Vec3::splat(grey) + (color - grey) * (0.75 * 2.0);
    color *= Vec3::new(
        gain(color.x, 0.4),
        gain(color.y, 0.4),
        gain(color.z, 0.4),
    );

    color.extend(1.0)
}

/// Snow-cover shading: a normal-derived mask switches upward-facing
/// regions (or the whole surface, for thin materials) to the color texture,
/// then bounces diffusely.
fn shade_snow(
    scene: &Scene,
    bvh: &SceneBvh,
    ray: &Ray,
    bounce: u32,
    rng: &mut dyn RngCore,
    params: &RenderParams,
) -> Vec4 {
    use std::f32::consts::PI;

    let Some(isec) = intersect_scene(scene, bvh, ray, false) else {
        return eval_environment(scene, ray.direction).extend(1.0);
    };

    let instance = &scene.instances[isec.instance];
    let material = &scene.materials[instance.material];
    let position = eval_position(scene, instance, isec.element, isec.uv);
    let normal = eval_normal(scene, instance, isec.element, isec.uv);
    let texcoord = eval_texcoord(scene, instance, isec.element, isec.uv);

    let mut radiance = material.emission;
    if bounce >= params.bounces {
        return radiance.extend(1.0);
    }

    // coverage mask from the world up-ness of the normal
    let bottom = 0.2_f32;
    let top = 1.0_f32;
    let scale = (bottom + 1.0 - top) + 1.0;
    let snow = saturate(Vec3::splat(normal.y - bottom), 0.0, Vec3::splat(scale)).x;

    let mut color = material.color;
    if ((0.30..=1.0).contains(&snow) && !material.thin) || material.thin {
        color = eval_texture(scene, material.color_tex, texcoord, false, false, false).truncate();
    }

    let incoming = sample_hemisphere(normal, rand2f(rng));
    let next = Ray::new(position, incoming);
    radiance += (2.0 * PI) * color / PI
        * (shade_snow(scene, bvh, &next, bounce + 1, rng, params).truncate()
            * normal.dot(incoming));

    radiance.extend(1.0)
}

// =============================================================================
// Shading math
// =============================================================================

/// Schlick approximation of the Fresnel term.
pub fn fresnel_schlick(specular: Vec3, normal: Vec3, outgoing: Vec3) -> Vec3 {
    if specular == Vec3::ZERO {
        return Vec3::ZERO;
    }
    let cosine = normal.dot(outgoing);
    specular
        + (Vec3::ONE - specular) * (1.0 - cosine.abs()).clamp(0.0, 1.0).powi(5)
}

/// GGX microfacet distribution.
pub fn microfacet_distribution(roughness: f32, normal: Vec3, halfway: Vec3) -> f32 {
    use std::f32::consts::PI;

    let cosine = normal.dot(halfway);
    if cosine <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    roughness2 / (PI * (cosine2 * roughness2 + 1.0 - cosine2).powi(2))
}

fn microfacet_shadowing1(roughness: f32, normal: Vec3, halfway: Vec3, direction: Vec3) -> f32 {
    let cosine = normal.dot(direction);
    let cosineh = halfway.dot(direction);
    if cosine * cosineh <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    2.0 * cosine.abs() / (cosine.abs() + (cosine2 - roughness2 * cosine2 + roughness2).sqrt())
}

/// Smith shadowing-masking for GGX.
pub fn microfacet_shadowing(
    roughness: f32,
    normal: Vec3,
    halfway: Vec3,
    outgoing: Vec3,
    incoming: Vec3,
) -> f32 {
    microfacet_shadowing1(roughness, normal, halfway, outgoing)
        * microfacet_shadowing1(roughness, normal, halfway, incoming)
}

/// Convert reflectivity at normal incidence to an index of refraction.
pub fn reflectivity_to_eta(reflectivity: Vec3) -> Vec3 {
    let r = reflectivity.clamp(Vec3::ZERO, Vec3::splat(0.99));
    let s = Vec3::new(r.x.sqrt(), r.y.sqrt(), r.z.sqrt());
    (Vec3::ONE + s) / (Vec3::ONE - s)
}

/// Perlin-style bias curve.
fn bias(a: f32, b: f32) -> f32 {
    a / ((1.0 / b - 2.0) * (1.0 - a) + 1.0)
}

/// Perlin-style gain curve.
fn gain(a: f32, g: f32) -> f32 {
    if a < 0.5 {
        bias(a * 2.0, g) / 2.0
    } else {
        bias(a * 2.0 - 1.0, 1.0 - g) / 2.0 + 0.5
    }
}

/// Scale a color's saturation about its weighted grey value, clamped at
/// zero.
fn saturate(rgb: Vec3, saturation: f32, weights: Vec3) -> Vec3 {
    let grey = weights.dot(rgb);
    (Vec3::splat(grey) + (rgb - grey) * (saturation * 2.0)).max(Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::SceneBvh;
    use crate::renderer::RenderParams;
    use ember_core::Elements;
    use ember_math::Mat4;
    use rand_pcg::Pcg32;

    fn quad_scene(color: Vec3) -> Scene {
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        scene.shapes[shape].positions = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        scene.shapes[shape].elements = Elements::Triangles(vec![[0, 1, 3], [3, 1, 2]]);
        let material = scene.add_material();
        scene.materials[material].color = color;
        scene.add_instance();
        let camera = scene.add_camera();
        scene.cameras[camera].frame = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        scene
    }

    #[test]
    fn test_shader_kind_parse() {
        assert_eq!("pathtrace".parse::<ShaderKind>().unwrap(), ShaderKind::PathTrace);
        assert_eq!("toon".parse::<ShaderKind>().unwrap(), ShaderKind::Toon);
        assert!(matches!(
            "plasma".parse::<ShaderKind>(),
            Err(RenderError::UnknownShader(_))
        ));
    }

    #[test]
    fn test_shader_kind_roundtrip() {
        for kind in [
            ShaderKind::PathTrace,
            ShaderKind::Eyelight,
            ShaderKind::Normal,
            ShaderKind::Texcoord,
            ShaderKind::Color,
            ShaderKind::Toon,
            ShaderKind::Snow,
        ] {
            assert_eq!(kind.name().parse::<ShaderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_fresnel_schlick() {
        let n = Vec3::Z;
        // normal incidence returns the base reflectivity
        let f = fresnel_schlick(Vec3::splat(0.04), n, Vec3::Z);
        assert!((f.x - 0.04).abs() < 1e-6);
        // grazing incidence tends to one
        let f = fresnel_schlick(Vec3::splat(0.04), n, Vec3::new(1.0, 0.0, 1e-3).normalize());
        assert!(f.x > 0.9);
        // zero reflectivity stays zero
        assert_eq!(fresnel_schlick(Vec3::ZERO, n, Vec3::Z), Vec3::ZERO);
    }

    #[test]
    fn test_microfacet_terms() {
        let n = Vec3::Z;
        let h = Vec3::Z;
        let d_smooth = microfacet_distribution(0.01, n, h);
        let d_rough = microfacet_distribution(0.9, n, h);
        // smoother surfaces concentrate the distribution at the normal
        assert!(d_smooth > d_rough);
        // back-facing halfway contributes nothing
        assert_eq!(microfacet_distribution(0.5, n, -h), 0.0);

        let o = Vec3::new(0.3, 0.0, 1.0).normalize();
        let i = Vec3::new(-0.4, 0.2, 0.9).normalize();
        let g = microfacet_shadowing(0.3, n, h, o, i);
        assert!(g > 0.0 && g <= 1.0);
    }

    #[test]
    fn test_reflectivity_to_eta_glass_range() {
        // 4% reflectivity corresponds to an ior of 1.5
        let eta = reflectivity_to_eta(Vec3::splat(0.04)).x;
        assert!((eta - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_shade_color_and_normal() {
        let scene = quad_scene(Vec3::new(0.2, 0.4, 0.8));
        let bvh = SceneBvh::build(&scene);
        let params = RenderParams::default();
        let mut rng = Pcg32::new(1, 1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);

        let out = shade_color(&scene, &bvh, &ray, 0, &mut rng, &params);
        assert!((out.truncate() - Vec3::new(0.2, 0.4, 0.8)).length() < 1e-6);

        let out = shade_normal(&scene, &bvh, &ray, 0, &mut rng, &params);
        // +Z normal maps to (0.5, 0.5, 1.0)
        assert!((out.truncate() - Vec3::new(0.5, 0.5, 1.0)).length() < 1e-5);

        // misses are transparent black for the debug shaders
        let miss = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        assert_eq!(shade_color(&scene, &bvh, &miss, 0, &mut rng, &params), Vec4::ZERO);
    }

    #[test]
    fn test_shade_eyelight_front_facing() {
        let color = Vec3::new(0.6, 0.3, 0.1);
        let scene = quad_scene(color);
        let bvh = SceneBvh::build(&scene);
        let params = RenderParams::default();
        let mut rng = Pcg32::new(1, 1);

        // head-on view: dot(normal, -d) = 1, so the output is the color
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
        let out = shade_eyelight(&scene, &bvh, &ray, 0, &mut rng, &params);
        assert!((out.truncate() - color).length() < 1e-5);
    }

    #[test]
    fn test_shade_path_trace_unlit_is_black() {
        // closed diffuse box around the origin: no emission, no environment,
        // every path terminates with zero radiance
        let mut scene = Scene::new();
        let shape = scene.add_shape();
        let s = 5.0;
        scene.shapes[shape].positions = vec![
            Vec3::new(-s, -s, -s),
            Vec3::new(s, -s, -s),
            Vec3::new(s, s, -s),
            Vec3::new(-s, s, -s),
            Vec3::new(-s, -s, s),
            Vec3::new(s, -s, s),
            Vec3::new(s, s, s),
            Vec3::new(-s, s, s),
        ];
        scene.shapes[shape].elements = Elements::Triangles(vec![
            [0, 1, 2], [0, 2, 3], // back
            [4, 6, 5], [4, 7, 6], // front
            [0, 3, 7], [0, 7, 4], // left
            [1, 5, 6], [1, 6, 2], // right
            [3, 2, 6], [3, 6, 7], // top
            [0, 4, 5], [0, 5, 1], // bottom
        ]);
        let material = scene.add_material();
        scene.materials[material].color = Vec3::splat(0.7);
        scene.add_instance();

        let bvh = SceneBvh::build(&scene);
        let params = RenderParams::default();
        let mut rng = Pcg32::new(42, 1);

        for _ in 0..16 {
            let dir = sample_hemisphere(Vec3::Z, rand2f(&mut rng));
            let ray = Ray::new(Vec3::ZERO, dir);
            let out = shade_path_trace(&scene, &bvh, &ray, 0, &mut rng, &params);
            assert_eq!(out.truncate(), Vec3::ZERO);
            assert_eq!(out.w, 1.0);
        }
    }

    #[test]
    fn test_shade_path_trace_emission_terminates() {
        let mut scene = quad_scene(Vec3::splat(0.5));
        scene.materials[0].emission = Vec3::new(2.0, 1.0, 0.5);

        let bvh = SceneBvh::build(&scene);
        let mut params = RenderParams::default();
        params.bounces = 0; // cap immediately: emission only
        let mut rng = Pcg32::new(9, 1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
        let out = shade_path_trace(&scene, &bvh, &ray, 0, &mut rng, &params);
        assert!((out.truncate() - Vec3::new(2.0, 1.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_shade_path_trace_miss_returns_environment() {
        let mut scene = quad_scene(Vec3::splat(0.5));
        let env = scene.add_environment();
        scene.environments[env].emission = Vec3::new(0.1, 0.2, 0.3);

        let bvh = SceneBvh::build(&scene);
        let params = RenderParams::default();
        let mut rng = Pcg32::new(9, 1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        let out = shade_path_trace(&scene, &bvh, &ray, 0, &mut rng, &params);
        assert!((out.truncate() - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-6);
        assert_eq!(out.w, 1.0);
    }

    #[test]
    fn test_toon_bands_darken_center() {
        let scene = quad_scene(Vec3::splat(0.9));
        let bvh = SceneBvh::build(&scene);
        let params = RenderParams::default();
        let mut rng = Pcg32::new(1, 1);

        // head-on: intensity ~1.0 lands in the brightest band
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
        let head_on = shade_toon(&scene, &bvh, &ray, 0, &mut rng, &params);

        // oblique: intensity ~0.6 lands in a darker band
        let origin = Vec3::new(2.5, 0.0, 2.0);
        let ray = Ray::new(origin, (Vec3::ZERO - origin).normalize());
        let oblique = shade_toon(&scene, &bvh, &ray, 0, &mut rng, &params);

        assert!(head_on.truncate().length() > oblique.truncate().length());
    }
}
