//! Simple path tracer example.
//!
//! Builds a small scene with two spheres on a ground plane under a sky
//! environment, renders it progressively, and saves a PNG.

use anyhow::Result;
use ember_renderer::{
    render_samples, Elements, RenderParams, RenderState, Scene, SceneBvh, ShaderKind, Vec2, Vec3,
    Vec4,
};
use glam::Mat4;
use std::f32::consts::PI;

fn main() -> Result<()> {
    env_logger::init();

    println!("Ember Path Tracer - Simple Example");
    println!("==================================");

    let start = std::time::Instant::now();
    let scene = build_scene();
    scene.validate()?;
    let bvh = SceneBvh::build(&scene);
    println!("Scene built in {:?}", start.elapsed());

    let params = RenderParams {
        resolution: 640,
        shader: ShaderKind::PathTrace,
        samples: 64,
        bounces: 6,
        ..RenderParams::default()
    };

    let camera = &scene.cameras[0];
    let mut state = RenderState::new(camera, &params);
    println!(
        "Rendering {}x{} @ {} spp...",
        state.width(),
        state.height(),
        params.samples
    );

    let start = std::time::Instant::now();
    for _ in 0..params.samples {
        render_samples(&mut state, &scene, &bvh, camera, &params);
        let (current, total) = state.progress(&params);
        if current % 16 == 0 {
            println!("  sample {current}/{total}");
        }
    }
    println!("Rendered in {:?}", start.elapsed());

    let filename = "output.png";
    save_png(&state, filename)?;
    println!("Saved to {filename}");

    Ok(())
}

fn build_scene() -> Scene {
    let mut scene = Scene::new();

    // camera looking slightly down at the spheres
    let camera = scene.add_camera();
    scene.cameras[camera].frame = Mat4::look_at_rh(
        Vec3::new(0.0, 1.5, 5.0),
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::Y,
    )
    .inverse();

    // ground plane
    let ground = scene.add_shape();
    scene.shapes[ground].positions = vec![
        Vec3::new(-20.0, 0.0, -20.0),
        Vec3::new(20.0, 0.0, -20.0),
        Vec3::new(20.0, 0.0, 20.0),
        Vec3::new(-20.0, 0.0, 20.0),
    ];
    scene.shapes[ground].elements = Elements::Triangles(vec![[0, 2, 1], [0, 3, 2]]);

    let grey = scene.add_material();
    scene.materials[grey].color = Vec3::splat(0.5);

    let floor = scene.add_instance();
    scene.instances[floor].shape = ground;
    scene.instances[floor].material = grey;

    // shared sphere shape, instanced twice
    let sphere = make_sphere(&mut scene, 64, 1.0);

    let red = scene.add_material();
    scene.materials[red].color = Vec3::new(0.7, 0.2, 0.15);

    let steel = scene.add_material();
    scene.materials[steel].color = Vec3::splat(0.85);
    scene.materials[steel].metallic = 1.0;
    scene.materials[steel].roughness = 0.15;

    let matte_ball = scene.add_instance();
    scene.instances[matte_ball].shape = sphere;
    scene.instances[matte_ball].material = red;
    scene.instances[matte_ball].frame = Mat4::from_translation(Vec3::new(-1.2, 1.0, 0.0));

    let metal_ball = scene.add_instance();
    scene.instances[metal_ball].shape = sphere;
    scene.instances[metal_ball].material = steel;
    scene.instances[metal_ball].frame = Mat4::from_translation(Vec3::new(1.2, 1.0, 0.0));

    // constant sky
    let sky = scene.add_environment();
    scene.environments[sky].emission = Vec3::new(0.8, 0.9, 1.0);

    scene
}

/// Tessellate a lat-long sphere into the scene and return its shape index.
fn make_sphere(scene: &mut Scene, steps: u32, radius: f32) -> usize {
    let shape_id = scene.add_shape();
    let shape = &mut scene.shapes[shape_id];

    for j in 0..=steps {
        for i in 0..=steps {
            let u = i as f32 / steps as f32;
            let v = j as f32 / steps as f32;
            let theta = v * PI;
            let phi = u * 2.0 * PI;
            let p = Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            );
            shape.positions.push(p * radius);
            shape.normals.push(p);
            shape.texcoords.push(Vec2::new(u, v));
        }
    }

    let stride = steps + 1;
    let mut triangles = Vec::new();
    for j in 0..steps {
        for i in 0..steps {
            let v00 = j * stride + i;
            let v10 = v00 + 1;
            let v01 = v00 + stride;
            let v11 = v01 + 1;
            triangles.push([v00, v10, v11]);
            triangles.push([v00, v11, v01]);
        }
    }
    shape.elements = Elements::Triangles(triangles);

    shape_id
}

fn save_png(state: &RenderState, filename: &str) -> Result<()> {
    let mut image = image::RgbaImage::new(state.width() as u32, state.height() as u32);
    for (pixel, out) in state.image().iter().zip(image.pixels_mut()) {
        *out = image::Rgba(encode_srgb(*pixel));
    }
    image.save(filename)?;
    Ok(())
}

/// Encode a linear RGBA pixel to 8-bit sRGB.
fn encode_srgb(pixel: Vec4) -> [u8; 4] {
    let encode = |v: f32| {
        let v = v.clamp(0.0, 1.0);
        let v = if v <= 0.0031308 {
            v * 12.92
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        };
        (v * 255.0).round() as u8
    };
    [
        encode(pixel.x),
        encode(pixel.y),
        encode(pixel.z),
        (pixel.w.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}
