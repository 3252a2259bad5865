//! Progressive sampling loop and render state.
//!
//! One invocation of [`render_samples`] adds exactly one sample to every
//! pixel: jitter a sub-pixel offset, trace a camera ray through the selected
//! shader, guard the result against non-finite values and fireflies, and
//! fold it into the per-pixel running average. Pixels are fully independent
//! (own RNG stream, own accumulation cells), so the parallel and sequential
//! sweeps produce bit-identical buffers.

use ember_core::{Camera, Scene};
use ember_math::{Vec2, Vec3, Vec4};
use rand_pcg::Pcg32;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bvh::SceneBvh;
use crate::eval::eval_camera;
use crate::sampling::{rand1i, rand2f};
use crate::shading::{shader_func, ShaderFn, ShaderKind};

/// Render parameters, as handed over by the CLI/config collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderParams {
    /// Long edge of the image in pixels; the short edge follows the camera
    /// aspect.
    pub resolution: usize,
    /// Shader to trace with.
    pub shader: ShaderKind,
    /// Total samples per pixel.
    pub samples: u32,
    /// Maximum recursion depth of the transport shaders.
    pub bounces: u32,
    /// Run the pixel loop sequentially.
    pub noparallel: bool,
    /// Master seed for all per-pixel RNG streams.
    pub seed: u64,
    /// Radiance clamp against fireflies.
    pub clamp: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            resolution: 720,
            shader: ShaderKind::PathTrace,
            samples: 512,
            bounces: 8,
            noparallel: false,
            seed: 961748941,
            clamp: 100.0,
        }
    }
}

/// Fixed seed of the generator that assigns per-pixel RNG streams, so pixel
/// streams depend only on the master seed.
const STREAM_SEED: u64 = 1301081;

/// Per-render mutable state: the only data written during sampling.
///
/// All buffers are row-major `width * height`. `render` holds the displayed
/// image, i.e. `accumulation / samples` per pixel, in linear RGBA.
pub struct RenderState {
    width: usize,
    height: usize,
    render: Vec<Vec4>,
    accumulation: Vec<Vec4>,
    samples: Vec<i32>,
    rngs: Vec<Pcg32>,
    current_sample: u32,
}

impl RenderState {
    /// Allocate state for a camera and parameter set.
    ///
    /// The image size puts `params.resolution` on the long edge of the
    /// camera film and derives the other edge from the aspect ratio. Each
    /// pixel receives its own RNG stream derived from the master seed.
    pub fn new(camera: &Camera, params: &RenderParams) -> Self {
        let (width, height) = if camera.film.x > camera.film.y {
            (
                params.resolution,
                (params.resolution as f32 * camera.film.y / camera.film.x).round() as usize,
            )
        } else {
            (
                (params.resolution as f32 * camera.film.x / camera.film.y).round() as usize,
                params.resolution,
            )
        };
        let count = width * height;

        let mut stream_rng = Pcg32::new(STREAM_SEED, 1);
        let rngs = (0..count)
            .map(|_| {
                let stream = rand1i(&mut stream_rng, 1 << 31) / 2 + 1;
                Pcg32::new(params.seed, stream as u64)
            })
            .collect();

        Self {
            width,
            height,
            render: vec![Vec4::ZERO; count],
            accumulation: vec![Vec4::ZERO; count],
            samples: vec![0; count],
            rngs,
            current_sample: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The displayed image: per-pixel averaged radiance, linear RGBA.
    pub fn image(&self) -> &[Vec4] {
        &self.render
    }

    /// The raw accumulation buffer (summed radiance).
    pub fn accumulation(&self) -> &[Vec4] {
        &self.accumulation
    }

    /// Per-pixel sample counts.
    pub fn sample_counts(&self) -> &[i32] {
        &self.samples
    }

    /// The displayed image as raw bytes for the output collaborator.
    pub fn image_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.render)
    }

    /// Progress as (completed sample passes, total requested).
    pub fn progress(&self, params: &RenderParams) -> (u32, u32) {
        (self.current_sample, params.samples)
    }
}

/// Shade one camera sample and apply the per-sample guards.
fn sample_pixel(
    scene: &Scene,
    bvh: &SceneBvh,
    camera: &Camera,
    shader: ShaderFn,
    i: usize,
    j: usize,
    width: usize,
    height: usize,
    rng: &mut Pcg32,
    params: &RenderParams,
) -> Vec4 {
    let puv = rand2f(rng);
    let uv = Vec2::new(
        (i as f32 + puv.x) / width as f32,
        (j as f32 + puv.y) / height as f32,
    );
    let ray = eval_camera(camera, uv);

    let mut shaded = shader(scene, bvh, &ray, 0, rng, params);

    // non-finite channels are zeroed and opacity forced, so one bad sample
    // cannot poison the running average
    let mut rgb = shaded.truncate();
    if !rgb.is_finite() {
        rgb = Vec3::new(
            if rgb.x.is_finite() { rgb.x } else { 0.0 },
            if rgb.y.is_finite() { rgb.y } else { 0.0 },
            if rgb.z.is_finite() { rgb.z } else { 0.0 },
        );
        shaded = rgb.extend(1.0);
    }

    // fireflies are rescaled uniformly, preserving color ratio
    if rgb.max_element() > params.clamp {
        let scale = params.clamp / rgb.max_element();
        shaded = (rgb * scale).extend(shaded.w);
    }

    shaded
}

/// Add one sample to a single pixel.
pub fn render_sample(
    state: &mut RenderState,
    scene: &Scene,
    bvh: &SceneBvh,
    camera: &Camera,
    i: usize,
    j: usize,
    params: &RenderParams,
) {
    let shader = shader_func(params.shader);
    let idx = j * state.width + i;
    let shaded = sample_pixel(
        scene,
        bvh,
        camera,
        shader,
        i,
        j,
        state.width,
        state.height,
        &mut state.rngs[idx],
        params,
    );
    state.accumulation[idx] += shaded;
    state.samples[idx] += 1;
    state.render[idx] = state.accumulation[idx] / state.samples[idx] as f32;
}

/// Add one sample to every pixel.
///
/// With `noparallel` the sweep is sequential row-major; otherwise rayon
/// partitions the pixel grid, each task exclusively owning its pixel's
/// cells. Both modes are numerically identical because RNG streams are
/// per-pixel.
pub fn render_samples(
    state: &mut RenderState,
    scene: &Scene,
    bvh: &SceneBvh,
    camera: &Camera,
    params: &RenderParams,
) {
    let shader = shader_func(params.shader);
    let (width, height) = (state.width, state.height);

    if params.noparallel {
        for j in 0..height {
            for i in 0..width {
                let idx = j * width + i;
                let shaded = sample_pixel(
                    scene,
                    bvh,
                    camera,
                    shader,
                    i,
                    j,
                    width,
                    height,
                    &mut state.rngs[idx],
                    params,
                );
                state.accumulation[idx] += shaded;
                state.samples[idx] += 1;
                state.render[idx] = state.accumulation[idx] / state.samples[idx] as f32;
            }
        }
    } else {
        state
            .accumulation
            .par_iter_mut()
            .zip_eq(state.samples.par_iter_mut())
            .zip_eq(state.rngs.par_iter_mut())
            .zip_eq(state.render.par_iter_mut())
            .enumerate()
            .for_each(|(idx, (((accumulation, samples), rng), render))| {
                let (i, j) = (idx % width, idx / width);
                let shaded =
                    sample_pixel(scene, bvh, camera, shader, i, j, width, height, rng, params);
                *accumulation += shaded;
                *samples += 1;
                *render = *accumulation / *samples as f32;
            });
    }

    state.current_sample += 1;
    log::debug!(
        "rendered sample {}/{}",
        state.current_sample,
        params.samples
    );
}
