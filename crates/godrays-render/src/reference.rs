//! CPU mirror of the GPU stages.
//!
//! Follows the WGSL of the blit, bright-pass and accumulation stages step
//! for step, including clamp-to-edge bilinear filtering. Used to check the
//! kernel's properties without a device and by the demo to write a
//! reference image next to the GPU output.

use glam::{Mat4, Vec2, Vec4};
use godrays_lighting::LightShadingData;

use crate::bright_pass::bright_pass_pixel;
use crate::camera::Camera;
use crate::depth::far_plane_depth;
use crate::params::EffectParameters;
use crate::shader_variant::GodRaySettings;
use crate::working_buffer::working_extent;

/// Bias applied to depth comparisons, same as the kernel's `DEPTH_BIAS`.
pub const DEPTH_BIAS: f32 = 1e-4;

/// Linear RGBA image, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Image {
    /// Transparent black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [f32; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    fn texel_clamped(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, i64::from(self.width) - 1) as u32;
        let y = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear sample with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2) -> [f32; 4] {
        let px = uv.x * self.width as f32 - 0.5;
        let py = uv.y * self.height as f32 - 0.5;
        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel_clamped(x0, y0);
        let b = self.texel_clamped(x0 + 1, y0);
        let c = self.texel_clamped(x0, y0 + 1);
        let d = self.texel_clamped(x0 + 1, y0 + 1);
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Largest value of any color channel.
    pub fn max_rgb(&self) -> f32 {
        self.pixels
            .iter()
            .flat_map(|p| p[..3].iter().copied())
            .fold(0.0, f32::max)
    }
}

/// Scene depth, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl DepthImage {
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// Unfiltered load at `uv`, clamped to the edge texels.
    pub fn load(&self, uv: Vec2) -> f32 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let coord = (uv * size).clamp(Vec2::ZERO, size - Vec2::ONE);
        self.values[(coord.y as u32 * self.width + coord.x as u32) as usize]
    }
}

/// Resample `src` to `width` x `height` by sampling at destination texel centers.
pub fn downsample(src: &Image, width: u32, height: u32) -> Image {
    Image::from_fn(width, height, |x, y| {
        let uv = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );
        src.sample(uv)
    })
}

/// Apply the bright-pass rule to every pixel.
pub fn bright_pass(src: &Image, threshold: f32, floor: [f32; 4]) -> Image {
    Image {
        width: src.width,
        height: src.height,
        pixels: src
            .pixels
            .iter()
            .map(|&p| bright_pass_pixel(p, threshold, floor))
            .collect(),
    }
}

/// Settings block the compositor would upload for these inputs.
pub fn settings_for(
    params: &EffectParameters,
    light: LightShadingData,
    camera: &Camera,
) -> GodRaySettings {
    GodRaySettings {
        density: params.medium_density,
        decay: params.medium_decay,
        weight: params.medium_weight,
        exposure: params.exposure,
        light_index: params.light_index,
        reverse_z: u32::from(camera.reverse_z),
        light,
        camera_matrix: camera.view_projection_matrix().to_cols_array_2d(),
        ..Default::default()
    }
}

fn occluded(depth: &DepthImage, uv: Vec2, light_depth: f32, reverse_z: bool) -> bool {
    let scene_depth = depth.load(uv);
    if reverse_z {
        scene_depth > light_depth + DEPTH_BIAS
    } else {
        scene_depth < light_depth - DEPTH_BIAS
    }
}

/// Radial accumulation into a `width` x `height` image.
///
/// Alpha is 1 everywhere the kernel runs, as on the GPU.
pub fn accumulate(
    bright: &Image,
    depth: &DepthImage,
    settings: &GodRaySettings,
    sample_count: u32,
    width: u32,
    height: u32,
) -> Image {
    let camera = Mat4::from_cols_array_2d(&settings.camera_matrix);
    let anchor = Vec4::from_array(settings.light.anchor);
    let clip = camera * anchor;
    if sample_count == 0 || clip.w <= 0.0 {
        return Image::from_fn(width, height, |_, _| [0.0, 0.0, 0.0, 1.0]);
    }

    let reverse_z = settings.reverse_z != 0;
    let ndc = clip.truncate() / clip.w;
    let light_uv = Vec2::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    let light_depth = if settings.light.is_directional() {
        far_plane_depth(reverse_z)
    } else {
        ndc.z
    };
    let tint = settings.light.color();

    Image::from_fn(width, height, |x, y| {
        let start = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );
        let delta = (start - light_uv) * settings.density / (sample_count as f32).max(1.0);
        let mut uv = start;
        let mut attenuation = 1.0;
        let mut illumination = [0.0f32; 3];
        for _ in 0..sample_count {
            uv -= delta;
            if !occluded(depth, uv, light_depth, reverse_z) {
                let texel = bright.sample(uv);
                for (sum, channel) in illumination.iter_mut().zip(texel) {
                    *sum += channel * attenuation * settings.weight;
                }
            }
            attenuation *= settings.decay;
        }
        let scale = settings.exposure * settings.density;
        [
            illumination[0] * scale * tint.x,
            illumination[1] * scale * tint.y,
            illumination[2] * scale * tint.z,
            1.0,
        ]
    })
}

/// The light shafts the effect adds to the destination for these inputs.
pub fn render_reference(
    color: &Image,
    depth: &DepthImage,
    params: &EffectParameters,
    light: LightShadingData,
    camera: &Camera,
) -> Image {
    let (work_width, work_height) = working_extent(color.width, color.height, u32::MAX);
    let working = downsample(color, work_width, work_height);
    let bright = bright_pass(&working, params.threshold, [0.0; 4]);
    let settings = settings_for(params, light, camera);
    accumulate(
        &bright,
        depth,
        &settings,
        params.samples(),
        color.width,
        color.height,
    )
}

/// Additive composite of `shafts` over `base`, as the GPU blend state does.
pub fn composite(base: &Image, shafts: &Image) -> Image {
    Image {
        width: base.width,
        height: base.height,
        pixels: base
            .pixels
            .iter()
            .zip(&shafts.pixels)
            .map(|(d, s)| {
                [
                    d[0] + s[0],
                    d[1] + s[1],
                    d[2] + s[2],
                    s[3] * s[3] + d[3] * (1.0 - s[3]),
                ]
            })
            .collect(),
    }
}
