//! Procedural test scene: a dim sky, a bright disc where the selected light
//! projects, and a row of pillars standing between the camera and the light.

use glam::{Vec2, Vec3, Vec4};
use godrays_config::{ColorFormat, Config};
use godrays_lighting::{DirectionalLight, PointLight, SceneLight};
use godrays_render::depth::far_plane_depth;
use godrays_render::reference::{DepthImage, Image};
use godrays_render::{BasicScene, Camera, DepthBuffer, GodRaysError, LightScene};

/// Sun disc radius as a fraction of the frame height.
const DISC_RADIUS: f32 = 0.06;
/// Distance of the pillars from the camera.
const PILLAR_DISTANCE: f32 = 5.0;
const PILLAR_COUNT: u32 = 7;

/// Build the demo scene: a point "sun" ahead of the camera and a directional "moon".
pub fn build_scene(config: &Config) -> BasicScene {
    let mut camera = Camera::look_at(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.2, -1.0), Vec3::Y);
    camera.reverse_z = config.render.reverse_z;
    camera.set_aspect_ratio(config.render.width as f32, config.render.height as f32);

    let mut scene = BasicScene::new(camera);
    scene.add_light(SceneLight::point(
        "sun",
        PointLight {
            position: Vec3::new(0.0, 2.5, -20.0),
            color: Vec3::new(1.0, 0.9, 0.7),
            intensity: 1.0,
            radius: 100.0,
        },
    ));
    let mut moon = DirectionalLight {
        color: Vec3::new(0.6, 0.7, 1.0),
        ..Default::default()
    };
    moon.set_direction(Vec3::new(0.3, -0.2, 1.0));
    scene.add_light(SceneLight::directional("moon", moon));
    scene
}

/// CPU images of the synthetic frame.
pub struct SyntheticFrame {
    pub color: Image,
    pub depth: DepthImage,
}

/// Rasterize the frame for the light at `light_index`.
///
/// When the light is missing or behind the camera only the sky and pillars
/// are drawn.
pub fn render_frame(scene: &BasicScene, light_index: u32, width: u32, height: u32) -> SyntheticFrame {
    let camera = scene.active_camera();
    let sun_uv = scene
        .light(light_index as usize)
        .and_then(|light| camera.project_anchor(light.shading_data().anchor_vec4()))
        .map(|projected| projected.uv);
    let sun_color = scene
        .light(light_index as usize)
        .map(|light| light.shading_data().color())
        .unwrap_or(Vec3::ONE);

    let far = far_plane_depth(camera.reverse_z);
    let pillar_depth = camera
        .project_anchor(Vec4::new(0.0, 0.0, -PILLAR_DISTANCE, 1.0))
        .map_or(far, |p| p.depth);
    let aspect = width as f32 / height.max(1) as f32;

    let mut depth_values = Vec::with_capacity(width as usize * height as usize);
    let color = Image::from_fn(width, height, |x, y| {
        let uv = Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        );
        if is_pillar(uv) {
            depth_values.push(pillar_depth);
            return [0.02, 0.02, 0.025, 1.0];
        }
        depth_values.push(far);

        let sky = 0.05 + 0.15 * (1.0 - uv.y);
        let mut rgb = Vec3::new(sky * 0.8, sky * 0.9, sky * 1.2);
        if let Some(sun) = sun_uv {
            let offset = (uv - sun) * Vec2::new(aspect, 1.0);
            if offset.length() <= DISC_RADIUS {
                rgb = sun_color * 6.0;
            }
        }
        [rgb.x, rgb.y, rgb.z, 1.0]
    });

    SyntheticFrame {
        color,
        depth: DepthImage {
            width,
            height,
            values: depth_values,
        },
    }
}

fn is_pillar(uv: Vec2) -> bool {
    let spacing = 1.0 / PILLAR_COUNT as f32;
    let local = (uv.x / spacing).fract();
    uv.y > 0.35 && (0.45..0.55).contains(&local)
}

/// Map the configured format to its wgpu counterpart.
pub fn texture_format(format: ColorFormat) -> wgpu::TextureFormat {
    match format {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

/// Create a color target of `format` holding `image`.
pub fn upload_color(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &Image,
    format: ColorFormat,
    label: &str,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let (bytes, texel_size) = match format {
        ColorFormat::Rgba8Unorm => (
            image
                .pixels
                .iter()
                .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
                .collect::<Vec<u8>>(),
            4,
        ),
        ColorFormat::Rgba16Float => (
            image
                .pixels
                .iter()
                .flat_map(|p| p.map(|c| half::f16::from_f32(c).to_le_bytes()))
                .flatten()
                .collect::<Vec<u8>>(),
            8,
        ),
    };
    queue.write_texture(
        texture.as_image_copy(),
        &bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.width * texel_size),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture
}

/// Upload the frame's depth into a sampleable depth buffer.
pub fn upload_depth(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    depth: &DepthImage,
) -> Result<DepthBuffer, GodRaysError> {
    DepthBuffer::from_values(device, queue, depth.width, depth.height, &depth.values)
}
