//! Linear-filtered texture copy between render targets of any size.

use rustc_hash::FxHashMap;

use crate::pass::{FULLSCREEN_VERTEX_SOURCE, create_fullscreen_pipeline, run_fullscreen_pass};

const BLIT_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var src_texture: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;

@fragment
fn fs_blit(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(src_texture, src_sampler, in.uv, 0.0);
}
"#;

/// Copies a filterable color view into a color target, resampling bilinearly.
///
/// Used to downsample the source color into the working buffer and to copy
/// the source into the destination before compositing.
pub struct Blitter {
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl Blitter {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("godrays-blit-shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_SOURCE}{BLIT_FRAGMENT_SOURCE}").into(),
            ),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("godrays-blit-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("godrays-blit-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("godrays-blit-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            shader,
            bind_group_layout,
            pipeline_layout,
            sampler,
            pipelines: FxHashMap::default(),
        }
    }

    /// Record a blit of `src_view` into `dst_view`, whose texture has `dst_format`.
    pub fn blit(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src_view: &wgpu::TextureView,
        dst_view: &wgpu::TextureView,
        dst_format: wgpu::TextureFormat,
    ) {
        let pipeline = self.pipelines.entry(dst_format).or_insert_with(|| {
            log::debug!("Creating blit pipeline for {dst_format:?}");
            create_fullscreen_pipeline(
                device,
                &self.shader,
                &self.pipeline_layout,
                "fs_blit",
                dst_format,
                None,
                "godrays-blit",
            )
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("godrays-blit-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        run_fullscreen_pass(
            encoder,
            pipeline,
            &[&bind_group],
            dst_view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "godrays-blit",
        );
    }

    /// Number of per-format pipelines created so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::create_test_device_queue;
    use crate::pass::read_texture_linear;

    fn solid_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: u32,
        rgba: [u8; 4],
    ) -> wgpu::Texture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("blit-test-src"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let pixels: Vec<u8> = (0..size * size).flat_map(|_| rgba).collect();
        queue.write_texture(
            texture.as_image_copy(),
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size * 4),
                rows_per_image: Some(size),
            },
            texture.size(),
        );
        texture
    }

    #[test]
    fn test_blit_downsamples_solid_color() {
        let Some((device, queue)) = create_test_device_queue() else {
            return;
        };
        let src = solid_texture(&device, &queue, 64, [255, 128, 0, 255]);
        let dst = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("blit-test-dst"),
            size: wgpu::Extent3d {
                width: 32,
                height: 32,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let mut blitter = Blitter::new(&device);
        let mut encoder = device.create_command_encoder(&Default::default());
        blitter.blit(
            &device,
            &mut encoder,
            &src.create_view(&Default::default()),
            &dst.create_view(&Default::default()),
            dst.format(),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let texels = read_texture_linear(&device, &queue, &dst).expect("readback");
        assert_eq!(texels.len(), 32 * 32);
        for texel in texels {
            assert!((texel[0] - 1.0).abs() < 0.01);
            assert!((texel[1] - 128.0 / 255.0).abs() < 0.01);
            assert!(texel[2].abs() < 0.01);
        }
        assert_eq!(blitter.pipeline_count(), 1);
    }
}
