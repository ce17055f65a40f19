//! Sampleable scene depth buffers.
//!
//! Depth formats cannot be written from buffers, so [`DepthBuffer::from_values`]
//! uploads the values into a float texture and draws them through
//! `@builtin(frag_depth)`.

use crate::error::GodRaysError;
use crate::gpu::with_error_scope;
use crate::pass::FULLSCREEN_VERTEX_SOURCE;

const WRITE_DEPTH_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var depth_values: texture_2d<f32>;

@fragment
fn fs_write_depth(in: VertexOutput) -> @builtin(frag_depth) f32 {
    return textureLoad(depth_values, vec2<i32>(in.position.xy), 0).r;
}
"#;

/// Depth of the far plane under the given convention.
pub fn far_plane_depth(reverse_z: bool) -> f32 {
    if reverse_z { 0.0 } else { 1.0 }
}

/// A depth texture the effect can sample.
pub struct DepthBuffer {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl DepthBuffer {
    /// 32-bit float depth.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Reverse-Z clear value: 0.0 represents the far plane.
    pub const CLEAR_VALUE: f32 = 0.0;

    /// Create an uninitialized depth buffer.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, GodRaysError> {
        let texture = with_error_scope(device, "depth buffer", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("godrays-depth"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    /// Create a depth buffer holding `values`, row-major, top row first.
    ///
    /// Submits its own command buffer.
    pub fn from_values(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        values: &[f32],
    ) -> Result<Self, GodRaysError> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(GodRaysError::InvalidParameter {
                name: "depth values",
                reason: format!("expected {expected} values, got {}", values.len()),
            });
        }

        let depth = Self::new(device, width, height)?;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let staging = with_error_scope(device, "depth staging texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("godrays-depth-staging"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R32Float,
                usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        queue.write_texture(
            staging.as_image_copy(),
            bytemuck::cast_slice(values),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("godrays-write-depth"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_SOURCE}{WRITE_DEPTH_FRAGMENT_SOURCE}").into(),
            ),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("godrays-write-depth-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("godrays-write-depth-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("godrays-write-depth"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Self::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_write_depth"),
                targets: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        let staging_view = staging.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("godrays-write-depth-bg"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&staging_view),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("godrays-write-depth-encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("godrays-write-depth"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(Self::CLEAR_VALUE),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));

        log::debug!("Uploaded {width}x{height} depth buffer");
        Ok(depth)
    }

    /// Fill a buffer with one depth value.
    pub fn filled(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        value: f32,
    ) -> Result<Self, GodRaysError> {
        let values = vec![value; width as usize * height as usize];
        Self::from_values(device, queue, width, height, &values)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
