//! Full-screen pass helpers shared by every stage of the effect.
//!
//! Every stage draws a single oversized triangle generated from the vertex
//! index, so no vertex buffers are involved. [`read_texture_linear`] copies a
//! render target back to the CPU for tests and the demo's PNG output.

use crate::error::{GodRaysError, Precondition};

/// Full-screen triangle vertex stage. Concatenated in front of each stage's
/// fragment source.
pub const FULLSCREEN_VERTEX_SOURCE: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}
"#;

/// Additive color blend, standard alpha-over for the alpha channel.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Create a full-screen render pipeline with the given fragment entry point.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

/// Record one full-screen draw into `target_view`.
pub fn run_fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    bind_groups: &[&wgpu::BindGroup],
    target_view: &wgpu::TextureView,
    load_op: wgpu::LoadOp<wgpu::Color>,
    label: &str,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: load_op,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    pass.set_pipeline(pipeline);
    for (index, bind_group) in bind_groups.iter().enumerate() {
        pass.set_bind_group(index as u32, *bind_group, &[]);
    }
    pass.draw(0..3, 0..1);
}

/// Whether `format` can be sampled with a filtering sampler without extra features.
pub fn is_filterable_color(format: wgpu::TextureFormat) -> bool {
    !format.is_depth_stencil_format()
        && format
            .guaranteed_format_features(wgpu::Features::empty())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
}

/// Whether `format` can be used as a color render target with blending.
pub fn is_blendable_target(format: wgpu::TextureFormat) -> bool {
    let features = format.guaranteed_format_features(wgpu::Features::empty());
    !format.is_depth_stencil_format()
        && features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        && features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
}

fn readback_texel_size(format: wgpu::TextureFormat) -> Option<u32> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Some(4),
        wgpu::TextureFormat::Rgba16Float => Some(8),
        wgpu::TextureFormat::Rgba32Float => Some(16),
        _ => None,
    }
}

fn decode_texel(format: wgpu::TextureFormat, bytes: &[u8]) -> [f32; 4] {
    match format {
        wgpu::TextureFormat::Rgba16Float => {
            let mut out = [0.0; 4];
            for (channel, chunk) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *channel = half::f16::from_le_bytes([chunk[0], chunk[1]]).to_f32();
            }
            out
        }
        wgpu::TextureFormat::Rgba32Float => {
            let mut out = [0.0; 4];
            for (channel, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *channel = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            out
        }
        // 8-bit formats; sRGB views are returned as stored.
        _ => [
            f32::from(bytes[0]) / 255.0,
            f32::from(bytes[1]) / 255.0,
            f32::from(bytes[2]) / 255.0,
            f32::from(bytes[3]) / 255.0,
        ],
    }
}

/// Copy a color texture to the CPU and decode it to linear RGBA floats.
///
/// Submits its own command buffer and blocks until the copy completes. The
/// texture needs `COPY_SRC` usage. Rows are returned top to bottom.
pub fn read_texture_linear(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<[f32; 4]>, GodRaysError> {
    let format = texture.format();
    let texel_size = readback_texel_size(format).ok_or(Precondition::UnsupportedFormat {
        input: "readback",
        format,
    })?;
    let w = texture.width();
    let h = texture.height();
    let unpadded = w * texel_size;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("godrays-readback"),
        size: u64::from(padded * h),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("godrays-readback-encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(h),
            },
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| GodRaysError::Readback(e.to_string()))?;
    receiver
        .recv()
        .map_err(|e| GodRaysError::Readback(e.to_string()))?
        .map_err(|e| GodRaysError::Readback(e.to_string()))?;

    let data = slice.get_mapped_range();
    let mut texels = Vec::with_capacity((w * h) as usize);
    for row in data.chunks(padded as usize).take(h as usize) {
        for texel in row[..unpadded as usize].chunks_exact(texel_size as usize) {
            texels.push(decode_texel(format, texel));
        }
    }
    drop(data);
    buffer.unmap();

    log::trace!("Read back {w}x{h} {format:?} texture");
    Ok(texels)
}
