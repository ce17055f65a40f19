//! Bright-pass extraction: isolates pixels whose luminance reaches a threshold.

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::error::GodRaysError;
use crate::gpu::with_error_scope;
use crate::pass::{FULLSCREEN_VERTEX_SOURCE, create_fullscreen_pipeline, run_fullscreen_pass};

/// Rec. 709 luma weights.
pub const LUMINANCE_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Relative luminance of a linear RGB color.
pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMINANCE_WEIGHTS[0] + rgb[1] * LUMINANCE_WEIGHTS[1] + rgb[2] * LUMINANCE_WEIGHTS[2]
}

/// CPU form of the per-pixel bright-pass rule.
///
/// Pixels at or above `threshold` pass through unchanged; everything else
/// becomes `floor`.
pub fn bright_pass_pixel(color: [f32; 4], threshold: f32, floor: [f32; 4]) -> [f32; 4] {
    if luminance([color[0], color[1], color[2]]) >= threshold {
        color
    } else {
        floor
    }
}

/// A filtered image produced by a [`PassFilter`], owned by the filter and
/// reused frame to frame.
pub struct FilterResult {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// The image a filter reads from.
#[derive(Clone, Copy)]
pub struct FilterInput<'a> {
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// A stage producing a same-size image that isolates above-threshold luminance.
pub trait PassFilter {
    fn threshold(&self) -> f32;

    /// Change the threshold. Takes effect on the next `execute` without
    /// recreating GPU resources.
    fn set_threshold(&mut self, threshold: f32);

    /// Record the filter into `encoder` and return its result.
    fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        input: FilterInput<'_>,
    ) -> Result<&FilterResult, GodRaysError>;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct BrightPassParams {
    threshold: f32,
    _pad: [f32; 3],
    floor: [f32; 4],
}

const BRIGHT_PASS_FRAGMENT_SOURCE: &str = r#"
struct BrightPassParams {
    threshold: f32,
    floor: vec4<f32>,
};

@group(0) @binding(0) var<uniform> params: BrightPassParams;
@group(0) @binding(1) var src_texture: texture_2d<f32>;

@fragment
fn fs_bright_pass(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureLoad(src_texture, vec2<i32>(in.position.xy), 0);
    let lum = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    return select(params.floor, color, lum >= params.threshold);
}
"#;

/// Threshold filter run on the working buffer.
pub struct BrightPassFilter {
    threshold: f32,
    floor: [f32; 4],
    params_dirty: bool,
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    params_buffer: wgpu::Buffer,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
    result: Option<FilterResult>,
}

impl BrightPassFilter {
    pub fn new(device: &wgpu::Device, threshold: f32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("godrays-bright-pass-shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_SOURCE}{BRIGHT_PASS_FRAGMENT_SOURCE}").into(),
            ),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("godrays-bright-pass-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<BrightPassParams>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("godrays-bright-pass-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("godrays-bright-pass-params"),
            size: std::mem::size_of::<BrightPassParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            threshold,
            floor: [0.0; 4],
            params_dirty: true,
            shader,
            bind_group_layout,
            pipeline_layout,
            params_buffer,
            pipelines: FxHashMap::default(),
            result: None,
        }
    }

    /// Value written for pixels below the threshold.
    pub fn floor(&self) -> [f32; 4] {
        self.floor
    }

    pub fn set_floor(&mut self, floor: [f32; 4]) {
        if self.floor != floor {
            self.floor = floor;
            self.params_dirty = true;
        }
    }

    /// The most recent result, if the filter has run.
    pub fn result(&self) -> Option<&FilterResult> {
        self.result.as_ref()
    }

    fn params(&self) -> BrightPassParams {
        BrightPassParams {
            threshold: self.threshold,
            _pad: [0.0; 3],
            floor: self.floor,
        }
    }

    fn ensure_result(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<(), GodRaysError> {
        let matches = self
            .result
            .as_ref()
            .is_some_and(|r| r.width == width && r.height == height && r.format == format);
        if matches {
            return Ok(());
        }

        log::debug!("Allocating {width}x{height} {format:?} bright-pass target");
        self.result = None;
        let texture = with_error_scope(device, "bright-pass target", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("godrays-bright-pass-target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.result = Some(FilterResult {
            texture,
            view,
            width,
            height,
            format,
        });
        Ok(())
    }
}

impl PassFilter for BrightPassFilter {
    fn threshold(&self) -> f32 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: f32) {
        if self.threshold != threshold {
            self.threshold = threshold;
            self.params_dirty = true;
        }
    }

    fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        input: FilterInput<'_>,
    ) -> Result<&FilterResult, GodRaysError> {
        self.ensure_result(device, input.width, input.height, input.format)?;

        if self.params_dirty {
            queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params()));
            self.params_dirty = false;
        }

        let format = input.format;
        let pipeline = self.pipelines.entry(format).or_insert_with(|| {
            create_fullscreen_pipeline(
                device,
                &self.shader,
                &self.pipeline_layout,
                "fs_bright_pass",
                format,
                None,
                "godrays-bright-pass",
            )
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("godrays-bright-pass-bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input.view),
                },
            ],
        });

        let result = self.result.as_ref().ok_or(GodRaysError::ResourceAllocation {
            what: "bright-pass target",
            message: "target missing after allocation".to_string(),
        })?;
        run_fullscreen_pass(
            encoder,
            pipeline,
            &[&bind_group],
            &result.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "godrays-bright-pass",
        );
        Ok(result)
    }
}
