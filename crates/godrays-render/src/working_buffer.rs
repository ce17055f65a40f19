//! Downsampled working buffer and its reallocation policy.
//!
//! The effect runs its bright pass and accumulation against a reduced copy
//! of the source color. Halving the resolution keeps the accumulation cheap;
//! the 256-texel floor keeps small viewports from degenerating into a
//! handful of texels.

use crate::error::GodRaysError;
use crate::gpu::with_error_scope;

/// Smallest working-buffer height, and the base of the width floor.
pub const MIN_WORKING_DIMENSION: u32 = 256;

/// Size of the working buffer for a `width` x `height` source.
///
/// `height = max(H / 2, 256)`, `width = max(W / 2, floor(256 * W / H))`,
/// each then capped at `max_dimension`.
pub fn working_extent(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let aspect = width as f64 / height.max(1) as f64;
    let min_width = (MIN_WORKING_DIMENSION as f64 * aspect).floor() as u32;
    let w = (width / 2).max(min_width).clamp(1, max_dimension);
    let h = (height / 2).max(MIN_WORKING_DIMENSION).clamp(1, max_dimension);
    (w, h)
}

/// Identity of a working buffer: any difference forces reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingBufferDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl WorkingBufferDesc {
    /// Descriptor required for a source of the given size and format.
    pub fn for_source(
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        max_dimension: u32,
    ) -> Self {
        let (width, height) = working_extent(width, height, max_dimension);
        Self {
            width,
            height,
            format,
        }
    }
}

/// The GPU render target the source color is downsampled into.
pub struct WorkingBuffer {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub desc: WorkingBufferDesc,
}

impl WorkingBuffer {
    fn create(device: &wgpu::Device, desc: WorkingBufferDesc) -> Result<Self, GodRaysError> {
        let texture = with_error_scope(device, "working buffer", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("godrays-working-buffer"),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            desc,
        })
    }
}

/// Owns the working buffer and decides when it must be recreated.
pub struct ResourceCache {
    working: Option<WorkingBuffer>,
    max_dimension: u32,
    allocations: u32,
}

impl ResourceCache {
    pub fn new(device: &wgpu::Device) -> Self {
        Self::with_max_dimension(device.limits().max_texture_dimension_2d)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            working: None,
            max_dimension,
            allocations: 0,
        }
    }

    /// Whether a source of this size and format requires a new working buffer.
    pub fn needs_rebuild(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> bool {
        let desc = WorkingBufferDesc::for_source(width, height, format, self.max_dimension);
        self.working.as_ref().map(|buffer| buffer.desc) != Some(desc)
    }

    /// Return a working buffer matching the source, recreating it when the
    /// required size or format differs from the current one.
    pub fn ensure_working_buffer(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<&WorkingBuffer, GodRaysError> {
        let desc = WorkingBufferDesc::for_source(width, height, format, self.max_dimension);
        if self.working.as_ref().map(|buffer| buffer.desc) != Some(desc) {
            log::info!(
                "Allocating {}x{} {:?} working buffer for {}x{} source",
                desc.width,
                desc.height,
                desc.format,
                width,
                height
            );
            // Release the old buffer before allocating the new one.
            self.working = None;
            self.working = Some(WorkingBuffer::create(device, desc)?);
            self.allocations += 1;
        }
        self.working.as_ref().ok_or(GodRaysError::ResourceAllocation {
            what: "working buffer",
            message: "working buffer missing after allocation".to_string(),
        })
    }

    /// Current working buffer, if one was allocated.
    pub fn working_buffer(&self) -> Option<&WorkingBuffer> {
        self.working.as_ref()
    }

    /// Number of times a working buffer has been allocated.
    pub fn allocation_count(&self) -> u32 {
        self.allocations
    }

    /// Release the working buffer. The next frame reallocates it.
    pub fn release(&mut self) {
        self.working = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::create_test_device_queue;

    const MAX: u32 = 8192;

    #[test]
    fn test_full_hd_halves() {
        assert_eq!(working_extent(1920, 1080, MAX), (960, 540));
    }

    #[test]
    fn test_small_source_clamps_to_minimum() {
        // 400x300: height floor 256, width floor floor(256 * 4/3) = 341.
        assert_eq!(working_extent(400, 300, MAX), (341, 256));
    }

    #[test]
    fn test_tall_source_keeps_half_width() {
        // 600x2000: half width 300 beats floor(256 * 0.3) = 76.
        assert_eq!(working_extent(600, 2000, MAX), (300, 1000));
    }

    #[test]
    fn test_extent_is_capped_by_device_limit() {
        assert_eq!(working_extent(16384, 16384, MAX), (8192, 8192));
        assert_eq!(working_extent(16384, 16384, 4096), (4096, 4096));
    }

    #[test]
    fn test_needs_rebuild_without_buffer() {
        let cache = ResourceCache::with_max_dimension(MAX);
        assert!(cache.needs_rebuild(1920, 1080, wgpu::TextureFormat::Rgba16Float));
        assert_eq!(cache.allocation_count(), 0);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut cache = ResourceCache::new(&device);
        let format = wgpu::TextureFormat::Rgba16Float;
        let desc = cache
            .ensure_working_buffer(&device, 1920, 1080, format)
            .expect("allocation")
            .desc;
        assert_eq!((desc.width, desc.height), (960, 540));
        cache
            .ensure_working_buffer(&device, 1920, 1080, format)
            .expect("reuse");
        assert_eq!(cache.allocation_count(), 1);
        assert!(!cache.needs_rebuild(1920, 1080, format));
    }

    #[test]
    fn test_size_or_format_change_recreates() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut cache = ResourceCache::new(&device);
        cache
            .ensure_working_buffer(&device, 1920, 1080, wgpu::TextureFormat::Rgba16Float)
            .expect("first");
        assert!(cache.needs_rebuild(1280, 720, wgpu::TextureFormat::Rgba16Float));
        cache
            .ensure_working_buffer(&device, 1280, 720, wgpu::TextureFormat::Rgba16Float)
            .expect("resize");
        assert_eq!(cache.allocation_count(), 2);

        assert!(cache.needs_rebuild(1280, 720, wgpu::TextureFormat::Rgba8Unorm));
        let buffer = cache
            .ensure_working_buffer(&device, 1280, 720, wgpu::TextureFormat::Rgba8Unorm)
            .expect("reformat");
        assert_eq!(buffer.texture.format(), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(cache.allocation_count(), 3);
    }

    #[test]
    fn test_source_change_with_same_working_size_reuses() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut cache = ResourceCache::new(&device);
        let format = wgpu::TextureFormat::Rgba8Unorm;
        // Both sources halve to a 300x1000 working buffer.
        cache.ensure_working_buffer(&device, 600, 2000, format).expect("first");
        cache.ensure_working_buffer(&device, 601, 2000, format).expect("second");
        assert_eq!(cache.allocation_count(), 1);
    }

    #[test]
    fn test_release_forces_reallocation() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let mut cache = ResourceCache::new(&device);
        let format = wgpu::TextureFormat::Rgba8Unorm;
        cache.ensure_working_buffer(&device, 640, 480, format).expect("first");
        cache.release();
        assert!(cache.working_buffer().is_none());
        cache.ensure_working_buffer(&device, 640, 480, format).expect("second");
        assert_eq!(cache.allocation_count(), 2);
    }
}
