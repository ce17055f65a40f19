//! GPU-side light description shared by every light kind.

use bytemuck::{Pod, Zeroable};

/// Light sub-structure of the god ray settings block, 32 bytes, std140-compatible.
///
/// Mirrors the WGSL struct:
/// ```wgsl
/// struct LightData {
///     anchor: vec4<f32>,
///     color_intensity: vec4<f32>,
/// };
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightShadingData {
    /// Homogeneous world-space anchor: `w = 1` for positions, `w = 0` for
    /// directions toward a light at infinity.
    pub anchor: [f32; 4],
    /// xyz = color (linear RGB), w = intensity.
    pub color_intensity: [f32; 4],
}

impl LightShadingData {
    /// Whether the anchor is a point at infinity.
    pub fn is_directional(&self) -> bool {
        self.anchor[3] == 0.0
    }

    /// Anchor as a glam vector.
    pub fn anchor_vec4(&self) -> glam::Vec4 {
        glam::Vec4::from_array(self.anchor)
    }

    /// Linear RGB color without intensity.
    pub fn color(&self) -> glam::Vec3 {
        glam::Vec3::new(
            self.color_intensity[0],
            self.color_intensity[1],
            self.color_intensity[2],
        )
    }
}
