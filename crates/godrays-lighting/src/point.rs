//! Point light: a localized source with a world-space position.

use crate::shading::LightShadingData;

/// CPU-side point light descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    /// Position in world coordinates.
    pub position: glam::Vec3,
    /// Linear RGB color.
    pub color: glam::Vec3,
    /// Luminous intensity.
    pub intensity: f32,
    /// Maximum radius of effect. Beyond this distance, direct contribution is zero.
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: glam::Vec3::ZERO,
            color: glam::Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
        }
    }
}

impl PointLight {
    /// Build the shading sub-structure bound into the effect's settings block.
    pub fn to_shading_data(&self) -> LightShadingData {
        LightShadingData {
            anchor: [self.position.x, self.position.y, self.position.z, 1.0],
            color_intensity: [self.color.x, self.color.y, self.color.z, self.intensity],
        }
    }
}
