//! Directional light: an infinitely distant, sun-like source.
//!
//! A directional light has no position, so its screen-space anchor is the
//! vanishing point of the direction toward the light. [`LightShadingData`]
//! encodes that as a homogeneous vector with `w = 0`.

use crate::shading::LightShadingData;

/// CPU-side directional light description.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Normalized direction vector pointing FROM the light (toward the surface).
    pub direction: glam::Vec3,
    /// Linear RGB color of the light (not premultiplied by intensity).
    pub color: glam::Vec3,
    /// Scalar intensity multiplier. Physical range is `[0.0, ..)`.
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: glam::Vec3::new(0.0, -1.0, 0.0),
            // Warm white, approximating D65 daylight.
            color: glam::Vec3::new(1.0, 0.96, 0.90),
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// Set the light direction, normalizing the input.
    ///
    /// # Panics
    ///
    /// Panics if the input vector has near-zero length.
    pub fn set_direction(&mut self, dir: glam::Vec3) {
        let len = dir.length();
        assert!(len > 1e-6, "directional light direction must not be zero");
        self.direction = dir / len;
    }

    /// Unit vector pointing from the scene toward the light.
    pub fn toward_light(&self) -> glam::Vec3 {
        -self.direction.normalize_or_zero()
    }

    /// Build the shading sub-structure bound into the effect's settings block.
    pub fn to_shading_data(&self) -> LightShadingData {
        let toward = self.toward_light();
        LightShadingData {
            anchor: [toward.x, toward.y, toward.z, 0.0],
            color_intensity: [self.color.x, self.color.y, self.color.z, self.intensity],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_direction_normalizes() {
        let mut light = DirectionalLight::default();
        light.set_direction(glam::Vec3::new(3.0, -4.0, 0.0));
        let len = light.direction.length();
        assert!(
            (len - 1.0).abs() < 1e-6,
            "set_direction must normalize, got {len}"
        );
    }

    #[test]
    #[should_panic(expected = "must not be zero")]
    fn test_zero_direction_panics() {
        let mut light = DirectionalLight::default();
        light.set_direction(glam::Vec3::ZERO);
    }

    #[test]
    fn test_anchor_points_toward_light_at_infinity() {
        let light = DirectionalLight {
            direction: glam::Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        let data = light.to_shading_data();
        assert_eq!(data.anchor, [0.0, 0.0, -1.0, 0.0]);
    }

    #[test]
    fn test_to_shading_data_packs_color_and_intensity() {
        let light = DirectionalLight {
            direction: glam::Vec3::new(0.0, -1.0, 0.0),
            color: glam::Vec3::new(1.0, 0.5, 0.25),
            intensity: 2.0,
        };
        let data = light.to_shading_data();
        assert_eq!(data.color_intensity, [1.0, 0.5, 0.25, 2.0]);
        assert!((data.anchor[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_sun_color_is_warm_white() {
        let light = DirectionalLight::default();
        assert!(light.color.x >= light.color.y, "R should be >= G");
        assert!(light.color.y >= light.color.z, "G should be >= B");
    }
}
