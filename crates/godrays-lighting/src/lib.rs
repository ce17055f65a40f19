//! Scene light descriptions consumed by the light-shaft effect.

mod directional;
mod point;
mod shading;

pub use directional::DirectionalLight;
pub use point::PointLight;
pub use shading::LightShadingData;

/// A named light as stored in a scene's light list.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLight {
    /// Display name, used by editing surfaces to label the light selector.
    pub name: String,
    /// Light kind and its parameters.
    pub kind: LightKind,
}

/// The light kinds a scene can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light (sun, moon).
    Directional(DirectionalLight),
    /// Positioned light.
    Point(PointLight),
}

impl SceneLight {
    /// Create a named directional light.
    pub fn directional(name: impl Into<String>, light: DirectionalLight) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Directional(light),
        }
    }

    /// Create a named point light.
    pub fn point(name: impl Into<String>, light: PointLight) -> Self {
        Self {
            name: name.into(),
            kind: LightKind::Point(light),
        }
    }

    /// Shading data written into the effect's settings block.
    pub fn shading_data(&self) -> LightShadingData {
        match &self.kind {
            LightKind::Directional(light) => light.to_shading_data(),
            LightKind::Point(light) => light.to_shading_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_light_dispatches_to_kind() {
        let sun = SceneLight::directional("sun", DirectionalLight::default());
        let lamp = SceneLight::point("lamp", PointLight::default());
        assert!(sun.shading_data().is_directional());
        assert!(!lamp.shading_data().is_directional());
        assert_eq!(lamp.name, "lamp");
    }
}
