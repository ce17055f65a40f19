//! Scene binding: the light list and active camera the effect reads each frame.

use godrays_lighting::SceneLight;

use crate::camera::Camera;
use crate::error::GodRaysError;

/// Read-only view of the host scene.
///
/// Passed to the compositor every frame so light indices are resolved
/// against the light list as it is *now*, not as it was at construction.
pub trait LightScene {
    /// Number of lights currently in the scene.
    fn light_count(&self) -> usize;

    /// Light at `index`, if present.
    fn light(&self, index: usize) -> Option<&SceneLight>;

    /// Camera the frame is rendered from.
    fn active_camera(&self) -> &Camera;
}

/// A plain in-memory scene.
#[derive(Debug, Clone, Default)]
pub struct BasicScene {
    pub lights: Vec<SceneLight>,
    pub camera: Camera,
}

impl BasicScene {
    pub fn new(camera: Camera) -> Self {
        Self {
            lights: Vec::new(),
            camera,
        }
    }

    /// Append a light, returning its index.
    pub fn add_light(&mut self, light: SceneLight) -> u32 {
        self.lights.push(light);
        (self.lights.len() - 1) as u32
    }
}

impl LightScene for BasicScene {
    fn light_count(&self) -> usize {
        self.lights.len()
    }

    fn light(&self, index: usize) -> Option<&SceneLight> {
        self.lights.get(index)
    }

    fn active_camera(&self) -> &Camera {
        &self.camera
    }
}

/// Resolve a light index against the scene's current light list.
pub fn resolve_light(scene: &dyn LightScene, index: u32) -> Result<&SceneLight, GodRaysError> {
    scene
        .light(index as usize)
        .ok_or(GodRaysError::InvalidLightReference {
            index,
            count: scene.light_count(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use godrays_lighting::{DirectionalLight, PointLight};

    fn two_light_scene() -> BasicScene {
        let mut scene = BasicScene::default();
        scene.add_light(SceneLight::directional("sun", DirectionalLight::default()));
        scene.add_light(SceneLight::point("lamp", PointLight::default()));
        scene
    }

    #[test]
    fn test_resolve_existing_light() {
        let scene = two_light_scene();
        let light = resolve_light(&scene, 1).expect("index 1 exists");
        assert_eq!(light.name, "lamp");
    }

    #[test]
    fn test_resolve_out_of_range_light() {
        let scene = two_light_scene();
        match resolve_light(&scene, 5) {
            Err(GodRaysError::InvalidLightReference { index, count }) => {
                assert_eq!(index, 5);
                assert_eq!(count, 2);
            }
            other => panic!("expected InvalidLightReference, got {other:?}"),
        }
    }

    #[test]
    fn test_resolution_follows_current_list() {
        let mut scene = two_light_scene();
        assert!(resolve_light(&scene, 1).is_ok());
        scene.lights.truncate(1);
        assert!(resolve_light(&scene, 1).is_err());
    }
}
