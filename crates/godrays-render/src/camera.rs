//! Camera for view and projection matrix generation, and light-anchor projection.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// The scene's active camera as seen by the light-shaft effect.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Position in world space.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Projection parameters.
    pub projection: Projection,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
    /// Map the near plane to depth 1 and the far plane to depth 0.
    pub reverse_z: bool,
}

/// Projection type for the camera.
#[derive(Debug, Clone)]
pub enum Projection {
    /// Perspective projection for 3D scenes.
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        /// Width / height.
        aspect_ratio: f32,
    },
    /// Orthographic projection.
    Orthographic {
        /// Half-width of the view volume in world units.
        half_width: f32,
        /// Half-height of the view volume in world units.
        half_height: f32,
    },
}

/// A light anchor projected into the destination image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedLight {
    /// Texture coordinates, origin top-left. May lie outside `[0, 1]`.
    pub uv: Vec2,
    /// Normalized device depth of the anchor.
    pub depth: f32,
}

impl Camera {
    /// Build a camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        Self {
            position: eye,
            rotation,
            ..Self::default()
        }
    }

    /// Compute the view matrix (inverse of camera transform).
    pub fn view_matrix(&self) -> Mat4 {
        (Mat4::from_translation(self.position) * Mat4::from_quat(self.rotation)).inverse()
    }

    /// Compute the projection matrix, honoring [`Camera::reverse_z`].
    pub fn projection_matrix(&self) -> Mat4 {
        // Reverse-Z is obtained by swapping near and far.
        let (z_near, z_far) = if self.reverse_z {
            (self.far, self.near)
        } else {
            (self.near, self.far)
        };
        match &self.projection {
            Projection::Perspective {
                fov_y,
                aspect_ratio,
            } => Mat4::perspective_rh(*fov_y, *aspect_ratio, z_near, z_far),
            Projection::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_rh(
                -*half_width,
                *half_width,
                -*half_height,
                *half_height,
                z_near,
                z_far,
            ),
        }
    }

    /// Compute the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// The forward direction vector (-Z in camera space).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Update the aspect ratio for perspective projection.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        if let Projection::Perspective { aspect_ratio, .. } = &mut self.projection {
            *aspect_ratio = width / height;
        }
    }

    /// Project a homogeneous light anchor through this camera.
    pub fn project_anchor(&self, anchor: Vec4) -> Option<ProjectedLight> {
        project_anchor(self.view_projection_matrix(), anchor)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_4,
                aspect_ratio: 16.0 / 9.0,
            },
            near: 0.1,
            far: 1000.0,
            reverse_z: true,
        }
    }
}

/// Project a homogeneous anchor (`w = 1` point, `w = 0` direction) into uv space.
///
/// Returns `None` when the anchor lies behind the camera; the accumulation
/// kernel contributes nothing in that case.
pub fn project_anchor(view_proj: Mat4, anchor: Vec4) -> Option<ProjectedLight> {
    let clip = view_proj * anchor;
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(ProjectedLight {
        uv: Vec2::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5),
        depth: ndc.z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_camera_looks_down_neg_z() {
        let forward = Camera::default().forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_point_in_front_projects_to_center() {
        let camera = Camera::default();
        let projected = camera
            .project_anchor(Vec4::new(0.0, 0.0, -10.0, 1.0))
            .expect("point in front of camera");
        assert!((projected.uv - Vec2::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn test_point_behind_camera_is_culled() {
        let camera = Camera::default();
        assert!(camera.project_anchor(Vec4::new(0.0, 0.0, 10.0, 1.0)).is_none());
    }

    #[test]
    fn test_directional_anchor_projects_to_vanishing_point() {
        let camera = Camera::default();
        let projected = camera
            .project_anchor(Vec4::new(0.0, 0.0, -1.0, 0.0))
            .expect("direction ahead of camera");
        assert!((projected.uv - Vec2::splat(0.5)).length() < 1e-5);
        let behind = camera.project_anchor(Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert!(behind.is_none());
    }

    #[test]
    fn test_up_is_top_of_image() {
        let camera = Camera::default();
        let projected = camera
            .project_anchor(Vec4::new(0.0, 1.0, -10.0, 1.0))
            .expect("visible");
        assert!(projected.uv.y < 0.5, "uv origin is top-left: {projected:?}");
    }

    #[test]
    fn test_reverse_z_maps_near_to_one() {
        let camera = Camera::default();
        let near = camera
            .project_anchor(Vec4::new(0.0, 0.0, -camera.near, 1.0))
            .expect("visible");
        let far = camera
            .project_anchor(Vec4::new(0.0, 0.0, -camera.far, 1.0))
            .expect("visible");
        assert!((near.depth - 1.0).abs() < 1e-4);
        assert!(far.depth.abs() < 1e-4);
    }

    #[test]
    fn test_standard_z_maps_near_to_zero() {
        let camera = Camera {
            reverse_z: false,
            ..Camera::default()
        };
        let near = camera
            .project_anchor(Vec4::new(0.0, 0.0, -camera.near, 1.0))
            .expect("visible");
        assert!(near.depth.abs() < 1e-4);
    }

    #[test]
    fn test_look_at_faces_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let forward = camera.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5, "{forward:?}");
        let projected = camera.project_anchor(Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(projected.is_some());
    }

    #[test]
    fn test_set_aspect_ratio() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(800.0, 600.0);
        if let Projection::Perspective { aspect_ratio, .. } = camera.projection {
            assert!((aspect_ratio - 4.0 / 3.0).abs() < 1e-6);
        } else {
            panic!("expected perspective projection");
        }
    }
}
