//! Per-frame transforms built with three matrix stacks.

use std::f32::consts::TAU;

use corelib::{CoreResult, Mat4, MatrixStack, Vec3, vec3};

/// Frames per full turn of the mesh.
pub const ROTATION_PERIOD_FRAMES: u32 = 200;

pub const FOV_Y_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.01;
pub const Z_FAR: f32 = 100.0;

/// Where the mesh sits in front of the camera.
pub const MODEL_OFFSET: Vec3 = vec3(0.0, 0.0, 5.0);

/// Rotation about +Y for a frame number, in radians.
pub fn rotation_for_frame(frame: u32) -> f32 {
    let t = (frame % ROTATION_PERIOD_FRAMES) as f32 / ROTATION_PERIOD_FRAMES as f32;
    t * TAU
}

/// Matrices captured for upload as `P`, `V` and `MV`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTransforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub model_view: Mat4,
}

/// Projection, view and model-view stacks, reused across frames.
#[derive(Debug, Default)]
pub struct FrameStacks {
    projection: MatrixStack,
    view: MatrixStack,
    model_view: MatrixStack,
}

impl FrameStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build this frame's transforms. Every push is matched by a pop, so the
    /// stacks end at their base.
    pub fn build(&mut self, frame: u32, aspect: f32) -> CoreResult<FrameTransforms> {
        self.projection.reset();
        self.view.reset();
        self.model_view.reset();

        let p = &mut self.projection;
        p.push_matrix()?;
        p.perspective(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        let projection = p.top_matrix();

        let v = &mut self.view;
        v.push_matrix()?;
        v.load_identity();
        v.look_at(Vec3::ZERO, vec3(0.0, 0.0, 1.0), Vec3::Y);
        let view = v.top_matrix();
        v.pop_matrix()?;

        let mv = &mut self.model_view;
        mv.push_matrix()?;
        mv.load_identity();
        mv.translate(MODEL_OFFSET);
        mv.rotate(rotation_for_frame(frame), Vec3::Y);
        let model_view = mv.top_matrix();
        mv.pop_matrix()?;

        p.pop_matrix()?;

        Ok(FrameTransforms {
            projection,
            view,
            model_view,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.projection.depth() == 0 && self.view.depth() == 0 && self.model_view.depth() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::Vec4;

    #[test]
    fn rotation_wraps_every_period() {
        assert_eq!(rotation_for_frame(0), 0.0);
        assert_eq!(rotation_for_frame(ROTATION_PERIOD_FRAMES), 0.0);
        assert!((rotation_for_frame(50) - TAU / 4.0).abs() < 1e-6);
        assert_eq!(rotation_for_frame(7), rotation_for_frame(207));
    }

    #[test]
    fn first_frame_places_mesh_in_front_of_camera() {
        let mut stacks = FrameStacks::new();
        let t = stacks.build(0, 640.0 / 480.0).unwrap();

        assert_eq!(t.model_view, Mat4::from_translation(MODEL_OFFSET));
        assert_eq!(t.view, Mat4::from_diagonal(Vec4::new(-1.0, 1.0, -1.0, 1.0)));
        assert_eq!(
            t.projection,
            Mat4::perspective_rh_gl(45f32.to_radians(), 640.0 / 480.0, Z_NEAR, Z_FAR)
        );

        // The mesh origin lands inside the clip volume.
        let clip = t.projection * t.view * t.model_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn model_view_spins_about_y() {
        let mut stacks = FrameStacks::new();
        let t = stacks.build(50, 1.0).unwrap();
        let expected = Mat4::from_translation(MODEL_OFFSET) * Mat4::from_rotation_y(TAU / 4.0);
        let (a, b) = (t.model_view.to_cols_array(), expected.to_cols_array());
        for i in 0..16 {
            assert!((a[i] - b[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn stacks_are_balanced_after_every_frame() {
        let mut stacks = FrameStacks::new();
        for frame in 0..(ROTATION_PERIOD_FRAMES * 2) {
            stacks.build(frame, 1.5).unwrap();
            assert!(stacks.is_balanced());
        }
    }
}
