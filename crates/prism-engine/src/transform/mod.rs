//! Model/view/projection matrices for the rotating cube.
//!
//! Everything here is a pure function of elapsed seconds and [`TransformParams`].

use glam::{Mat4, Vec3};

use crate::driver::GraphicsDriver;
use crate::program::PipelineProgram;

pub const MODEL_UNIFORM: &str = "model";
pub const VIEW_UNIFORM: &str = "view";
pub const PROJECTION_UNIFORM: &str = "projection";

/// Fixed viewing parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformParams {
    /// Rotation axis of the model. Normalized before use.
    pub axis: Vec3,
    /// Translation applied by the view matrix.
    pub camera_offset: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height. Not updated on resize.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            axis: Vec3::new(1.0, 1.0, 0.0),
            camera_offset: Vec3::new(0.0, 0.0, -3.0),
            fov_y_degrees: 45.0,
            aspect: 800.0 / 600.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransformSet {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl TransformSet {
    /// Computes the three matrices at `elapsed` seconds.
    ///
    /// The model turns about `params.axis` at one radian per second.
    pub fn compute(params: &TransformParams, elapsed: f32) -> Self {
        let model = Mat4::from_axis_angle(params.axis.normalize(), elapsed);
        let view = Mat4::from_translation(params.camera_offset);
        let projection = Mat4::perspective_rh(
            params.fov_y_degrees.to_radians(),
            params.aspect,
            params.near,
            params.far,
        );

        Self {
            model,
            view,
            projection,
        }
    }

    /// Combined clip-from-model matrix, as the vertex stage applies it.
    pub fn clip_from_model(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    /// Uploads all three matrices to `program`.
    pub fn upload(&self, driver: &mut dyn GraphicsDriver, program: &PipelineProgram) {
        program.set_uniform_mat4(driver, MODEL_UNIFORM, &self.model);
        program.set_uniform_mat4(driver, VIEW_UNIFORM, &self.view);
        program.set_uniform_mat4(driver, PROJECTION_UNIFORM, &self.projection);
    }
}
