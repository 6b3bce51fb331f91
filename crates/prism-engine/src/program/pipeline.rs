use glam::Mat4;

use crate::driver::{GraphicsDriver, ProgramId, ShaderStage};

use super::ShaderSource;

/// A linked vertex + fragment program.
///
/// Compilation and link failures are not surfaced: the program still exists,
/// but every draw issued with it is dropped by the driver.
#[derive(Debug)]
pub struct PipelineProgram {
    id: ProgramId,
}

impl PipelineProgram {
    /// Compiles both stages, links them and releases the stage objects.
    pub fn compile(driver: &mut dyn GraphicsDriver, source: &ShaderSource) -> Self {
        let vertex = driver.create_shader(ShaderStage::Vertex);
        driver.compile_shader(vertex, &source.vertex);

        let fragment = driver.create_shader(ShaderStage::Fragment);
        driver.compile_shader(fragment, &source.fragment);

        let id = driver.create_program();
        driver.attach_shader(id, vertex);
        driver.attach_shader(id, fragment);
        driver.link_program(id);

        // Stages are only needed until link.
        driver.delete_shader(vertex);
        driver.delete_shader(fragment);

        Self { id }
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Makes this program current for subsequent draws.
    pub fn activate(&self, driver: &mut dyn GraphicsDriver) {
        driver.use_program(Some(self.id));
    }

    /// Uploads `value` to the `mat4x4<f32>` uniform `name`.
    ///
    /// Unknown names are ignored.
    pub fn set_uniform_mat4(&self, driver: &mut dyn GraphicsDriver, name: &str, value: &Mat4) {
        match driver.uniform_location(self.id, name) {
            Some(slot) => driver.uniform_matrix4(slot, &value.to_cols_array()),
            None => log::trace!("uniform `{name}` not found in {:?}", self.id),
        }
    }

    /// Releases the program object.
    pub fn delete(self, driver: &mut dyn GraphicsDriver) {
        driver.delete_program(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, RecordingDriver};

    #[test]
    fn compile_leaves_only_the_program_alive() {
        let mut driver = RecordingDriver::new();
        let program = PipelineProgram::compile(&mut driver, &ShaderSource::cube());
        assert!(driver.is_linked(program.id()));
        assert_eq!(driver.live_objects(), 1);
        program.delete(&mut driver);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn uniform_upload_is_column_major() {
        let mut driver = RecordingDriver::new();
        let program = PipelineProgram::compile(&mut driver, &ShaderSource::cube());
        let m = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, -3.0));
        program.set_uniform_mat4(&mut driver, "view", &m);
        let uploaded = driver.uniform_value(program.id(), "view").unwrap();
        assert_eq!(uploaded[14], -3.0);
        assert_eq!(uploaded[15], 1.0);
    }

    #[test]
    fn unknown_uniform_is_ignored() {
        let mut driver = RecordingDriver::new();
        let program = PipelineProgram::compile(&mut driver, &ShaderSource::cube());
        program.set_uniform_mat4(&mut driver, "normal", &Mat4::IDENTITY);
        assert_eq!(
            driver.count(|c| matches!(c, DriverCall::UniformMatrix4 { .. })),
            0
        );
    }

    #[test]
    fn uniforms_on_an_unlinked_program_are_ignored() {
        let mut driver = RecordingDriver::new();
        let broken = ShaderSource::new("fn vs_main( {", ShaderSource::cube().fragment);
        let program = PipelineProgram::compile(&mut driver, &broken);
        assert!(!driver.is_linked(program.id()));
        program.set_uniform_mat4(&mut driver, "model", &Mat4::IDENTITY);
        assert_eq!(
            driver.count(|c| matches!(c, DriverCall::UniformMatrix4 { .. })),
            0
        );
        assert_eq!(driver.live_objects(), 1);
    }

    #[test]
    fn stage_mismatch_fails_link_silently() {
        let mut driver = RecordingDriver::new();
        let mixed = ShaderSource::new(ShaderSource::quad().fragment, ShaderSource::quad().fragment);
        let program = PipelineProgram::compile(&mut driver, &mixed);
        assert!(driver.calls().contains(&DriverCall::LinkProgram {
            program: program.id(),
            linked: false,
        }));
    }
}
