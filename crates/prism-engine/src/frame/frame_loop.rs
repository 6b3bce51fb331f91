use crate::driver::{GraphicsDriver, PresentStatus};
use crate::geometry::{GeometryBuffer, GeometryError};
use crate::program::PipelineProgram;
use crate::time::FrameClock;
use crate::transform::TransformSet;
use crate::window::WindowHost;

use super::{FrameLoopConfig, Variant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Close was requested or the surface is gone. Terminal.
    Closing,
}

/// Counters collected while the loop runs.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames that reached the screen.
    pub presented: u64,
    /// Frames rendered but not shown (surface busy or reconfigured).
    pub skipped: u64,
    /// Sum of clamped frame deltas, in seconds.
    pub frame_seconds: f64,
}

impl FrameStats {
    /// Mean seconds between presented frames.
    pub fn mean_frame_seconds(&self) -> Option<f64> {
        (self.presented > 0).then(|| self.frame_seconds / self.presented as f64)
    }
}

pub struct FrameLoop {
    config: FrameLoopConfig,
    geometry: GeometryBuffer,
    /// Program kept for the whole run, unless one is built per frame.
    program: Option<PipelineProgram>,
    state: LoopState,
    clock: FrameClock,
    stats: FrameStats,
}

impl FrameLoop {
    /// Uploads geometry and, unless rebuilt per frame, builds the program.
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        config: FrameLoopConfig,
    ) -> Result<Self, GeometryError> {
        let mesh = config.variant.mesh()?;

        driver.set_clear_color(config.clear_color);
        if config.variant.uses_depth() {
            driver.enable_depth_test();
        }

        let geometry = GeometryBuffer::build(driver, &mesh);
        let program = (!config.rebuilds_program_per_frame())
            .then(|| PipelineProgram::compile(driver, &config.shaders));

        log::info!(
            "frame loop ready: {:?}, program {}",
            config.variant,
            if program.is_some() {
                "built once"
            } else {
                "rebuilt every frame"
            }
        );

        Ok(Self {
            config,
            geometry,
            program,
            state: LoopState::Running,
            clock: FrameClock::new(),
            stats: FrameStats::default(),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Runs one iteration, or moves to [`LoopState::Closing`] if close was requested.
    pub fn step(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        host: &mut dyn WindowHost,
    ) -> LoopState {
        if self.state == LoopState::Closing {
            return self.state;
        }
        if host.close_requested() {
            log::debug!("close requested, leaving the frame loop");
            self.state = LoopState::Closing;
            return self.state;
        }

        if let Some(size) = host.take_resize() {
            log::debug!("resize to {}x{}", size.width, size.height);
            driver.set_viewport(size);
        }

        driver.clear(self.config.variant.clear_mask());

        let frame_program = self
            .program
            .is_none()
            .then(|| PipelineProgram::compile(driver, &self.config.shaders));

        if let Some(program) = frame_program.as_ref().or(self.program.as_ref()) {
            program.activate(driver);

            if self.config.variant == Variant::Cube {
                let elapsed = host.time() as f32;
                TransformSet::compute(&self.config.transform, elapsed).upload(driver, program);
            }

            self.geometry.bind(driver);
            self.geometry.draw(driver);
        }

        let status = driver.present();
        host.poll_events();

        if let Some(program) = frame_program {
            program.delete(driver);
        }

        match status {
            PresentStatus::Presented => {
                let time = self.clock.tick();
                self.stats.presented += 1;
                self.stats.frame_seconds += f64::from(time.dt);
                log::trace!("frame {} presented, dt {:.4}s", time.frame_index, time.dt);
            }
            PresentStatus::Skipped => self.stats.skipped += 1,
            PresentStatus::Lost => {
                log::error!("surface lost, closing");
                self.state = LoopState::Closing;
            }
        }

        self.state
    }

    /// Steps until closing, then releases everything.
    pub fn run(
        mut self,
        driver: &mut dyn GraphicsDriver,
        host: &mut dyn WindowHost,
    ) -> FrameStats {
        while self.step(driver, host) == LoopState::Running {}
        self.shutdown(driver)
    }

    /// Releases the geometry and any persistent program.
    pub fn shutdown(self, driver: &mut dyn GraphicsDriver) -> FrameStats {
        if let Some(program) = self.program {
            program.delete(driver);
        }
        self.geometry.release(driver);

        log::info!(
            "frame loop finished: {} frames presented, {} skipped, {:.1}s",
            self.stats.presented,
            self.stats.skipped,
            self.clock.elapsed()
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ClearMask, DriverCall, ProgramId, RecordingDriver};
    use crate::program::ShaderSource;
    use crate::transform::TransformParams;
    use crate::window::ScriptedHost;
    use glam::Mat4;
    use winit::dpi::PhysicalSize;

    fn run(config: FrameLoopConfig, mut host: ScriptedHost) -> (RecordingDriver, FrameStats) {
        let mut driver = RecordingDriver::new();
        let frame_loop = FrameLoop::new(&mut driver, config).unwrap();
        let stats = frame_loop.run(&mut driver, &mut host);
        (driver, stats)
    }

    fn index_of(frame: &[DriverCall], pred: impl Fn(&DriverCall) -> bool) -> usize {
        frame.iter().position(pred).unwrap()
    }

    #[derive(Debug, PartialEq)]
    enum Lifecycle {
        Create(ProgramId),
        Present,
        Delete(ProgramId),
    }

    fn lifecycle(driver: &RecordingDriver) -> Vec<Lifecycle> {
        driver
            .calls()
            .iter()
            .filter_map(|c| match c {
                DriverCall::CreateProgram(p) => Some(Lifecycle::Create(*p)),
                DriverCall::DeleteProgram(p) => Some(Lifecycle::Delete(*p)),
                DriverCall::Present => Some(Lifecycle::Present),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn cube_builds_and_deletes_a_program_every_frame() {
        let (driver, stats) = run(FrameLoopConfig::cube(), ScriptedHost::closing_after(4));
        assert_eq!(stats.presented, 4);

        let events = lifecycle(&driver);
        assert_eq!(events.len(), 12);
        for frame in events.chunks_exact(3) {
            match frame {
                [Lifecycle::Create(a), Lifecycle::Present, Lifecycle::Delete(b)] => {
                    assert_eq!(a, b)
                }
                other => panic!("unexpected frame lifecycle: {other:?}"),
            }
        }
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn cube_frame_order() {
        let (driver, _) = run(FrameLoopConfig::cube(), ScriptedHost::closing_after(2));
        let first = driver.frames()[0];

        let clear = index_of(first, |c| *c == DriverCall::Clear(ClearMask::COLOR_DEPTH));
        let create = index_of(first, |c| matches!(c, DriverCall::CreateProgram(_)));
        let activate = index_of(first, |c| matches!(c, DriverCall::UseProgram(Some(_))));
        let upload = index_of(first, |c| matches!(c, DriverCall::UniformMatrix4 { .. }));
        let bind = index_of(first, |c| matches!(c, DriverCall::BindVertexArray(Some(_))));
        let draw = index_of(first, |c| *c == DriverCall::DrawArrays { first: 0, count: 36 });

        assert!(clear < create);
        assert!(create < activate);
        assert!(activate < upload);
        assert!(upload < bind);
        assert!(bind < draw);
        assert_eq!(
            first
                .iter()
                .filter(|c| matches!(c, DriverCall::UniformMatrix4 { .. }))
                .count(),
            3
        );
        assert!(driver.depth_test_enabled());
    }

    #[test]
    fn cube_model_follows_host_time() {
        let mut driver = RecordingDriver::new();
        let mut frame_loop = FrameLoop::new(&mut driver, FrameLoopConfig {
            persistent_program: true,
            ..FrameLoopConfig::cube()
        })
        .unwrap();
        let mut host = ScriptedHost::closing_after(2).stepping(0.0, 0.25);

        frame_loop.step(&mut driver, &mut host);
        let program = driver
            .calls()
            .iter()
            .find_map(|c| match c {
                DriverCall::CreateProgram(p) => Some(*p),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            driver.uniform_value(program, "model"),
            Some(Mat4::IDENTITY.to_cols_array())
        );

        frame_loop.step(&mut driver, &mut host);
        let expected = TransformSet::compute(&TransformParams::default(), 0.25).model;
        assert_eq!(
            driver.uniform_value(program, "model"),
            Some(expected.to_cols_array())
        );

        assert_eq!(frame_loop.step(&mut driver, &mut host), LoopState::Closing);
        frame_loop.shutdown(&mut driver);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn persistent_cube_program_is_built_once() {
        let config = FrameLoopConfig {
            persistent_program: true,
            ..FrameLoopConfig::cube()
        };
        let (driver, stats) = run(config, ScriptedHost::closing_after(5));
        assert_eq!(stats.presented, 5);
        assert_eq!(driver.count(|c| matches!(c, DriverCall::CreateProgram(_))), 1);
        assert_eq!(driver.count(|c| matches!(c, DriverCall::DeleteProgram(_))), 1);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn quad_draws_six_indices_per_frame_with_one_program() {
        let (driver, stats) = run(FrameLoopConfig::quad(), ScriptedHost::closing_after(3));
        assert_eq!(stats.presented, 3);

        let frames = driver.frames();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            let draws: Vec<_> = frame
                .iter()
                .filter(|c| {
                    matches!(
                        c,
                        DriverCall::DrawElements { .. }
                            | DriverCall::DrawArrays { .. }
                            | DriverCall::DrawSkipped(_)
                    )
                })
                .collect();
            assert_eq!(draws, [&DriverCall::DrawElements { count: 6 }]);
            assert!(frame.contains(&DriverCall::Clear(ClearMask::COLOR)));
            assert!(!frame.iter().any(|c| matches!(c, DriverCall::UniformLocation { .. })));
        }

        assert_eq!(driver.count(|c| matches!(c, DriverCall::CreateProgram(_))), 1);
        assert!(!driver.depth_test_enabled());
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn broken_shader_degrades_silently() {
        let config = FrameLoopConfig {
            shaders: ShaderSource::new("@vertex fn vs_main( {", ShaderSource::cube().fragment),
            ..FrameLoopConfig::cube()
        };
        let (driver, stats) = run(config, ScriptedHost::closing_after(3));

        assert_eq!(stats.presented, 3);
        assert_eq!(
            driver.count(|c| *c == DriverCall::DrawSkipped("program is not linked")),
            3
        );
        assert_eq!(driver.count(|c| matches!(c, DriverCall::UniformMatrix4 { .. })), 0);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn closed_window_renders_nothing() {
        let (driver, stats) = run(FrameLoopConfig::quad(), ScriptedHost::closing_after(0));
        assert_eq!(stats.presented, 0);
        assert!(driver.frames().is_empty());
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn lost_surface_closes_the_loop() {
        let mut driver = RecordingDriver::new();
        driver.set_present_status(PresentStatus::Lost);
        let mut host = ScriptedHost::closing_after(100);
        let frame_loop = FrameLoop::new(&mut driver, FrameLoopConfig::cube()).unwrap();

        let stats = frame_loop.run(&mut driver, &mut host);
        assert_eq!(host.polls(), 1);
        assert_eq!(stats.presented, 0);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn skipped_presents_are_counted() {
        let mut driver = RecordingDriver::new();
        driver.set_present_status(PresentStatus::Skipped);
        let mut host = ScriptedHost::closing_after(2);
        let stats = FrameLoop::new(&mut driver, FrameLoopConfig::quad())
            .unwrap()
            .run(&mut driver, &mut host);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.mean_frame_seconds(), None);
    }

    #[test]
    fn resize_reaches_the_driver_on_the_next_frame() {
        let size = PhysicalSize::new(1024, 768);
        let (driver, _) = run(
            FrameLoopConfig::quad(),
            ScriptedHost::closing_after(3).resize_at(1, size),
        );
        let frames = driver.frames();
        assert!(!frames[0].contains(&DriverCall::SetViewport(size)));
        assert!(frames[1].contains(&DriverCall::SetViewport(size)));
        assert_eq!(driver.count(|c| matches!(c, DriverCall::SetViewport(_))), 1);
    }

    #[test]
    fn clear_color_is_applied_at_startup() {
        let config = FrameLoopConfig {
            clear_color: crate::paint::Color::rgba(0.2, 0.3, 0.3, 1.0),
            ..FrameLoopConfig::quad()
        };
        let (driver, _) = run(config, ScriptedHost::closing_after(1));
        assert_eq!(driver.clear_color(), crate::paint::Color::rgba(0.2, 0.3, 0.3, 1.0));
    }
}
