use std::collections::HashMap;

use winit::dpi::PhysicalSize;

use crate::paint::Color;

use super::reflect::{self, ProgramInterface, StageInterface};
use super::{
    BufferId, BufferTarget, ClearMask, GraphicsDriver, HandleAllocator, PresentStatus, ProgramId,
    ShaderId, ShaderStage, UniformSlot, VertexArrayId, VertexLayout,
};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    CreateShader { shader: ShaderId, stage: ShaderStage },
    CompileShader { shader: ShaderId, compiled: bool },
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    AttachShader { program: ProgramId, shader: ShaderId },
    LinkProgram { program: ProgramId, linked: bool },
    UseProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),
    UniformLocation { program: ProgramId, name: String, found: bool },
    UniformMatrix4 { slot: UniformSlot, value: [f32; 16] },
    CreateVertexArray(VertexArrayId),
    CreateBuffer(BufferId),
    BufferData { buffer: BufferId, target: BufferTarget, len: usize },
    VertexAttribLayout { vertex_array: VertexArrayId, buffer: BufferId, layout: VertexLayout },
    ElementBuffer { vertex_array: VertexArrayId, buffer: BufferId },
    BindVertexArray(Option<VertexArrayId>),
    DeleteVertexArray(VertexArrayId),
    DeleteBuffer(BufferId),
    EnableDepthTest,
    SetClearColor(Color),
    Clear(ClearMask),
    SetViewport(PhysicalSize<u32>),
    DrawArrays { first: u32, count: u32 },
    DrawElements { count: u32 },
    /// A draw call that was dropped because bound state could not satisfy it.
    DrawSkipped(&'static str),
    Present,
}

struct ShaderRecord {
    stage: ShaderStage,
    interface: Option<StageInterface>,
}

#[derive(Default)]
struct ProgramRecord {
    attached: Vec<(ShaderStage, Option<StageInterface>)>,
    linked: Option<ProgramInterface>,
    uniforms: HashMap<u32, [f32; 16]>,
}

struct BufferRecord {
    target: Option<BufferTarget>,
    data: Vec<u8>,
}

#[derive(Default)]
struct VertexArrayRecord {
    vertex: Option<(BufferId, VertexLayout)>,
    elements: Option<BufferId>,
}

/// Headless [`GraphicsDriver`] that records every call.
///
/// Stage compilation and linking share [`reflect`] with the wgpu driver, so a
/// program that would be inert on the GPU is inert here too. Draws are checked
/// against bound state the way the wgpu driver checks them, and a clear issued
/// after a draw in the same frame is dropped. Nothing is rasterized.
///
/// Every call is kept until the driver is dropped.
pub struct RecordingDriver {
    ids: HandleAllocator,
    calls: Vec<DriverCall>,
    /// A draw was issued since the last `present`.
    drawn: bool,

    shaders: HashMap<ShaderId, ShaderRecord>,
    programs: HashMap<ProgramId, ProgramRecord>,
    buffers: HashMap<BufferId, BufferRecord>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayRecord>,

    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,

    depth_test: bool,
    clear_color: Color,
    present_status: PresentStatus,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            ids: HandleAllocator::default(),
            calls: Vec::new(),
            drawn: false,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            current_program: None,
            current_vertex_array: None,
            depth_test: false,
            clear_color: Color::default(),
            present_status: PresentStatus::Presented,
        }
    }

    /// All calls in issue order.
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Calls grouped per frame; each group ends with its `Present`.
    ///
    /// Calls after the last `Present` (setup or teardown) are not included.
    pub fn frames(&self) -> Vec<&[DriverCall]> {
        self.calls
            .split_inclusive(|c| *c == DriverCall::Present)
            .filter(|group| group.last() == Some(&DriverCall::Present))
            .collect()
    }

    /// Stages, programs, buffers and vertex arrays not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.shaders.len() + self.programs.len() + self.buffers.len() + self.vertex_arrays.len()
    }

    /// Bytes last uploaded to `buffer`.
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Target `buffer` was last filled for.
    pub fn buffer_target(&self, buffer: BufferId) -> Option<BufferTarget> {
        self.buffers.get(&buffer).and_then(|b| b.target)
    }

    /// Last matrix uploaded to the uniform `name` of `program`.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<[f32; 16]> {
        let record = self.programs.get(&program)?;
        let binding = record.linked.as_ref()?.uniform(name)?.binding;
        record.uniforms.get(&binding).copied()
    }

    /// Whether `program` linked successfully.
    pub fn is_linked(&self, program: ProgramId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|p| p.linked.is_some())
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    /// Status returned by every subsequent `present`.
    pub fn set_present_status(&mut self, status: PresentStatus) {
        self.present_status = status;
    }

    fn record(&mut self, call: DriverCall) {
        log::trace!("driver call: {call:?}");
        self.calls.push(call);
    }

    /// Checks bound state for a draw; returns the element buffer and vertex count.
    fn draw_state(&self) -> Result<(Option<BufferId>, usize), &'static str> {
        let program = self
            .current_program
            .and_then(|p| self.programs.get(&p))
            .ok_or("no program in use")?;
        let interface = program.linked.as_ref().ok_or("program is not linked")?;

        let vertex_array = self
            .current_vertex_array
            .and_then(|v| self.vertex_arrays.get(&v))
            .ok_or("no vertex array bound")?;
        let (buffer, layout) = vertex_array.vertex.ok_or("vertex array has no vertex buffer")?;
        let data = self.buffers.get(&buffer).ok_or("vertex buffer was deleted")?;

        if !interface.accepts(&layout) {
            return Err("vertex layout does not match program input");
        }

        let vertex_count = if layout.stride == 0 {
            0
        } else {
            (data.data.len() as u64).saturating_sub(layout.offset) / layout.stride
        };

        Ok((vertex_array.elements, vertex_count as usize))
    }
}

impl GraphicsDriver for RecordingDriver {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let shader = self.ids.shader();
        self.shaders.insert(
            shader,
            ShaderRecord {
                stage,
                interface: None,
            },
        );
        self.record(DriverCall::CreateShader { shader, stage });
        shader
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) {
        let compiled = match self.shaders.get_mut(&shader) {
            Some(record) => match reflect::reflect_stage(record.stage, source) {
                Ok(interface) => {
                    record.interface = Some(interface);
                    true
                }
                Err(e) => {
                    log::debug!("shader {shader:?} failed to compile: {e}");
                    record.interface = None;
                    false
                }
            },
            None => false,
        };
        self.record(DriverCall::CompileShader { shader, compiled });
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.record(DriverCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> ProgramId {
        let program = self.ids.program();
        self.programs.insert(program, ProgramRecord::default());
        self.record(DriverCall::CreateProgram(program));
        program
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let (Some(p), Some(s)) = (self.programs.get_mut(&program), self.shaders.get(&shader)) {
            p.attached.push((s.stage, s.interface.clone()));
        }
        self.record(DriverCall::AttachShader { program, shader });
    }

    fn link_program(&mut self, program: ProgramId) {
        let linked = match self.programs.get_mut(&program) {
            Some(p) => {
                let stages: Vec<_> = p.attached.iter().map(|(s, i)| (*s, i.as_ref())).collect();
                match reflect::link(&stages) {
                    Ok(interface) => {
                        p.linked = Some(interface);
                        true
                    }
                    Err(e) => {
                        log::debug!("program {program:?} failed to link: {e}");
                        p.linked = None;
                        false
                    }
                }
            }
            None => false,
        };
        self.record(DriverCall::LinkProgram { program, linked });
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.record(DriverCall::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.record(DriverCall::DeleteProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        let slot = self
            .programs
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .and_then(|i| i.uniform(name))
            .map(|u| UniformSlot {
                program,
                binding: u.binding,
            });
        self.record(DriverCall::UniformLocation {
            program,
            name: name.to_string(),
            found: slot.is_some(),
        });
        slot
    }

    fn uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        if let Some(p) = self.programs.get_mut(&slot.program) {
            p.uniforms.insert(slot.binding, *value);
        }
        self.record(DriverCall::UniformMatrix4 {
            slot,
            value: *value,
        });
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let vertex_array = self.ids.vertex_array();
        self.vertex_arrays
            .insert(vertex_array, VertexArrayRecord::default());
        self.record(DriverCall::CreateVertexArray(vertex_array));
        vertex_array
    }

    fn create_buffer(&mut self) -> BufferId {
        let buffer = self.ids.buffer();
        self.buffers.insert(
            buffer,
            BufferRecord {
                target: None,
                data: Vec::new(),
            },
        );
        self.record(DriverCall::CreateBuffer(buffer));
        buffer
    }

    fn buffer_data(&mut self, buffer: BufferId, target: BufferTarget, data: &[u8]) {
        if let Some(b) = self.buffers.get_mut(&buffer) {
            b.target = Some(target);
            b.data = data.to_vec();
        }
        self.record(DriverCall::BufferData {
            buffer,
            target,
            len: data.len(),
        });
    }

    fn vertex_attrib_layout(
        &mut self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
        layout: VertexLayout,
    ) {
        if let Some(v) = self.vertex_arrays.get_mut(&vertex_array) {
            v.vertex = Some((buffer, layout));
        }
        self.record(DriverCall::VertexAttribLayout {
            vertex_array,
            buffer,
            layout,
        });
    }

    fn element_buffer(&mut self, vertex_array: VertexArrayId, buffer: BufferId) {
        if let Some(v) = self.vertex_arrays.get_mut(&vertex_array) {
            v.elements = Some(buffer);
        }
        self.record(DriverCall::ElementBuffer {
            vertex_array,
            buffer,
        });
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.current_vertex_array = vertex_array;
        self.record(DriverCall::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
        self.record(DriverCall::DeleteVertexArray(vertex_array));
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.record(DriverCall::DeleteBuffer(buffer));
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
        self.record(DriverCall::EnableDepthTest);
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
        self.record(DriverCall::SetClearColor(color));
    }

    fn clear(&mut self, mask: ClearMask) {
        if self.drawn {
            log::debug!("clear after draws in the same frame is ignored");
            return;
        }
        self.record(DriverCall::Clear(mask));
    }

    fn set_viewport(&mut self, size: PhysicalSize<u32>) {
        self.record(DriverCall::SetViewport(size));
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        let call = match self.draw_state() {
            Ok((_, vertices)) if first as usize + count as usize > vertices => {
                DriverCall::DrawSkipped("draw range exceeds vertex buffer")
            }
            Ok(_) => DriverCall::DrawArrays { first, count },
            Err(reason) => DriverCall::DrawSkipped(reason),
        };
        self.drawn |= matches!(call, DriverCall::DrawArrays { .. });
        self.record(call);
    }

    fn draw_elements(&mut self, count: u32) {
        let call = match self.draw_state() {
            Ok((Some(elements), _)) => match self.buffers.get(&elements) {
                Some(b) if b.target != Some(BufferTarget::ElementArray) => {
                    DriverCall::DrawSkipped("vertex array has no element buffer")
                }
                Some(b) if b.data.len() >= count as usize * std::mem::size_of::<u32>() => {
                    DriverCall::DrawElements { count }
                }
                Some(_) => DriverCall::DrawSkipped("draw range exceeds element buffer"),
                None => DriverCall::DrawSkipped("element buffer was deleted"),
            },
            Ok((None, _)) => DriverCall::DrawSkipped("vertex array has no element buffer"),
            Err(reason) => DriverCall::DrawSkipped(reason),
        };
        self.drawn |= matches!(call, DriverCall::DrawElements { .. });
        self.record(call);
    }

    fn present(&mut self) -> PresentStatus {
        self.drawn = false;
        self.record(DriverCall::Present);
        self.present_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ShaderSource;

    fn linked_quad_program(driver: &mut RecordingDriver) -> ProgramId {
        let src = ShaderSource::quad();
        let vs = driver.create_shader(ShaderStage::Vertex);
        driver.compile_shader(vs, &src.vertex);
        let fs = driver.create_shader(ShaderStage::Fragment);
        driver.compile_shader(fs, &src.fragment);
        let program = driver.create_program();
        driver.attach_shader(program, vs);
        driver.attach_shader(program, fs);
        driver.link_program(program);
        driver.delete_shader(vs);
        driver.delete_shader(fs);
        program
    }

    #[test]
    fn stages_can_be_deleted_after_link() {
        let mut driver = RecordingDriver::new();
        let program = linked_quad_program(&mut driver);
        assert!(driver.is_linked(program));
        assert_eq!(driver.live_objects(), 1);
    }

    #[test]
    fn deleting_twice_is_a_no_op() {
        let mut driver = RecordingDriver::new();
        let program = linked_quad_program(&mut driver);
        driver.delete_program(program);
        driver.delete_program(program);
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn draw_without_program_is_skipped() {
        let mut driver = RecordingDriver::new();
        driver.draw_arrays(0, 3);
        assert_eq!(
            driver.calls().last(),
            Some(&DriverCall::DrawSkipped("no program in use"))
        );
    }

    #[test]
    fn draw_with_mismatched_layout_is_skipped() {
        let mut driver = RecordingDriver::new();
        let program = linked_quad_program(&mut driver);
        let vao = driver.create_vertex_array();
        let vbo = driver.create_buffer();
        driver.buffer_data(vbo, BufferTarget::Array, &[0u8; 36]);
        driver.vertex_attrib_layout(vao, vbo, VertexLayout::tightly_packed(3));
        driver.use_program(Some(program));
        driver.bind_vertex_array(Some(vao));
        driver.draw_arrays(0, 3);
        assert_eq!(
            driver.calls().last(),
            Some(&DriverCall::DrawSkipped(
                "vertex layout does not match program input"
            ))
        );
    }

    #[test]
    fn frames_split_on_present() {
        let mut driver = RecordingDriver::new();
        driver.clear(ClearMask::COLOR);
        driver.present();
        driver.clear(ClearMask::COLOR);
        driver.present();
        driver.clear(ClearMask::COLOR);
        let frames = driver.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], &[DriverCall::Clear(ClearMask::COLOR), DriverCall::Present]);
    }

    fn bound_quad(driver: &mut RecordingDriver, element_target: BufferTarget) {
        let program = linked_quad_program(driver);
        let vao = driver.create_vertex_array();
        let vbo = driver.create_buffer();
        driver.buffer_data(vbo, BufferTarget::Array, &[0u8; 32]);
        driver.vertex_attrib_layout(vao, vbo, VertexLayout::tightly_packed(2));
        let ebo = driver.create_buffer();
        driver.buffer_data(ebo, element_target, &[0u8; 24]);
        driver.element_buffer(vao, ebo);
        driver.use_program(Some(program));
        driver.bind_vertex_array(Some(vao));
    }

    #[test]
    fn element_draw_needs_an_element_array_buffer() {
        let mut driver = RecordingDriver::new();
        bound_quad(&mut driver, BufferTarget::Array);
        driver.draw_elements(6);
        assert_eq!(
            driver.calls().last(),
            Some(&DriverCall::DrawSkipped("vertex array has no element buffer"))
        );
    }

    #[test]
    fn clear_after_draw_is_dropped_until_present() {
        let mut driver = RecordingDriver::new();
        bound_quad(&mut driver, BufferTarget::ElementArray);
        driver.clear(ClearMask::COLOR);
        driver.draw_elements(6);
        driver.clear(ClearMask::COLOR);
        driver.present();
        driver.clear(ClearMask::COLOR);
        assert_eq!(driver.count(|c| *c == DriverCall::Clear(ClearMask::COLOR)), 2);
        assert_eq!(driver.frames()[0].last(), Some(&DriverCall::Present));
        assert_eq!(driver.count(|c| *c == DriverCall::DrawElements { count: 6 }), 1);
    }
}
