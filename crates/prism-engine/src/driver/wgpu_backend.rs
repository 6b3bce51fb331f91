use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction, DEPTH_FORMAT};
use crate::paint::Color;

use super::reflect::{self, LinkError, ProgramInterface, StageInterface, UNIFORM_MATRIX_SIZE};
use super::{
    BufferId, BufferTarget, ClearMask, GraphicsDriver, HandleAllocator, PresentStatus, ProgramId,
    ShaderId, ShaderStage, UniformSlot, VertexArrayId, VertexLayout,
};

#[derive(Clone)]
struct CompiledStage {
    interface: StageInterface,
    module: wgpu::ShaderModule,
}

struct ShaderObject {
    stage: ShaderStage,
    compiled: Option<CompiledStage>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    layout: VertexLayout,
    depth: bool,
    format: wgpu::TextureFormat,
}

struct LinkedProgram {
    interface: ProgramInterface,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    bind_group: Option<wgpu::BindGroup>,
    /// Uniform buffers keyed by binding.
    uniform_buffers: HashMap<u32, wgpu::Buffer>,
    /// Pipelines are built on first draw, per vertex layout and target.
    /// `None` records a pipeline wgpu rejected.
    pipelines: HashMap<PipelineKey, Option<wgpu::RenderPipeline>>,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<(ShaderStage, Option<CompiledStage>)>,
    linked: Option<LinkedProgram>,
}

struct BufferObject {
    buffer: wgpu::Buffer,
    target: BufferTarget,
}

#[derive(Debug, Default, Copy, Clone)]
struct VertexArrayObject {
    vertex: Option<(BufferId, VertexLayout)>,
    elements: Option<BufferId>,
}

enum DrawKind {
    Arrays { first: u32, count: u32 },
    Elements { index_buffer: wgpu::Buffer, count: u32 },
}

/// A draw resolved against the state bound when it was issued.
struct DrawCommand {
    pipeline: wgpu::RenderPipeline,
    bind_group: Option<wgpu::BindGroup>,
    vertex_buffer: wgpu::Buffer,
    kind: DrawKind,
}

struct PendingFrame {
    frame: GpuFrame,
    clear: ClearMask,
    draws: Vec<DrawCommand>,
}

/// [`GraphicsDriver`] backed by a wgpu device and a window surface.
///
/// Commands issued between the first clear/draw of a frame and `present` are
/// collected into one render pass:
/// - clears become the pass load ops
/// - each draw captures the pipeline, bind group and buffers bound at issue
///   time, so deleting a program before `present` is safe
/// - uniform uploads go through `Queue::write_buffer` and land at submit
pub struct WgpuDriver {
    gpu: Gpu,
    ids: HandleAllocator,

    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
    /// `None` until the first `buffer_data`.
    buffers: HashMap<BufferId, Option<BufferObject>>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayObject>,

    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,

    depth_test: bool,
    clear_color: Color,

    frame: Option<PendingFrame>,
    /// Acquisition failed this frame; do not retry until `present`.
    frame_unavailable: bool,
    lost: bool,
}

impl WgpuDriver {
    /// Creates the GPU context for `window`.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, init))?;

        Ok(Self {
            gpu,
            ids: HandleAllocator::default(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            current_program: None,
            current_vertex_array: None,
            depth_test: false,
            clear_color: Color::default(),
            frame: None,
            frame_unavailable: false,
            lost: false,
        })
    }

    /// Returns the frame being recorded, acquiring a surface texture if needed.
    fn pending_frame(&mut self) -> Option<&mut PendingFrame> {
        if self.frame.is_none() && !self.frame_unavailable && !self.lost {
            match self.gpu.begin_frame() {
                Ok(frame) => {
                    self.frame = Some(PendingFrame {
                        frame,
                        clear: ClearMask::default(),
                        draws: Vec::new(),
                    });
                }
                Err(err) => {
                    log::debug!("surface acquisition failed: {err}");
                    self.frame_unavailable = true;
                    if self.gpu.handle_surface_error(err) == SurfaceErrorAction::Fatal {
                        log::error!("surface lost; no further frames can be presented");
                        self.lost = true;
                    }
                }
            }
        }
        self.frame.as_mut()
    }

    fn link(
        &self,
        attached: &[(ShaderStage, Option<CompiledStage>)],
    ) -> Result<LinkedProgram, LinkError> {
        let stages: Vec<_> = attached
            .iter()
            .map(|(stage, compiled)| (*stage, compiled.as_ref().map(|c| &c.interface)))
            .collect();
        let interface = reflect::link(&stages)?;

        let module_for = |stage: ShaderStage| {
            attached
                .iter()
                .find(|(s, _)| *s == stage)
                .and_then(|(_, c)| c.as_ref())
                .map(|c| c.module.clone())
                .ok_or(LinkError::MissingStage(stage))
        };
        let vertex_module = module_for(ShaderStage::Vertex)?;
        let fragment_module = module_for(ShaderStage::Fragment)?;

        let device = self.gpu.device();

        let layout_entries: Vec<_> = interface
            .uniforms
            .iter()
            .map(|u| wgpu::BindGroupLayoutEntry {
                binding: u.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_MATRIX_SIZE),
                },
                count: None,
            })
            .collect();

        let uniform_buffers: HashMap<u32, wgpu::Buffer> = interface
            .uniforms
            .iter()
            .map(|u| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("prism uniform matrix"),
                    size: UNIFORM_MATRIX_SIZE,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (u.binding, buffer)
            })
            .collect();

        let (layout, bind_group) = if layout_entries.is_empty() {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism program layout"),
                bind_group_layouts: &[],
                immediate_size: 0,
            });
            (layout, None)
        } else {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("prism uniform bgl"),
                    entries: &layout_entries,
                });

            let entries: Vec<_> = uniform_buffers
                .iter()
                .map(|(binding, buffer)| wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: buffer.as_entire_binding(),
                })
                .collect();

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("prism uniform bind group"),
                layout: &bind_group_layout,
                entries: &entries,
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism program layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });
            (layout, Some(bind_group))
        };

        Ok(LinkedProgram {
            interface,
            vertex_module,
            fragment_module,
            layout,
            bind_group,
            uniform_buffers,
            pipelines: HashMap::new(),
        })
    }

    /// Resolves bound state into a draw command. Errors explain a skipped draw.
    fn resolve_draw(
        &mut self,
        indexed: Option<u32>,
        first: u32,
        count: u32,
    ) -> Result<DrawCommand, &'static str> {
        let vertex_array = self
            .current_vertex_array
            .and_then(|v| self.vertex_arrays.get(&v))
            .copied()
            .ok_or("no vertex array bound")?;
        let (vertex_id, layout) = vertex_array
            .vertex
            .ok_or("vertex array has no vertex buffer")?;
        let vertex = self
            .buffers
            .get(&vertex_id)
            .and_then(Option::as_ref)
            .ok_or("vertex buffer has no storage")?;
        let vertex_buffer = vertex.buffer.clone();

        let kind = match indexed {
            Some(count) => {
                let elements = vertex_array
                    .elements
                    .and_then(|e| self.buffers.get(&e))
                    .and_then(Option::as_ref)
                    .filter(|b| b.target == BufferTarget::ElementArray)
                    .ok_or("vertex array has no element buffer")?;
                if elements.buffer.size() < count as u64 * std::mem::size_of::<u32>() as u64 {
                    return Err("draw range exceeds element buffer");
                }
                DrawKind::Elements {
                    index_buffer: elements.buffer.clone(),
                    count,
                }
            }
            None => {
                let vertices = if layout.stride == 0 {
                    0
                } else {
                    vertex.buffer.size().saturating_sub(layout.offset) / layout.stride
                };
                if first as u64 + count as u64 > vertices {
                    return Err("draw range exceeds vertex buffer");
                }
                DrawKind::Arrays { first, count }
            }
        };

        let key = PipelineKey {
            layout,
            depth: self.depth_test,
            format: self.gpu.surface_format(),
        };

        let program_id = self.current_program.ok_or("no program in use")?;
        let program = self
            .programs
            .get_mut(&program_id)
            .and_then(|p| p.linked.as_mut())
            .ok_or("program is not linked")?;

        if !program.interface.accepts(&layout) {
            return Err("vertex layout does not match program input");
        }
        let format = float_format(layout.components).ok_or("unsupported component count")?;

        if !program.pipelines.contains_key(&key) {
            let device = self.gpu.device();
            let pipeline = validated(device, "pipeline", || {
                create_pipeline(device, program_id, program, key, format)
            });
            program.pipelines.insert(key, pipeline);
        }
        let pipeline = program
            .pipelines
            .get(&key)
            .cloned()
            .flatten()
            .ok_or("pipeline rejected by the device")?;

        Ok(DrawCommand {
            pipeline,
            bind_group: program.bind_group.clone(),
            vertex_buffer,
            kind,
        })
    }

    fn draw(&mut self, indexed: Option<u32>, first: u32, count: u32) {
        if self.pending_frame().is_none() {
            return;
        }

        match self.resolve_draw(indexed, first, count) {
            Ok(cmd) => {
                if let Some(pending) = self.frame.as_mut() {
                    pending.draws.push(cmd);
                }
            }
            Err(reason) => log::debug!("draw skipped: {reason}"),
        }
    }
}

/// Runs `f` inside a validation error scope. A captured error yields `None`.
fn validated<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Option<T> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let out = f();
    match pollster::block_on(scope.pop()) {
        None => Some(out),
        Some(err) => {
            log::debug!("{what} rejected by wgpu: {err}");
            None
        }
    }
}

fn float_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    id: ProgramId,
    program: &LinkedProgram,
    key: PipelineKey,
    format: wgpu::VertexFormat,
) -> wgpu::RenderPipeline {
    log::debug!(
        "building pipeline for program {} ({} components, depth: {})",
        id.raw(),
        key.layout.components,
        key.depth
    );

    let attributes = [wgpu::VertexAttribute {
        format,
        offset: key.layout.offset,
        shader_location: 0,
    }];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("prism program pipeline"),
        layout: Some(&program.layout),

        vertex: wgpu::VertexState {
            module: &program.vertex_module,
            entry_point: Some(program.interface.vertex_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: key.layout.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.fragment_module,
            entry_point: Some(program.interface.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: key.depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    })
}

impl GraphicsDriver for WgpuDriver {
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let shader = self.ids.shader();
        self.shaders.insert(
            shader,
            ShaderObject {
                stage,
                compiled: None,
            },
        );
        shader
    }

    fn compile_shader(&mut self, shader: ShaderId, source: &str) {
        let Some(object) = self.shaders.get_mut(&shader) else { return };

        object.compiled = match reflect::reflect_stage(object.stage, source) {
            Ok(interface) => {
                let device = self.gpu.device();
                validated(device, "shader module", || {
                    device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("prism shader stage"),
                        source: wgpu::ShaderSource::Wgsl(source.into()),
                    })
                })
                .map(|module| CompiledStage { interface, module })
            }
            Err(e) => {
                log::debug!("shader {} failed to compile: {e}", shader.raw());
                None
            }
        };
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> ProgramId {
        let program = self.ids.program();
        self.programs.insert(program, ProgramObject::default());
        program
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        let Some(object) = self.shaders.get(&shader) else { return };
        if let Some(p) = self.programs.get_mut(&program) {
            p.attached.push((object.stage, object.compiled.clone()));
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        let Some(attached) = self.programs.get(&program).map(|p| &p.attached) else { return };

        let linked = match self.link(attached) {
            Ok(linked) => Some(linked),
            Err(e) => {
                log::debug!("program {} failed to link: {e}", program.raw());
                None
            }
        };

        if let Some(p) = self.programs.get_mut(&program) {
            p.linked = linked;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        self.programs
            .get(&program)?
            .linked
            .as_ref()?
            .interface
            .uniform(name)
            .map(|u| UniformSlot {
                program,
                binding: u.binding,
            })
    }

    fn uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]) {
        let buffer = self
            .programs
            .get(&slot.program)
            .and_then(|p| p.linked.as_ref())
            .and_then(|l| l.uniform_buffers.get(&slot.binding));

        if let Some(buffer) = buffer {
            self.gpu
                .queue()
                .write_buffer(buffer, 0, bytemuck::cast_slice(value.as_slice()));
        }
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let vertex_array = self.ids.vertex_array();
        self.vertex_arrays
            .insert(vertex_array, VertexArrayObject::default());
        vertex_array
    }

    fn create_buffer(&mut self) -> BufferId {
        let buffer = self.ids.buffer();
        self.buffers.insert(buffer, None);
        buffer
    }

    fn buffer_data(&mut self, buffer: BufferId, target: BufferTarget, data: &[u8]) {
        let Some(slot) = self.buffers.get_mut(&buffer) else { return };

        let usage = match target {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::ElementArray => wgpu::BufferUsages::INDEX,
        };

        let gpu_buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match target {
                    BufferTarget::Array => "prism vertex buffer",
                    BufferTarget::ElementArray => "prism index buffer",
                }),
                contents: data,
                usage,
            });

        *slot = Some(BufferObject {
            buffer: gpu_buffer,
            target,
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
    }

    fn element_buffer(&mut self, vertex_array: VertexArrayId, buffer: BufferId) {
        if let Some(v) = self.vertex_arrays.get_mut(&vertex_array) {
            v.elements = Some(buffer);
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.current_vertex_array = vertex_array;
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_arrays.remove(&vertex_array);
        if self.current_vertex_array == Some(vertex_array) {
            self.current_vertex_array = None;
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
        self.gpu.enable_depth();
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn clear(&mut self, mask: ClearMask) {
        let Some(pending) = self.pending_frame() else { return };

        if !pending.draws.is_empty() {
            log::debug!("clear after draws in the same frame is ignored");
            return;
        }
        pending.clear.color |= mask.color;
        pending.clear.depth |= mask.depth;
    }

    fn set_viewport(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.draw(None, first, count);
    }

    fn draw_elements(&mut self, count: u32) {
        self.draw(Some(count), 0, count);
    }

    fn present(&mut self) -> PresentStatus {
        self.frame_unavailable = false;

        let Some(PendingFrame {
            mut frame,
            clear,
            draws,
        }) = self.frame.take()
        else {
            return if self.lost {
                PresentStatus::Lost
            } else {
                PresentStatus::Skipped
            };
        };

        {
            let depth_stencil_attachment = self
                .gpu
                .depth_view()
                .filter(|_| self.depth_test)
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if clear.depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("prism frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear.color {
                            wgpu::LoadOp::Clear(self.clear_color.to_wgpu())
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &draws {
                rpass.set_pipeline(&draw.pipeline);
                if let Some(bind_group) = &draw.bind_group {
                    rpass.set_bind_group(0, bind_group, &[]);
                }
                rpass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));

                match &draw.kind {
                    DrawKind::Arrays { first, count } => {
                        rpass.draw(*first..first + count, 0..1);
                    }
                    DrawKind::Elements {
                        index_buffer,
                        count,
                    } => {
                        rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(0..*count, 0, 0..1);
                    }
                }
            }
        }

        self.gpu.submit(frame);
        PresentStatus::Presented
    }
}
