//! WGSL stage reflection and link checks.
//!
//! Both drivers compile stages through here so that a program links (or stays
//! inert) identically with or without a GPU.

use thiserror::Error;

use super::{ShaderStage, VertexLayout};

/// Uniform matrices are the only uniform kind programs expose.
pub const UNIFORM_MATRIX_SIZE: u64 = 64;

/// Why a stage failed to compile. Logged, never returned to callers.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("WGSL parse error:\n{0}")]
    Parse(String),
    #[error("WGSL validation error: {0}")]
    Validation(String),
    #[error("no {0:?} entry point")]
    MissingEntryPoint(ShaderStage),
}

/// Why a program failed to link. Logged, never returned to callers.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("no {0:?} stage attached")]
    MissingStage(ShaderStage),
    #[error("more than one {0:?} stage attached")]
    DuplicateStage(ShaderStage),
    #[error("attached {0:?} stage did not compile")]
    InvalidStage(ShaderStage),
    #[error("fragment input at location {0} is not written by the vertex stage")]
    InterfaceMismatch(u32),
    #[error("uniform `{0}` does not agree on its binding across stages")]
    UniformConflict(String),
    #[error("uniform `{0}` is not a mat4x4<f32> in group 0")]
    UnsupportedUniform(String),
    #[error("resource `{0}` is not a uniform matrix")]
    UnsupportedResource(String),
    #[error("vertex input at location {0} is not a float position at location 0")]
    UnsupportedInput(u32),
    #[error("fragment stage must write a single vec4<f32> at location 0")]
    UnsupportedOutput,
}

/// Scalar type plus component count of a stage input/output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VaryingType {
    pub scalar: naga::Scalar,
    pub components: u32,
}

/// A `@location(n)` input or output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StageVarying {
    pub location: u32,
    pub ty: VaryingType,
}

/// A `var<uniform>` global.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    is_mat4: bool,
}

/// Everything the linker needs to know about one compiled stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInterface {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<StageVarying>,
    pub outputs: Vec<StageVarying>,
    pub uniforms: Vec<UniformBinding>,
    /// Bound globals outside the uniform address space.
    pub resources: Vec<String>,
}

/// The interface of a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Uniform slots, sorted by binding.
    pub uniforms: Vec<UniformBinding>,
    /// Type of the `@location(0)` vertex input, if the vertex stage reads one.
    pub position: Option<VaryingType>,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<&UniformBinding> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Whether geometry described by `layout` can feed this program.
    pub fn accepts(&self, layout: &VertexLayout) -> bool {
        self.position.is_some_and(|ty| {
            ty.scalar == naga::Scalar::F32 && ty.components == layout.components
        })
    }
}

/// Parses, validates and reflects one WGSL stage.
pub fn reflect_stage(stage: ShaderStage, source: &str) -> Result<StageInterface, CompileError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| CompileError::Parse(e.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| CompileError::Validation(format!("{e:?}")))?;

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage)
        .ok_or(CompileError::MissingEntryPoint(stage))?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        collect_varyings(&module, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_varyings(&module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let uniforms = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == naga::AddressSpace::Uniform)
        .filter_map(|(_, var)| {
            let name = var.name.clone()?;
            let rb = var.binding.as_ref()?;
            let is_mat4 = matches!(
                module.types[var.ty].inner,
                naga::TypeInner::Matrix {
                    columns: naga::VectorSize::Quad,
                    rows: naga::VectorSize::Quad,
                    scalar,
                } if scalar == naga::Scalar::F32
            );
            Some(UniformBinding {
                name,
                group: rb.group,
                binding: rb.binding,
                is_mat4,
            })
        })
        .collect();

    let resources = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.binding.is_some() && var.space != naga::AddressSpace::Uniform)
        .map(|(handle, var)| {
            var.name
                .clone()
                .unwrap_or_else(|| format!("global#{}", handle.index()))
        })
        .collect();

    Ok(StageInterface {
        stage,
        entry_point: entry.name.clone(),
        inputs,
        outputs,
        uniforms,
        resources,
    })
}

fn collect_varyings(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<StageVarying>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            if let Some(ty) = varying_type(&module.types[ty].inner) {
                out.push(StageVarying {
                    location: *location,
                    ty,
                });
            }
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_varyings(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn varying_type(inner: &naga::TypeInner) -> Option<VaryingType> {
    match *inner {
        naga::TypeInner::Scalar(scalar) => Some(VaryingType {
            scalar,
            components: 1,
        }),
        naga::TypeInner::Vector { size, scalar } => Some(VaryingType {
            scalar,
            components: size as u32,
        }),
        _ => None,
    }
}

/// Links compiled stages into a program interface.
///
/// `stages` holds one entry per attached stage; `None` marks a stage whose
/// compilation failed.
pub fn link(
    stages: &[(ShaderStage, Option<&StageInterface>)],
) -> Result<ProgramInterface, LinkError> {
    let vertex = pick_stage(stages, ShaderStage::Vertex)?;
    let fragment = pick_stage(stages, ShaderStage::Fragment)?;

    if let Some(name) = vertex.resources.iter().chain(&fragment.resources).next() {
        return Err(LinkError::UnsupportedResource(name.clone()));
    }

    if let Some(input) = vertex
        .inputs
        .iter()
        .find(|i| i.location != 0 || i.ty.scalar != naga::Scalar::F32)
    {
        return Err(LinkError::UnsupportedInput(input.location));
    }

    let color_output = VaryingType {
        scalar: naga::Scalar::F32,
        components: 4,
    };
    match fragment.outputs.as_slice() {
        [out] if out.location == 0 && out.ty == color_output => {}
        _ => return Err(LinkError::UnsupportedOutput),
    }

    for input in &fragment.inputs {
        let written = vertex
            .outputs
            .iter()
            .any(|o| o.location == input.location && o.ty == input.ty);
        if !written {
            return Err(LinkError::InterfaceMismatch(input.location));
        }
    }

    let mut uniforms: Vec<UniformBinding> = Vec::new();
    for u in vertex.uniforms.iter().chain(&fragment.uniforms) {
        if !u.is_mat4 || u.group != 0 {
            return Err(LinkError::UnsupportedUniform(u.name.clone()));
        }
        match uniforms.iter().find(|seen| seen.name == u.name) {
            Some(seen) if seen.binding != u.binding => {
                return Err(LinkError::UniformConflict(u.name.clone()));
            }
            Some(_) => {}
            None if uniforms.iter().any(|seen| seen.binding == u.binding) => {
                return Err(LinkError::UniformConflict(u.name.clone()));
            }
            None => uniforms.push(u.clone()),
        }
    }
    uniforms.sort_by_key(|u| u.binding);

    let position = vertex.inputs.first().map(|i| i.ty);

    Ok(ProgramInterface {
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
        uniforms,
        position,
    })
}

fn pick_stage<'a>(
    stages: &[(ShaderStage, Option<&'a StageInterface>)],
    stage: ShaderStage,
) -> Result<&'a StageInterface, LinkError> {
    let mut matching = stages.iter().filter(|(s, _)| *s == stage);
    let (_, first) = matching.next().ok_or(LinkError::MissingStage(stage))?;
    if matching.next().is_some() {
        return Err(LinkError::DuplicateStage(stage));
    }
    first.ok_or(LinkError::InvalidStage(stage))
}
