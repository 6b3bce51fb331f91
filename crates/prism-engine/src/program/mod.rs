//! Pipeline programs: shader sources and the compile/link lifecycle.

mod pipeline;

pub use pipeline::PipelineProgram;

use std::borrow::Cow;

/// WGSL source for the two stages of a program.
///
/// Vertex entry point is `vs_main`, fragment entry point is `fs_main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<Cow<'static, str>>, fragment: impl Into<Cow<'static, str>>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Pass-through 2D positions, solid orange fill.
    pub fn quad() -> Self {
        Self::new(
            include_str!("shaders/quad.vert.wgsl"),
            include_str!("shaders/fill.frag.wgsl"),
        )
    }

    /// `projection * view * model` transform of 3D positions, solid orange fill.
    pub fn cube() -> Self {
        Self::new(
            include_str!("shaders/cube.vert.wgsl"),
            include_str!("shaders/fill.frag.wgsl"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;

    fn float_literals(
        module: &naga::Module,
        exprs: &naga::Arena<naga::Expression>,
        e: naga::Handle<naga::Expression>,
    ) -> Vec<f32> {
        match &exprs[e] {
            naga::Expression::Literal(naga::Literal::F32(v)) => vec![*v],
            naga::Expression::Compose { components, .. } => components
                .iter()
                .flat_map(|c| float_literals(module, exprs, *c))
                .collect(),
            naga::Expression::Constant(c) => {
                float_literals(module, &module.global_expressions, module.constants[*c].init)
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn fill_stage_writes_orange() {
        for source in [ShaderSource::quad(), ShaderSource::cube()] {
            let module = naga::front::wgsl::parse_str(&source.fragment).unwrap();
            let entry = module
                .entry_points
                .iter()
                .find(|ep| ep.name == "fs_main")
                .unwrap();
            let returned = entry
                .function
                .body
                .iter()
                .find_map(|s| match s {
                    naga::Statement::Return { value: Some(v) } => Some(*v),
                    _ => None,
                })
                .unwrap();
            let color = float_literals(&module, &entry.function.expressions, returned);
            assert_eq!(color, Color::ORANGE.to_array());
        }
    }
}
