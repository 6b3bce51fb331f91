use crate::driver::ClearMask;
use crate::geometry::{GeometryError, Mesh, primitives};
use crate::paint::Color;
use crate::program::ShaderSource;
use crate::transform::TransformParams;

/// Which primitive the loop renders.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Flat indexed square, no transforms.
    Quad,
    /// Rotating cube with depth testing.
    Cube,
}

impl Variant {
    pub fn mesh(self) -> Result<Mesh, GeometryError> {
        match self {
            Variant::Quad => primitives::quad(),
            Variant::Cube => primitives::cube(),
        }
    }

    pub fn shaders(self) -> ShaderSource {
        match self {
            Variant::Quad => ShaderSource::quad(),
            Variant::Cube => ShaderSource::cube(),
        }
    }

    pub fn uses_depth(self) -> bool {
        self == Variant::Cube
    }

    pub fn clear_mask(self) -> ClearMask {
        if self.uses_depth() {
            ClearMask::COLOR_DEPTH
        } else {
            ClearMask::COLOR
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameLoopConfig {
    pub variant: Variant,
    /// Build the cube program once instead of once per frame.
    ///
    /// The quad program is always built once.
    pub persistent_program: bool,
    pub clear_color: Color,
    /// Viewing parameters, used by the cube only.
    pub transform: TransformParams,
    pub shaders: ShaderSource,
}

impl FrameLoopConfig {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            persistent_program: false,
            clear_color: Color::BLACK,
            transform: TransformParams::default(),
            shaders: variant.shaders(),
        }
    }

    pub fn quad() -> Self {
        Self::for_variant(Variant::Quad)
    }

    pub fn cube() -> Self {
        Self::for_variant(Variant::Cube)
    }

    /// Whether a fresh program is compiled and deleted within every frame.
    pub fn rebuilds_program_per_frame(&self) -> bool {
        self.variant == Variant::Cube && !self.persistent_program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_default_cube_rebuilds_per_frame() {
        assert!(FrameLoopConfig::cube().rebuilds_program_per_frame());
        assert!(!FrameLoopConfig::quad().rebuilds_program_per_frame());

        let persistent = FrameLoopConfig {
            persistent_program: true,
            ..FrameLoopConfig::cube()
        };
        assert!(!persistent.rebuilds_program_per_frame());

        let quad = FrameLoopConfig {
            persistent_program: false,
            ..FrameLoopConfig::quad()
        };
        assert!(!quad.rebuilds_program_per_frame());
    }

    #[test]
    fn cube_clears_depth_and_quad_does_not() {
        assert_eq!(Variant::Cube.clear_mask(), ClearMask::COLOR_DEPTH);
        assert_eq!(Variant::Quad.clear_mask(), ClearMask::COLOR);
    }
}
