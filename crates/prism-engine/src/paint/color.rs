/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Used for clear values. Channels are handed to the driver untouched; the
/// surface is configured without sRGB encoding, so `(1.0, 0.5, 0.2)` lands in
/// the framebuffer as written.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    /// Fill color written by `fill.frag.wgsl`.
    pub const ORANGE: Self = Self::rgba(1.0, 0.5, 0.2, 1.0);

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_wgpu_preserves_channels() {
        let w = Color::ORANGE.to_wgpu();
        assert_eq!((w.r, w.g, w.b, w.a), (1.0, 0.5, 0.2f32 as f64, 1.0));
    }
}
