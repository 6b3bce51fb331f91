/// GPU setup options.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB swapchain format when one is offered.
    ///
    /// Off by default: fill colors are written unconverted, the way a linear
    /// default framebuffer shows them.
    pub prefer_srgb: bool,

    /// Wait for vertical blank when presenting.
    pub vsync: bool,

    pub power_preference: wgpu::PowerPreference,

    pub required_limits: wgpu::Limits,

    /// Frames the presentation engine may queue ahead. A hint.
    pub max_frame_latency: u32,
}

impl GpuInit {
    pub(crate) fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
            max_frame_latency: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_selects_present_mode() {
        let mut init = GpuInit::default();
        assert_eq!(init.present_mode(), wgpu::PresentMode::AutoVsync);
        init.vsync = false;
        assert_eq!(init.present_mode(), wgpu::PresentMode::AutoNoVsync);
    }
}
