use winit::dpi::PhysicalSize;

/// What to do after a failed frame acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// The swapchain was rebuilt; the next frame can be acquired normally.
    Reconfigured,
    /// Nothing to fix; drop this frame.
    SkipFrame,
    /// The device cannot continue presenting.
    Fatal,
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let first = *caps.formats.first()?;

    let matches_preference = |f: &&wgpu::TextureFormat| f.is_srgb() == prefer_srgb;
    let preferred = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Rgba8Unorm,
    ];
    for f in preferred.iter().filter(matches_preference) {
        if caps.formats.contains(f) {
            return Some(*f);
        }
    }

    Some(first)
}

/// Opaque when offered; the window never shows through.
pub(crate) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        caps.alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto)
    }
}

/// Records `new_size` and rebuilds the swapchain unless it is zero-sized
/// (minimized). Returns whether the swapchain was rebuilt.
pub(crate) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut PhysicalSize<u32>,
    new_size: PhysicalSize<u32>,
) -> bool {
    *size = new_size;

    if new_size.width == 0 || new_size.height == 0 {
        return false;
    }

    config.width = new_size.width;
    config.height = new_size.height;

    surface.configure(device, config);
    true
}

/// Action for errors that need no reconfiguration; `None` for lost/outdated swapchains.
fn classify(err: wgpu::SurfaceError) -> Option<SurfaceErrorAction> {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => None,
        wgpu::SurfaceError::OutOfMemory => Some(SurfaceErrorAction::Fatal),
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => {
            Some(SurfaceErrorAction::SkipFrame)
        }
    }
}

pub(crate) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    err: wgpu::SurfaceError,
) -> SurfaceErrorAction {
    classify(err).unwrap_or_else(|| {
        // A zero-sized window is reconfigured by the next resize instead.
        if size.width > 0 && size.height > 0 {
            surface.configure(device, config);
        }
        SurfaceErrorAction::Reconfigured
    })
}

/// Creates a depth attachment matching the surface configuration.
pub(crate) fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("prism depth target"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: &[wgpu::TextureFormat]) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats: formats.to_vec(),
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            ..Default::default()
        }
    }

    #[test]
    fn empty_caps_have_no_format() {
        assert_eq!(choose_surface_format(&caps(&[]), false), None);
    }

    #[test]
    fn linear_format_preferred_when_srgb_disabled() {
        let c = caps(&[
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ]);
        assert_eq!(
            choose_surface_format(&c, false),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            choose_surface_format(&c, true),
            Some(wgpu::TextureFormat::Bgra8UnormSrgb)
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        let c = caps(&[wgpu::TextureFormat::Rgba16Float]);
        assert_eq!(
            choose_surface_format(&c, false),
            Some(wgpu::TextureFormat::Rgba16Float)
        );
    }

    #[test]
    fn opaque_alpha_is_preferred() {
        let mut c = caps(&[wgpu::TextureFormat::Bgra8Unorm]);
        c.alpha_modes = vec![
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::Opaque,
        ];
        assert_eq!(choose_alpha_mode(&c), wgpu::CompositeAlphaMode::Opaque);

        c.alpha_modes = vec![wgpu::CompositeAlphaMode::PreMultiplied];
        assert_eq!(choose_alpha_mode(&c), wgpu::CompositeAlphaMode::PreMultiplied);
    }

    #[test]
    fn out_of_memory_is_fatal() {
        // Only the variants that need no surface are checked here.
        assert_eq!(classify(wgpu::SurfaceError::OutOfMemory), Some(SurfaceErrorAction::Fatal));
        assert_eq!(classify(wgpu::SurfaceError::Timeout), Some(SurfaceErrorAction::SkipFrame));
        assert_eq!(classify(wgpu::SurfaceError::Lost), None);
    }
}
