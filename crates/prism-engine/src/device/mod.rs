//! wgpu device and window surface.
//!
//! [`Gpu`] owns the device, queue and swapchain configuration plus the depth
//! target once one is requested. Only the wgpu driver talks to it.

mod gpu;
mod init;
mod surface;

pub use gpu::{DEPTH_FORMAT, Gpu, GpuFrame};
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
