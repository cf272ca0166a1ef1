//! Depthgrade GPU: wgpu backend for the depth grading resample pass.
//!
//! This crate owns all GPU resources. No Bevy dependency. It implements
//! `depthgrade_core::EffectBackend` on top of a plain wgpu device and queue.

pub mod backend;
pub mod buffers;
pub mod program;
pub mod readback;
pub mod transient;

pub use backend::{ColorTarget, DepthSource, WgpuBackend};
pub use buffers::{EffectUniformsGpu, GpuLutHandle};
pub use program::{GradingProgram, ShaderRegistry};

/// Errors raised while bringing up a wgpu device.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no GPU adapter available: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Create a standalone device and queue, blocking on adapter selection.
pub fn create_device_blocking() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        ..Default::default()
    }))?;

    tracing::info!("depth grading adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("depthgrade_device"),
        ..Default::default()
    }))?;
    Ok((device, queue))
}
