//! wgpu implementation of [`EffectBackend`].

use depthgrade_core::controller::PassInputs;
use depthgrade_core::{EffectBackend, EffectError};

use crate::program::{GradingProgram, ShaderRegistry};
use crate::transient::TransientPool;

/// The camera color buffer. Needs `COPY_SRC | RENDER_ATTACHMENT` usage.
pub struct ColorTarget {
    pub texture: wgpu::Texture,
}

/// The camera depth buffer as a depth-aspect view with `TEXTURE_BINDING`.
pub struct DepthSource {
    pub view: wgpu::TextureView,
}

/// Runs the resample pass on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    registry: ShaderRegistry,
    transients: TransientPool,
    depth_requested: bool,
}

impl WgpuBackend {
    /// Backend with the built-in program registry.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        Self::with_registry(device, queue, color_format, ShaderRegistry::default())
    }

    pub fn with_registry(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        registry: ShaderRegistry,
    ) -> Self {
        Self {
            device,
            queue,
            color_format,
            registry,
            transients: TransientPool::new(),
            depth_requested: false,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Whether the controller has asked for a depth texture.
    pub fn depth_requested(&self) -> bool {
        self.depth_requested
    }

    pub fn transients(&self) -> &TransientPool {
        &self.transients
    }
}

impl EffectBackend for WgpuBackend {
    type Program = GradingProgram;
    type ColorTarget = ColorTarget;
    type DepthSource = DepthSource;

    fn load_program(&mut self, name: &str) -> Result<GradingProgram, EffectError> {
        let source = self
            .registry
            .get(name)
            .ok_or_else(|| EffectError::ProgramNotFound(name.to_string()))?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = GradingProgram::new(&self.device, source, self.color_format);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(EffectError::ProgramCreation {
                name: name.to_string(),
                reason: err.to_string(),
            });
        }
        Ok(program)
    }

    fn require_depth_texture(&mut self) {
        if !self.depth_requested {
            tracing::debug!("depth grading requested the camera depth texture");
            self.depth_requested = true;
        }
    }

    fn execute(
        &mut self,
        program: &mut GradingProgram,
        inputs: &PassInputs<'_>,
        color: &mut ColorTarget,
        depth: &DepthSource,
    ) -> Result<(), EffectError> {
        let format = color.texture.format();
        if format != program.format() {
            return Err(EffectError::Backend(format!(
                "color target is {format:?}, program was built for {:?}",
                program.format()
            )));
        }

        program.upload(&self.queue, inputs);

        let size = color.texture.size();
        let temp = self.transients.acquire(&self.device, size, format);
        let temp_view = temp.create_view(&wgpu::TextureViewDescriptor::default());
        let target_view = color
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = program.bind_group(&self.device, &temp_view, &depth.view);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("depthgrade_encoder"),
            });
        encoder.copy_texture_to_texture(color.texture.as_image_copy(), temp.as_image_copy(), size);
        program.draw(&mut encoder, &bind_group, &target_view);
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
