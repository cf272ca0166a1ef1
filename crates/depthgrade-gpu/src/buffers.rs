//! GPU-side LUT textures and the uniform block of the resample pass.

use bytemuck::{Pod, Zeroable};
use depthgrade_core::controller::{LutBinding, PassInputs};
use depthgrade_core::{DepthLinearization, LUT_HEIGHT, LUT_WIDTH};

/// Uniform block read by `depth_grading.wgsl`.
///
/// The first four vectors are the shader constants; `depth_linearize` holds
/// `(a, b, 0, 0)` for `eye = b / (depth + a)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EffectUniformsGpu {
    pub params: [f32; 4],
    pub params2: [f32; 4],
    pub params3: [f32; 4],
    pub depth_to_view: [f32; 4],
    pub depth_linearize: [f32; 4],
}

impl EffectUniformsGpu {
    pub fn from_inputs(inputs: &PassInputs<'_>) -> Self {
        let c = inputs.constants;
        let lin = DepthLinearization::from_projection(&inputs.view.projection);
        Self {
            params: c.params,
            params2: c.params2,
            params3: c.params3,
            depth_to_view: c.depth_to_view,
            depth_linearize: [lin.a, lin.b, 0.0, 0.0],
        }
    }
}

/// Handle to a packed LUT on the GPU.
///
/// Re-uploaded only when the generator revision moves.
pub struct GpuLutHandle {
    pub texture: wgpu::Texture,
    pub texture_view: wgpu::TextureView,
    uploaded_revision: Option<u64>,
}

impl GpuLutHandle {
    /// Create an empty 256×16 RGBA8 texture.
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: lut_extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            texture_view,
            uploaded_revision: None,
        }
    }

    /// Upload `binding` if its revision differs from the one on the GPU.
    /// Returns whether an upload happened.
    pub fn sync(&mut self, queue: &wgpu::Queue, binding: &LutBinding<'_>) -> bool {
        if self.uploaded_revision == Some(binding.revision) {
            return false;
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            binding.table.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(LUT_WIDTH * 4),
                rows_per_image: None,
            },
            lut_extent(),
        );
        self.uploaded_revision = Some(binding.revision);
        tracing::debug!(revision = binding.revision, "uploaded depth grading LUT");
        true
    }

    pub fn uploaded_revision(&self) -> Option<u64> {
        self.uploaded_revision
    }
}

fn lut_extent() -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: LUT_WIDTH,
        height: LUT_HEIGHT,
        depth_or_array_layers: 1,
    }
}
