//! Scoped transient render targets.
//!
//! A [`TransientTexture`] is leased from the pool and returned on drop, so the
//! lease ends with the frame scope even on early return.

use std::ops::Deref;

/// Free list of transient textures. Only textures matching the most recent
/// request's size and format are kept.
#[derive(Default)]
pub struct TransientPool {
    free: Vec<wgpu::Texture>,
    leased: usize,
}

impl TransientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease a texture usable as a copy destination and sampled source.
    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        size: wgpu::Extent3d,
        format: wgpu::TextureFormat,
    ) -> TransientTexture<'_> {
        // Drop idle targets left over from another size or format.
        let idle = self.free.len();
        self.free.retain(|t| t.size() == size && t.format() == format);
        if self.free.len() < idle {
            tracing::debug!("evicted {} stale transient targets", idle - self.free.len());
        }
        let reused = self.free.pop();

        let texture = reused.unwrap_or_else(|| {
            tracing::debug!(
                "allocating transient target {}x{} {:?}",
                size.width,
                size.height,
                format
            );
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("depthgrade_temp_color"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        });

        self.leased += 1;
        TransientTexture {
            pool: self,
            texture: Some(texture),
        }
    }

    /// Number of textures currently leased.
    pub fn leased(&self) -> usize {
        self.leased
    }

    /// Number of textures waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

/// A leased texture. Returned to its pool on drop.
pub struct TransientTexture<'a> {
    pool: &'a mut TransientPool,
    texture: Option<wgpu::Texture>,
}

impl Deref for TransientTexture<'_> {
    type Target = wgpu::Texture;

    fn deref(&self) -> &wgpu::Texture {
        // Only `drop` takes the texture out.
        match &self.texture {
            Some(texture) => texture,
            None => unreachable!("transient texture used after release"),
        }
    }
}

impl Drop for TransientTexture<'_> {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.pool.free.push(texture);
            self.pool.leased -= 1;
        }
    }
}
