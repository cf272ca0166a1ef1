//! GPU-to-CPU readback of RGBA8 color targets.

/// `bytes_per_row` must be a multiple of this for texture-to-buffer copies.
const ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Download a 4-byte-per-texel 2D texture. Blocks until the copy completes.
///
/// The texture needs `COPY_SRC` usage.
pub fn read_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Vec<[u8; 4]> {
    let size = texture.size();
    let unpadded = size.width * 4;
    let padded = unpadded.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("depthgrade_readback_staging"),
        size: (padded as u64) * (size.height as u64),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("depthgrade_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    staging.slice(..).map_async(wgpu::MapMode::Read, |_| {});
    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    let mut texels = Vec::with_capacity((size.width * size.height) as usize);
    {
        let data = staging.slice(..).get_mapped_range();
        for row in data.chunks(padded as usize) {
            let row: &[[u8; 4]] = bytemuck::cast_slice(&row[..unpadded as usize]);
            texels.extend_from_slice(row);
        }
    }
    staging.unmap();
    texels
}
