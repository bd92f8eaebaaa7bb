// ============================================================================
// GPU TEXTURES — allocation under error scopes, upload, readback
// ============================================================================

use super::context::GpuContext;
use crate::error::EnhanceError;

/// WGPU requires `bytes_per_row` in texture ↔ buffer copies to be a
/// multiple of 256.
pub const COPY_BYTES_PER_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Padded row pitch for an RGBA8 texture copy of the given width.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    (width * 4).div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Run `alloc` inside out-of-memory and validation error scopes.  Any error
/// the device reports while allocating becomes `ResourceAllocation`.
pub fn allocate_scoped<T>(
    ctx: &GpuContext,
    what: &str,
    alloc: impl FnOnce(&wgpu::Device) -> T,
) -> Result<T, EnhanceError> {
    let device = &ctx.device;
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = alloc(device);
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(err) => Err(EnhanceError::ResourceAllocation(format!("{what}: {err}"))),
        None => Ok(value),
    }
}

fn texture_descriptor<'a>(label: &'a str, w: u32, h: u32, usage: wgpu::TextureUsages) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage,
        view_formats: &[],
    }
}

/// Source/destination texture pair for one pipeline run.  Both are owned by
/// that run and dropped with it.
pub struct TexturePair {
    pub source: wgpu::Texture,
    pub destination: wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

impl TexturePair {
    /// Allocate both textures and upload `rgba` into the source.
    pub fn upload(ctx: &GpuContext, rgba: &[u8], width: u32, height: u32) -> Result<Self, EnhanceError> {
        if !ctx.supports_size(width, height) {
            return Err(EnhanceError::ResourceAllocation(format!(
                "{width}×{height} exceeds the device limit of {} pixels per side",
                ctx.max_texture_dim
            )));
        }
        let (source, destination) = allocate_scoped(ctx, "equalize textures", |device| {
            let source = device.create_texture(&texture_descriptor(
                "equalize_src",
                width,
                height,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ));
            let destination = device.create_texture(&texture_descriptor(
                "equalize_dst",
                width,
                height,
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ));
            (source, destination)
        })?;

        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &source,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Ok(Self { source, destination, width, height })
    }
}

/// Staging buffer that receives the destination texture inside the same
/// command encoder as the compute passes.
pub struct TextureReadback {
    staging: wgpu::Buffer,
    width: u32,
    height: u32,
    bytes_per_row: u32,
}

impl TextureReadback {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self, EnhanceError> {
        let bytes_per_row = aligned_bytes_per_row(width);
        let size = bytes_per_row as u64 * height as u64;
        let staging = allocate_scoped(ctx, "readback staging", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback_staging"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        Ok(Self { staging, width, height, bytes_per_row })
    }

    /// Record the texture → staging copy.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Map the staging buffer (after submission) and return tightly packed
    /// RGBA rows.
    pub fn read(self, ctx: &GpuContext) -> Result<Vec<u8>, EnhanceError> {
        let mapped = map_read(ctx, &self.staging)?;
        let actual_row = (self.width * 4) as usize;
        let mut result = Vec::with_capacity(actual_row * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * self.bytes_per_row as usize;
            result.extend_from_slice(&mapped[start..start + actual_row]);
        }
        Ok(result)
    }
}

/// Map a `MAP_READ` buffer and copy its whole contents out.
pub fn map_read(ctx: &GpuContext, buffer: &wgpu::Buffer) -> Result<Vec<u8>, EnhanceError> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(EnhanceError::ResourceAllocation(format!("readback map failed: {e}"))),
        Err(e) => return Err(EnhanceError::ResourceAllocation(format!("readback channel closed: {e}"))),
    }
    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
