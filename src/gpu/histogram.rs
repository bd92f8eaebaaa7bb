// ============================================================================
// GPU HISTOGRAM EQUALIZATION — histogram, transform, apply in one submission
// ============================================================================
//
// Run order (one command encoder, one `queue.submit`):
//
//   upload ─► clear histogram ─► histogram pass ─► transform pass ─► apply pass
//          ─► copy destination to staging ─► submit + wait ─► map ─► Image
//
// Each pass consumes the previous pass's output buffer, so wgpu serialises
// them on the device; nothing else needs synchronising.  Device, queue and
// the three compiled pipelines live for the whole app, textures and buffers
// live for exactly one run.
// ============================================================================

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::texture::{TexturePair, TextureReadback, allocate_scoped, map_read};
use crate::error::{EnhanceError, FatalDeviceError};
use crate::image_data::Image;
use crate::log_info;
use crate::ops::histogram::{CHANNELS, HISTOGRAM_BINS, Histogram};

/// Size in bytes of the histogram and LUT buffers (1024 × u32).
const HISTOGRAM_BUFFER_SIZE: u64 = (HISTOGRAM_BINS * CHANNELS * std::mem::size_of::<u32>()) as u64;

/// Workgroup edge used by the per-pixel passes (`@workgroup_size(16, 16)`).
const TILE: u32 = 16;

// ============================================================================
// HISTOGRAM DESCRIPTOR
// ============================================================================

/// Parameters shared by all three kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramInfo {
    /// Fixed at 256; the buffers are sized for it.
    pub number_of_entries: u32,
    pub histogram_for_alpha: bool,
    pub min_pixel_value: [f32; 4],
    pub max_pixel_value: [f32; 4],
}

impl Default for HistogramInfo {
    fn default() -> Self {
        Self {
            number_of_entries: HISTOGRAM_BINS as u32,
            histogram_for_alpha: true,
            min_pixel_value: [0.0; 4],
            max_pixel_value: [1.0; 4],
        }
    }
}

/// Uniform block, layout-matched to `HistogramInfo` in the WGSL sources.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct HistogramUniform {
    min_value: [f32; 4],
    max_value: [f32; 4],
    entries: u32,
    include_alpha: u32,
    width: u32,
    height: u32,
}

impl HistogramInfo {
    fn uniform(&self, width: u32, height: u32) -> HistogramUniform {
        HistogramUniform {
            min_value: self.min_pixel_value,
            max_value: self.max_pixel_value,
            entries: self.number_of_entries,
            include_alpha: self.histogram_for_alpha as u32,
            width,
            height,
        }
    }
}

// ============================================================================
// PIPELINES
// ============================================================================

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba8Unorm,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn storage_buffer_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// One compiled compute kernel and its bind group layout.
struct Kernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl Kernel {
    fn new(device: &wgpu::Device, name: &str, source: &str, entry_point: &str, entries: &[wgpu::BindGroupLayoutEntry]) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point,
            compilation_options: Default::default(),
        });
        Self { pipeline, bind_group_layout }
    }

    fn bind(&self, device: &wgpu::Device, label: &str, resources: &[wgpu::BindingResource<'_>]) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = resources
            .iter()
            .enumerate()
            .map(|(i, r)| wgpu::BindGroupEntry { binding: i as u32, resource: r.clone() })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, label: &str, bind_group: &wgpu::BindGroup, groups: (u32, u32)) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(groups.0, groups.1, 1);
    }
}

/// Histogram, transform-derive and transform-apply kernels.
pub struct GpuHistogramPipeline {
    histogram: Kernel,
    transform: Kernel,
    apply: Kernel,
}

impl GpuHistogramPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let histogram = Kernel::new(
            device,
            "histogram_compute",
            super::shaders::HISTOGRAM_SHADER,
            "cs_histogram",
            &[texture_entry(0), storage_buffer_entry(1, false), uniform_entry(2)],
        );
        let transform = Kernel::new(
            device,
            "histogram_equalization_transform",
            super::shaders::EQUALIZATION_TRANSFORM_SHADER,
            "cs_equalization_transform",
            &[storage_buffer_entry(0, true), storage_buffer_entry(1, false), uniform_entry(2)],
        );
        let apply = Kernel::new(
            device,
            "histogram_equalization_apply",
            super::shaders::EQUALIZATION_APPLY_SHADER,
            "cs_equalization_apply",
            &[texture_entry(0), storage_texture_entry(1), storage_buffer_entry(2, true), uniform_entry(3)],
        );
        Self { histogram, transform, apply }
    }

    /// Clear `histogram` and accumulate the source texture into it.
    pub fn encode_histogram(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        histogram: &wgpu::Buffer,
        params: &wgpu::Buffer,
        width: u32,
        height: u32,
    ) {
        encoder.clear_buffer(histogram, 0, None);
        let bg = self.histogram.bind(
            device,
            "histogram_bg",
            &[
                wgpu::BindingResource::TextureView(source),
                histogram.as_entire_binding(),
                params.as_entire_binding(),
            ],
        );
        self.histogram
            .dispatch(encoder, "histogram_pass", &bg, (width.div_ceil(TILE), height.div_ceil(TILE)));
    }

    /// Derive the per-channel equalization LUT from `histogram` into `lut`.
    pub fn encode_transform(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        histogram: &wgpu::Buffer,
        lut: &wgpu::Buffer,
        params: &wgpu::Buffer,
    ) {
        let bg = self.transform.bind(
            device,
            "transform_bg",
            &[histogram.as_entire_binding(), lut.as_entire_binding(), params.as_entire_binding()],
        );
        self.transform.dispatch(encoder, "transform_pass", &bg, (CHANNELS as u32, 1));
    }

    /// Write `lut(source)` into `destination`.
    pub fn encode_apply(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
        lut: &wgpu::Buffer,
        params: &wgpu::Buffer,
        width: u32,
        height: u32,
    ) {
        let bg = self.apply.bind(
            device,
            "apply_bg",
            &[
                wgpu::BindingResource::TextureView(source),
                wgpu::BindingResource::TextureView(destination),
                lut.as_entire_binding(),
                params.as_entire_binding(),
            ],
        );
        self.apply
            .dispatch(encoder, "apply_pass", &bg, (width.div_ceil(TILE), height.div_ceil(TILE)));
    }
}

// ============================================================================
// EQUALIZER — the full run
// ============================================================================

/// Per-run buffers: uniform params, histogram, LUT.
struct RunBuffers {
    params: wgpu::Buffer,
    histogram: wgpu::Buffer,
    lut: wgpu::Buffer,
}

impl RunBuffers {
    fn new(ctx: &GpuContext, info: &HistogramInfo, width: u32, height: u32) -> Result<Self, EnhanceError> {
        allocate_scoped(ctx, "histogram buffers", |device| {
            let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("histogram_info"),
                contents: bytemuck::bytes_of(&info.uniform(width, height)),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let histogram = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("histogram_counts"),
                size: HISTOGRAM_BUFFER_SIZE,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let lut = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("equalization_lut"),
                size: HISTOGRAM_BUFFER_SIZE,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            });
            Self { params, histogram, lut }
        })
    }
}

/// GPU histogram equalization over a shared device.
pub struct GpuEqualizer {
    ctx: GpuContext,
    pipeline: GpuHistogramPipeline,
    info: HistogramInfo,
}

impl GpuEqualizer {
    /// Create the device and compile the kernels.  Failure here disables the
    /// GPU mode for the whole session.
    pub fn new(preferred_gpu: &str) -> Result<Self, FatalDeviceError> {
        Ok(Self::with_context(GpuContext::new(preferred_gpu)?))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        let pipeline = GpuHistogramPipeline::new(&ctx.device);
        Self {
            ctx,
            pipeline,
            info: HistogramInfo::default(),
        }
    }

    pub fn with_info(mut self, info: HistogramInfo) -> Self {
        self.info = HistogramInfo {
            number_of_entries: HISTOGRAM_BINS as u32,
            ..info
        };
        self
    }

    pub fn info(&self) -> &HistogramInfo {
        &self.info
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Histogram-equalize `image` on the GPU.
    pub fn equalize(&self, image: &Image) -> Result<Image, EnhanceError> {
        let rgba = image.to_rgba8()?;
        let (w, h) = rgba.dimensions();
        let device = &self.ctx.device;

        // 1. Upload
        let textures = TexturePair::upload(&self.ctx, rgba.as_raw(), w, h)?;
        let buffers = RunBuffers::new(&self.ctx, &self.info, w, h)?;
        let readback = TextureReadback::new(&self.ctx, w, h)?;

        let src_view = textures.source.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = textures.destination.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("equalize_encoder"),
        });

        // 2–4. Histogram → transform → apply
        self.pipeline
            .encode_histogram(device, &mut encoder, &src_view, &buffers.histogram, &buffers.params, w, h);
        self.pipeline
            .encode_transform(device, &mut encoder, &buffers.histogram, &buffers.lut, &buffers.params);
        self.pipeline.encode_apply(
            device,
            &mut encoder,
            &src_view,
            &dst_view,
            &buffers.lut,
            &buffers.params,
            w,
            h,
        );
        readback.encode_copy(&mut encoder, &textures.destination);

        // 5. Submit + wait
        self.ctx.submit_and_wait(encoder);

        // 6. Download
        let data = readback.read(&self.ctx)?;
        let out = RgbaImage::from_raw(w, h, data)
            .ok_or_else(|| EnhanceError::ResourceAllocation("readback size does not match texture".into()))?;
        log_info!("[GPU] Equalized {}×{} on '{}'", w, h, self.ctx.adapter_name);
        Ok(Image::from_rgba(out, image.color_space()))
    }

    /// Run only the histogram pass and read the counts back.
    pub fn histogram(&self, image: &Image) -> Result<Histogram, EnhanceError> {
        let rgba = image.to_rgba8()?;
        let (w, h) = rgba.dimensions();
        let device = &self.ctx.device;

        let textures = TexturePair::upload(&self.ctx, rgba.as_raw(), w, h)?;
        let buffers = RunBuffers::new(&self.ctx, &self.info, w, h)?;
        let staging = allocate_scoped(&self.ctx, "histogram staging", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("histogram_staging"),
                size: HISTOGRAM_BUFFER_SIZE,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let src_view = textures.source.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("histogram_encoder"),
        });
        self.pipeline
            .encode_histogram(device, &mut encoder, &src_view, &buffers.histogram, &buffers.params, w, h);
        encoder.copy_buffer_to_buffer(&buffers.histogram, 0, &staging, 0, HISTOGRAM_BUFFER_SIZE);
        self.ctx.submit_and_wait(encoder);

        let bytes = map_read(&self.ctx, &staging)?;
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Histogram::from_words(&words)
            .ok_or_else(|| EnhanceError::ResourceAllocation("histogram readback has the wrong size".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<HistogramUniform>(), 48);
        let u = HistogramInfo::default().uniform(3, 2);
        assert_eq!(u.entries, 256);
        assert_eq!(u.include_alpha, 1);
        assert_eq!(u.max_value, [1.0; 4]);
    }

    #[test]
    fn alpha_flag_reaches_uniform() {
        let info = HistogramInfo {
            histogram_for_alpha: false,
            ..HistogramInfo::default()
        };
        let u = info.uniform(7, 9);
        assert_eq!(u.include_alpha, 0);
        assert_eq!((u.width, u.height), (7, 9));
    }

    #[test]
    fn buffer_holds_four_channels() {
        assert_eq!(HISTOGRAM_BUFFER_SIZE, 4096);
    }
}
