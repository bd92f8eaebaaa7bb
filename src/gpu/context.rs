// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::error::FatalDeviceError;
use crate::{log_info, log_warn};

/// Holds the core wgpu resources shared across every GPU pipeline run.
/// Created once at startup; if creation fails the GPU mode is disabled.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    pub backend: wgpu::Backend,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Attempt to create a GPU context.  Tries hardware first, then falls
    /// back to a software rasterizer (`force_fallback_adapter`).
    ///
    /// We use `pollster::block_on` because eframe doesn't expose its own
    /// device to application code and we need one for compute.
    pub fn new(preferred_gpu: &str) -> Result<Self, FatalDeviceError> {
        match pollster::block_on(Self::new_async(preferred_gpu, false)) {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                log_warn!("[GPU] Hardware adapter unavailable ({e}), trying software fallback");
                pollster::block_on(Self::new_async(preferred_gpu, true))
            }
        }
    }

    /// Software adapter only.  Used by the headless report when asked to
    /// avoid real hardware.
    pub fn new_software() -> Result<Self, FatalDeviceError> {
        pollster::block_on(Self::new_async("", true))
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Result<Self, FatalDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power = match preferred_gpu.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None, // headless — compute + copies only
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(FatalDeviceError::NoAdapter)?;

        let info = adapter.get_info();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("HistLab GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
                        max_compute_workgroup_size_x: limits.max_compute_workgroup_size_x,
                        max_compute_workgroup_size_y: limits.max_compute_workgroup_size_y,
                        max_compute_workgroup_size_z: limits.max_compute_workgroup_size_z,
                        max_compute_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| FatalDeviceError::DeviceRequest(e.to_string()))?;

        log_info!(
            "[GPU] Using adapter '{}' ({:?}, {:?}), max texture {}",
            info.name,
            info.backend,
            info.device_type,
            limits.max_texture_dimension_2d
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: info.name,
            backend: info.backend,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width > 0 && height > 0 && width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands and block until the device is idle.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }
}
