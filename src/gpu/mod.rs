// ============================================================================
// GPU MODULE — compute-shader histogram equalization
// ============================================================================
//
// Architecture:
//   context.rs   — wgpu Device, Queue, adapter init
//   shaders.rs   — all WGSL shader source (inline strings)
//   texture.rs   — scoped allocation, texture upload, staging readback
//   histogram.rs — histogram / transform / apply pipeline and GpuEqualizer
// ============================================================================

pub mod context;
pub mod histogram;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use histogram::{GpuEqualizer, HistogramInfo};
