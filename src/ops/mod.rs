// ============================================================================
// OPS MODULE — CPU-side image enhancement
// ============================================================================
//
// Architecture:
//   histogram.rs   — Histogram, EqualizationTransform, equalize/stretch LUTs
//   kernels.rs     — RGBA8888 buffer kernels (equalize, contrast stretch)
//   filters.rs     — CpuFilter adapters: Image → PixelBuffer → kernel → Image
//   auto_adjust.rs — filter catalog, capability contract, tone curve
//   color.rs       — luminance + HSL helpers
// ============================================================================

pub mod auto_adjust;
pub mod color;
pub mod filters;
pub mod histogram;
pub mod kernels;

pub use auto_adjust::{AutoAdjust, Capability, FilterCatalog};
pub use filters::CpuFilter;
pub use histogram::{EqualizationTransform, Histogram};
