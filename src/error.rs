// ============================================================================
// ERRORS — failure taxonomy for the enhancement pipelines
// ============================================================================
//
// Every pipeline error is local to one mode selection: the controller logs
// it and keeps the previous image on screen.  Only `FatalDeviceError` is
// raised at startup, and it disables the GPU mode rather than the app.
// ============================================================================

use thiserror::Error;

use crate::ops::auto_adjust::Capability;
use crate::ops::kernels::KernelError;

/// Recoverable failure of a single enhancement run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnhanceError {
    /// The source could not be normalised to the 8-bit RGBA working layout.
    #[error("image conversion failed: {0}")]
    Conversion(String),

    /// A pixel-buffer kernel rejected its arguments.
    #[error("filter execution failed: {0}")]
    FilterExecution(#[from] KernelError),

    /// A GPU texture or buffer could not be allocated.
    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// The filter catalog offered nothing with the required capability.
    #[error("no auto-adjust filter provides {0}")]
    NoFilterAvailable(Capability),

    /// GPU mode was requested but no device was created at startup.
    #[error("GPU mode is disabled: no compute device")]
    GpuUnavailable,
}

/// No compute device could be created.  Raised once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalDeviceError {
    #[error("no suitable GPU adapter found (hardware or fallback)")]
    NoAdapter,

    #[error("failed to request GPU device: {0}")]
    DeviceRequest(String),
}
