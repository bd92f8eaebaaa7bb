// ============================================================================
// CPU FILTER ADAPTERS — image → pixel buffer → kernel → image
// ============================================================================

use super::kernels::{KernelError, contrast_stretch_rgba8888, equalize_color_rgba8888, equalize_rgba8888};
use crate::error::EnhanceError;
use crate::image_data::{Image, PixelBuffer, PixelFormat};

/// Which buffer kernel an adapter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuFilter {
    Equalize,
    /// Equalize R, G and B only.
    EqualizeColor,
    Stretch,
}

impl CpuFilter {
    pub fn display_name(&self) -> &'static str {
        match self {
            CpuFilter::Equalize => "Histogram Equalization",
            CpuFilter::EqualizeColor => "Histogram Equalization (color)",
            CpuFilter::Stretch => "Contrast Stretch",
        }
    }

    /// Run the filter on `image` using the given working layout.
    ///
    /// Both buffers are owned by this call and dropped before it returns,
    /// whether the kernel succeeds or not.
    pub fn apply(&self, image: &Image, format: &PixelFormat) -> Result<Image, EnhanceError> {
        let src = PixelBuffer::from_image(image, format)?;
        let mut dst = PixelBuffer::zeroed_like(&src);
        self.kernel()(&src, &mut dst)?;
        dst.into_image(image.color_space())
    }

    fn kernel(&self) -> fn(&PixelBuffer, &mut PixelBuffer) -> Result<(), KernelError> {
        match self {
            CpuFilter::Equalize => equalize_rgba8888,
            CpuFilter::EqualizeColor => equalize_color_rgba8888,
            CpuFilter::Stretch => contrast_stretch_rgba8888,
        }
    }
}
