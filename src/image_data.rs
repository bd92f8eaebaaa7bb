// ============================================================================
// IMAGE DATA — immutable images, the working pixel format, scoped buffers
// ============================================================================
//
// `Image` is what every pipeline consumes and produces.  It is never mutated;
// each run builds a new one.  `PixelBuffer` is the CPU-side working copy used
// by the buffer kernels: it lives for exactly one adapter call and its memory
// is released by `Drop` on every exit path, including errors.
// ============================================================================

use image::{DynamicImage, RgbaImage};

use crate::error::EnhanceError;

/// Color space tag carried alongside the pixels.  Pipelines never convert
/// between spaces, they only propagate the tag from input to output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    DeviceRgb,
    LinearSrgb,
}

impl std::fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpace::Srgb => write!(f, "sRGB"),
            ColorSpace::DeviceRgb => write!(f, "Device RGB"),
            ColorSpace::LinearSrgb => write!(f, "Linear sRGB"),
        }
    }
}

/// An immutable 2-D image with a color space tag.
#[derive(Debug, Clone)]
pub struct Image {
    pixels: DynamicImage,
    color_space: ColorSpace,
}

impl Image {
    pub fn new(pixels: DynamicImage, color_space: ColorSpace) -> Self {
        Self { pixels, color_space }
    }

    pub fn from_rgba(pixels: RgbaImage, color_space: ColorSpace) -> Self {
        Self::new(DynamicImage::ImageRgba8(pixels), color_space)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// Normalise to tightly packed 8-bit RGBA.
    ///
    /// Integer layouts (gray, gray+alpha, RGB, RGBA at 8 or 16 bits) are
    /// widened or narrowed.  Floating-point HDR layouts are rejected: there is
    /// no lossless way to squeeze an unbounded range into 8 bits without
    /// choosing a tone map, which is not this function's call to make.
    pub fn to_rgba8(&self) -> Result<RgbaImage, EnhanceError> {
        if self.width() == 0 || self.height() == 0 {
            return Err(EnhanceError::Conversion(format!(
                "empty image ({}×{})",
                self.width(),
                self.height()
            )));
        }
        match &self.pixels {
            DynamicImage::ImageRgba8(img) => Ok(img.clone()),
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Err(EnhanceError::Conversion(format!(
                    "{:?} samples cannot be normalised to 8 bits per channel",
                    self.pixels.color()
                )))
            }
            other => Ok(other.to_rgba8()),
        }
    }

    /// Borrow the raw RGBA bytes when the image is already in the working layout.
    pub fn as_rgba8(&self) -> Option<&RgbaImage> {
        self.pixels.as_rgba8()
    }
}

// ============================================================================
// PIXEL FORMAT — immutable working-layout descriptor
// ============================================================================

/// Alpha storage convention of the working layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// Color channels are independent of alpha.
    Straight,
    /// Color channels are pre-multiplied by alpha.
    Premultiplied,
}

/// Describes the 4-channel, 8-bit buffer layout the CPU kernels operate on.
///
/// Passed by reference into every adapter call; there is no shared global
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_component: u32,
    pub bits_per_pixel: u32,
    pub alpha: AlphaMode,
    /// Row stride is rounded up to a multiple of this many bytes.
    pub row_alignment: usize,
}

impl PixelFormat {
    /// 8-bit RGBA, alpha last, straight alpha, 16-byte aligned rows.
    pub const RGBA8888: PixelFormat = PixelFormat {
        bits_per_component: 8,
        bits_per_pixel: 32,
        alpha: AlphaMode::Straight,
        row_alignment: 16,
    };

    pub fn with_row_alignment(self, row_alignment: usize) -> Self {
        Self { row_alignment: row_alignment.max(1), ..self }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel / 8) as usize
    }

    /// Smallest aligned row stride holding `width` pixels, or `None` on overflow.
    pub fn row_stride(&self, width: usize) -> Option<usize> {
        let tight = width.checked_mul(self.bytes_per_pixel())?;
        let align = self.row_alignment.max(1);
        tight.div_ceil(align).checked_mul(align)
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::RGBA8888
    }
}

// ============================================================================
// PIXEL BUFFER — scoped CPU working copy
// ============================================================================

/// Mutable, contiguous RGBA8 pixel storage with an explicit row stride.
///
/// Holds exactly `row_stride × height` bytes.  Bytes past `width × 4` in
/// each row are padding and are never read back into an image.
#[derive(Debug)]
pub struct PixelBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) row_stride: usize,
    pub(crate) format: PixelFormat,
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer.  Fails on arithmetic overflow.
    pub fn new(width: usize, height: usize, format: &PixelFormat) -> Result<Self, EnhanceError> {
        if format.bits_per_component != 8 || format.bits_per_pixel != 32 {
            return Err(EnhanceError::Conversion(format!(
                "unsupported working layout: {} bpc / {} bpp",
                format.bits_per_component, format.bits_per_pixel
            )));
        }
        let row_stride = format
            .row_stride(width)
            .ok_or_else(|| EnhanceError::Conversion(format!("row stride overflow for width {width}")))?;
        let len = row_stride
            .checked_mul(height)
            .ok_or_else(|| EnhanceError::Conversion(format!("buffer size overflow for {width}×{height}")))?;
        Ok(Self {
            data: vec![0u8; len],
            width,
            height,
            row_stride,
            format: *format,
        })
    }

    /// Render an image into a freshly allocated buffer of the given layout.
    pub fn from_image(image: &Image, format: &PixelFormat) -> Result<Self, EnhanceError> {
        let rgba = image.to_rgba8()?;
        let (w, h) = (rgba.width() as usize, rgba.height() as usize);
        let mut buf = Self::new(w, h, format)?;
        let tight = w * 4;
        let src = rgba.as_raw();
        for (y, row) in buf.data.chunks_exact_mut(buf.row_stride).enumerate() {
            row[..tight].copy_from_slice(&src[y * tight..(y + 1) * tight]);
        }
        if format.alpha == AlphaMode::Premultiplied {
            buf.premultiply();
        }
        Ok(buf)
    }

    /// A zeroed buffer with the same width, height, stride and format.
    pub fn zeroed_like(other: &PixelBuffer) -> Self {
        Self {
            data: vec![0u8; other.data.len()],
            width: other.width,
            height: other.height,
            row_stride: other.row_stride,
            format: other.format,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, strip row padding and wrap the pixels as an image.
    pub fn into_image(mut self, color_space: ColorSpace) -> Result<Image, EnhanceError> {
        if self.format.alpha == AlphaMode::Premultiplied {
            self.unpremultiply();
        }
        let tight = self.width * 4;
        let mut packed = Vec::with_capacity(tight * self.height);
        for row in self.data.chunks_exact(self.row_stride).take(self.height) {
            packed.extend_from_slice(&row[..tight]);
        }
        let rgba = RgbaImage::from_raw(self.width as u32, self.height as u32, packed)
            .ok_or_else(|| EnhanceError::Conversion("pixel buffer shape does not match its data".into()))?;
        Ok(Image::from_rgba(rgba, color_space))
    }

    fn premultiply(&mut self) {
        let tight = self.width * 4;
        for row in self.data.chunks_exact_mut(self.row_stride) {
            for px in row[..tight].chunks_exact_mut(4) {
                let a = px[3] as u32;
                for c in &mut px[..3] {
                    *c = ((*c as u32 * a + 127) / 255) as u8;
                }
            }
        }
    }

    fn unpremultiply(&mut self) {
        let tight = self.width * 4;
        for row in self.data.chunks_exact_mut(self.row_stride) {
            for px in row[..tight].chunks_exact_mut(4) {
                let a = px[3] as u32;
                if a == 0 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}
