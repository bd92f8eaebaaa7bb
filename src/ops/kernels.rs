// ============================================================================
// BUFFER KERNELS — single-call histogram operations on RGBA8888 buffers
// ============================================================================
//
// Library-style entry points: each takes a source and a destination buffer
// descriptor of identical shape and returns a status.  Channels are processed
// independently; `equalize_rgba8888` covers alpha too, `equalize_color_rgba8888`
// copies it through.  Rows are processed in parallel
// via rayon; padding bytes past `width * 4` are left untouched.
// ============================================================================

use rayon::prelude::*;
use thiserror::Error;

use super::histogram::{EqualizationTransform, HISTOGRAM_BINS, Histogram, identity_lut, stretch_lut};
use crate::image_data::PixelBuffer;

/// Status returned by a kernel that refused to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("source is {src_w}×{src_h} but destination is {dst_w}×{dst_h}")]
    ShapeMismatch {
        src_w: usize,
        src_h: usize,
        dst_w: usize,
        dst_h: usize,
    },

    #[error("row stride {stride} is smaller than {min} bytes")]
    InvalidStride { stride: usize, min: usize },

    #[error("buffer holds {len} bytes, needs {needed}")]
    BufferTooSmall { len: usize, needed: usize },
}

type ChannelLuts = [[u8; HISTOGRAM_BINS]; 4];

/// Global per-channel histogram equalization of R, G, B and A.
pub fn equalize_rgba8888(src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<(), KernelError> {
    equalize_channels(src, dst, true)
}

/// Histogram equalization of R, G and B; alpha is copied unchanged.
pub fn equalize_color_rgba8888(src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<(), KernelError> {
    equalize_channels(src, dst, false)
}

fn equalize_channels(src: &PixelBuffer, dst: &mut PixelBuffer, include_alpha: bool) -> Result<(), KernelError> {
    validate(src, dst)?;
    let transform = EqualizationTransform::from_histogram(&channel_histograms(src), include_alpha);
    if transform.is_identity() {
        copy_rows(src, dst);
    } else {
        apply_luts(src, dst, &transform.luts);
    }
    Ok(())
}

/// Per-channel min–max contrast stretch.
pub fn contrast_stretch_rgba8888(src: &PixelBuffer, dst: &mut PixelBuffer) -> Result<(), KernelError> {
    validate(src, dst)?;
    let hist = channel_histograms(src);
    let luts: ChannelLuts = std::array::from_fn(|c| match hist.range(c) {
        Some((lo, hi)) => stretch_lut(lo, hi),
        None => identity_lut(),
    });
    apply_luts(src, dst, &luts);
    Ok(())
}

fn validate(src: &PixelBuffer, dst: &PixelBuffer) -> Result<(), KernelError> {
    if src.width != dst.width || src.height != dst.height {
        return Err(KernelError::ShapeMismatch {
            src_w: src.width,
            src_h: src.height,
            dst_w: dst.width,
            dst_h: dst.height,
        });
    }
    for buf in [src, dst] {
        let min = buf.width * 4;
        if buf.row_stride < min {
            return Err(KernelError::InvalidStride { stride: buf.row_stride, min });
        }
        let needed = buf.row_stride * buf.height;
        if buf.data.len() < needed {
            return Err(KernelError::BufferTooSmall { len: buf.data.len(), needed });
        }
    }
    Ok(())
}

/// Counts over the visible `width × 4` bytes of each row only.
fn channel_histograms(src: &PixelBuffer) -> Histogram {
    let tight = src.width * 4;
    src.data
        .par_chunks(src.row_stride)
        .take(src.height)
        .fold(Histogram::empty, |mut acc, row| {
            for px in row[..tight].chunks_exact(4) {
                acc.bins[0][px[0] as usize] += 1;
                acc.bins[1][px[1] as usize] += 1;
                acc.bins[2][px[2] as usize] += 1;
                acc.bins[3][px[3] as usize] += 1;
            }
            acc
        })
        .reduce(Histogram::empty, |mut a, b| {
            a.merge(&b);
            a
        })
}

fn copy_rows(src: &PixelBuffer, dst: &mut PixelBuffer) {
    let tight = src.width * 4;
    for (row_out, row_in) in dst
        .data
        .chunks_mut(dst.row_stride)
        .zip(src.data.chunks(src.row_stride))
        .take(src.height)
    {
        row_out[..tight].copy_from_slice(&row_in[..tight]);
    }
}

fn apply_luts(src: &PixelBuffer, dst: &mut PixelBuffer, luts: &ChannelLuts) {
    let tight = src.width * 4;
    let src_stride = src.row_stride;
    let src_data = &src.data;
    let height = dst.height;
    dst.data
        .par_chunks_mut(dst.row_stride)
        .take(height)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_data[y * src_stride..y * src_stride + tight];
            for (o, i) in row_out[..tight].chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
                o[0] = luts[0][i[0] as usize];
                o[1] = luts[1][i[1] as usize];
                o[2] = luts[2][i[2] as usize];
                o[3] = luts[3][i[3] as usize];
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_data::PixelFormat;

    fn buffer_from(width: usize, height: usize, pixels: &[[u8; 4]]) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, &PixelFormat::RGBA8888).unwrap();
        for (i, px) in pixels.iter().enumerate() {
            let (x, y) = (i % width, i / width);
            let off = y * buf.row_stride + x * 4;
            buf.data[off..off + 4].copy_from_slice(px);
        }
        buf
    }

    fn pixel(buf: &PixelBuffer, x: usize, y: usize) -> [u8; 4] {
        let off = y * buf.row_stride + x * 4;
        [buf.data[off], buf.data[off + 1], buf.data[off + 2], buf.data[off + 3]]
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let src = PixelBuffer::new(4, 4, &PixelFormat::RGBA8888).unwrap();
        let mut dst = PixelBuffer::new(4, 5, &PixelFormat::RGBA8888).unwrap();
        let err = equalize_rgba8888(&src, &mut dst).unwrap_err();
        assert!(matches!(err, KernelError::ShapeMismatch { dst_h: 5, .. }));
    }

    #[test]
    fn short_buffer_is_reported() {
        let src = PixelBuffer::new(4, 4, &PixelFormat::RGBA8888).unwrap();
        let mut dst = PixelBuffer::zeroed_like(&src);
        dst.data.truncate(10);
        assert!(matches!(
            contrast_stretch_rgba8888(&src, &mut dst),
            Err(KernelError::BufferTooSmall { len: 10, .. })
        ));
    }

    #[test]
    fn bad_stride_is_reported() {
        let mut src = PixelBuffer::new(4, 1, &PixelFormat::RGBA8888).unwrap();
        src.row_stride = 8;
        let mut dst = PixelBuffer::zeroed_like(&src);
        assert!(matches!(
            equalize_rgba8888(&src, &mut dst),
            Err(KernelError::InvalidStride { stride: 8, min: 16 })
        ));
    }

    #[test]
    fn stretch_expands_each_channel() {
        let src = buffer_from(2, 1, &[[50, 10, 0, 255], [150, 20, 255, 255]]);
        let mut dst = PixelBuffer::zeroed_like(&src);
        contrast_stretch_rgba8888(&src, &mut dst).unwrap();
        assert_eq!(pixel(&dst, 0, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&dst, 1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn equalize_spreads_low_contrast() {
        let pixels: Vec<[u8; 4]> = (0..16).map(|i| [100 + (i % 4) as u8; 4]).collect();
        let src = buffer_from(4, 4, &pixels);
        let mut dst = PixelBuffer::zeroed_like(&src);
        equalize_rgba8888(&src, &mut dst).unwrap();
        assert_eq!(pixel(&dst, 0, 0), [0; 4]);
        assert_eq!(pixel(&dst, 3, 0), [255; 4]);
    }

    #[test]
    fn color_equalize_copies_alpha() {
        let pixels: Vec<[u8; 4]> = (0..16).map(|i| [100 + (i % 4) as u8, 60, 7 * i as u8, 40 + i as u8]).collect();
        let src = buffer_from(4, 4, &pixels);

        let mut color_only = PixelBuffer::zeroed_like(&src);
        equalize_color_rgba8888(&src, &mut color_only).unwrap();
        let mut all = PixelBuffer::zeroed_like(&src);
        equalize_rgba8888(&src, &mut all).unwrap();

        for i in 0..16 {
            let (x, y) = (i % 4, i / 4);
            let (c, a) = (pixel(&color_only, x, y), pixel(&all, x, y));
            assert_eq!(c[3], pixels[i][3], "alpha changed at {i}");
            assert_eq!(c[..3], a[..3], "color differs at {i}");
        }
        assert_eq!(pixel(&all, 0, 0)[3], 0);
        assert_eq!(pixel(&all, 3, 3)[3], 255);
    }

    #[test]
    fn flat_source_is_copied_verbatim() {
        let src = buffer_from(3, 2, &[[9, 80, 200, 128]; 6]);
        let hist = channel_histograms(&src);
        assert!(EqualizationTransform::from_histogram(&hist, true).is_identity());
        let mut dst = PixelBuffer::zeroed_like(&src);
        equalize_rgba8888(&src, &mut dst).unwrap();
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(pixel(&dst, x, y), [9, 80, 200, 128]);
            }
        }
    }

    #[test]
    fn padding_bytes_untouched() {
        let src = buffer_from(1, 2, &[[0, 0, 0, 255], [255, 255, 255, 255]]);
        let mut dst = PixelBuffer::zeroed_like(&src);
        dst.data[4] = 0xAB;
        equalize_rgba8888(&src, &mut dst).unwrap();
        assert_eq!(dst.data[4], 0xAB);
    }
}
