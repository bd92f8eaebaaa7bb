// ============================================================================
// HISTOGRAM — per-channel 256-bin counts and the equalization transform
// ============================================================================
//
// The same `Histogram` type is produced by the CPU overlay computation and by
// the GPU histogram pass readback, so the two can be compared directly.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::image_data::Image;

/// Number of bins per channel.
pub const HISTOGRAM_BINS: usize = 256;

/// Channel order used by every histogram: R, G, B, A.
pub const CHANNELS: usize = 4;

/// 256 counts per channel over the normalised range [0, 1].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub bins: [[u32; HISTOGRAM_BINS]; CHANNELS],
}

impl Histogram {
    pub fn empty() -> Self {
        Self { bins: [[0; HISTOGRAM_BINS]; CHANNELS] }
    }

    /// Build from a flat `[r, g, b, a, ...]` array laid out as 1024 words
    /// (the GPU buffer layout: channel-major, 256 words per channel).
    pub fn from_words(words: &[u32]) -> Option<Self> {
        if words.len() != HISTOGRAM_BINS * CHANNELS {
            return None;
        }
        let mut h = Self::empty();
        for (c, chunk) in words.chunks_exact(HISTOGRAM_BINS).enumerate() {
            h.bins[c].copy_from_slice(chunk);
        }
        Some(h)
    }

    /// Count every pixel of a tightly packed RGBA8 image.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let w = img.width() as usize;
        if w == 0 || img.height() == 0 {
            return Self::empty();
        }
        let stride = w * 4;
        img.as_raw()
            .par_chunks(stride)
            .fold(Self::empty, |mut acc, row| {
                for px in row.chunks_exact(4) {
                    acc.bins[0][px[0] as usize] += 1;
                    acc.bins[1][px[1] as usize] += 1;
                    acc.bins[2][px[2] as usize] += 1;
                    acc.bins[3][px[3] as usize] += 1;
                }
                acc
            })
            .reduce(Self::empty, |mut a, b| {
                a.merge(&b);
                a
            })
    }

    /// Histogram of any image the working layout can represent.  Images that
    /// cannot be normalised yield an empty histogram.
    pub fn from_image(image: &Image) -> Self {
        match image.as_rgba8() {
            Some(rgba) => Self::from_rgba(rgba),
            None => image.to_rgba8().map(|rgba| Self::from_rgba(&rgba)).unwrap_or_else(|_| Self::empty()),
        }
    }

    pub fn merge(&mut self, other: &Histogram) {
        for c in 0..CHANNELS {
            for i in 0..HISTOGRAM_BINS {
                self.bins[c][i] += other.bins[c][i];
            }
        }
    }

    pub fn channel(&self, c: usize) -> &[u32; HISTOGRAM_BINS] {
        &self.bins[c]
    }

    /// Sum of all bins of one channel.
    pub fn total(&self, c: usize) -> u64 {
        self.bins[c].iter().map(|&n| n as u64).sum()
    }

    /// Largest single bin over the color channels (alpha excluded, it is
    /// usually one spike at 255 and would flatten the overlay).
    pub fn max_color_count(&self) -> u32 {
        self.bins[..3].iter().flat_map(|ch| ch.iter().copied()).max().unwrap_or(0)
    }

    /// Lowest and highest occupied bin of a channel.
    pub fn range(&self, c: usize) -> Option<(u8, u8)> {
        let ch = &self.bins[c];
        let lo = ch.iter().position(|&n| n > 0)?;
        let hi = ch.iter().rposition(|&n| n > 0)?;
        Some((lo as u8, hi as u8))
    }

    /// Mean value of a channel in 0..255.
    pub fn mean(&self, c: usize) -> f64 {
        let total = self.total(c);
        if total == 0 {
            return 0.0;
        }
        let sum: u64 = self.bins[c].iter().enumerate().map(|(v, &n)| v as u64 * n as u64).sum();
        sum as f64 / total as f64
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// EQUALIZATION TRANSFORM
// ============================================================================

/// Per-channel lookup mapping raw intensity to equalized intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizationTransform {
    pub luts: [[u8; HISTOGRAM_BINS]; CHANNELS],
}

impl EqualizationTransform {
    /// Derive the transform from a histogram.  When `include_alpha` is false
    /// the alpha LUT is the identity.
    pub fn from_histogram(hist: &Histogram, include_alpha: bool) -> Self {
        let mut luts = [identity_lut(); CHANNELS];
        let channels = if include_alpha { CHANNELS } else { 3 };
        for (c, lut) in luts.iter_mut().enumerate().take(channels) {
            *lut = equalization_lut(&hist.bins[c]);
        }
        Self { luts }
    }

    pub fn is_identity(&self) -> bool {
        let id = identity_lut();
        self.luts.iter().all(|l| *l == id)
    }
}

pub fn identity_lut() -> [u8; HISTOGRAM_BINS] {
    let mut lut = [0u8; HISTOGRAM_BINS];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = i as u8;
    }
    lut
}

/// CDF-based equalization LUT for one channel.
///
///   lut[v] = round((cdf[v] - cdf_min) / (N - cdf_min) * 255)
///
/// A single-valued channel (N == cdf_min) maps to the identity so that flat
/// inputs come back unchanged.
pub fn equalization_lut(hist: &[u32; HISTOGRAM_BINS]) -> [u8; HISTOGRAM_BINS] {
    let mut cdf = [0u64; HISTOGRAM_BINS];
    let mut running = 0u64;
    for (i, &n) in hist.iter().enumerate() {
        running += n as u64;
        cdf[i] = running;
    }
    let total = running;
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total <= cdf_min {
        return identity_lut();
    }

    let denom = (total - cdf_min) as f32;
    let mut lut = [0u8; HISTOGRAM_BINS];
    for (i, v) in lut.iter_mut().enumerate() {
        let num = cdf[i].saturating_sub(cdf_min) as f32;
        *v = (num / denom * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Min–max contrast stretch LUT.  Identity when there is no range to stretch.
pub fn stretch_lut(min: u8, max: u8) -> [u8; HISTOGRAM_BINS] {
    if max <= min {
        return identity_lut();
    }
    let range = (max - min) as f32;
    let mut lut = [0u8; HISTOGRAM_BINS];
    for (i, v) in lut.iter_mut().enumerate() {
        let x = i as f32;
        let s = if i as u8 <= min {
            0.0
        } else if i as u8 >= max {
            255.0
        } else {
            (x - min as f32) / range * 255.0
        };
        *v = s.round().clamp(0.0, 255.0) as u8;
    }
    lut
}
