// Synthetic test images shared by the integration tests.
#![allow(dead_code)]

use histlab::gpu::GpuEqualizer;
use histlab::{ColorSpace, Image};
use image::{Rgba, RgbaImage};

pub fn flat(width: u32, height: u32, px: [u8; 4]) -> Image {
    Image::from_rgba(RgbaImage::from_pixel(width, height, Rgba(px)), ColorSpace::Srgb)
}

/// Black/white squares of `cell` pixels, opaque.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> Image {
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let v = if ((x / cell) + (y / cell)) % 2 == 0 { 0 } else { 255 };
        Rgba([v, v, v, 255])
    });
    Image::from_rgba(rgba, ColorSpace::Srgb)
}

/// Every channel (alpha included) contains both 0 and 255.
pub fn full_range(width: u32, height: u32) -> Image {
    let span = (width * height - 1).max(1);
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let i = y * width + x;
        let v = (i * 255 / span) as u8;
        Rgba([v, 255 - v, v / 2 + if i == span { 128 } else { 0 }, if i % 2 == 0 { 0 } else { 255 }])
    });
    Image::from_rgba(rgba, ColorSpace::Srgb)
}

/// Dark-heavy distribution: v = 255·t² along the pixel index, different
/// per channel, opaque.
pub fn skewed(width: u32, height: u32) -> Image {
    let n = (width * height) as f32;
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let t = (y * width + x) as f32 / (n - 1.0).max(1.0);
        let r = (255.0 * t * t).round() as u8;
        let g = (255.0 * t * t * t).round() as u8;
        let b = (64.0 + 100.0 * t).round() as u8;
        Rgba([r, g, b, 255])
    });
    Image::from_rgba(rgba, ColorSpace::DeviceRgb)
}

/// Set to make a missing adapter fail the GPU tests instead of skipping them.
pub const REQUIRE_GPU_ENV: &str = "HISTLAB_REQUIRE_GPU";

/// `None` when the machine has no adapter, hardware or software.  The skip is
/// printed to stderr (visible with `--nocapture`) and becomes a failure when
/// `HISTLAB_REQUIRE_GPU` is set.
pub fn gpu() -> Option<GpuEqualizer> {
    match GpuEqualizer::new("high performance") {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            if std::env::var_os(REQUIRE_GPU_ENV).is_some() {
                panic!("{REQUIRE_GPU_ENV} is set but no adapter is available: {e}");
            }
            let test = std::thread::current().name().unwrap_or("GPU test").to_string();
            eprintln!("SKIPPED {test}: {e}");
            None
        }
    }
}

pub fn rgba(image: &Image) -> RgbaImage {
    image.to_rgba8().expect("test image converts to RGBA8")
}

/// Fraction of pixels in channel `c` at or below each level.
pub fn cumulative(image: &RgbaImage, c: usize) -> [f64; 256] {
    let mut counts = [0u64; 256];
    for px in image.pixels() {
        counts[px.0[c] as usize] += 1;
    }
    let n = (image.width() * image.height()) as f64;
    let mut out = [0.0; 256];
    let mut acc = 0u64;
    for (i, &k) in counts.iter().enumerate() {
        acc += k;
        out[i] = acc as f64 / n;
    }
    out
}

/// Largest gap between the channel's CDF and the uniform CDF, measured at
/// every output level that is actually used.
pub fn uniformity_error(image: &RgbaImage, c: usize) -> f64 {
    let cdf = cumulative(image, c);
    let mut used = [false; 256];
    for px in image.pixels() {
        used[px.0[c] as usize] = true;
    }
    (0..256)
        .filter(|&l| used[l])
        .map(|l| (cdf[l] - l as f64 / 255.0).abs())
        .fold(0.0, f64::max)
}
