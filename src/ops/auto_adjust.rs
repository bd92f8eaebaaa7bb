// ============================================================================
// AUTO ADJUST — filter catalog with capability contracts + tone curve
// ============================================================================
//
// The catalog inspects an image and recommends auto-adjustment filters.  Each
// filter declares the `Capability` it provides; callers ask for a capability,
// never for a filter by name.  `AutoAdjust` needs a tone curve and fails fast
// with `NoFilterAvailable` when the catalog does not offer one (for example
// on a flat image, where there is nothing to derive a curve from).
// ============================================================================

use std::fmt;

use image::RgbaImage;
use rayon::prelude::*;

use super::color::{hsl_to_rgb, luma_bin, rgb_to_hsl};
use super::histogram::{HISTOGRAM_BINS, identity_lut};
use crate::error::EnhanceError;
use crate::image_data::Image;

/// What an auto-adjustment filter can do to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Per-channel intensity remapping derived from image statistics.
    ToneCurve,
    /// Saturation boost weighted toward muted colors.
    Vibrance,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ToneCurve => write!(f, "tone curve"),
            Capability::Vibrance => write!(f, "vibrance"),
        }
    }
}

/// A configured filter recommended for one specific image.
pub trait AutoAdjustFilter: Send + Sync {
    fn capability(&self) -> Capability;
    fn name(&self) -> &'static str;
    fn apply(&self, image: &Image) -> Result<Image, EnhanceError>;
}

// ============================================================================
// FILTER CATALOG
// ============================================================================

/// Mean HSL saturation below which vibrance is recommended.
const VIBRANCE_SATURATION_THRESHOLD: f32 = 0.35;

/// Luminance percentiles sampled for the tone curve control points.
const CURVE_PERCENTILES: [f64; 5] = [0.005, 0.25, 0.5, 0.75, 0.995];

/// Evenly spaced output targets the control points are pulled toward.
const CURVE_TARGETS: [f32; 5] = [0.0, 64.0, 128.0, 191.0, 255.0];

/// How far interior control points move toward their targets (0 = none, 1 = all the way).
const CURVE_STRENGTH: f32 = 0.5;

pub struct FilterCatalog;

impl FilterCatalog {
    /// Recommend auto-adjustment filters for `image`, already configured
    /// from its statistics.
    pub fn auto_adjustment_filters(image: &Image) -> Result<Vec<Box<dyn AutoAdjustFilter>>, EnhanceError> {
        let rgba = image.to_rgba8()?;
        let stats = ImageStats::measure(&rgba);
        let mut filters: Vec<Box<dyn AutoAdjustFilter>> = Vec::new();

        if stats.mean_saturation < VIBRANCE_SATURATION_THRESHOLD && stats.counted > 0 {
            let amount = ((VIBRANCE_SATURATION_THRESHOLD - stats.mean_saturation) * 100.0).clamp(0.0, 40.0);
            filters.push(Box::new(VibranceFilter { amount }));
        }
        if let Some(points) = stats.tone_curve_points() {
            filters.push(Box::new(ToneCurveFilter::new(points)));
        }
        Ok(filters)
    }

    /// The first recommended filter providing `capability`.  `Ok(None)` means
    /// the image was readable but nothing on offer provides it.
    pub fn find(image: &Image, capability: Capability) -> Result<Option<Box<dyn AutoAdjustFilter>>, EnhanceError> {
        Ok(Self::auto_adjustment_filters(image)?
            .into_iter()
            .find(|f| f.capability() == capability))
    }
}

/// Statistics over visible (alpha > 0) pixels.
struct ImageStats {
    luma_hist: [u32; HISTOGRAM_BINS],
    counted: u64,
    mean_saturation: f32,
}

impl ImageStats {
    fn measure(rgba: &RgbaImage) -> Self {
        let stride = rgba.width() as usize * 4;
        let (luma_hist, counted, sat_sum) = rgba
            .as_raw()
            .par_chunks(stride.max(4))
            .fold(
                || ([0u32; HISTOGRAM_BINS], 0u64, 0f64),
                |(mut hist, mut n, mut sat), row| {
                    for px in row.chunks_exact(4) {
                        if px[3] == 0 {
                            continue;
                        }
                        hist[luma_bin(px[0], px[1], px[2])] += 1;
                        let (_, s, _) =
                            rgb_to_hsl(px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0);
                        sat += s as f64;
                        n += 1;
                    }
                    (hist, n, sat)
                },
            )
            .reduce(
                || ([0u32; HISTOGRAM_BINS], 0u64, 0f64),
                |(mut ha, na, sa), (hb, nb, sb)| {
                    for i in 0..HISTOGRAM_BINS {
                        ha[i] += hb[i];
                    }
                    (ha, na + nb, sa + sb)
                },
            );
        let mean_saturation = if counted == 0 { 0.0 } else { (sat_sum / counted as f64) as f32 };
        Self { luma_hist, counted, mean_saturation }
    }

    /// Smallest luminance level whose cumulative share reaches `q`.
    fn percentile(&self, q: f64) -> u8 {
        let target = (q * self.counted as f64).ceil().max(1.0) as u64;
        let mut running = 0u64;
        for (v, &n) in self.luma_hist.iter().enumerate() {
            running += n as u64;
            if running >= target {
                return v as u8;
            }
        }
        255
    }

    /// Five control points, or `None` when the image has a single luminance level.
    fn tone_curve_points(&self) -> Option<Vec<(f32, f32)>> {
        let distinct = self.luma_hist.iter().filter(|&&n| n > 0).count();
        if self.counted == 0 || distinct < 2 {
            return None;
        }
        let mut points: Vec<(f32, f32)> = Vec::with_capacity(CURVE_PERCENTILES.len());
        let last = CURVE_PERCENTILES.len() - 1;
        for (i, (&q, &target)) in CURVE_PERCENTILES.iter().zip(CURVE_TARGETS.iter()).enumerate() {
            let x = self.percentile(q) as f32;
            let y = if i == 0 || i == last { target } else { x + (target - x) * CURVE_STRENGTH };
            if points.last().is_some_and(|&(px, _)| x <= px) {
                continue;
            }
            points.push((x, y));
        }
        // Heavy spikes can collapse the upper percentiles onto the first one.
        if points.len() < 2 {
            return None;
        }
        if let Some(p) = points.last_mut() {
            p.1 = 255.0;
        }
        Some(points)
    }
}

// ============================================================================
// TONE CURVE
// ============================================================================

/// Monotone cubic tone curve applied to R, G and B.  Alpha is untouched.
pub struct ToneCurveFilter {
    points: Vec<(f32, f32)>,
    lut: [u8; HISTOGRAM_BINS],
}

impl ToneCurveFilter {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        let lut = build_curve_lut(&points);
        Self { points, lut }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn lut(&self) -> &[u8; HISTOGRAM_BINS] {
        &self.lut
    }
}

impl AutoAdjustFilter for ToneCurveFilter {
    fn capability(&self) -> Capability {
        Capability::ToneCurve
    }

    fn name(&self) -> &'static str {
        "Tone Curve"
    }

    fn apply(&self, image: &Image) -> Result<Image, EnhanceError> {
        let lut = self.lut;
        map_pixels(image, move |px| [lut[px[0] as usize], lut[px[1] as usize], lut[px[2] as usize], px[3]])
    }
}

/// Sample the monotone cubic through `points` (sorted by x) at every input
/// level.  Levels outside the first and last control point are clamped to
/// their y.  Fewer than two points give the identity.
pub fn build_curve_lut(points: &[(f32, f32)]) -> [u8; HISTOGRAM_BINS] {
    if points.len() < 2 {
        return identity_lut();
    }
    let curve = MonotoneCubic::new(points);
    let (first, last) = (points[0], points[points.len() - 1]);

    let mut lut = [0u8; HISTOGRAM_BINS];
    let mut seg = 0;
    for (level, out) in lut.iter_mut().enumerate() {
        let x = level as f32;
        let y = if x <= first.0 {
            first.1
        } else if x >= last.0 {
            last.1
        } else {
            while seg + 2 < points.len() && x >= points[seg + 1].0 {
                seg += 1;
            }
            curve.eval(seg, x)
        };
        *out = y.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Fritsch-Carlson monotone cubic Hermite spline.
struct MonotoneCubic<'a> {
    points: &'a [(f32, f32)],
    tangents: Vec<f32>,
}

impl<'a> MonotoneCubic<'a> {
    /// `points` must hold at least two entries.
    fn new(points: &'a [(f32, f32)]) -> Self {
        let secants: Vec<f32> = points
            .windows(2)
            .map(|w| {
                let dx = w[1].0 - w[0].0;
                if dx.abs() < 1e-6 { 0.0 } else { (w[1].1 - w[0].1) / dx }
            })
            .collect();

        // Ends take their secant; interior points average the two around
        // them, or go flat at a local extremum.
        let mut tangents = Vec::with_capacity(points.len());
        tangents.push(secants[0]);
        tangents.extend(
            secants
                .windows(2)
                .map(|d| if d[0] * d[1] <= 0.0 { 0.0 } else { 0.5 * (d[0] + d[1]) }),
        );
        tangents.push(secants[secants.len() - 1]);

        for (k, &d) in secants.iter().enumerate() {
            if d.abs() < 1e-6 {
                tangents[k] = 0.0;
                tangents[k + 1] = 0.0;
                continue;
            }
            let (a, b) = (tangents[k] / d, tangents[k + 1] / d);
            let r2 = a * a + b * b;
            if r2 > 9.0 {
                let scale = 3.0 / r2.sqrt();
                tangents[k] = scale * a * d;
                tangents[k + 1] = scale * b * d;
            }
        }
        Self { points, tangents }
    }

    /// Value at `x` on the segment starting at control point `k`, evaluated
    /// as a cubic Bezier.
    fn eval(&self, k: usize, x: f32) -> f32 {
        let (x0, y0) = self.points[k];
        let (x1, y1) = self.points[k + 1];
        let h = x1 - x0;
        if h.abs() < 1e-6 {
            return y0;
        }
        let t = (x - x0) / h;
        let u = 1.0 - t;
        let c0 = y0 + self.tangents[k] * h / 3.0;
        let c1 = y1 - self.tangents[k + 1] * h / 3.0;
        u * u * u * y0 + 3.0 * u * t * (u * c0 + t * c1) + t * t * t * y1
    }
}

// ============================================================================
// VIBRANCE
// ============================================================================

/// Boosts saturation selectively — less-saturated colors are boosted more.
/// `amount`: 0..100
pub struct VibranceFilter {
    amount: f32,
}

impl AutoAdjustFilter for VibranceFilter {
    fn capability(&self) -> Capability {
        Capability::Vibrance
    }

    fn name(&self) -> &'static str {
        "Vibrance"
    }

    fn apply(&self, image: &Image) -> Result<Image, EnhanceError> {
        let v = self.amount / 100.0;
        map_pixels(image, move |px| {
            let (h, s, l) = rgb_to_hsl(px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0);
            let ns = (s + v * (1.0 - s).powi(2)).clamp(0.0, 1.0);
            let (r, g, b) = hsl_to_rgb(h, ns, l);
            let q = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
            [q(r), q(g), q(b), px[3]]
        })
    }
}

/// Per-pixel map into a new RGBA image, rows in parallel.
fn map_pixels<F>(image: &Image, f: F) -> Result<Image, EnhanceError>
where
    F: Fn(&[u8]) -> [u8; 4] + Sync,
{
    let src = image.to_rgba8()?;
    let (w, h) = src.dimensions();
    let stride = w as usize * 4;
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for (o, i) in row_out.chunks_exact_mut(4).zip(row_in.chunks_exact(4)) {
            o.copy_from_slice(&f(i));
        }
    });

    let out = RgbaImage::from_raw(w, h, dst_raw)
        .ok_or_else(|| EnhanceError::Conversion("mapped pixel data does not match image shape".into()))?;
    Ok(Image::from_rgba(out, image.color_space()))
}

// ============================================================================
// AUTO ADJUST PIPELINE
// ============================================================================

/// Applies the catalog's tone-curve recommendation to an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAdjust;

impl AutoAdjust {
    pub const REQUIRED: Capability = Capability::ToneCurve;

    pub fn run(&self, image: &Image) -> Result<Image, EnhanceError> {
        let filter = FilterCatalog::find(image, Self::REQUIRED)?
            .ok_or(EnhanceError::NoFilterAvailable(Self::REQUIRED))?;
        filter.apply(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_data::ColorSpace;
    use image::Rgba;

    fn gradient(lo: u8, hi: u8) -> Image {
        let span = (hi - lo) as u32;
        let rgba = RgbaImage::from_fn(64, 8, |x, _| {
            let v = lo + (x * span / 63) as u8;
            Rgba([v, v, v, 255])
        });
        Image::from_rgba(rgba, ColorSpace::Srgb)
    }

    #[test]
    fn flat_image_has_no_tone_curve() {
        let img = Image::from_rgba(RgbaImage::from_pixel(8, 8, Rgba([128, 128, 128, 255])), ColorSpace::Srgb);
        assert!(FilterCatalog::find(&img, Capability::ToneCurve).unwrap().is_none());
        assert_eq!(
            AutoAdjust.run(&img).unwrap_err(),
            EnhanceError::NoFilterAvailable(Capability::ToneCurve)
        );
    }

    #[test]
    fn unreadable_image_is_a_conversion_error_not_a_missing_filter() {
        let hdr = image::Rgba32FImage::from_pixel(8, 8, Rgba([0.2, 0.4, 0.6, 1.0]));
        let img = Image::new(image::DynamicImage::ImageRgba32F(hdr), ColorSpace::LinearSrgb);
        assert!(matches!(FilterCatalog::auto_adjustment_filters(&img), Err(EnhanceError::Conversion(_))));
        assert!(matches!(FilterCatalog::find(&img, Capability::ToneCurve), Err(EnhanceError::Conversion(_))));
        assert!(matches!(AutoAdjust.run(&img), Err(EnhanceError::Conversion(_))));
    }

    #[test]
    fn gray_image_gets_vibrance_recommendation() {
        let filters = FilterCatalog::auto_adjustment_filters(&gradient(40, 200)).unwrap();
        assert!(filters.iter().any(|f| f.capability() == Capability::Vibrance));
        assert!(filters.iter().any(|f| f.capability() == Capability::ToneCurve));
    }

    #[test]
    fn tone_curve_widens_low_contrast_range() {
        let img = gradient(90, 160);
        let out = AutoAdjust.run(&img).unwrap();
        let px = out.as_rgba8().unwrap();
        let first = px.get_pixel(0, 0).0[0];
        let last = px.get_pixel(63, 0).0[0];
        assert!(first < 90, "dark end not lowered: {first}");
        assert!(last > 160, "bright end not raised: {last}");
        assert_eq!(px.get_pixel(10, 3).0[3], 255);
    }

    #[test]
    fn curve_lut_is_monotone_and_hits_endpoints() {
        let lut = build_curve_lut(&[(10.0, 0.0), (60.0, 50.0), (120.0, 128.0), (200.0, 220.0), (240.0, 255.0)]);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[10], 0);
        assert_eq!(lut[240], 255);
        assert_eq!(lut[255], 255);
        for i in 1..256 {
            assert!(lut[i] >= lut[i - 1], "decreasing at {i}");
        }
    }

    #[test]
    fn curve_passes_through_interior_points() {
        let lut = build_curve_lut(&[(0.0, 0.0), (60.0, 50.0), (120.0, 128.0), (255.0, 255.0)]);
        assert_eq!(lut[60], 50);
        assert_eq!(lut[120], 128);
        // Straight line stays straight.
        let line = build_curve_lut(&[(0.0, 0.0), (128.0, 128.0), (255.0, 255.0)]);
        assert_eq!(line, identity_lut());
    }

    #[test]
    fn vibrance_boosts_muted_colors() {
        let rgba = RgbaImage::from_fn(32, 2, |x, _| {
            let v = (80 + x * 3) as u8;
            Rgba([v, v, v + 12, 200])
        });
        let img = Image::from_rgba(rgba.clone(), ColorSpace::Srgb);
        let vibrance = FilterCatalog::find(&img, Capability::Vibrance).unwrap().unwrap();
        assert_eq!(vibrance.name(), "Vibrance");
        let out = vibrance.apply(&img).unwrap();
        let out = out.as_rgba8().unwrap();
        let chroma = |p: &Rgba<u8>| p.0[2] as i32 - p.0[0] as i32;
        for (o, i) in out.pixels().zip(rgba.pixels()) {
            assert!(chroma(o) > chroma(i), "{:?} -> {:?}", i.0, o.0);
            assert_eq!(o.0[3], 200);
        }
    }

    #[test]
    fn curve_with_too_few_points_is_identity() {
        assert_eq!(build_curve_lut(&[(5.0, 9.0)]), identity_lut());
    }

    #[test]
    fn transparent_pixels_are_ignored_for_statistics() {
        let rgba = RgbaImage::from_fn(4, 4, |x, _| if x < 2 { Rgba([0, 0, 0, 0]) } else { Rgba([77, 77, 77, 255]) });
        let img = Image::from_rgba(rgba, ColorSpace::Srgb);
        assert!(FilterCatalog::find(&img, Capability::ToneCurve).unwrap().is_none());
    }
}
