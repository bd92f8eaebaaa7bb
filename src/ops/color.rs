// ============================================================================
// COLOR HELPERS — luminance and HSL conversions used by auto adjust
// ============================================================================

/// Rec. 709 luma of 0..255 components, rounded to a 0..255 bin.
#[inline]
pub fn luma_bin(r: u8, g: u8, b: u8) -> usize {
    let l = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    (l.round() as usize).min(255)
}

/// RGB in 0..1 to `(hue, saturation, lightness)`, each in 0..1.
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let hi = r.max(g).max(b);
    let lo = r.min(g).min(b);
    let chroma = hi - lo;
    let light = (hi + lo) * 0.5;
    if chroma < 1e-6 {
        return (0.0, 0.0, light);
    }

    let sat = chroma / (1.0 - (2.0 * light - 1.0).abs());
    // Hue sector 0..6: red, yellow, green, cyan, blue, magenta.
    let sector = if hi == r {
        ((g - b) / chroma).rem_euclid(6.0)
    } else if hi == g {
        (b - r) / chroma + 2.0
    } else {
        (r - g) / chroma + 4.0
    };
    (sector / 6.0, sat.min(1.0), light)
}

/// Inverse of [`rgb_to_hsl`].
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let sector = (h * 6.0).rem_euclid(6.0);
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = l - chroma * 0.5;
    (r + m, g + m, b + m)
}
