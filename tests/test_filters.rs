// tests/test_filters.rs — CPU equalize / stretch adapters through the public API.

mod common;

use common::{checkerboard, flat, full_range, rgba, skewed, uniformity_error};
use histlab::image_data::AlphaMode;
use histlab::ops::{CpuFilter, Histogram};
use histlab::{ColorSpace, EnhanceError, PixelFormat};

const FORMAT: PixelFormat = PixelFormat::RGBA8888;

// ===== Fixed points =====

#[test]
fn flat_image_unchanged_by_equalize() {
    let img = flat(17, 9, [40, 120, 200, 255]);
    let out = CpuFilter::Equalize.apply(&img, &FORMAT).unwrap();
    assert_eq!(rgba(&out), rgba(&img));
}

#[test]
fn mid_gray_unchanged_by_both_filters() {
    let img = flat(8, 8, [128, 128, 128, 255]);
    for filter in [CpuFilter::Equalize, CpuFilter::Stretch] {
        let out = filter.apply(&img, &FORMAT).unwrap();
        assert_eq!(rgba(&out), rgba(&img), "{} changed mid-gray", filter.display_name());
    }
}

#[test]
fn full_range_unchanged_by_stretch() {
    let img = full_range(32, 16);
    let out = CpuFilter::Stretch.apply(&img, &FORMAT).unwrap();
    assert_eq!(rgba(&out), rgba(&img));
}

#[test]
fn two_by_two_checkerboard_unchanged_by_equalize() {
    let img = checkerboard(2, 2, 1);
    let out = CpuFilter::Equalize.apply(&img, &FORMAT).unwrap();
    assert_eq!(rgba(&out), rgba(&img));
}

// ===== Behaviour on real distributions =====

#[test]
fn stretch_expands_narrow_range() {
    let rgba_in = image::RgbaImage::from_fn(50, 4, |x, _| {
        let v = 100 + x as u8;
        image::Rgba([v, v, v, 255])
    });
    let img = histlab::Image::from_rgba(rgba_in, ColorSpace::Srgb);
    let out = CpuFilter::Stretch.apply(&img, &FORMAT).unwrap();
    let hist = Histogram::from_image(&out);
    for c in 0..3 {
        assert_eq!(hist.range(c), Some((0, 255)));
    }
    // Single-valued alpha stays put.
    assert_eq!(hist.range(3), Some((255, 255)));
}

#[test]
fn equalize_flattens_skewed_histogram() {
    let img = skewed(128, 64);
    let out = rgba(&CpuFilter::Equalize.apply(&img, &FORMAT).unwrap());
    let before = rgba(&img);
    for c in [0, 2] {
        let after_err = uniformity_error(&out, c);
        assert!(after_err < 0.06, "channel {c}: CDF off uniform by {after_err}");
        assert!(after_err < uniformity_error(&before, c));
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let img = skewed(61, 37);
    for filter in [CpuFilter::Equalize, CpuFilter::Stretch] {
        let a = filter.apply(&img, &FORMAT).unwrap();
        let b = filter.apply(&img, &FORMAT).unwrap();
        assert_eq!(rgba(&a), rgba(&b));
    }
}

#[test]
fn row_alignment_does_not_change_output() {
    let img = skewed(33, 7);
    let tight = CpuFilter::Equalize.apply(&img, &FORMAT.with_row_alignment(1)).unwrap();
    let padded = CpuFilter::Equalize.apply(&img, &FORMAT.with_row_alignment(256)).unwrap();
    assert_eq!(rgba(&tight), rgba(&padded));
}

#[test]
fn output_keeps_color_space_and_size() {
    let img = skewed(20, 10);
    let out = CpuFilter::Stretch.apply(&img, &FORMAT).unwrap();
    assert_eq!(out.color_space(), ColorSpace::DeviceRgb);
    assert_eq!((out.width(), out.height()), (20, 10));
}

// ===== Errors =====

#[test]
fn float_image_is_a_conversion_error() {
    let hdr = image::DynamicImage::ImageRgba32F(image::ImageBuffer::new(4, 4));
    let img = histlab::Image::new(hdr, ColorSpace::LinearSrgb);
    let err = CpuFilter::Equalize.apply(&img, &FORMAT).unwrap_err();
    assert!(matches!(err, EnhanceError::Conversion(_)));
}

#[test]
fn premultiplied_layout_keeps_opaque_pixels() {
    let img = skewed(16, 16);
    let format = PixelFormat {
        alpha: AlphaMode::Premultiplied,
        ..FORMAT
    };
    let straight = CpuFilter::Equalize.apply(&img, &FORMAT).unwrap();
    let premul = CpuFilter::Equalize.apply(&img, &format).unwrap();
    assert_eq!(rgba(&straight), rgba(&premul));
}
