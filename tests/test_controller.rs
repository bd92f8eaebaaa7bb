// tests/test_controller.rs — mode selection, overlay and error handling.

mod common;

use common::{flat, rgba, skewed};
use histlab::ops::Histogram;
use histlab::settings::AppSettings;
use histlab::{DisplayController, DisplayMode, EnhanceError, PixelFormat};

fn cpu_only(image: histlab::Image) -> DisplayController {
    DisplayController::new(image, PixelFormat::RGBA8888, None)
}

#[test]
fn starts_on_original() {
    let c = cpu_only(skewed(40, 20));
    assert_eq!(c.mode(), DisplayMode::Original);
    assert_eq!(rgba(c.current()), rgba(c.source()));
    assert_eq!(c.histogram(), &Histogram::from_image(c.source()));
    assert!(!c.gpu_available());
}

#[test]
fn each_cpu_mode_replaces_image_and_overlay() {
    let mut c = cpu_only(skewed(40, 20));
    for mode in [DisplayMode::CpuEqualize, DisplayMode::CpuStretch, DisplayMode::AutoAdjust] {
        c.select(mode).unwrap();
        assert_eq!(c.mode(), mode);
        assert_eq!(c.histogram(), &Histogram::from_image(c.current()));
        assert_eq!(c.last_run().unwrap().mode, mode);
    }
}

#[test]
fn reselecting_reruns_from_source() {
    let mut c = cpu_only(skewed(40, 20));
    let first = rgba(c.select(DisplayMode::CpuEqualize).unwrap());
    c.select(DisplayMode::CpuStretch).unwrap();
    let again = rgba(c.select(DisplayMode::CpuEqualize).unwrap());
    assert_eq!(first, again);

    let original = rgba(c.select(DisplayMode::Original).unwrap());
    assert_eq!(original, rgba(c.source()));
}

#[test]
fn failed_selection_keeps_previous_image() {
    let mut c = cpu_only(skewed(40, 20));
    let stretched = rgba(c.select(DisplayMode::CpuStretch).unwrap());
    let overlay = c.histogram().clone();

    let err = c.select(DisplayMode::GpuEqualize).unwrap_err();
    assert_eq!(err, EnhanceError::GpuUnavailable);
    assert_eq!(c.mode(), DisplayMode::CpuStretch);
    assert_eq!(rgba(c.current()), stretched);
    assert_eq!(c.histogram(), &overlay);
}

#[test]
fn auto_adjust_without_tone_curve_shows_source() {
    let mut c = cpu_only(flat(12, 12, [128, 128, 128, 255]));
    let shown = rgba(c.select(DisplayMode::AutoAdjust).unwrap());
    assert_eq!(shown, rgba(c.source()));
    assert!(c.last_run().unwrap().fell_back);
}

#[test]
fn auto_adjust_on_float_source_reports_conversion() {
    let hdr = image::Rgba32FImage::from_pixel(8, 8, image::Rgba([0.5, 0.25, 0.75, 1.0]));
    let mut c = cpu_only(histlab::Image::new(
        image::DynamicImage::ImageRgba32F(hdr),
        histlab::ColorSpace::LinearSrgb,
    ));
    for mode in [DisplayMode::CpuEqualize, DisplayMode::AutoAdjust] {
        let err = c.select(mode).unwrap_err();
        assert!(matches!(err, EnhanceError::Conversion(_)), "{mode}: {err:?}");
    }
    assert_eq!(c.mode(), DisplayMode::Original);
    assert!(c.last_run().is_none());
}

#[test]
fn auto_adjust_leaves_alpha_alone() {
    let mut c = cpu_only(skewed(64, 32));
    let out = rgba(c.select(DisplayMode::AutoAdjust).unwrap());
    assert!(out.pixels().all(|p| p.0[3] == 255));
    assert!(!c.last_run().unwrap().fell_back);
}

#[test]
fn alpha_equalization_follows_the_controller_flag() {
    // Alpha 100..=115 across columns.
    let translucent = image::RgbaImage::from_fn(16, 16, |x, y| image::Rgba([(x * 10) as u8, (y * 5) as u8, 90, 100 + x as u8]));
    let img = histlab::Image::new(image::DynamicImage::ImageRgba8(translucent.clone()), histlab::ColorSpace::Srgb);

    let mut keep = cpu_only(img.clone()).with_alpha_equalization(false);
    let kept = rgba(keep.select(DisplayMode::CpuEqualize).unwrap());
    for (o, i) in kept.pixels().zip(translucent.pixels()) {
        assert_eq!(o.0[3], i.0[3]);
    }

    let mut remap = cpu_only(img);
    assert!(remap.equalize_alpha());
    let remapped = rgba(remap.select(DisplayMode::CpuEqualize).unwrap());
    assert_eq!(remapped.get_pixel(0, 0).0[3], 0);
    assert_eq!(remapped.get_pixel(15, 0).0[3], 255);
    for (a, b) in kept.pixels().zip(remapped.pixels()) {
        assert_eq!(a.0[..3], b.0[..3]);
    }
}

#[test]
fn from_settings_applies_alpha_setting() {
    let settings = AppSettings::parse("gpu_acceleration=false
equalize_alpha=false");
    let c = DisplayController::from_settings(&settings).unwrap();
    assert!(!c.equalize_alpha());
    assert!(DisplayController::from_settings(&AppSettings::parse("gpu_acceleration=false")).unwrap().equalize_alpha());
}

#[test]
fn from_settings_without_gpu_loads_bundled_image() {
    let settings = AppSettings::parse("gpu_acceleration=false\ninitial_mode=cpu_stretch\nrow_alignment=64");
    let c = DisplayController::from_settings(&settings).unwrap();
    assert!(!c.gpu_available());
    assert_eq!(c.mode(), DisplayMode::CpuStretch);
    assert_eq!(c.format().row_alignment, 64);
    assert_eq!((c.source().width(), c.source().height()), (480, 320));
}

#[test]
fn initial_gpu_mode_without_device_stays_original() {
    let settings = AppSettings::parse("gpu_acceleration=false\ninitial_mode=gpu_equalize");
    let c = DisplayController::from_settings(&settings).unwrap();
    assert_eq!(c.mode(), DisplayMode::Original);
    assert!(c.last_run().is_none());
    assert_eq!(rgba(c.current()), rgba(c.source()));
    assert_eq!(c.histogram(), &Histogram::from_image(c.source()));
}
