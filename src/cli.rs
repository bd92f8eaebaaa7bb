// ============================================================================
// HistLab CLI — headless report over the bundled image
// ============================================================================
//
// Usage examples:
//   histlab --headless                               (all five modes, 2 runs each)
//   histlab --headless --mode cpu_equalize --mode gpu_equalize --runs 5
//   histlab --headless --software-gpu                (fallback adapter only)
//
// No window is opened and nothing is written to disk; the report goes to
// stdout, errors to stderr.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use crate::controller::{DisplayController, DisplayMode};
use crate::error::FatalDeviceError;
use crate::gpu::{GpuContext, GpuEqualizer};
use crate::image_data::Image;
use crate::ops::{FilterCatalog, Histogram};
use crate::settings::AppSettings;
use crate::source;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// HistLab headless enhancement report.
#[derive(Parser, Debug)]
#[command(
    name = "histlab",
    about = "Run HistLab's enhancement modes without the GUI and print a report",
    long_about = "Runs the selected display modes against the bundled image and prints\n\
                  timing, output size, per-channel statistics and whether repeated runs\n\
                  produced identical pixels.\n\n\
                  Modes: original, cpu_equalize, cpu_stretch, gpu_equalize, auto_adjust"
)]
pub struct CliArgs {
    /// Required to select headless mode.
    #[arg(long)]
    pub headless: bool,

    /// Mode to run; repeat for several.  Defaults to all five.
    #[arg(short, long = "mode", value_name = "MODE", value_parser = parse_mode)]
    pub modes: Vec<DisplayMode>,

    /// Runs per mode.  Outputs of every run are compared with the first.
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub runs: u32,

    /// Use the software fallback adapter for the GPU mode.
    #[arg(long)]
    pub software_gpu: bool,
}

impl CliArgs {
    /// Returns `true` when `--headless` is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--headless")
    }

    fn selected_modes(&self) -> Vec<DisplayMode> {
        if self.modes.is_empty() {
            DisplayMode::ALL.to_vec()
        } else {
            self.modes.clone()
        }
    }
}

fn parse_mode(s: &str) -> Result<DisplayMode, String> {
    DisplayMode::from_config_key(&s.to_lowercase()).ok_or_else(|| {
        let keys: Vec<&str> = DisplayMode::ALL.iter().map(|m| m.config_key()).collect();
        format!("unknown mode '{}' (expected one of: {})", s, keys.join(", "))
    })
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the report and return an OS exit code.
/// `0` = every mode succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = AppSettings::load();
    let modes = args.selected_modes();

    let image = match source::load_bundled() {
        Ok(img) => img,
        Err(e) => {
            eprintln!("error: could not decode the bundled image: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gpu = if modes.iter().any(|m| m.needs_gpu()) {
        match create_gpu(&args, &settings) {
            Ok(gpu) => Some(gpu),
            Err(e) => {
                eprintln!("warning: {}; GPU mode will fail", e);
                None
            }
        }
    } else {
        None
    };

    let mut controller =
        DisplayController::new(image, settings.pixel_format(), gpu).with_alpha_equalization(settings.equalize_alpha);
    let mut stdout = std::io::stdout().lock();
    match report(&mut controller, &modes, args.runs, &mut stdout) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: could not write report: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn create_gpu(args: &CliArgs, settings: &AppSettings) -> Result<GpuEqualizer, FatalDeviceError> {
    if args.software_gpu {
        Ok(GpuEqualizer::with_context(GpuContext::new_software()?))
    } else {
        GpuEqualizer::new(&settings.preferred_gpu)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Run each mode `runs` times through `controller.select` and write one
/// report block per mode.  Returns `Ok(false)` if any mode failed.
pub fn report(
    controller: &mut DisplayController,
    modes: &[DisplayMode],
    runs: u32,
    out: &mut impl Write,
) -> std::io::Result<bool> {
    let src = controller.source();
    writeln!(
        out,
        "{} {}×{} {} | row alignment {} | alpha {} | GPU: {}",
        source::BUNDLED_NAME,
        src.width(),
        src.height(),
        src.color_space(),
        controller.format().row_alignment,
        if controller.equalize_alpha() { "equalized" } else { "kept" },
        controller.gpu_adapter_name().unwrap_or("unavailable"),
    )?;

    let mut all_ok = true;
    for &mode in modes {
        let mut first: Option<Image> = None;
        let mut identical = true;
        let mut times = Vec::with_capacity(runs as usize);
        let mut failure = None;

        for _ in 0..runs {
            if let Err(e) = controller.select(mode) {
                failure = Some(e);
                break;
            }
            if let Some(stats) = controller.last_run() {
                times.push(stats.elapsed.as_secs_f64() * 1000.0);
            }
            let current = controller.current();
            match &first {
                None => first = Some(current.clone()),
                Some(prev) => identical &= same_pixels(prev, current),
            }
        }

        if let Some(e) = failure {
            writeln!(out, "{:<18} FAILED: {}", mode.label(), e)?;
            all_ok = false;
            continue;
        }
        let Some(output) = first else { continue };

        let best = times.iter().copied().fold(f64::INFINITY, f64::min);
        let fell_back = controller.last_run().is_some_and(|s| s.fell_back);
        writeln!(
            out,
            "{:<18} {:>9.2}ms best of {}  {}×{}  {}{}",
            mode.label(),
            best,
            times.len(),
            output.width(),
            output.height(),
            if identical { "deterministic" } else { "NON-DETERMINISTIC" },
            if fell_back { "  (no tone curve, original shown)" } else { "" },
        )?;
        if !identical {
            all_ok = false;
        }

        let hist = controller.histogram();
        for (c, name) in ["R", "G", "B", "A"].iter().enumerate() {
            let (lo, hi) = hist.range(c).unwrap_or((0, 0));
            writeln!(out, "    {}  min {:>3}  max {:>3}  mean {:>6.1}", name, lo, hi, hist.mean(c))?;
        }

        if mode.needs_gpu() {
            all_ok &= check_gpu_histogram(controller, out)?;
        }
        if mode == DisplayMode::AutoAdjust {
            all_ok &= write_catalog(controller.source(), out)?;
        }
    }
    Ok(all_ok)
}

/// Every binned channel of the device-side histogram must count each pixel
/// once.  Alpha is left empty when it is not equalized.
fn check_gpu_histogram(controller: &DisplayController, out: &mut impl Write) -> std::io::Result<bool> {
    let Some(gpu) = controller.gpu() else { return Ok(true) };
    let src = controller.source();
    let expected = src.width() as u64 * src.height() as u64;
    let channels = if gpu.info().histogram_for_alpha { 4 } else { 3 };
    match gpu.histogram(src) {
        Ok(hist) => {
            let ok = sums_match(&hist, expected, channels);
            writeln!(
                out,
                "    GPU histogram sums {} (expected {} per channel)",
                if ok { "ok" } else { "MISMATCH" },
                expected
            )?;
            Ok(ok)
        }
        Err(e) => {
            writeln!(out, "    GPU histogram readback FAILED: {}", e)?;
            Ok(false)
        }
    }
}

/// One line per filter the catalog offers for `src`, with the mean level and
/// mean chroma of the filter's output next to the source's.
fn write_catalog(src: &Image, out: &mut impl Write) -> std::io::Result<bool> {
    let filters = match FilterCatalog::auto_adjustment_filters(src) {
        Ok(filters) => filters,
        Err(e) => {
            writeln!(out, "    catalog FAILED: {}", e)?;
            return Ok(false);
        }
    };
    if filters.is_empty() {
        writeln!(out, "    catalog offers nothing for this image")?;
        return Ok(true);
    }

    let Some((level, chroma)) = level_and_chroma(src) else { return Ok(false) };
    let mut ok = true;
    for filter in filters {
        match filter.apply(src).ok().as_ref().and_then(level_and_chroma) {
            Some((l, c)) => writeln!(
                out,
                "    offers {:<10} ({})  level {:.1} -> {:.1}  chroma {:.1} -> {:.1}",
                filter.name(),
                filter.capability(),
                level,
                l,
                chroma,
                c
            )?,
            None => {
                writeln!(out, "    offers {:<10} ({})  FAILED", filter.name(), filter.capability())?;
                ok = false;
            }
        }
    }
    Ok(ok)
}

/// Mean of (R+G+B)/3 and of max-min over all pixels.
fn level_and_chroma(image: &Image) -> Option<(f64, f64)> {
    let rgba = image.to_rgba8().ok()?;
    let n = (rgba.width() as u64 * rgba.height() as u64).max(1) as f64;
    let (level, chroma) = rgba.pixels().fold((0u64, 0u64), |(l, c), p| {
        let [r, g, b, _] = p.0;
        let hi = r.max(g).max(b);
        let lo = r.min(g).min(b);
        (l + r as u64 + g as u64 + b as u64, c + (hi - lo) as u64)
    });
    Some((level as f64 / 3.0 / n, chroma as f64 / n))
}

fn sums_match(hist: &Histogram, expected: u64, channels: usize) -> bool {
    (0..channels).all(|c| hist.total(c) == expected)
}

fn same_pixels(a: &Image, b: &Image) -> bool {
    match (a.to_rgba8(), b.to_rgba8()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
