// ============================================================================
// DISPLAY CONTROLLER — mode selection, current image, histogram overlay
// ============================================================================
//
// Every selection re-runs its pipeline from the source image, so the
// controller holds no history beyond the image currently on screen.
// ============================================================================

use std::time::{Duration, Instant};

use crate::error::EnhanceError;
use crate::gpu::{GpuEqualizer, HistogramInfo};
use crate::image_data::{Image, PixelFormat};
use crate::ops::{AutoAdjust, CpuFilter, Histogram};
use crate::settings::AppSettings;
use crate::source;
use crate::{log_err, log_info, log_warn};

/// The five display modes, in selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    #[default]
    Original,
    CpuEqualize,
    CpuStretch,
    GpuEqualize,
    AutoAdjust,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 5] = [
        DisplayMode::Original,
        DisplayMode::CpuEqualize,
        DisplayMode::CpuStretch,
        DisplayMode::GpuEqualize,
        DisplayMode::AutoAdjust,
    ];

    /// Selector label.
    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Original => "Original",
            DisplayMode::CpuEqualize => "CPU Equalization",
            DisplayMode::CpuStretch => "CPU Stretch",
            DisplayMode::GpuEqualize => "GPU Equalization",
            DisplayMode::AutoAdjust => "Auto Adjust",
        }
    }

    /// Name used in the settings file and on the command line.
    pub fn config_key(&self) -> &'static str {
        match self {
            DisplayMode::Original => "original",
            DisplayMode::CpuEqualize => "cpu_equalize",
            DisplayMode::CpuStretch => "cpu_stretch",
            DisplayMode::GpuEqualize => "gpu_equalize",
            DisplayMode::AutoAdjust => "auto_adjust",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.config_key() == key)
    }

    pub fn needs_gpu(&self) -> bool {
        matches!(self, DisplayMode::GpuEqualize)
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing of the most recent successful selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub mode: DisplayMode,
    pub elapsed: Duration,
    /// Auto Adjust found no tone curve and showed the source instead.
    pub fell_back: bool,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} execution time {:.4}s", self.mode, self.elapsed.as_secs_f64())?;
        if self.fell_back {
            write!(f, " (no tone curve, showing original)")?;
        }
        Ok(())
    }
}

pub struct DisplayController {
    source: Image,
    current: Image,
    histogram: Histogram,
    mode: DisplayMode,
    format: PixelFormat,
    gpu: Option<GpuEqualizer>,
    /// Equalize modes also remap alpha (CPU and GPU alike).
    equalize_alpha: bool,
    auto_adjust: AutoAdjust,
    last_run: Option<RunStats>,
}

impl DisplayController {
    /// Start in `Original` mode showing `source`.  Pass `gpu: None` when no
    /// compute device could be created.
    pub fn new(source: Image, format: PixelFormat, gpu: Option<GpuEqualizer>) -> Self {
        let histogram = Histogram::from_image(&source);
        Self {
            current: source.clone(),
            source,
            histogram,
            mode: DisplayMode::Original,
            format,
            gpu,
            equalize_alpha: true,
            auto_adjust: AutoAdjust,
            last_run: None,
        }
    }

    /// Choose whether the equalize modes remap alpha.  The GPU kernels get
    /// the same flag through their `HistogramInfo`.
    pub fn with_alpha_equalization(mut self, on: bool) -> Self {
        self.equalize_alpha = on;
        self.gpu = self.gpu.map(|gpu| {
            let info = HistogramInfo {
                histogram_for_alpha: on,
                ..*gpu.info()
            };
            gpu.with_info(info)
        });
        self
    }

    /// Load the bundled image, create the GPU device if enabled, and apply
    /// the configured initial mode.  A failing initial mode is logged and the
    /// controller stays on `Original`.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, EnhanceError> {
        let image = source::load_bundled()?;
        log_info!(
            "[Controller] Loaded {} ({}×{}, {})",
            source::BUNDLED_NAME,
            image.width(),
            image.height(),
            image.color_space()
        );

        let gpu = if settings.gpu_acceleration {
            match GpuEqualizer::new(&settings.preferred_gpu) {
                Ok(gpu) => Some(gpu),
                Err(e) => {
                    log_err!("[GPU] {}; GPU mode disabled", e);
                    None
                }
            }
        } else {
            log_info!("[GPU] Disabled in settings");
            None
        };

        let mut controller =
            Self::new(image, settings.pixel_format(), gpu).with_alpha_equalization(settings.equalize_alpha);
        if settings.initial_mode != DisplayMode::Original
            && let Err(e) = controller.select(settings.initial_mode)
        {
            log_warn!(
                "[Controller] Initial mode {} failed ({}); starting on {}",
                settings.initial_mode,
                e,
                DisplayMode::Original
            );
        }
        Ok(controller)
    }

    pub fn source(&self) -> &Image {
        &self.source
    }

    pub fn current(&self) -> &Image {
        &self.current
    }

    /// Histogram of the current image (overlay data).
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Mode whose output is currently displayed.
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn last_run(&self) -> Option<&RunStats> {
        self.last_run.as_ref()
    }

    pub fn gpu_available(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn gpu(&self) -> Option<&GpuEqualizer> {
        self.gpu.as_ref()
    }

    pub fn gpu_adapter_name(&self) -> Option<&str> {
        self.gpu.as_ref().map(|g| g.adapter_name())
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn equalize_alpha(&self) -> bool {
        self.equalize_alpha
    }

    fn cpu_equalize(&self) -> CpuFilter {
        if self.equalize_alpha { CpuFilter::Equalize } else { CpuFilter::EqualizeColor }
    }

    /// Run `mode`'s pipeline on the source image without touching the
    /// displayed state.
    pub fn run(&self, mode: DisplayMode) -> Result<Image, EnhanceError> {
        match mode {
            DisplayMode::Original => Ok(self.source.clone()),
            DisplayMode::CpuEqualize => self.cpu_equalize().apply(&self.source, &self.format),
            DisplayMode::CpuStretch => CpuFilter::Stretch.apply(&self.source, &self.format),
            DisplayMode::GpuEqualize => match &self.gpu {
                Some(gpu) => gpu.equalize(&self.source),
                None => Err(EnhanceError::GpuUnavailable),
            },
            DisplayMode::AutoAdjust => self.auto_adjust.run(&self.source),
        }
    }

    /// Switch to `mode`.  On success the current image and overlay are
    /// replaced; on failure both stay as they were and the error is returned.
    pub fn select(&mut self, mode: DisplayMode) -> Result<&Image, EnhanceError> {
        let start = Instant::now();
        let (image, fell_back) = match self.run(mode) {
            Ok(image) => (image, false),
            Err(EnhanceError::NoFilterAvailable(cap)) if mode == DisplayMode::AutoAdjust => {
                log_warn!("[Controller] No {} filter offered, showing the original", cap);
                (self.source.clone(), true)
            }
            Err(e) => {
                log_err!("[Controller] {} failed: {}", mode, e);
                return Err(e);
            }
        };
        let elapsed = start.elapsed();

        self.histogram = Histogram::from_image(&image);
        self.current = image;
        self.mode = mode;
        let stats = RunStats { mode, elapsed, fell_back };
        log_info!("[Controller] {}", stats);
        self.last_run = Some(stats);
        Ok(&self.current)
    }
}
