// ============================================================================
// SETTINGS — key=value config file, read once at startup
// ============================================================================

use std::path::PathBuf;

use crate::controller::DisplayMode;
use crate::image_data::PixelFormat;
use crate::log_warn;

const FILE_NAME: &str = "histlab_settings.cfg";

/// User preferences.  Missing or unparseable keys keep their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// When false the GPU mode is disabled without probing for a device.
    pub gpu_acceleration: bool,
    /// "high performance" or "low power" / "integrated".
    pub preferred_gpu: String,
    pub initial_mode: DisplayMode,
    pub histogram_log_scale: bool,
    /// Equalize modes remap alpha as a fourth channel.  When false alpha
    /// passes through unchanged.
    pub equalize_alpha: bool,
    /// Row alignment in bytes for CPU pixel buffers (power of two).
    pub row_alignment: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            gpu_acceleration: true,
            preferred_gpu: "high performance".to_string(),
            initial_mode: DisplayMode::Original,
            histogram_log_scale: false,
            equalize_alpha: true,
            row_alignment: PixelFormat::RGBA8888.row_alignment,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/histlab/histlab_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\HistLab\histlab_settings.cfg
    /// On macOS:   ~/Library/Application Support/HistLab/histlab_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("HistLab").join(FILE_NAME));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("HistLab")
                    .join(FILE_NAME),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("histlab").join(FILE_NAME))
        }
    }

    /// Load settings from disk (defaults if the file is missing).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines.  Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "gpu_acceleration" => {
                    s.gpu_acceleration = val == "true";
                }
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                }
                "initial_mode" => match DisplayMode::from_config_key(val) {
                    Some(mode) => s.initial_mode = mode,
                    None => log_warn!("[Settings] Unknown initial_mode '{}'", val),
                },
                "histogram_log_scale" => {
                    s.histogram_log_scale = val == "true";
                }
                "equalize_alpha" => {
                    s.equalize_alpha = val == "true";
                }
                "row_alignment" => match val.parse::<usize>() {
                    Ok(n) if n.is_power_of_two() && n <= 4096 => s.row_alignment = n,
                    _ => log_warn!("[Settings] Ignoring row_alignment '{}'", val),
                },
                _ => {}
            }
        }
        s
    }

    /// Serialise to the on-disk format.  The app itself never writes the
    /// file; this is what a hand-written one should look like.
    pub fn to_config_string(&self) -> String {
        format!(
            "gpu_acceleration={}\npreferred_gpu={}\ninitial_mode={}\nhistogram_log_scale={}\nequalize_alpha={}\nrow_alignment={}\n",
            self.gpu_acceleration,
            self.preferred_gpu,
            self.initial_mode.config_key(),
            self.histogram_log_scale,
            self.equalize_alpha,
            self.row_alignment,
        )
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::RGBA8888.with_row_alignment(self.row_alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppSettings::parse(""), AppSettings::default());
    }

    #[test]
    fn reads_every_key() {
        let s = AppSettings::parse(
            "gpu_acceleration=false\n\
             preferred_gpu = low power\n\
             initial_mode=cpu_stretch\n\
             histogram_log_scale=true\n\
             equalize_alpha=false\n\
             row_alignment=64\n",
        );
        assert!(!s.gpu_acceleration);
        assert_eq!(s.preferred_gpu, "low power");
        assert_eq!(s.initial_mode, DisplayMode::CpuStretch);
        assert!(s.histogram_log_scale);
        assert!(!s.equalize_alpha);
        assert_eq!(s.row_alignment, 64);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = AppSettings::parse("initial_mode=sepia\nrow_alignment=12\nnot a pair\n# comment=1\n");
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn config_string_parses_back() {
        let s = AppSettings {
            gpu_acceleration: false,
            preferred_gpu: "integrated".into(),
            initial_mode: DisplayMode::AutoAdjust,
            histogram_log_scale: true,
            equalize_alpha: false,
            row_alignment: 256,
        };
        assert_eq!(AppSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn pixel_format_uses_alignment() {
        let s = AppSettings::parse("row_alignment=64");
        assert_eq!(s.pixel_format().row_alignment, 64);
        assert_eq!(s.pixel_format().bits_per_pixel, 32);
    }
}
