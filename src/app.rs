use crate::controller::{DisplayController, DisplayMode};
use crate::ops::histogram::HISTOGRAM_BINS;
use crate::settings::AppSettings;
use egui::{self, Color32, Pos2, Rect, Rounding, Stroke, Vec2};

// ============================================================================
// APP — mode selector, histogram overlay, image view, status bar
// ============================================================================

/// Overlay colors for R, G, B (alpha is not drawn).
const CHANNEL_COLORS: [Color32; 3] = [
    Color32::from_rgb(230, 70, 70),
    Color32::from_rgb(70, 200, 90),
    Color32::from_rgb(80, 130, 240),
];

pub struct HistLabApp {
    controller: DisplayController,
    texture: Option<egui::TextureHandle>,
    /// Set when the current image changed and the texture must be re-uploaded.
    texture_dirty: bool,
    log_scale: bool,
    /// Last selection error, cleared by the next successful selection.
    status_error: Option<String>,
}

impl HistLabApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, controller: DisplayController, settings: &AppSettings) -> Self {
        Self {
            controller,
            texture: None,
            texture_dirty: true,
            log_scale: settings.histogram_log_scale,
            status_error: None,
        }
    }

    fn select(&mut self, mode: DisplayMode) {
        match self.controller.select(mode) {
            Ok(_) => {
                self.status_error = None;
                self.texture_dirty = true;
            }
            Err(e) => {
                self.status_error = Some(format!("{}: {}", mode, e));
            }
        }
    }

    fn sync_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty && self.texture.is_some() {
            return;
        }
        let rgba = match self.controller.current().to_rgba8() {
            Ok(rgba) => rgba,
            Err(e) => {
                self.status_error = Some(e.to_string());
                self.texture_dirty = false;
                return;
            }
        };
        let size = [rgba.width() as usize, rgba.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
        match &mut self.texture {
            Some(tex) => tex.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("current_image", color_image, egui::TextureOptions::LINEAR));
            }
        }
        self.texture_dirty = false;
    }

    fn draw_histogram(&self, ui: &egui::Ui, rect: Rect) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, Rounding::same(3.0), Color32::from_gray(24));

        let hist = self.controller.histogram();
        let peak = hist.max_color_count();
        if peak == 0 {
            return;
        }
        let height = rect.height();
        let bar_w = rect.width() / HISTOGRAM_BINS as f32;
        let log_max = (peak as f32).ln_1p();

        for (c, color) in CHANNEL_COLORS.iter().enumerate() {
            let bins = hist.channel(c);
            for (i, &count) in bins.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                let frac = if self.log_scale {
                    (count as f32).ln_1p() / log_max
                } else {
                    count as f32 / peak as f32
                };
                let h = (frac * height).min(height);
                let x = rect.min.x + i as f32 * bar_w;
                let bar = Rect::from_min_max(Pos2::new(x, rect.max.y - h), Pos2::new(x + bar_w.max(1.0), rect.max.y));
                painter.rect_filled(bar, 0.0, color.linear_multiply(0.45));
            }
        }
        painter.rect_stroke(rect, Rounding::same(3.0), Stroke::new(1.0, Color32::from_gray(70)));
    }

    fn draw_image(&self, ui: &egui::Ui, area: Rect) {
        let Some(tex) = &self.texture else { return };
        let [w, h] = tex.size();
        if w == 0 || h == 0 {
            return;
        }
        let scale = (area.width() / w as f32).min(area.height() / h as f32);
        let rect = Rect::from_center_size(area.center(), Vec2::new(w as f32 * scale, h as f32 * scale));
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        ui.painter_at(area).image(tex.id(), rect, uv, Color32::WHITE);
    }
}

impl eframe::App for HistLabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Mode selector ---
        let mut clicked = None;
        egui::TopBottomPanel::top("mode_selector").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for mode in DisplayMode::ALL {
                    let enabled = !mode.needs_gpu() || self.controller.gpu_available();
                    let selected = self.controller.mode() == mode;
                    let resp = ui
                        .add_enabled(enabled, egui::SelectableLabel::new(selected, mode.label()))
                        .on_disabled_hover_text("No compute device available");
                    if resp.clicked() {
                        clicked = Some(mode);
                    }
                }
                ui.separator();
                ui.checkbox(&mut self.log_scale, "Log scale");
            });
        });
        if let Some(mode) = clicked {
            self.select(mode);
        }

        // --- Status bar ---
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(err) = &self.status_error {
                    ui.colored_label(Color32::from_rgb(220, 80, 80), err);
                } else if let Some(stats) = self.controller.last_run() {
                    ui.label(stats.to_string());
                } else {
                    ui.label(DisplayMode::Original.label());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let current = self.controller.current();
                    ui.label(format!("{}×{} {}", current.width(), current.height(), current.color_space()));
                    ui.separator();
                    match self.controller.gpu_adapter_name() {
                        Some(name) => ui.label(format!("GPU: {name}")),
                        None => ui.label("GPU: unavailable"),
                    };
                });
            });
        });

        self.sync_texture(ctx);

        // --- Histogram (top half) + image (bottom half) ---
        egui::CentralPanel::default().show(ctx, |ui| {
            let full = ui.available_rect_before_wrap();
            let split = full.min.y + full.height() * 0.5;
            let hist_rect = Rect::from_min_max(full.min, Pos2::new(full.max.x, split - 4.0));
            let image_rect = Rect::from_min_max(Pos2::new(full.min.x, split + 4.0), full.max);
            self.draw_histogram(ui, hist_rect);
            self.draw_image(ui, image_rect);
            ui.allocate_rect(full, egui::Sense::hover());
        });
    }
}
