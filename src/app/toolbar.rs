//! Toolbar and stats panel for `ViewerApp`.
//!
//! Draws the breadcrumb trail, drill-up/reset buttons, the grouping
//! dimension and layout mode selectors, and the dark-mode toggle.

use eframe::egui;
use pivot_canvas::render::layout::LayoutMode;

use super::ViewerApp;

const MODES: [LayoutMode; 5] = [
    LayoutMode::Pivot,
    LayoutMode::Grid,
    LayoutMode::Shelf,
    LayoutMode::Masonry,
    LayoutMode::SmartGrid,
];

impl ViewerApp {
    /// Render the top toolbar strip.
    pub fn draw_toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.add_space(4.0);

            // Up / Reset
            let can_up = self.canvas.drill().depth() > 0;
            if ui
                .add_enabled(can_up, egui::Button::new("\u{25B2}").min_size(egui::vec2(28.0, 24.0)))
                .on_hover_text("Drill up (Backspace)")
                .clicked()
            {
                self.canvas.drill_up();
            }
            if ui
                .add_enabled(can_up, egui::Button::new("\u{21BA}").min_size(egui::vec2(28.0, 24.0)))
                .on_hover_text("Back to all items (Esc)")
                .clicked()
            {
                self.canvas.reset_drill();
            }

            // Breadcrumbs
            let crumbs = self.canvas.breadcrumbs();
            let last = crumbs.len().saturating_sub(1);
            for (i, crumb) in crumbs.iter().enumerate() {
                if i > 0 {
                    ui.weak("/");
                }
                if i == last {
                    ui.strong(crumb);
                } else {
                    ui.label(crumb);
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.add_space(4.0);

                let mut dark = self.dark_mode;
                if ui.checkbox(&mut dark, "Dark").changed() {
                    self.set_dark_mode(ctx, dark);
                }
                ui.checkbox(&mut self.show_stats, "Stats");

                if ui.button("Fit").on_hover_text("Reset view (R)").clicked() {
                    self.canvas.reset_view();
                }

                // Layout mode selector
                let mut mode = self.canvas.mode();
                egui::ComboBox::from_id_salt("layout_mode")
                    .selected_text(mode.label())
                    .show_ui(ui, |ui| {
                        for m in MODES {
                            ui.selectable_value(&mut mode, m, m.label());
                        }
                    });
                if mode != self.canvas.mode() {
                    self.set_mode(mode);
                }

                // Grouping dimension selector; child dimensions stay disabled
                // until their parent is filtered.
                let dims: Vec<(String, String, bool)> = self
                    .canvas
                    .drill()
                    .dimensions()
                    .iter()
                    .map(|d| (d.key.clone(), d.label.clone(), self.canvas.can_use_dimension(&d.key)))
                    .collect();
                let active = self
                    .canvas
                    .drill()
                    .active_dimension()
                    .map(|d| (d.key.clone(), d.label.clone()));
                let mut picked = None;
                egui::ComboBox::from_id_salt("dimension")
                    .selected_text(active.as_ref().map_or("-", |(_, label)| label.as_str()))
                    .show_ui(ui, |ui| {
                        for (key, label, usable) in &dims {
                            let selected = active.as_ref().is_some_and(|(k, _)| k == key);
                            if ui
                                .add_enabled(*usable, egui::SelectableLabel::new(selected, label))
                                .clicked()
                            {
                                picked = Some(key.clone());
                            }
                        }
                    });
                if let Some(key) = picked {
                    self.canvas.set_grouping_dimension(&key);
                }
                ui.label("Group by");
            });
        });
    }

    /// Right-hand panel with layout, draw and image streaming counters.
    pub fn draw_stats_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Stats");
        ui.separator();

        let output = self.canvas.layout_output();
        egui::Grid::new("layout_stats").num_columns(2).show(ui, |ui| {
            ui.label("Items");
            ui.label(format!("{} / {}", self.canvas.pool().len(), self.canvas.catalog().len()));
            ui.end_row();
            ui.label("Groups");
            ui.label(output.headers.len().to_string());
            ui.end_row();
            ui.label("Cell");
            ui.label(format!("{:.1}", output.cell_size));
            ui.end_row();
            ui.label("Fits");
            ui.label(if output.constraint_satisfied { "yes" } else { "overflow" });
            ui.end_row();
            ui.label("Zoom");
            ui.label(format!("{:.2}x", self.canvas.camera().scale()));
            ui.end_row();
        });

        ui.separator();
        let draw = self.last_draw;
        egui::Grid::new("draw_stats").num_columns(2).show(ui, |ui| {
            ui.label("Drawn");
            ui.label(draw.nodes_drawn.to_string());
            ui.end_row();
            ui.label("Culled");
            ui.label(draw.nodes_culled.to_string());
            ui.end_row();
            ui.label("Images");
            ui.label(draw.images_drawn.to_string());
            ui.end_row();
            ui.label("Textures");
            ui.label(self.textures.len().to_string());
            ui.end_row();
        });

        ui.separator();
        let lod = self.canvas.lod();
        let stats = lod.stats();
        let counters = self.image_counters.lock().map(|c| *c).unwrap_or_default();
        egui::Grid::new("lod_stats").num_columns(2).show(ui, |ui| {
            ui.label("Queued");
            ui.label(lod.queue().len().to_string());
            ui.end_row();
            ui.label("In flight");
            ui.label(lod.in_flight().to_string());
            ui.end_row();
            ui.label("Dispatched");
            ui.label(stats.dispatched.to_string());
            ui.end_row();
            ui.label("Cache");
            ui.label(format!("{} ({:.0}% hits)", lod.cache().len(), lod.cache().hit_rate() * 100.0));
            ui.end_row();
            ui.label("Stale");
            ui.label(stats.dropped_stale.to_string());
            ui.end_row();
            ui.label("Loaded");
            ui.label(counters.loaded.to_string());
            ui.end_row();
            ui.label("Failed");
            ui.label(counters.failed.to_string());
            ui.end_row();
            ui.label("Suppressed");
            ui.label(counters.suppressed.to_string());
            ui.end_row();
        });

        ui.separator();
        ui.small("1-5 layout · W warm-up · R fit · Backspace up");
    }
}
