//! `ViewerApp`: the egui front end around a [`PivotCanvas`].
//!
//! Methods are split across sibling modules:
//!
//! - `toolbar` for the breadcrumb bar, selectors and the stats panel
//! - `view` for the canvas widget (pointer, wheel and touch input, painting)
//! - `sample` for the synthetic catalog

pub mod sample;
pub mod toolbar;
pub mod view;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eframe::egui;

use pivot_canvas::input::GestureRecognizer;
use pivot_canvas::net::lod::ImageEvent;
use pivot_canvas::net::{HttpFetcher, ImageFetcher, ImageResolverConfig};
use pivot_canvas::render::layout::LayoutMode;
use pivot_canvas::render::paint::TextureCache;
use pivot_canvas::render::{DrawStats, DrawStyle};
use pivot_canvas::{CanvasConfig, ImageError, PivotCanvas};

use sample::DemoProduct;

/// Startup options, read from the environment by `main`.
#[derive(Debug, Clone)]
pub struct ViewerSettings {
    pub items: usize,
    pub seed: u64,
    pub proxy_base: Option<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            items: 240,
            seed: 42,
            proxy_base: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCounters {
    pub loaded: usize,
    pub failed: usize,
    pub suppressed: usize,
}

pub struct ViewerApp {
    pub canvas: PivotCanvas<DemoProduct>,
    pub textures: TextureCache,
    pub gestures: GestureRecognizer,
    pub image_counters: Arc<Mutex<ImageCounters>>,
    pub last_draw: DrawStats,
    /// Pointer movement since the current drag began.
    pub drag_total: egui::Vec2,
    pub dark_mode: bool,
    pub show_stats: bool,
    pub app_start: Instant,
}

/// Fetcher used when the HTTP client cannot be built; every load fails and
/// nodes keep their placeholders.
struct Offline(String);

impl ImageFetcher for Offline {
    fn fetch(&self, _url: &str, _max_edge: u32) -> Result<pivot_canvas::net::ImageData, ImageError> {
        Err(ImageError::Http(self.0.clone()))
    }
}

impl ViewerApp {
    pub fn new(settings: ViewerSettings) -> Self {
        let mut resolver = ImageResolverConfig::default();
        if let Some(base) = settings.proxy_base.clone() {
            resolver = resolver.with_proxy_base(base);
        }
        let config = CanvasConfig::default().with_resolver(resolver);

        let fetcher: Arc<dyn ImageFetcher> = match HttpFetcher::new(Duration::from_secs(15)) {
            Ok(http) => Arc::new(http),
            Err(e) => {
                log::warn!("image fetching disabled: {e}");
                Arc::new(Offline(e.to_string()))
            }
        };

        let mut canvas = PivotCanvas::new(config, sample::dimensions(), fetcher);
        canvas.sync(sample::catalog(settings.items, settings.seed));
        canvas.start();

        let image_counters = Arc::new(Mutex::new(ImageCounters::default()));
        let sink = Arc::clone(&image_counters);
        canvas.subscribe_images(move |event| {
            let Ok(mut c) = sink.lock() else {
                return;
            };
            match event {
                ImageEvent::Loaded { .. } => c.loaded += 1,
                ImageEvent::Failed { .. } => c.failed += 1,
                ImageEvent::Suppressed { .. } => c.suppressed += 1,
            }
        });

        log::info!("viewer started with {} items", settings.items);
        Self {
            canvas,
            textures: TextureCache::default(),
            gestures: GestureRecognizer::default(),
            image_counters,
            last_draw: DrawStats::default(),
            drag_total: egui::Vec2::ZERO,
            dark_mode: false,
            show_stats: true,
            app_start: Instant::now(),
        }
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        let layout = self.canvas.config().layout.clone();
        self.canvas.set_layout_mode(mode, layout);
    }

    pub fn set_dark_mode(&mut self, ctx: &egui::Context, dark: bool) {
        self.dark_mode = dark;
        let style = if dark { DrawStyle::dark() } else { DrawStyle::light() };
        self.canvas.set_style(style);
        ctx.set_visuals(if dark { egui::Visuals::dark() } else { egui::Visuals::light() });
    }

    /// Keyboard shortcuts.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let modes = [
            (egui::Key::Num1, LayoutMode::Pivot),
            (egui::Key::Num2, LayoutMode::Grid),
            (egui::Key::Num3, LayoutMode::Shelf),
            (egui::Key::Num4, LayoutMode::Masonry),
            (egui::Key::Num5, LayoutMode::SmartGrid),
        ];
        let (up, reset_drill, reset_view, warm, mode) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Backspace),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::R),
                i.key_pressed(egui::Key::W),
                modes.iter().find(|(k, _)| i.key_pressed(*k)).map(|(_, m)| *m),
            )
        });
        if up {
            self.canvas.drill_up();
        }
        if reset_drill {
            self.canvas.reset_drill();
        }
        if reset_view {
            self.canvas.reset_view();
        }
        if warm {
            let queued = self.canvas.warm_up();
            log::info!("warm-up queued {queued} low-res loads");
        }
        if let Some(mode) = mode {
            self.set_mode(mode);
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui, ctx);
        });

        if self.show_stats {
            egui::SidePanel::right("stats")
                .default_width(220.0)
                .show(ctx, |ui| {
                    self.draw_stats_panel(ui);
                });
        }

        let ctx_clone = ctx.clone();
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                self.draw_canvas(ui, &ctx_clone);
            });
    }
}
