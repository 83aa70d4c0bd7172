//! Pivot canvas demo viewer.
//!
//! Environment:
//!
//! - `PIVOT_CANVAS_ITEMS`: number of synthetic products (default 240)
//! - `PIVOT_CANVAS_SEED`: catalog seed
//! - `PIVOT_CANVAS_PROXY`: image proxy base URL for storage images
//! - `RUST_LOG`: log filter, e.g. `pivot_canvas=debug`

use eframe::egui;

mod app;

use app::{ViewerApp, ViewerSettings};

fn settings_from_env() -> ViewerSettings {
    let mut settings = ViewerSettings::default();
    if let Ok(raw) = std::env::var("PIVOT_CANVAS_ITEMS") {
        match raw.parse() {
            Ok(n) => settings.items = n,
            Err(_) => log::warn!("ignoring PIVOT_CANVAS_ITEMS={raw:?}"),
        }
    }
    if let Ok(raw) = std::env::var("PIVOT_CANVAS_SEED") {
        match raw.parse() {
            Ok(n) => settings.seed = n,
            Err(_) => log::warn!("ignoring PIVOT_CANVAS_SEED={raw:?}"),
        }
    }
    settings.proxy_base = std::env::var("PIVOT_CANVAS_PROXY").ok().filter(|s| !s.is_empty());
    settings
}

fn main() {
    env_logger::init();

    let settings = settings_from_env();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Pivot Canvas",
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(settings)))),
    );
    if let Err(e) = result {
        log::error!("viewer exited with error: {e}");
        std::process::exit(1);
    }
}
