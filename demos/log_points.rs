#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
#![allow(rustdoc::missing_crate_level_docs)] // it's an example

use eframe::egui;
use osmpoint_map::{
    config::OpenStreetMapConfig,
    controller::{MapController, SelectionMode},
};

fn main() -> eframe::Result {
    // Clicked points are logged at info level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Log clicked points",
        options,
        Box::new(|_cc| Ok(Box::<MyApp>::default())),
    )
}

struct MyApp {
    controller: MapController,
}

impl Default for MyApp {
    fn default() -> Self {
        let mut controller = MapController::init_map(OpenStreetMapConfig::default());
        controller.enable_adding_points(SelectionMode::Log);
        Self { controller }
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.controller.show(ui);
            });
    }
}
