#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release
#![allow(rustdoc::missing_crate_level_docs)] // it's an example

use eframe::egui;
use log::{error, info};
use osmpoint_map::{
    config::{OpenStreetMapConfig, PoiConfig},
    controller::{MapController, SelectionMode},
    form::LayoutMode,
    geolocation::{DynGeolocation, GeolocationError, GeolocationStatus},
    projection::GeoPos,
};

fn main() -> eframe::Result {
    env_logger::init();

    // Optional JSON configuration as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => PoiConfig::load(&path).unwrap_or_else(|e| {
            error!("{:?}", e);
            PoiConfig::default()
        }),
        None => PoiConfig::default(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1000.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Add a point of interest",
        options,
        Box::new(|_cc| Ok(Box::new(MyApp::new(config)))),
    )
}

/// Reads the device position from `OSMPOINT_POSITION`, formatted as `lon,lat`.
fn env_position() -> Result<GeoPos, GeolocationError> {
    let value = std::env::var("OSMPOINT_POSITION")
        .map_err(|_| GeolocationError::PositionUnavailable("OSMPOINT_POSITION is not set".into()))?;
    let (lon, lat) = value
        .split_once(',')
        .ok_or_else(|| GeolocationError::PositionUnavailable(format!("Bad position `{value}`")))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))
    };
    Ok(GeoPos::new(parse(lon)?, parse(lat)?))
}

struct MyApp {
    controller: MapController,
}

impl MyApp {
    fn new(config: PoiConfig) -> Self {
        let mut controller = MapController::init_map(OpenStreetMapConfig::default());
        controller.enable_adding_points(SelectionMode::Marker(config));
        controller.center_to_gps(DynGeolocation::new(env_position));
        Self { controller }
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Center on my position").clicked() {
                    self.controller
                        .center_to_gps(DynGeolocation::new(env_position));
                }
                match self.controller.geolocation() {
                    GeolocationStatus::Pending(_) => {
                        ui.spinner();
                    }
                    GeolocationStatus::Failed(e) => {
                        ui.colored_label(egui::Color32::RED, e.to_string());
                    }
                    _ => {}
                }
                if let Some(pos) = self.controller.map().mouse_pos {
                    ui.label(format!("{pos}"));
                }
            });
        });

        if self.controller.layout() == LayoutMode::MenuForm {
            egui::SidePanel::right("poi_form")
                .default_width(300.0)
                .show(ctx, |ui| {
                    if let Some(submission) = self.controller.show_form(ui) {
                        match serde_json::to_string(&submission) {
                            Ok(json) => info!("New point: {json}"),
                            Err(e) => error!("{:?}", e),
                        }
                    }
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.controller.show(ui);
            });
    }
}
