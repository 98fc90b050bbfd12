#![warn(missing_docs)]

//! A point-of-interest picker built on a slippy map widget for `egui`.
//!
//! The crate provides a [`Map`] widget that displays tiles from a tile server, and a
//! [`controller::MapController`] that wires it to a point-of-interest form: it centers the
//! map on the device position and lets the user click the map to pick a point.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use osmpoint_map::config::{OpenStreetMapConfig, PoiConfig};
//! use osmpoint_map::controller::{MapController, SelectionMode};
//!
//! struct MyApp {
//!     controller: MapController,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         let mut controller = MapController::init_map(OpenStreetMapConfig::default());
//!         controller.enable_adding_points(SelectionMode::Marker(PoiConfig::default()));
//!         Self { controller }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default()
//!             .frame(egui::Frame::NONE)
//!             .show(ctx, |ui| {
//!                 self.controller.show(ui);
//!             });
//!     }
//! }
//! ```

/// Configuration traits and types for the map widget.
pub mod config;

/// The map controller tying the map, the form and geolocation together.
pub mod controller;

/// Interaction controls of the map.
pub mod controls;

/// The point-of-interest form.
pub mod form;

/// Device position requests.
pub mod geolocation;

/// Layers drawn on the map.
pub mod layers;

/// Coordinate systems and conversions.
pub mod projection;

use eframe::egui;
use egui::{Color32, Pos2, Rect, Response, Sense, Ui, Vec2, Widget};
use eyre::WrapErr;
use log::{debug, error};
use once_cell::sync::Lazy;
use poll_promise::Promise;
use std::sync::Arc;
use thiserror::Error;

use crate::config::MapConfig;
use crate::controls::Control;
use crate::layers::Layer;
use crate::projection::{GeoPos, HALF_WORLD, MapProjection, ProjectedPos, resolution, reverse_project};

// The size of a map tile in pixels.
const TILE_SIZE: u32 = 256;
/// The minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// The maximum zoom level.
pub const MAX_ZOOM: u8 = 19;

// Viewport size assumed until the widget has been laid out.
const DEFAULT_VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

// Kinetic panning slows down by this factor every second.
const KINETIC_DECAY_PER_SECOND: f32 = 0.05;
// Kinetic panning stops below this speed, in points per second.
const KINETIC_MIN_SPEED: f32 = 10.0;

// Reuse the reqwest client for all image downloads by making it a static variable.
static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build reqwest client")
});

/// Errors that can occur while using the map widget.
#[derive(Error, Debug)]
pub enum MapError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    ConnectionError(#[from] reqwest::Error),

    /// An image failed to download.
    #[error("An image failed to download. HTTP Status: `{0}`")]
    DownloadError(String),

    /// An image file could not be read.
    #[error("Unable to read image file `{path}`")]
    ReadError {
        /// The path that was read.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The downloaded bytes could not be converted to an image.
    #[error("Unable to convert downloaded bytes as image")]
    ImageConversionError(#[from] image::ImageError),
}

/// A unique identifier for a map tile.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileId {
    /// The zoom level.
    pub z: u8,

    /// The x-coordinate of the tile.
    pub x: u32,

    /// The y-coordinate of the tile.
    pub y: u32,
}

impl TileId {
    fn to_url(self, config: &dyn MapConfig) -> String {
        config.tile_url(&self)
    }
}

/// The state of an image loaded in the background: a tile or a marker icon.
pub(crate) enum ImageState {
    /// The image is being loaded.
    Loading(Promise<Result<egui::ColorImage, Arc<eyre::Report>>>),

    /// The image is in texture memory.
    Loaded(egui::TextureHandle),

    /// The image failed to load.
    Failed(Arc<eyre::Report>),
}

impl ImageState {
    /// Starts loading the image at `src` on a background thread.
    pub(crate) fn spawn(thread_name: &str, src: String) -> Self {
        let promise = Promise::spawn_thread(thread_name, move || {
            fetch_image(&src)
                .wrap_err_with(|| format!("Failed to load image from {}", &src))
                .map_err(Arc::new)
        });
        ImageState::Loading(promise)
    }

    /// Moves a finished load into texture memory.
    pub(crate) fn poll(&mut self, ctx: &egui::Context, texture_name: &str) {
        if let ImageState::Loading(promise) = self {
            if let Some(result) = promise.ready() {
                match result {
                    Ok(color_image) => {
                        let texture =
                            ctx.load_texture(texture_name, color_image.clone(), Default::default());
                        *self = ImageState::Loaded(texture);
                    }
                    Err(e) => {
                        error!("{:?}", e);
                        *self = ImageState::Failed(e.clone());
                    }
                }
            }
        }
    }
}

/// Loads an image from an http(s) URL or from a file path.
fn fetch_image(src: &str) -> Result<egui::ColorImage, MapError> {
    let bytes = if src.starts_with("http://") || src.starts_with("https://") {
        debug!("Downloading image from {}", src);
        let response = CLIENT.get(src).send()?;
        if !response.status().is_success() {
            return Err(MapError::DownloadError(response.status().to_string()));
        }
        response.bytes()?.to_vec()
    } else {
        debug!("Reading image from {}", src);
        std::fs::read(src).map_err(|source| MapError::ReadError {
            path: src.to_string(),
            source,
        })?
    };

    let image = image::load_from_memory(&bytes)?.to_rgba8();
    let size = [image.width() as _, image.height() as _];
    let pixels = image.into_raw();
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
}

/// The map widget.
pub struct Map {
    container: String,

    center: ProjectedPos,

    zoom: u8,

    controls: Vec<Control>,

    layers: Vec<(String, Box<dyn Layer>)>,

    viewport: Vec2,

    kinetic_velocity: Vec2,

    /// The geographical position under the mouse pointer, if any.
    pub mouse_pos: Option<GeoPos>,
}

impl Map {
    /// Creates a new, empty `Map` widget bound to the named container.
    ///
    /// The map has no layers and no controls, and looks at the origin at zoom 0.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            center: ProjectedPos::default(),
            zoom: MIN_ZOOM,
            controls: Vec::new(),
            layers: Vec::new(),
            viewport: DEFAULT_VIEWPORT,
            kinetic_velocity: Vec2::ZERO,
            mouse_pos: None,
        }
    }

    /// The container the map is bound to.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The projected center of the view.
    pub fn center(&self) -> ProjectedPos {
        self.center
    }

    /// The geographical center of the view.
    pub fn center_geo(&self) -> GeoPos {
        reverse_project(self.center)
    }

    /// The zoom level of the view.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Moves the view. The zoom level is clamped to [`MIN_ZOOM`]..=[`MAX_ZOOM`].
    pub fn set_center(&mut self, center: ProjectedPos, zoom: u8) {
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.kinetic_velocity = Vec2::ZERO;
    }

    /// Adds an interaction control.
    pub fn add_control(&mut self, control: Control) {
        self.controls.push(control);
    }

    /// The interaction controls in the order they were added.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Whether a control with the same name as `control` is attached.
    pub fn has_control(&self, control: Control) -> bool {
        self.controls.iter().any(|c| c.name() == control.name())
    }

    fn touch_kinetic(&self) -> bool {
        self.controls
            .iter()
            .any(|c| matches!(c, Control::TouchNavigation { kinetic: true }))
    }

    /// Adds a layer on top of the existing ones.
    pub fn add_layer(&mut self, name: impl Into<String>, layer: impl Layer) {
        let layer: Box<dyn Layer> = Box::new(layer);
        self.layers.push((name.into(), layer));
    }

    /// The number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns the first layer with the given name, if it is of type `T`.
    pub fn layer<T: Layer>(&self, name: &str) -> Option<&T> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, layer)| layer.as_any().downcast_ref::<T>())
    }

    /// Returns the first layer with the given name mutably, if it is of type `T`.
    pub fn layer_mut<T: Layer>(&mut self, name: &str) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, layer)| layer.as_any_mut().downcast_mut::<T>())
    }

    /// Iterates over all layers of type `T`.
    pub fn layers_of<T: Layer>(&self) -> impl Iterator<Item = &T> {
        self.layers
            .iter()
            .filter_map(|(_, layer)| layer.as_any().downcast_ref::<T>())
    }

    /// Sets the viewport size used to interpret viewport pixels before the first frame.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport = size;
    }

    /// The size of the viewport in the last frame.
    pub fn viewport_size(&self) -> Vec2 {
        self.viewport
    }

    /// The projection of the current view, with the viewport at the origin.
    pub fn projection(&self) -> MapProjection {
        MapProjection::new(
            self.zoom,
            self.center,
            Rect::from_min_size(Pos2::ZERO, self.viewport),
        )
    }

    /// Returns the projected coordinate under a viewport pixel.
    pub fn lonlat_from_viewport_px(&self, xy: Pos2) -> ProjectedPos {
        self.projection().from_screen(xy)
    }

    /// Moves the center by a screen delta.
    fn pan_by(&mut self, delta: Vec2, rect: &Rect) {
        let res = resolution(self.zoom);
        self.center.x -= delta.x as f64 * res;
        self.center.y += delta.y as f64 * res;
        self.clamp_center(rect);
    }

    /// Keeps the view inside the world. If the world is smaller than the view, centers it.
    fn clamp_center(&mut self, rect: &Rect) {
        let res = resolution(self.zoom);
        let half_w = rect.width() as f64 / 2.0 * res;
        let half_h = rect.height() as f64 / 2.0 * res;

        self.center.x = if half_w > HALF_WORLD {
            0.0
        } else {
            self.center.x.clamp(-HALF_WORLD + half_w, HALF_WORLD - half_w)
        };
        self.center.y = if half_h > HALF_WORLD {
            0.0
        } else {
            self.center.y.clamp(-HALF_WORLD + half_h, HALF_WORLD - half_h)
        };
    }

    /// Changes the zoom level, keeping the position under `anchor` fixed on screen.
    fn zoom_around(&mut self, new_zoom: u8, anchor: Pos2, rect: &Rect) {
        let new_zoom = new_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if new_zoom == self.zoom {
            return;
        }

        // Reject zooming out past the point where the world is smaller than the widget.
        if new_zoom < self.zoom {
            let world_pixel_size = 2.0_f64.powi(new_zoom as i32) * TILE_SIZE as f64;
            if world_pixel_size < rect.width() as f64 || world_pixel_size < rect.height() as f64 {
                return;
            }
        }

        let target = MapProjection::new(self.zoom, self.center, *rect).from_screen(anchor);
        let rel = anchor - rect.center();
        let res = resolution(new_zoom);

        self.zoom = new_zoom;
        self.center = ProjectedPos {
            x: target.x - rel.x as f64 * res,
            y: target.y + rel.y as f64 * res,
        };
        self.clamp_center(rect);
    }

    /// Handles user input for panning and zooming, according to the attached controls.
    fn handle_input(&mut self, ui: &Ui, rect: &Rect, response: &Response) {
        let navigation = self.has_control(Control::Navigation);
        let touch = self.has_control(Control::TouchNavigation { kinetic: false });

        // Handle panning
        if (navigation || touch) && response.dragged() {
            self.kinetic_velocity = Vec2::ZERO;
            self.pan_by(response.drag_delta(), rect);
        }

        if self.touch_kinetic() {
            if response.drag_stopped() {
                self.kinetic_velocity = ui.input(|i| i.pointer.velocity());
            } else if !response.dragged() && self.kinetic_velocity.length() > KINETIC_MIN_SPEED {
                let dt = ui.input(|i| i.stable_dt).min(0.1);
                self.pan_by(self.kinetic_velocity * dt, rect);
                self.kinetic_velocity *= KINETIC_DECAY_PER_SECOND.powf(dt);
                ui.ctx().request_repaint();
            } else if !response.dragged() {
                self.kinetic_velocity = Vec2::ZERO;
            }
        }

        if !navigation {
            self.mouse_pos = None;
            return;
        }

        // Handle double-click to zoom and center
        if response.double_clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                self.zoom_around(self.zoom.saturating_add(1), pointer_pos, rect);
            }
        }

        // Handle zooming and mouse position
        match response.hover_pos() {
            Some(mouse_pos) if response.hovered() => {
                let projection = MapProjection::new(self.zoom, self.center, *rect);
                self.mouse_pos = Some(projection.unproject(mouse_pos));

                let scroll = ui.input(|i| i.raw_scroll_delta.y);
                if scroll > 0.0 {
                    self.zoom_around(self.zoom.saturating_add(1), mouse_pos, rect);
                } else if scroll < 0.0 {
                    self.zoom_around(self.zoom.saturating_sub(1), mouse_pos, rect);
                }
            }
            _ => self.mouse_pos = None,
        }
    }

    /// Draws the zoom buttons in the top-left corner.
    fn draw_zoom_panel(&mut self, ui: &mut Ui, rect: &Rect) {
        let mut new_zoom = None;
        egui::Area::new(ui.id().with((&self.container, "zoom_panel")))
            .fixed_pos(rect.left_top() + egui::vec2(10.0, 10.0))
            .show(ui.ctx(), |ui| {
                ui.vertical(|ui| {
                    if ui.button("+").clicked() {
                        new_zoom = Some(self.zoom.saturating_add(1));
                    }
                    if ui.button("-").clicked() {
                        new_zoom = Some(self.zoom.saturating_sub(1));
                    }
                });
            });
        if let Some(zoom) = new_zoom {
            self.zoom_around(zoom, rect.center(), rect);
        }
    }

    /// Draws the attribution text of every layer that has one.
    fn draw_attribution(&self, ui: &mut Ui, rect: &Rect) {
        let attributions: Vec<_> = self
            .layers
            .iter()
            .filter_map(|(_, layer)| layer.attribution())
            .collect();
        if attributions.is_empty() {
            return;
        }

        let bg_color = if ui.visuals().dark_mode {
            Color32::from_black_alpha(150)
        } else {
            Color32::from_white_alpha(150)
        };

        let frame = egui::Frame::NONE
            .inner_margin(egui::Margin::same(5)) // A bit of padding
            .fill(bg_color)
            .corner_radius(3.0);

        egui::Area::new(ui.id().with((&self.container, "attribution")))
            .fixed_pos(rect.left_bottom())
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(5.0, -5.0))
            .show(ui.ctx(), |ui| {
                frame.show(ui, |ui| {
                    ui.style_mut().override_text_style = Some(egui::TextStyle::Small);
                    ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend); // Don't wrap attribution text.

                    for (text, url) in attributions {
                        match url {
                            Some(url) => ui.hyperlink_to(text, url),
                            None => ui.label(text),
                        };
                    }
                });
            });
    }
}

impl Widget for &mut Map {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::drag().union(Sense::click()));
        self.viewport = rect.size();

        // Layers see the input first, top-most layer first.
        let projection = MapProjection::new(self.zoom, self.center, rect);
        let mut consumed = false;
        for (_, layer) in self.layers.iter_mut().rev() {
            if layer.handle_input(&response, &projection) {
                consumed = true;
                break;
            }
        }
        if !consumed {
            self.handle_input(ui, &rect, &response);
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(220, 220, 220)); // Background

        let projection = MapProjection::new(self.zoom, self.center, rect);
        for (_, layer) in &self.layers {
            layer.draw(&painter, &projection);
        }

        if self.has_control(Control::ZoomPanel) {
            self.draw_zoom_panel(ui, &rect);
        }
        self.draw_attribution(ui, &rect);

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynMapConfig;
    use crate::layers::markers::MarkersLayer;
    use crate::layers::tile::TileLayer;
    use crate::projection::project;
    use egui::pos2;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn map_new() {
        let map = Map::new("map");
        assert_eq!(map.container(), "map");
        assert_eq!(map.center(), ProjectedPos::default());
        assert_eq!(map.zoom(), MIN_ZOOM);
        assert!(map.controls().is_empty());
        assert_eq!(map.layer_count(), 0);
        assert!(map.mouse_pos.is_none());
    }

    #[test]
    fn set_center_clamps_zoom() {
        let mut map = Map::new("map");
        let center = project(GeoPos::new(26.10, 44.43));
        map.set_center(center, 42);
        assert_eq!(map.zoom(), MAX_ZOOM);
        assert_eq!(map.center(), center);

        let geo = map.center_geo();
        assert!((geo.lon - 26.10).abs() < 1e-9);
        assert!((geo.lat - 44.43).abs() < 1e-9);
    }

    #[test]
    fn viewport_center_is_map_center() {
        let mut map = Map::new("map");
        let center = project(GeoPos::new(26.10, 44.43));
        map.set_center(center, 13);
        map.set_viewport_size(Vec2::new(400.0, 300.0));

        let p = map.lonlat_from_viewport_px(pos2(200.0, 150.0));
        assert!((p.x - center.x).abs() < EPSILON);
        assert!((p.y - center.y).abs() < EPSILON);

        // One pixel right and down is one resolution step east and south.
        let q = map.lonlat_from_viewport_px(pos2(201.0, 151.0));
        assert!((q.x - center.x - resolution(13)).abs() < 1e-6);
        assert!((center.y - q.y - resolution(13)).abs() < 1e-6);
    }

    #[test]
    fn layer_lookup_by_name_and_type() {
        let mut map = Map::new("map");
        map.add_layer("base", TileLayer::new(DynMapConfig::new(|_| String::new())));
        map.add_layer("Markers", MarkersLayer::new("Markers"));

        assert_eq!(map.layer_count(), 2);
        assert!(map.layer::<TileLayer>("base").is_some());
        assert!(map.layer::<MarkersLayer>("base").is_none());
        assert!(map.layer_mut::<MarkersLayer>("Markers").is_some());
        assert!(map.layer::<MarkersLayer>("missing").is_none());
        assert_eq!(map.layers_of::<TileLayer>().count(), 1);
    }

    #[test]
    fn controls_are_listed_in_order() {
        let mut map = Map::new("map");
        map.add_control(Control::Navigation);
        map.add_control(Control::TouchNavigation { kinetic: true });

        assert_eq!(
            map.controls(),
            &[Control::Navigation, Control::TouchNavigation { kinetic: true }]
        );
        assert!(map.has_control(Control::TouchNavigation { kinetic: false }));
        assert!(!map.has_control(Control::ZoomPanel));
        assert!(map.touch_kinetic());
    }

    #[test]
    fn zoom_around_keeps_anchor_fixed() {
        let mut map = Map::new("map");
        map.set_center(project(GeoPos::new(26.10, 44.43)), 13);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let anchor = pos2(600.0, 100.0);

        let before = MapProjection::new(map.zoom(), map.center(), rect).from_screen(anchor);
        map.zoom_around(14, anchor, &rect);
        let after = MapProjection::new(map.zoom(), map.center(), rect).from_screen(anchor);

        assert_eq!(map.zoom(), 14);
        assert!((before.x - after.x).abs() < 1e-6);
        assert!((before.y - after.y).abs() < 1e-6);
    }

    #[test]
    fn zoom_out_rejected_when_world_too_small() {
        let mut map = Map::new("map");
        map.set_center(ProjectedPos::default(), 2);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));

        // At zoom 1 the world is 512 px wide, smaller than the widget.
        map.zoom_around(1, rect.center(), &rect);
        assert_eq!(map.zoom(), 2);
    }

    #[test]
    fn pan_moves_center_against_drag() {
        let mut map = Map::new("map");
        map.set_center(project(GeoPos::new(26.10, 44.43)), 13);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let before = map.center();

        map.pan_by(Vec2::new(10.0, -20.0), &rect);
        let res = resolution(13);
        assert!((map.center().x - (before.x - 10.0 * res)).abs() < 1e-6);
        assert!((map.center().y - (before.y - 20.0 * res)).abs() < 1e-6);
    }

    #[test]
    fn pan_is_clamped_to_world() {
        let mut map = Map::new("map");
        map.set_center(ProjectedPos::default(), 3);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));

        map.pan_by(Vec2::new(-1.0e6, 0.0), &rect);
        let half_w = 400.0 * resolution(3);
        assert!((map.center().x - (HALF_WORLD - half_w)).abs() < 1e-3);
    }
}
