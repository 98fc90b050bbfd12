//! The map controller: one map view, the point-of-interest form, and the glue between them.
//!
//! # Example
//!
//! ```no_run
//! use osmpoint_map::config::{OpenStreetMapConfig, PoiConfig};
//! use osmpoint_map::controller::{MapController, SelectionMode};
//! use osmpoint_map::geolocation::FixedGeolocation;
//! use osmpoint_map::projection::GeoPos;
//!
//! let mut controller = MapController::init_map(OpenStreetMapConfig::default());
//! controller.enable_adding_points(SelectionMode::Marker(PoiConfig::default()));
//! controller.center_to_gps(FixedGeolocation(GeoPos::new(26.1, 44.43)));
//! ```

use egui::{Pos2, Response, Ui, Vec2};
use log::{info, warn};
use std::time::Duration;

use crate::Map;
use crate::config::{MapConfig, PoiConfig};
use crate::controls::Control;
use crate::controls::click::{
    ClickContext, ClickControl, DOUBLE_CLICK_DELAY, SingleClickRecognizer,
};
use crate::form::{FormAction, LayoutMode, PoiForm, PoiSubmission};
use crate::geolocation::{Geolocation, GeolocationRequest, GeolocationStatus};
use crate::layers::markers::{Icon, Marker, MarkersLayer};
use crate::layers::tile::TileLayer;
use crate::projection::{GeoPos, project, reverse_project};

/// The container the map view is bound to.
pub const MAP_CONTAINER: &str = "map";

/// The name of the base tile layer.
pub const BASE_LAYER: &str = "Base";

/// The name of the layer holding the selected point.
pub const MARKERS_LAYER: &str = "Markers";

/// The zoom level used when centering on the device position.
pub const GPS_ZOOM: u8 = 16;

/// The on-screen size of the selected point marker.
pub const MARKER_SIZE: Vec2 = Vec2::new(32.0, 32.0);

/// What happens when the user clicks the map.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionMode {
    /// Fill in and show the form, and mark the point on the map.
    Marker(PoiConfig),

    /// Only write the clicked coordinate to the log.
    Log,
}

/// Owns the map view and reacts to clicks and position fixes.
pub struct MapController {
    map: Map,
    form: PoiForm,
    layout: LayoutMode,
    click_controls: Vec<ClickControl>,
    clicks: SingleClickRecognizer,
    geolocation: GeolocationStatus,
    poi_config: Option<PoiConfig>,
}

impl MapController {
    /// Creates the map view with its controls and base layer, centered on the default view of
    /// `config`.
    ///
    /// Every call creates a new, independent view.
    pub fn init_map<C: MapConfig + 'static>(config: C) -> Self {
        let mut map = Map::new(MAP_CONTAINER);
        map.add_control(Control::Navigation);
        map.add_control(Control::ZoomPanel);
        map.add_control(Control::TouchNavigation { kinetic: true });

        let center = project(config.default_center());
        let zoom = config.default_zoom();
        map.add_layer(BASE_LAYER, TileLayer::new(config));
        map.set_center(center, zoom);

        Self {
            map,
            form: PoiForm::default(),
            layout: LayoutMode::default(),
            click_controls: Vec::new(),
            clicks: SingleClickRecognizer::default(),
            geolocation: GeolocationStatus::default(),
            poi_config: None,
        }
    }

    /// The map view.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The map view, mutably.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// The point-of-interest form.
    pub fn form(&self) -> &PoiForm {
        &self.form
    }

    /// The point-of-interest form, mutably.
    pub fn form_mut(&mut self) -> &mut PoiForm {
        &mut self.form
    }

    /// The current window layout.
    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// The state of the last position request.
    pub fn geolocation(&self) -> &GeolocationStatus {
        &self.geolocation
    }

    /// The number of installed click controls.
    pub fn click_control_count(&self) -> usize {
        self.click_controls.len()
    }

    /// Asks `source` for the device position in the background.
    ///
    /// The map is recentered by [`MapController::poll_geolocation`] once the position arrives.
    /// A request that is already in flight is dropped and its result ignored.
    pub fn center_to_gps(&mut self, source: impl Geolocation) {
        self.geolocation = GeolocationStatus::Pending(GeolocationRequest::spawn(source));
    }

    /// Applies the result of a finished position request. Returns `true` if a request finished.
    ///
    /// On success the map is centered on the position at [`GPS_ZOOM`]. In marker mode the form
    /// coordinates are updated too. On failure the map is left alone.
    pub fn poll_geolocation(&mut self) -> bool {
        let request = match std::mem::take(&mut self.geolocation) {
            GeolocationStatus::Pending(request) => request,
            other => {
                self.geolocation = other;
                return false;
            }
        };

        self.geolocation = match request.try_take() {
            Ok(Ok(pos)) => {
                info!("Centering map on device position {}", pos);
                self.map.set_center(project(pos), GPS_ZOOM);
                if self.poi_config.is_some() {
                    self.form.set_coordinates(pos);
                }
                GeolocationStatus::Located(pos)
            }
            Ok(Err(e)) => {
                warn!("Unable to center map on device position: {}", e);
                GeolocationStatus::Failed(e)
            }
            Err(request) => {
                self.geolocation = GeolocationStatus::Pending(request);
                return false;
            }
        };
        true
    }

    /// Installs an active click control that selects points in the given mode.
    ///
    /// Calling this again installs another control next to the existing one.
    pub fn enable_adding_points(&mut self, mode: SelectionMode) {
        let mut control = match mode {
            SelectionMode::Marker(config) => {
                self.map
                    .add_layer(MARKERS_LAYER, MarkersLayer::new(MARKERS_LAYER));
                self.poi_config = Some(config.clone());

                ClickControl::new(move |ctx: &mut ClickContext<'_>, xy: Pos2| {
                    let lonlat = reverse_project(ctx.map.lonlat_from_viewport_px(xy));
                    ctx.form.set_coordinates(lonlat);
                    ctx.form.reveal();
                    *ctx.layout = LayoutMode::MenuForm;
                    draw_marker(ctx.map, lonlat, &config);
                })
            }
            SelectionMode::Log => ClickControl::new(|ctx: &mut ClickContext<'_>, xy: Pos2| {
                let lonlat = reverse_project(ctx.map.lonlat_from_viewport_px(xy));
                info!("Selected point {}", lonlat);
            }),
        };
        control.activate();
        self.click_controls.push(control);
    }

    /// Delivers a click at a viewport pixel to every installed click control.
    pub fn handle_click(&mut self, xy: Pos2) {
        let mut ctx = ClickContext {
            map: &mut self.map,
            form: &mut self.form,
            layout: &mut self.layout,
        };
        for control in &mut self.click_controls {
            control.trigger(&mut ctx, xy);
        }
    }

    /// Hides the form and removes the selected point from the map.
    pub fn close_form(&mut self) {
        self.form.hide();
        self.layout = LayoutMode::Map;
        if let Some(layer) = self.map.layer_mut::<MarkersLayer>(MARKERS_LAYER) {
            layer.clear_markers();
        }
    }

    /// Draws the map and handles clicks on it.
    ///
    /// A click reaches the click controls only after [`DOUBLE_CLICK_DELAY`] has passed without a
    /// second click. Double clicks zoom the map and select nothing.
    pub fn show(&mut self, ui: &mut Ui) -> Response {
        self.poll_geolocation();
        if self.geolocation.is_pending() {
            ui.ctx().request_repaint();
        }

        let response = ui.add(&mut self.map);
        let now = ui.input(|i| i.time);

        if let Some(xy) = self.clicks.poll(now) {
            self.handle_click(xy);
            // The map was drawn before the click changed it.
            ui.ctx().request_repaint();
        }

        if response.double_clicked() {
            self.clicks.cancel();
        } else if response.clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                self.clicks
                    .click((pointer_pos - response.rect.min).to_pos2(), now);
            }
        }

        if self.clicks.is_pending() {
            ui.ctx()
                .request_repaint_after(Duration::from_secs_f64(DOUBLE_CLICK_DELAY));
        }
        response
    }

    /// Draws the form while the layout shows it. Returns the point when the user saves it.
    pub fn show_form(&mut self, ui: &mut Ui) -> Option<PoiSubmission> {
        if self.layout != LayoutMode::MenuForm || !self.form.visible {
            return None;
        }
        let config = self.poi_config.as_ref()?;

        match self.form.ui(ui, config)? {
            FormAction::Submitted(submission) => {
                info!(
                    "Point `{}` ({}) submitted at {}",
                    submission.name, submission.amenity, submission.pos
                );
                self.close_form();
                Some(submission)
            }
            FormAction::Cancelled => {
                self.close_form();
                None
            }
        }
    }
}

/// Replaces the marker in the markers layer of `map` with one at `lonlat`.
pub fn draw_marker(map: &mut Map, lonlat: GeoPos, config: &PoiConfig) {
    let icon = Icon::centered(config.marker_image_src.clone(), MARKER_SIZE);
    match map.layer_mut::<MarkersLayer>(MARKERS_LAYER) {
        Some(layer) => {
            layer.clear_markers();
            layer.add_marker(Marker::new(project(lonlat), icon));
        }
        None => warn!("No `{}` layer to draw the marker on", MARKERS_LAYER),
    }
}
