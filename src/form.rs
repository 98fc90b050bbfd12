//! The point-of-interest form that the map fills in.

use egui::{Color32, Ui};
use serde::Serialize;
use thiserror::Error;

use crate::config::PoiConfig;
use crate::projection::GeoPos;

/// Amenity value that asks the user to type a new amenity.
pub const NO_AMENITY: &str = "none";

// OpenStreetMap stores coordinates with seven decimals.
const COORDINATE_SCALE: f64 = 1e7;

/// The layout of the window around the map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutMode {
    /// Only the map is shown.
    #[default]
    Map,

    /// The map shares the window with the point-of-interest form.
    MenuForm,
}

/// A problem with the values typed into the form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// The name was left empty.
    #[error("A name is required")]
    MissingName,

    /// The latitude is not a number or not in [-90, 90].
    #[error("Latitude `{0}` must be a number between -90 and 90")]
    InvalidLatitude(String),

    /// The longitude is not a number or not in [-180, 180].
    #[error("Longitude `{0}` must be a number between -180 and 180")]
    InvalidLongitude(String),

    /// Neither a known amenity nor a new one was given.
    #[error("Choose an amenity or type a new one")]
    MissingAmenity,
}

/// A point of interest that passed validation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoiSubmission {
    /// Where the point is.
    pub pos: GeoPos,

    /// The name of the place.
    pub name: String,

    /// An optional web site.
    pub url: Option<String>,

    /// The amenity tag.
    pub amenity: String,
}

/// What the user did with the form.
#[derive(Clone, Debug, PartialEq)]
pub enum FormAction {
    /// The form was saved and its values are valid.
    Submitted(PoiSubmission),

    /// The form was closed without saving.
    Cancelled,
}

/// The fields of the point-of-interest form, as typed text.
#[derive(Clone, Debug, Default)]
pub struct PoiForm {
    /// Latitude text.
    pub lat: String,

    /// Longitude text.
    pub lon: String,

    /// Name of the place.
    pub name: String,

    /// Web site of the place.
    pub url: String,

    /// The chosen amenity value.
    pub amenity: String,

    /// A new amenity, used when `amenity` is [`NO_AMENITY`].
    pub new_amenity: String,

    /// Whether the form is shown.
    pub visible: bool,

    /// Errors from the last save attempt.
    pub errors: Vec<FormError>,
}

impl PoiForm {
    /// Writes a coordinate into the latitude and longitude fields, rounded to seven decimals.
    pub fn set_coordinates(&mut self, pos: GeoPos) {
        self.lat = format!("{:?}", round_coordinate(pos.lat));
        self.lon = format!("{:?}", round_coordinate(pos.lon));
    }

    /// Shows the form.
    pub fn reveal(&mut self) {
        self.visible = true;
    }

    /// Hides the form and forgets previous errors.
    pub fn hide(&mut self) {
        self.visible = false;
        self.errors.clear();
    }

    /// Checks the typed values against `config`.
    pub fn validate(&self, config: &PoiConfig) -> Result<PoiSubmission, Vec<FormError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FormError::MissingName);
        }

        let lat = parse_in_range(&self.lat, 90.0);
        if lat.is_none() {
            errors.push(FormError::InvalidLatitude(self.lat.clone()));
        }
        let lon = parse_in_range(&self.lon, 180.0);
        if lon.is_none() {
            errors.push(FormError::InvalidLongitude(self.lon.clone()));
        }

        let amenity = if self.amenity == NO_AMENITY || self.amenity.is_empty() {
            self.new_amenity.trim()
        } else if config.has_amenity(&self.amenity) {
            self.amenity.as_str()
        } else {
            ""
        };
        if amenity.is_empty() {
            errors.push(FormError::MissingAmenity);
        }

        match (lat, lon) {
            (Some(lat), Some(lon)) if errors.is_empty() => Ok(PoiSubmission {
                pos: GeoPos::new(lon, lat),
                name: name.to_string(),
                url: Some(self.url.trim())
                    .filter(|u| !u.is_empty())
                    .map(str::to_string),
                amenity: amenity.to_string(),
            }),
            _ => Err(errors),
        }
    }

    /// Draws the form. Returns an action when the user saves a valid form or cancels it.
    pub fn ui(&mut self, ui: &mut Ui, config: &PoiConfig) -> Option<FormAction> {
        let mut action = None;

        ui.heading("Add point of interest");
        egui::Grid::new("poi_form").num_columns(2).show(ui, |ui| {
            ui.label("Name");
            ui.text_edit_singleline(&mut self.name);
            ui.end_row();

            ui.label("URL");
            ui.text_edit_singleline(&mut self.url);
            ui.end_row();

            ui.label("Latitude");
            ui.text_edit_singleline(&mut self.lat);
            ui.end_row();

            ui.label("Longitude");
            ui.text_edit_singleline(&mut self.lon);
            ui.end_row();

            ui.label("Amenity");
            let selected = config
                .amenities
                .iter()
                .find(|a| a.value == self.amenity)
                .map(|a| a.label.as_str())
                .unwrap_or("");
            egui::ComboBox::from_id_salt("poi_amenity")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for amenity in &config.amenities {
                        ui.selectable_value(
                            &mut self.amenity,
                            amenity.value.clone(),
                            amenity.label.as_str(),
                        );
                    }
                });
            ui.end_row();

            if self.amenity == NO_AMENITY {
                ui.label("New amenity");
                ui.text_edit_singleline(&mut self.new_amenity);
                ui.end_row();
            }
        });

        for error in &self.errors {
            ui.colored_label(Color32::RED, error.to_string());
        }

        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                match self.validate(config) {
                    Ok(submission) => {
                        self.errors.clear();
                        action = Some(FormAction::Submitted(submission));
                    }
                    Err(errors) => self.errors = errors,
                }
            }
            if ui.button("Cancel").clicked() {
                action = Some(FormAction::Cancelled);
            }
        });

        action
    }
}

fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_SCALE).round() / COORDINATE_SCALE
}

fn parse_in_range(text: &str, limit: f64) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| (-limit..=limit).contains(v))
}
