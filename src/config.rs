//! Configuration for map providers and for point selection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::TileId;
use crate::projection::GeoPos;

/// Configuration for a map provider.
pub trait MapConfig {
    /// Returns the URL for a given tile.
    fn tile_url(&self, tile: &TileId) -> String;

    /// Returns the attribution text to be displayed on the map. If returns `None`, no attribution is shown.
    fn attribution(&self) -> Option<&String>;

    /// Returns the attribution URL to be linked from the attribution text.
    fn attribution_url(&self) -> Option<&String>;

    /// The default geographical center of the map.
    fn default_center(&self) -> GeoPos;

    /// The default zoom level of the map.
    fn default_zoom(&self) -> u8;
}

/// Configuration for the OpenStreetMap tile server.
///
/// # Example
///
/// ```
/// use osmpoint_map::config::OpenStreetMapConfig;
/// let config = OpenStreetMapConfig::default();
/// ```
#[cfg(feature = "openstreetmap")]
pub struct OpenStreetMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
}

#[cfg(feature = "openstreetmap")]
impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tile.openstreetmap.org".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            attribution_url: "https://www.openstreetmap.org".to_string(),
            default_center: GeoPos::new(26.10, 44.43), // Bucharest, Romania
            default_zoom: 13,
        }
    }
}

#[cfg(feature = "openstreetmap")]
impl MapConfig for OpenStreetMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, tile.z, tile.x, tile.y)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// A dynamic map configuration that allows defining a custom tile URL function at runtime.
///
/// # Example
///
/// ```
/// use osmpoint_map::config::DynMapConfig;
/// let config = DynMapConfig::new(|tile| format!("https://my-tile-server/{}/{}/{}.png", tile.z, tile.x, tile.y));
/// ```
pub struct DynMapConfig {
    tile_url: Box<dyn Fn(&TileId) -> String>,
    attribution: Option<String>,
    default_center: GeoPos,
    default_zoom: u8,
}

impl DynMapConfig {
    /// Creates a new `DynMapConfig` with a custom tile URL function.
    pub fn new(tile_url: impl Fn(&TileId) -> String + 'static) -> Self {
        Self {
            tile_url: Box::new(tile_url),
            attribution: None,
            default_center: GeoPos::new(26.10, 44.43),
            default_zoom: 13,
        }
    }

    /// Sets the attribution text shown in the corner of the map.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    /// Sets the initial view.
    pub fn with_default_view(mut self, center: GeoPos, zoom: u8) -> Self {
        self.default_center = center;
        self.default_zoom = zoom;
        self
    }
}

impl MapConfig for DynMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        (self.tile_url)(tile)
    }

    fn attribution(&self) -> Option<&String> {
        self.attribution.as_ref()
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }
}

/// Errors that can occur while loading a [`PoiConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Unable to read configuration file `{path}`")]
    Io {
        /// The path that was read.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON or is missing fields.
    #[error("Invalid configuration")]
    Parse(#[from] serde_json::Error),
}

/// A choice in the amenity selector of the point-of-interest form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    /// The value submitted with the form, e.g. `pub`.
    pub value: String,

    /// The label shown to the user.
    pub label: String,
}

impl Amenity {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Configuration for selecting points of interest on the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiConfig {
    /// File path or http(s) URL of the image used for the point marker.
    pub marker_image_src: String,

    /// Amenity choices offered by the form. The value [`crate::form::NO_AMENITY`] asks the user
    /// to type a new one.
    pub amenities: Vec<Amenity>,
}

impl Default for PoiConfig {
    fn default() -> Self {
        Self {
            marker_image_src: "static/img/marker.png".to_string(),
            amenities: vec![
                Amenity::new("none", "Other (type below)"),
                Amenity::new("bar", "Bar"),
                Amenity::new("cafe", "Cafe"),
                Amenity::new("fuel", "Fuel"),
                Amenity::new("pharmacy", "Pharmacy"),
                Amenity::new("pub", "Pub"),
                Amenity::new("restaurant", "Restaurant"),
            ],
        }
    }
}

impl PoiConfig {
    /// Parses the configuration from a JSON string. Missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Returns `true` if `value` is one of the configured amenities.
    pub fn has_amenity(&self, value: &str) -> bool {
        self.amenities.iter().any(|a| a.value == value)
    }
}
