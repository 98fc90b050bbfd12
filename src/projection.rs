//! Map projection.
//!
//! Geographic coordinates are WGS84 longitude/latitude in degrees (EPSG:4326). The map works in
//! spherical Web Mercator metres (EPSG:3857, a.k.a. EPSG:900913).

use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::TILE_SIZE;

/// The radius of the Web Mercator sphere in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half of the projected world width in metres.
pub const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// A geographical position. (longitude, latitude) in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    /// Longitude in degrees.
    pub lon: f64,

    /// Latitude in degrees.
    pub lat: f64,
}

impl GeoPos {
    /// Creates a new `GeoPos`.
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl fmt::Display for GeoPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lon={:.6} lat={:.6}", self.lon, self.lat)
    }
}

/// A position in the map's planar projection, in Web Mercator metres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProjectedPos {
    /// Easting in metres.
    pub x: f64,

    /// Northing in metres.
    pub y: f64,
}

impl ProjectedPos {
    /// Creates a new `ProjectedPos`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Projects a geographical position to Web Mercator.
///
/// The input is not range checked. Latitudes near ±90° project far outside the square world.
pub fn project(pos: GeoPos) -> ProjectedPos {
    let x = EARTH_RADIUS * pos.lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + pos.lat.to_radians() / 2.0).tan().ln();
    ProjectedPos { x, y }
}

/// Un-projects a Web Mercator position back to a geographical position.
pub fn reverse_project(pos: ProjectedPos) -> GeoPos {
    let lon = (pos.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (pos.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    GeoPos { lon, lat }
}

/// Metres per screen pixel at the given zoom level.
pub fn resolution(zoom: u8) -> f64 {
    2.0 * HALF_WORLD / (TILE_SIZE as f64 * 2.0_f64.powi(zoom as i32))
}

/// Converts a projected position to fractional tile coordinates at a zoom level.
pub(crate) fn to_tile(pos: ProjectedPos, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x = (pos.x + HALF_WORLD) / (2.0 * HALF_WORLD) * n;
    let y = (HALF_WORLD - pos.y) / (2.0 * HALF_WORLD) * n;
    (x, y)
}

/// A helper for converting between geographical and screen coordinates.
#[derive(Clone, Copy, Debug)]
pub struct MapProjection {
    zoom: u8,
    center: ProjectedPos,
    widget_rect: Rect,
}

impl MapProjection {
    /// Creates a new `MapProjection`.
    pub(crate) fn new(zoom: u8, center: ProjectedPos, widget_rect: Rect) -> Self {
        Self {
            zoom,
            center,
            widget_rect,
        }
    }

    /// The zoom level this projection was made for.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// The projected position at the center of the widget.
    pub fn center(&self) -> ProjectedPos {
        self.center
    }

    /// The screen rectangle of the map widget.
    pub fn widget_rect(&self) -> Rect {
        self.widget_rect
    }

    /// Converts a projected position to a screen coordinate.
    pub fn to_screen(&self, pos: ProjectedPos) -> Pos2 {
        let res = resolution(self.zoom);
        let dx = (pos.x - self.center.x) / res;
        let dy = (self.center.y - pos.y) / res;
        self.widget_rect.center() + Vec2::new(dx as f32, dy as f32)
    }

    /// Converts a screen coordinate to a projected position.
    pub fn from_screen(&self, screen_pos: Pos2) -> ProjectedPos {
        let res = resolution(self.zoom);
        let rel = screen_pos - self.widget_rect.center();
        ProjectedPos {
            x: self.center.x + rel.x as f64 * res,
            y: self.center.y - rel.y as f64 * res,
        }
    }

    /// Projects a geographical coordinate to a screen coordinate.
    pub fn project(&self, geo_pos: GeoPos) -> Pos2 {
        self.to_screen(project(geo_pos))
    }

    /// Un-projects a screen coordinate to a geographical coordinate.
    pub fn unproject(&self, screen_pos: Pos2) -> GeoPos {
        reverse_project(self.from_screen(screen_pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn reverse_project_inverts_project() {
        let points = [
            GeoPos::new(0.0, 0.0),
            GeoPos::new(26.10, 44.43),
            GeoPos::new(24.93545, 60.16952),
            GeoPos::new(-122.4194, 37.7749),
            GeoPos::new(179.9, -85.0),
            GeoPos::new(-179.9, 85.0),
        ];

        for p in points {
            let back = reverse_project(project(p));
            assert!((back.lon - p.lon).abs() < EPSILON, "{p} -> {back}");
            assert!((back.lat - p.lat).abs() < EPSILON, "{p} -> {back}");
        }
    }

    #[test]
    fn project_known_values() {
        let origin = project(GeoPos::new(0.0, 0.0));
        assert!(origin.x.abs() < EPSILON);
        assert!(origin.y.abs() < EPSILON);

        let east = project(GeoPos::new(180.0, 0.0));
        assert!((east.x - 20_037_508.342789244).abs() < EPSILON);

        // The Web Mercator latitude limit maps to the edge of the square world.
        let north = project(GeoPos::new(0.0, 85.0511287798066));
        assert!((north.y - HALF_WORLD).abs() < 1e-3);
    }

    #[test]
    fn project_does_not_validate_range() {
        let pole = project(GeoPos::new(0.0, 90.0));
        assert!(pole.y > 5.0 * HALF_WORLD);

        let wrapped = project(GeoPos::new(540.0, 0.0));
        assert!((wrapped.x - 3.0 * HALF_WORLD).abs() < 1e-3);
    }

    #[test]
    fn to_tile_known_values() {
        // Bucharest is in tile 13/4689/2965.
        let (x, y) = to_tile(project(GeoPos::new(26.10, 44.43)), 13);
        assert_eq!((x.floor(), y.floor()), (4689.0, 2965.0));

        // Top-left corner of the world.
        let (x, y) = to_tile(ProjectedPos::new(-HALF_WORLD, HALF_WORLD), 5);
        assert!(x.abs() < EPSILON);
        assert!(y.abs() < EPSILON);

        // The world at zoom 0 is a single tile.
        let (x, y) = to_tile(ProjectedPos::new(0.0, 0.0), 0);
        assert!((x - 0.5).abs() < EPSILON);
        assert!((y - 0.5).abs() < EPSILON);
    }

    #[test]
    fn resolution_halves_per_zoom() {
        assert!((resolution(0) - 156_543.03392804097).abs() < 1e-6);
        assert!((resolution(1) * 2.0 - resolution(0)).abs() < 1e-9);
    }

    #[test]
    fn map_projection_center_is_widget_center() {
        let rect = Rect::from_min_size(pos2(10.0, 20.0), Vec2::new(800.0, 600.0));
        let center = project(GeoPos::new(26.10, 44.43));
        let projection = MapProjection::new(13, center, rect);

        let screen = projection.to_screen(center);
        assert!((screen - rect.center()).length() < 1e-3);

        let geo = projection.unproject(rect.center());
        assert!((geo.lon - 26.10).abs() < EPSILON);
        assert!((geo.lat - 44.43).abs() < EPSILON);
    }

    #[test]
    fn map_projection_screen_axes() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(256.0, 256.0));
        let projection = MapProjection::new(0, ProjectedPos::default(), rect);

        // Screen y grows downwards, northing grows upwards.
        let top_left = projection.from_screen(pos2(0.0, 0.0));
        assert!((top_left.x + HALF_WORLD).abs() < 1e-3);
        assert!((top_left.y - HALF_WORLD).abs() < 1e-3);
    }
}
