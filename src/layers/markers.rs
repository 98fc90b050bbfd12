//! A layer for point markers drawn with an icon image.

use egui::{Color32, Painter, Pos2, Rect, Response, Stroke, Vec2};
use std::any::Any;
use std::collections::HashMap;

use crate::ImageState;
use crate::layers::Layer;
use crate::projection::{MapProjection, ProjectedPos};

/// An icon used to draw a marker.
#[derive(Clone, Debug, PartialEq)]
pub struct Icon {
    /// File path or http(s) URL of the icon image.
    pub src: String,

    /// The size of the icon on screen.
    pub size: Vec2,

    /// Offset from the marker position to the top-left corner of the icon.
    pub offset: Vec2,
}

impl Icon {
    /// Creates an icon of the given size, centered on the marker position.
    pub fn centered(src: impl Into<String>, size: Vec2) -> Self {
        Self {
            src: src.into(),
            size,
            offset: -size / 2.0,
        }
    }

    fn rect_at(&self, screen_pos: Pos2) -> Rect {
        Rect::from_min_size(screen_pos + self.offset, self.size)
    }
}

/// A marker placed at a projected position.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    /// Where the marker is.
    pub pos: ProjectedPos,

    /// How the marker is drawn.
    pub icon: Icon,
}

impl Marker {
    /// Creates a new marker.
    pub fn new(pos: ProjectedPos, icon: Icon) -> Self {
        Self { pos, icon }
    }
}

/// Layer implementation that draws a list of markers.
pub struct MarkersLayer {
    name: String,
    markers: Vec<Marker>,
    icons: HashMap<String, ImageState>,

    /// Color of the marker drawn while the icon image is unavailable.
    pub fallback_fill: Color32,
}

impl MarkersLayer {
    /// Creates a new, empty `MarkersLayer`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
            icons: HashMap::new(),
            fallback_fill: Color32::from_rgb(220, 40, 40),
        }
    }

    /// The display name of the layer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a marker on top of the existing ones.
    pub fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    /// Removes all markers. Loaded icon images stay cached.
    pub fn clear_markers(&mut self) {
        self.markers.clear();
    }

    /// The markers in drawing order.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl Layer for MarkersLayer {
    fn handle_input(&mut self, response: &Response, _projection: &MapProjection) -> bool {
        let mut loading = false;
        for marker in &self.markers {
            let src = &marker.icon.src;
            let state = self
                .icons
                .entry(src.clone())
                .or_insert_with(|| ImageState::spawn("load_icon", src.clone()));
            state.poll(&response.ctx, &format!("icon_{src}"));
            loading |= matches!(state, ImageState::Loading(_));
        }
        if loading {
            response.ctx.request_repaint();
        }
        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for marker in &self.markers {
            let screen_pos = projection.to_screen(marker.pos);
            let icon_rect = marker.icon.rect_at(screen_pos);

            match self.icons.get(&marker.icon.src) {
                Some(ImageState::Loaded(texture)) => {
                    painter.image(
                        texture.id(),
                        icon_rect,
                        Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
                _ => {
                    let radius = icon_rect.width().min(icon_rect.height()) / 4.0;
                    painter.circle(
                        icon_rect.center(),
                        radius,
                        self.fallback_fill,
                        Stroke::new(2.0, Color32::WHITE),
                    );
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_at(x: f64, y: f64) -> Marker {
        Marker::new(
            ProjectedPos::new(x, y),
            Icon::centered("marker.png", Vec2::splat(32.0)),
        )
    }

    #[test]
    fn centered_icon_offset() {
        let icon = Icon::centered("marker.png", Vec2::new(32.0, 32.0));
        assert_eq!(icon.offset, Vec2::new(-16.0, -16.0));

        let rect = icon.rect_at(Pos2::new(100.0, 100.0));
        assert_eq!(rect.center(), Pos2::new(100.0, 100.0));
        assert_eq!(rect.size(), Vec2::new(32.0, 32.0));
    }

    #[test]
    fn clear_then_add_keeps_one_marker() {
        let mut layer = MarkersLayer::new("Markers");
        layer.add_marker(marker_at(1.0, 2.0));
        layer.add_marker(marker_at(3.0, 4.0));
        assert_eq!(layer.markers().len(), 2);

        layer.clear_markers();
        assert!(layer.markers().is_empty());

        layer.add_marker(marker_at(5.0, 6.0));
        assert_eq!(layer.markers(), &[marker_at(5.0, 6.0)]);
        assert_eq!(layer.name(), "Markers");
    }

    #[test]
    fn markers_layer_as_any() {
        let mut layer = MarkersLayer::new("Markers");
        assert!(layer.as_any().is::<MarkersLayer>());
        assert!(layer.as_any_mut().is::<MarkersLayer>());
    }
}
