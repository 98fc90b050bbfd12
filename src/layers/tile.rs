//! A layer for tile maps on the map.

use egui::{Color32, Painter, Pos2, Rect, Response, Vec2};
use std::{
    any::Any,
    collections::{HashMap, HashSet},
};

use crate::{
    ImageState, TILE_SIZE, TileId, config::MapConfig, layers::Layer, projection::MapProjection,
    projection::to_tile,
};

/// A layer that manages and renders map tiles on the map view.
pub struct TileLayer {
    tiles: HashMap<TileId, ImageState>,
    /// Color tint applied to the tile images when rendering
    pub tint: Color32,
    config: Box<dyn MapConfig>,
}

impl TileLayer {
    /// Creates a new tile layer with the given map configuration.
    pub fn new(config: impl MapConfig + 'static) -> Self {
        Self {
            tiles: Default::default(),
            tint: Color32::WHITE,
            config: Box::new(config),
        }
    }

    /// Number of tiles in the cache, in any state.
    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Forgets failed tiles that are not visible, so they are downloaded again when they come
    /// back into view.
    fn forget_failed_tiles(&mut self, visible: &HashSet<TileId>) {
        self.tiles.retain(|tile_id, state| {
            !matches!(state, ImageState::Failed(_)) || visible.contains(tile_id)
        });
    }
}

/// Returns an iterator over the tiles visible through the projection, with their top-left
/// screen positions. Tiles outside the world are skipped.
pub(crate) fn visible_tiles(projection: &MapProjection) -> impl Iterator<Item = (TileId, Pos2)> {
    let zoom = projection.zoom();
    let rect = projection.widget_rect();
    let (center_x, center_y) = to_tile(projection.center(), zoom);

    let half_w = rect.width() as f64 / 2.0 / TILE_SIZE as f64;
    let half_h = rect.height() as f64 / 2.0 / TILE_SIZE as f64;

    let x_min = (center_x - half_w).floor() as i64;
    let y_min = (center_y - half_h).floor() as i64;
    let x_max = (center_x + half_w).floor() as i64;
    let y_max = (center_y + half_h).floor() as i64;

    let world = 1_i64 << zoom;
    let widget_center = rect.center();

    (x_min..=x_max)
        .flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
        .filter(move |(x, y)| (0..world).contains(x) && (0..world).contains(y))
        .map(move |(x, y)| {
            let tile_id = TileId {
                z: zoom,
                x: x as u32,
                y: y as u32,
            };
            let screen_x = (x as f64 - center_x) * TILE_SIZE as f64;
            let screen_y = (y as f64 - center_y) * TILE_SIZE as f64;
            (tile_id, widget_center + Vec2::new(screen_x as f32, screen_y as f32))
        })
}

impl Layer for TileLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        let visible: HashSet<TileId> = visible_tiles(projection).map(|(id, _)| id).collect();
        self.forget_failed_tiles(&visible);

        let mut loading = false;
        for &tile_id in &visible {
            let state = self.tiles.entry(tile_id).or_insert_with(|| {
                ImageState::spawn("download_tile", tile_id.to_url(self.config.as_ref()))
            });
            state.poll(
                &response.ctx,
                &format!("tile_{}_{}_{}", tile_id.z, tile_id.x, tile_id.y),
            );
            loading |= matches!(state, ImageState::Loading(_));
        }
        if loading {
            // Keep polling until every visible tile has arrived.
            response.ctx.request_repaint();
        }
        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for (tile_id, tile_pos) in visible_tiles(projection) {
            let tile_rect =
                Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));
            match self.tiles.get(&tile_id) {
                Some(ImageState::Loaded(texture)) => {
                    painter.image(
                        texture.id(),
                        tile_rect,
                        Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0)),
                        self.tint,
                    );
                }
                Some(ImageState::Failed(_)) => draw_placeholder(painter, tile_rect, "!", Color32::RED),
                _ => draw_placeholder(painter, tile_rect, "?", Color32::ORANGE),
            }
        }
    }

    fn attribution(&self) -> Option<(&str, Option<&str>)> {
        self.config.attribution().map(|text| {
            (
                text.as_str(),
                self.config.attribution_url().map(String::as_str),
            )
        })
    }
}

/// Draws a gray tile with a border and a mark in the center.
fn draw_placeholder(painter: &Painter, tile_rect: Rect, mark: &str, color: Color32) {
    painter.rect_filled(tile_rect, 0.0, Color32::from_gray(220));
    painter.rect_stroke(
        tile_rect,
        0.0,
        egui::Stroke::new(1.0, Color32::GRAY),
        egui::StrokeKind::Inside,
    );
    painter.text(
        tile_rect.center(),
        egui::Align2::CENTER_CENTER,
        mark,
        egui::FontId::proportional(40.0),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynMapConfig;
    use crate::projection::{GeoPos, ProjectedPos, project};
    use egui::pos2;

    #[test]
    fn tile_id_to_url() {
        let config = DynMapConfig::new(|t| format!("https://tiles/{}/{}/{}.png", t.z, t.x, t.y));
        let tile_id = TileId {
            z: 10,
            x: 559,
            y: 330,
        };
        assert_eq!(tile_id.to_url(&config), "https://tiles/10/559/330.png");
    }

    #[test]
    fn visible_tiles_at_zoom_zero() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(256.0, 256.0));
        let projection = MapProjection::new(0, ProjectedPos::default(), rect);

        let tiles: Vec<_> = visible_tiles(&projection).collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].0, TileId { z: 0, x: 0, y: 0 });
        assert!((tiles[0].1 - pos2(0.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn visible_tiles_cover_the_viewport() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(800.0, 600.0));
        let center = project(GeoPos::new(26.10, 44.43));
        let projection = MapProjection::new(13, center, rect);

        let tiles: Vec<_> = visible_tiles(&projection).collect();
        assert!(!tiles.is_empty());
        for (tile_id, pos) in &tiles {
            assert_eq!(tile_id.z, 13);
            let tile_rect = Rect::from_min_size(*pos, Vec2::splat(TILE_SIZE as f32));
            assert!(tile_rect.intersects(rect.expand(1.0)));
        }

        // The tile containing the center is among them.
        let (cx, cy) = to_tile(center, 13);
        assert!(
            tiles
                .iter()
                .any(|(t, _)| t.x == cx.floor() as u32 && t.y == cy.floor() as u32)
        );
    }

    #[test]
    fn tile_layer_attribution_comes_from_config() {
        let layer = TileLayer::new(DynMapConfig::new(|_| String::new()).with_attribution("Me"));
        assert_eq!(layer.attribution(), Some(("Me", None)));
        assert_eq!(layer.cached_tiles(), 0);
        assert!(layer.as_any().is::<TileLayer>());
    }

    #[test]
    fn failed_tiles_out_of_view_are_forgotten() {
        let mut layer = TileLayer::new(DynMapConfig::new(|_| String::new()));
        let seen = TileId { z: 3, x: 1, y: 1 };
        let gone = TileId { z: 3, x: 7, y: 7 };
        for tile_id in [seen, gone] {
            layer.tiles.insert(
                tile_id,
                ImageState::Failed(std::sync::Arc::new(eyre::eyre!("no such tile"))),
            );
        }

        layer.forget_failed_tiles(&HashSet::from([seen]));

        assert_eq!(layer.cached_tiles(), 1);
        assert!(layer.tiles.contains_key(&seen));
        assert!(!layer.tiles.contains_key(&gone));
    }
}
