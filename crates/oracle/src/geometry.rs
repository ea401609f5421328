//! World/tile coordinate helpers.
//!
//! Conventions:
//! - World units are pixels; `y` grows downward, so the tile "below" `(x, y)` is `(x, y + 1)`.
//! - Tile `(x, y)` covers `[x * size, (x + 1) * size)` on both axes.
//! - Entities are anchored at the centre of their bounding box.

use serde::{Deserialize, Serialize};

/// Inset used when asking which tiles a footprint touches, so that a box resting exactly on a
/// tile edge does not count as intersecting the neighbouring tile.
pub const CONTACT_INSET: f32 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: TileCoord) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Axis-aligned rectangle, top-left anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn centered(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            w: width,
            h: height,
        }
    }
}

/// Inclusive tile rectangle `[x, x + w] x [y, y + h]`, as authored in level data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl TileRect {
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.x && tile.x <= self.x + self.w && tile.y >= self.y && tile.y <= self.y + self.h
    }

    pub fn center(&self) -> TileCoord {
        TileCoord {
            x: self.x + self.w.div_euclid(2),
            y: self.y + self.h.div_euclid(2),
        }
    }
}

pub fn world_to_tile(point: Vec2, tile_size: f32) -> TileCoord {
    TileCoord {
        x: (point.x / tile_size).floor() as i32,
        y: (point.y / tile_size).floor() as i32,
    }
}

pub fn tile_center(tile: TileCoord, tile_size: f32) -> Vec2 {
    Vec2 {
        x: tile.x as f32 * tile_size + tile_size / 2.0,
        y: tile.y as f32 * tile_size + tile_size / 2.0,
    }
}

/// Centre position for a body of `height` standing in `tile`: horizontally centred, feet on the
/// tile's bottom edge (the top of the floor tile below it).
pub fn standing_position(tile: TileCoord, tile_size: f32, height: f32) -> Vec2 {
    Vec2 {
        x: tile.x as f32 * tile_size + tile_size / 2.0,
        y: (tile.y + 1) as f32 * tile_size - height / 2.0,
    }
}

/// Tiles touched by `rect` after shrinking it by `inset` on every side, row-major.
pub fn overlapped_tiles(rect: Rect, tile_size: f32, inset: f32) -> impl Iterator<Item = TileCoord> {
    let start_x = ((rect.x + inset) / tile_size).floor() as i32;
    let end_x = ((rect.x + rect.w - inset) / tile_size).floor() as i32;
    let start_y = ((rect.y + inset) / tile_size).floor() as i32;
    let end_y = ((rect.y + rect.h - inset) / tile_size).floor() as i32;
    (start_y..=end_y).flat_map(move |y| (start_x..=end_x).map(move |x| TileCoord { x, y }))
}

/// Centre-anchored footprint shared by the player and enemies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Body {
    pub fn new(position: Vec2, width: f32, height: f32) -> Self {
        Self {
            position,
            width,
            height,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::centered(self.position, self.width, self.height)
    }

    pub fn bottom(&self) -> f32 {
        self.position.y + self.height / 2.0
    }

    /// Tile containing the body's feet.
    pub fn standing_tile(&self, tile_size: f32) -> TileCoord {
        world_to_tile(
            Vec2 {
                x: self.position.x,
                y: self.bottom() - CONTACT_INSET,
            },
            tile_size,
        )
    }

    pub fn rect_at(&self, position: Vec2) -> Rect {
        Rect::centered(position, self.width, self.height)
    }
}
