//! Hex geometry: pure coordinate math for the offset hex grid.
//!
//! Rows are laid out top to bottom with `ROW_SPACING * size` between centers.
//! Odd rows are shifted left by half a hex width relative to even rows, which
//! produces the brick-style tiling the grid model and hit-tester assume.
//! Nothing here holds state or fails; non-finite inputs are a caller bug.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

use crate::consts::{HEX_SIZE, ROW_SPACING};

/// A point in either map or screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Integer address of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    pub col: u32,
    pub row: u32,
}

impl HexCoord {
    #[must_use]
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

/// Horizontal distance between adjacent centers in a row (the hex's flat-to-flat width).
#[must_use]
pub fn hex_width(size: f64) -> f64 {
    size * 30f64.to_radians().cos()
}

/// Pixel center of the cell at `(col, row)` for a hex of the given size.
#[must_use]
pub fn hex_center(col: u32, row: u32, size: f64) -> Point {
    let half_length = hex_width(size);
    let corner_offset = size * 0.5 * (1.0 - 3f64.sqrt() / 2.0);
    let row_start = if row % 2 == 1 { size * 0.5 + corner_offset } else { size };
    Point {
        x: f64::from(col) * half_length + row_start,
        y: f64::from(row) * ROW_SPACING * size + size * 0.5,
    }
}

/// The six corners of a hex centered at `(center_x, center_y)`.
///
/// Corners sit at `60° * i - 30°`, walking clockwise in screen space
/// (y grows downward) and ending at the top corner.
#[must_use]
pub fn hex_polygon(center_x: f64, center_y: f64, radius: f64) -> [Point; 6] {
    std::array::from_fn(|i| {
        #[allow(clippy::cast_precision_loss)]
        let angle = (60.0 * i as f64 - 30.0).to_radians();
        Point { x: center_x + radius * angle.cos(), y: center_y + radius * angle.sin() }
    })
}

/// Center and corners of `coord` in map-space, with `hex_scale` applied uniformly.
#[must_use]
pub fn cell_polygon(coord: HexCoord, hex_scale: f64) -> (Point, [Point; 6]) {
    let c = hex_center(coord.col, coord.row, HEX_SIZE);
    let center = Point { x: c.x * hex_scale, y: c.y * hex_scale };
    (center, hex_polygon(center.x, center.y, HEX_SIZE / 2.0 * hex_scale))
}

/// Column/row deltas of the six neighbours for a row of the given parity.
///
/// Odd rows are shifted left, so their diagonal neighbours skew one column left.
#[must_use]
pub fn neighbor_offsets(odd_row: bool) -> [(i64, i64); 6] {
    let skew = if odd_row { -1 } else { 0 };
    [(skew, -1), (skew + 1, -1), (-1, 0), (1, 0), (skew, 1), (skew + 1, 1)]
}

/// Candidate neighbour coordinates of `coord`, possibly outside any grid.
///
/// Callers bounds-check against the grid dimensions.
#[must_use]
pub fn hex_neighbors(coord: HexCoord) -> [(i64, i64); 6] {
    let col = i64::from(coord.col);
    let row = i64::from(coord.row);
    neighbor_offsets(coord.row % 2 == 1).map(|(dc, dr)| (col + dc, row + dr))
}

/// Whether `pt` lies inside (or on the edge of) the convex polygon `corners`.
#[must_use]
pub fn polygon_contains(corners: &[Point], pt: Point) -> bool {
    let mut winding: Option<bool> = None;
    for (i, a) in corners.iter().enumerate() {
        let b = corners[(i + 1) % corners.len()];
        let cross = (b.x - a.x) * (pt.y - a.y) - (b.y - a.y) * (pt.x - a.x);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        let positive = cross > 0.0;
        match winding {
            None => winding = Some(positive),
            Some(w) if w != positive => return false,
            Some(_) => {}
        }
    }
    true
}
