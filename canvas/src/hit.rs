#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::consts::{HEX_SIZE, ROW_SPACING};
use crate::geometry::{HexCoord, Point, cell_polygon, hex_center, hex_width, polygon_contains};
use crate::grid::{GridModel, MapConfig};

/// The visible hex under `map_pt`, if any.
///
/// Hidden hexes are not drawn and therefore never hit. On a shared edge the
/// first cell in row-major order wins.
#[must_use]
pub fn hex_at(map_pt: Point, config: &MapConfig, grid: &GridModel) -> Option<HexCoord> {
    candidates(map_pt, config.hex_scale, grid.rows(), grid.cols())
        .into_iter()
        .filter(|&coord| grid.cell(coord).is_some_and(|c| c.is_visible))
        .find(|&coord| polygon_contains(&cell_polygon(coord, config.hex_scale).1, map_pt))
}

/// In-range cells around the layout slot nearest `map_pt`, row-major.
///
/// A hex reaches half a row past its neighbours' centers at most, so the
/// owning cell is always within one row and one column of the estimate.
fn candidates(map_pt: Point, hex_scale: f64, rows: u32, cols: u32) -> Vec<HexCoord> {
    let mut out = Vec::with_capacity(9);
    if hex_scale <= 0.0 || !map_pt.x.is_finite() || !map_pt.y.is_finite() {
        return out;
    }
    let (x, y) = (map_pt.x / hex_scale, map_pt.y / hex_scale);
    let row_guess = nearest((y - HEX_SIZE * 0.5) / (ROW_SPACING * HEX_SIZE));
    for row in around(row_guess, rows) {
        let row_start = hex_center(0, row, HEX_SIZE).x;
        let col_guess = nearest((x - row_start) / hex_width(HEX_SIZE));
        out.extend(around(col_guess, cols).map(|col| HexCoord::new(col, row)));
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn nearest(v: f64) -> i64 {
    v.round().clamp(-1.0, f64::from(u32::MAX)) as i64
}

/// `guess - 1 ..= guess + 1`, clipped to `0..len`.
fn around(guess: i64, len: u32) -> impl Iterator<Item = u32> {
    (guess - 1..=guess + 1).filter_map(move |i| match u32::try_from(i) {
        Ok(i) if i < len => Some(i),
        _ => None,
    })
}
