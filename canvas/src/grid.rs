//! Grid model: map configuration, hex records, and the in-memory cell store.
//!
//! This module defines the data that describes one map session: `MapConfig`
//! (dimensions and image alignment), `HexRecord` (one persisted row as it
//! arrives from the server), and `GridModel`, which owns exactly one
//! `HexCell` for every in-range coordinate.
//!
//! All mutations are local. Persistence is the presenter's concern; the grid
//! only records a per-cell edit counter so that late server responses can be
//! recognised as stale, and an `unsynced` flag for writes that never landed.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

use serde::{Deserialize, Deserializer, Serialize};

use crate::consts::{
    DEFAULT_COLS, DEFAULT_IMAGE_SCALE_HORIZONTAL, DEFAULT_IMAGE_SCALE_VERTICAL, DEFAULT_MAP_NAME, DEFAULT_OFFSET_X,
    DEFAULT_OFFSET_Y, DEFAULT_ROWS, HEX_SIZE, ROW_SPACING, UNSAVED_MAP_ID,
};
use crate::geometry::{HexCoord, hex_width};

/// Largest accepted row or column count.
pub const MAX_DIMENSION: u32 = 512;

// =============================================================
// Errors
// =============================================================

/// Lookup or mutation against a coordinate outside the grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("hex ({col}, {row}) is outside the grid")]
    OutOfRange { col: u32, row: u32 },
}

/// Locally rejected input, caught before anything reaches the server.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("map name must not be empty")]
    EmptyName,
    #[error("grid dimensions must be between 1 and 512 (got {rows}x{cols})")]
    Dimensions { rows: u32, cols: u32 },
    #[error("{field} must be a positive finite number (got {value})")]
    Scale { field: &'static str, value: f64 },
    #[error("{field} must be finite (got {value})")]
    Offset { field: &'static str, value: f64 },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("note text must not be empty")]
    EmptyNote,
    #[error("only the DM may {0}")]
    NotPermitted(&'static str),
    #[error("a map save is in progress")]
    Busy,
    #[error("no hex is selected")]
    NoSelection,
    #[error("no map is open")]
    NoMap,
    #[error("the map has not been saved yet")]
    Unsaved,
}

// =============================================================
// Wire types
// =============================================================

/// One entry in a hex's note log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub author: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub text: String,
}

/// A persisted hex row keyed by `(x_coord, y_coord)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexRecord {
    #[serde(rename = "x_coord")]
    pub col: u32,
    #[serde(rename = "y_coord")]
    pub row: u32,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_explored: bool,
    #[serde(default)]
    pub is_controlled: bool,
    #[serde(default)]
    pub resources: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: Vec<Note>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl HexRecord {
    /// Snapshot a cell into its wire form.
    #[must_use]
    pub fn from_cell(cell: &HexCell) -> Self {
        Self {
            col: cell.coord.col,
            row: cell.coord.row,
            is_visible: cell.is_visible,
            is_explored: cell.is_explored,
            is_controlled: cell.is_controlled,
            resources: cell.resources.clone(),
            notes: cell.notes.clone(),
            name: cell.name.clone(),
        }
    }

    #[must_use]
    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.col, self.row)
    }
}

fn default_true() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A signed-in user as known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    pub username: String,
    #[serde(rename = "isDM")]
    pub is_dm: bool,
}

// =============================================================
// Map configuration
// =============================================================

/// Dimensions and background alignment for one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// Server identity, or [`UNSAVED_MAP_ID`] before the first save.
    #[serde(rename = "mapID")]
    pub map_id: i64,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    /// Uniform multiplier on hex geometry.
    pub hex_scale: f64,
    /// Alignment of the hex grid over the background image.
    pub offset_x: f64,
    pub offset_y: f64,
    pub image_scale_horizontal: f64,
    pub image_scale_vertical: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            map_id: UNSAVED_MAP_ID,
            name: DEFAULT_MAP_NAME.to_owned(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            hex_scale: 1.0,
            offset_x: DEFAULT_OFFSET_X,
            offset_y: DEFAULT_OFFSET_Y,
            image_scale_horizontal: DEFAULT_IMAGE_SCALE_HORIZONTAL,
            image_scale_vertical: DEFAULT_IMAGE_SCALE_VERTICAL,
        }
    }
}

/// Placement of the background image under the hex grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl MapConfig {
    /// Whether this map has never been saved.
    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        self.map_id == UNSAVED_MAP_ID
    }

    /// Check required fields before the config is used or sent anywhere.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.rows == 0 || self.cols == 0 || self.rows > MAX_DIMENSION || self.cols > MAX_DIMENSION {
            return Err(ValidationError::Dimensions { rows: self.rows, cols: self.cols });
        }
        for (field, value) in [
            ("hexScale", self.hex_scale),
            ("imageScaleHorizontal", self.image_scale_horizontal),
            ("imageScaleVertical", self.image_scale_vertical),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::Scale { field, value });
            }
        }
        for (field, value) in [("offsetX", self.offset_x), ("offsetY", self.offset_y)] {
            if !value.is_finite() {
                return Err(ValidationError::Offset { field, value });
            }
        }
        Ok(())
    }

    /// Rendered map size in map-space pixels.
    ///
    /// The grid extent covers every hex plus the configured offset; when the
    /// natural size of the background image is known the extent grows to
    /// cover the scaled image as well.
    #[must_use]
    pub fn extent(&self, image_size: Option<(f64, f64)>) -> (f64, f64) {
        let grid_w = f64::from(self.cols) * hex_width(HEX_SIZE) + 1.5 * HEX_SIZE + self.offset_x;
        let grid_h = f64::from(self.rows) * HEX_SIZE * ROW_SPACING + HEX_SIZE;
        match image_size {
            Some((iw, ih)) => {
                (grid_w.max(iw * self.image_scale_horizontal), grid_h.max(ih * self.image_scale_vertical))
            }
            None => (grid_w, grid_h),
        }
    }

    /// Transform applied to the background image: offsets in reverse, then per-axis scale.
    #[must_use]
    pub fn background_transform(&self) -> BackgroundTransform {
        BackgroundTransform {
            translate_x: -self.offset_x,
            translate_y: -self.offset_y,
            scale_x: self.image_scale_horizontal,
            scale_y: self.image_scale_vertical,
        }
    }
}

// =============================================================
// Cells
// =============================================================

/// One logical grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub coord: HexCoord,
    pub name: String,
    pub is_explored: bool,
    pub is_controlled: bool,
    pub is_visible: bool,
    pub resources: Option<serde_json::Value>,
    pub notes: Vec<Note>,
    /// Bumped on every local mutation; never by hydration.
    pub edit_seq: u64,
    /// A persistence write for this cell failed and has not been reconciled.
    pub unsynced: bool,
}

impl HexCell {
    fn blank(coord: HexCoord) -> Self {
        Self {
            coord,
            name: String::new(),
            is_explored: false,
            is_controlled: false,
            is_visible: true,
            resources: None,
            notes: Vec::new(),
            edit_seq: 0,
            unsynced: false,
        }
    }

    /// Overlay the persisted fields of `record`, leaving bookkeeping alone.
    fn overlay(&mut self, record: &HexRecord) {
        self.is_visible = record.is_visible;
        self.is_explored = record.is_explored;
        self.is_controlled = record.is_controlled;
        self.resources.clone_from(&record.resources);
        self.notes.clone_from(&record.notes);
        self.name.clone_from(&record.name);
    }
}

/// Row-major store of every cell in a `rows x cols` grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    rows: u32,
    cols: u32,
    cells: Vec<HexCell>,
}

impl Default for GridModel {
    fn default() -> Self {
        Self::build(0, 0)
    }
}

impl GridModel {
    /// Allocate a blank grid with one default cell per coordinate.
    #[must_use]
    pub fn build(rows: u32, cols: u32) -> Self {
        let cells = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| HexCell::blank(HexCoord::new(col, row))))
            .collect();
        Self { rows, cols, cells }
    }

    /// Overlay persisted rows onto the grid. Out-of-range records are ignored.
    ///
    /// Returns the number of records applied.
    pub fn hydrate(&mut self, records: &[HexRecord]) -> usize {
        let mut applied = 0;
        for record in records {
            if let Some(cell) = self.cell_mut(record.coord()) {
                cell.overlay(record);
                applied += 1;
            }
        }
        applied
    }

    #[must_use]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.iter()
    }

    /// Whether `(col, row)` addresses a cell in this grid.
    #[must_use]
    pub fn contains(&self, col: i64, row: i64) -> bool {
        (0..i64::from(self.cols)).contains(&col) && (0..i64::from(self.rows)).contains(&row)
    }

    /// Bounds-checked lookup.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn get(&self, col: u32, row: u32) -> Result<&HexCell, GridError> {
        self.cell(HexCoord::new(col, row)).ok_or(GridError::OutOfRange { col, row })
    }

    #[must_use]
    pub fn cell(&self, coord: HexCoord) -> Option<&HexCell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    fn cell_mut(&mut self, coord: HexCoord) -> Option<&mut HexCell> {
        self.index(coord).map(|i| &mut self.cells[i])
    }

    fn index(&self, coord: HexCoord) -> Option<usize> {
        if coord.col >= self.cols || coord.row >= self.rows {
            return None;
        }
        Some(coord.row as usize * self.cols as usize + coord.col as usize)
    }

    /// Apply a local edit, bump the cell's edit counter, and return `f`'s result.
    fn edit<T>(&mut self, col: u32, row: u32, f: impl FnOnce(&mut HexCell) -> T) -> Result<T, GridError> {
        let cell = self.cell_mut(HexCoord::new(col, row)).ok_or(GridError::OutOfRange { col, row })?;
        let out = f(cell);
        cell.edit_seq += 1;
        Ok(out)
    }

    // --- Mutations (each returns the previous value) ---

    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn set_explored(&mut self, col: u32, row: u32, value: bool) -> Result<bool, GridError> {
        self.edit(col, row, |c| std::mem::replace(&mut c.is_explored, value))
    }

    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn set_controlled(&mut self, col: u32, row: u32, value: bool) -> Result<bool, GridError> {
        self.edit(col, row, |c| std::mem::replace(&mut c.is_controlled, value))
    }

    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn set_visible(&mut self, col: u32, row: u32, value: bool) -> Result<bool, GridError> {
        self.edit(col, row, |c| std::mem::replace(&mut c.is_visible, value))
    }

    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn set_name(&mut self, col: u32, row: u32, value: String) -> Result<String, GridError> {
        self.edit(col, row, |c| std::mem::replace(&mut c.name, value))
    }

    /// Append to the note log; returns the number of notes before the append.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` when the coordinate is outside the grid.
    pub fn append_note(&mut self, col: u32, row: u32, note: Note) -> Result<usize, GridError> {
        self.edit(col, row, |c| {
            let before = c.notes.len();
            c.notes.push(note);
            before
        })
    }

    // --- Server results (no edit-counter bump) ---

    /// Overlay one server record if the cell has not been edited since `seq`.
    ///
    /// Returns `false` when the record is stale, out of range, or the cell
    /// holds a local value that never reached the server.
    pub fn apply_if_current(&mut self, record: &HexRecord, seq: u64) -> bool {
        match self.cell_mut(record.coord()) {
            Some(cell) if cell.edit_seq == seq && !cell.unsynced => {
                cell.overlay(record);
                true
            }
            _ => false,
        }
    }

    /// Current edit counter for `coord`, if in range.
    #[must_use]
    pub fn edit_seq(&self, coord: HexCoord) -> Option<u64> {
        self.cell(coord).map(|c| c.edit_seq)
    }

    pub fn mark_unsynced(&mut self, coord: HexCoord) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.unsynced = true;
        }
    }

    pub fn mark_synced(&mut self, coord: HexCoord) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.unsynced = false;
        }
    }

    /// Clear the unsynced flag only if the cell is unchanged since `seq`.
    ///
    /// Returns whether the flag was cleared.
    pub fn mark_synced_if_current(&mut self, coord: HexCoord, seq: u64) -> bool {
        match self.cell_mut(coord) {
            Some(cell) if cell.edit_seq == seq => {
                cell.unsynced = false;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_unsynced(&self, coord: HexCoord) -> bool {
        self.cell(coord).is_some_and(|c| c.unsynced)
    }

    /// Cells whose last persistence write failed.
    #[must_use]
    pub fn unsynced(&self) -> Vec<HexCoord> {
        self.cells.iter().filter(|c| c.unsynced).map(|c| c.coord).collect()
    }
}
