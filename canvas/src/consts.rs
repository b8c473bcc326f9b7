//! Shared numeric constants for the canvas crate.

// ── Hex layout ──────────────────────────────────────────────────

/// Nominal hex size in map-space pixels (corner-to-corner height).
pub const HEX_SIZE: f64 = 90.0;

/// Vertical distance between row centers as a fraction of `HEX_SIZE`.
pub const ROW_SPACING: f64 = 0.75;

// ── Zoom ────────────────────────────────────────────────────────

/// Fixed scale increment applied per wheel tick.
pub const ZOOM_STEP: f64 = 0.2;

/// Smallest permitted viewport scale.
pub const MIN_SCALE: f64 = 0.6;

/// Largest permitted viewport scale.
pub const MAX_SCALE: f64 = 2.4;

// ── Panning ─────────────────────────────────────────────────────

/// Screen-space movement (per axis) that turns an armed pointer into a drag.
pub const DRAG_THRESHOLD_PX: f64 = 3.0;

/// Upper bound on the overscroll margin, in screen pixels.
pub const BOUNDARY_MARGIN_MAX_PX: f64 = 100.0;

/// Overscroll margin as a fraction of the container dimension.
pub const BOUNDARY_MARGIN_RATIO: f64 = 0.05;

// ── Default map ─────────────────────────────────────────────────

/// Sentinel map id for a map that has never been saved.
pub const UNSAVED_MAP_ID: i64 = -1;

pub const DEFAULT_MAP_NAME: &str = "my map";
pub const DEFAULT_ROWS: u32 = 13;
pub const DEFAULT_COLS: u32 = 29;
pub const DEFAULT_OFFSET_X: f64 = -72.0;
pub const DEFAULT_OFFSET_Y: f64 = -60.0;
pub const DEFAULT_IMAGE_SCALE_HORIZONTAL: f64 = 0.264;
pub const DEFAULT_IMAGE_SCALE_VERTICAL: f64 = 0.265;

// ── Styling ─────────────────────────────────────────────────────

pub const HEX_STROKE: &str = "white";
pub const HEX_STROKE_WIDTH: f64 = 2.0;
pub const HEX_FILL: &str = "rgba(0,0,0,0)";
pub const CONTROLLED_FILL: &str = "rgba(46, 139, 87, 0.25)";
pub const HIGHLIGHT_STROKE: &str = "yellow";
pub const HIGHLIGHT_STROKE_WIDTH: f64 = 3.0;
pub const EXPLORED_OPACITY: f64 = 1.0;
pub const UNEXPLORED_OPACITY: f64 = 0.7;
pub const LABEL_FONT: &str = "14px sans-serif";
pub const LABEL_COLOR: &str = "white";
