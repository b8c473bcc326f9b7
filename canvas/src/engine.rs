use serde::Serialize;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::geometry::{HexCoord, Point};
use crate::grid::{GridModel, HexRecord, MapConfig, Note, Person, ValidationError};
use crate::hit;
use crate::input::{Button, GestureOutcome, GestureRouter, PointerTarget, WheelDelta};
use crate::presenter::{Access, HexChange, HexDetail, Presenter};
use crate::render;
use crate::viewport::{Viewport, ZoomDirection};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Action {
    RenderNeeded,
    SetCursor(String),
    HexSelected(HexCoord),
    SelectionCleared,
    /// Load server-side detail and notes; pass `seq` back to [`MapSession::apply_hex_detail`].
    FetchHexDetail { coord: HexCoord, seq: u64 },
    PersistHex { coord: HexCoord, seq: u64, change: HexChange },
    PersistNote { coord: HexCoord, note: Note },
    /// Non-blocking message for the user.
    Notice(String),
}

/// One open map: model, viewport, gesture and selection state.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct MapSession {
    pub config: MapConfig,
    pub grid: GridModel,
    pub viewport: Viewport,
    pub gesture: GestureRouter,
    pub presenter: Presenter,
    pub user: Option<Person>,
    busy: bool,
    image_size: Option<(f64, f64)>,
}

impl MapSession {
    /// A blank grid for `config`.
    #[must_use]
    pub fn new(config: MapConfig, user: Option<Person>) -> Self {
        let grid = GridModel::build(config.rows, config.cols);
        let (w, h) = config.extent(None);
        Self {
            config,
            grid,
            viewport: Viewport::new(w, h),
            gesture: GestureRouter::new(),
            presenter: Presenter::new(),
            user,
            busy: false,
            image_size: None,
        }
    }

    /// A grid for `config` hydrated from persisted rows.
    #[must_use]
    pub fn load(config: MapConfig, records: &[HexRecord], user: Option<Person>) -> Self {
        let mut session = Self::new(config, user);
        session.grid.hydrate(records);
        session
    }

    // --- Data inputs ---

    /// Natural size of the background image, once known.
    pub fn set_image_size(&mut self, width: f64, height: f64) {
        self.image_size = Some((width, height));
        let (w, h) = self.config.extent(self.image_size);
        self.viewport.set_map_size(w, h);
        self.viewport.center();
    }

    #[must_use]
    pub fn image_size(&self) -> Option<(f64, f64)> {
        self.image_size
    }

    pub fn set_container_size(&mut self, width: f64, height: f64) -> Vec<Action> {
        self.viewport.set_container_size(width, height);
        vec![Action::RenderNeeded]
    }

    /// Record the id assigned by the server on first save.
    pub fn set_map_id(&mut self, map_id: i64) {
        self.config.map_id = map_id;
    }

    /// Advisory lock held while a full-map save runs.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let target = self.target_at(screen);
        self.gesture.pointer_down(screen, target);
        Vec::new()
    }

    pub fn on_pointer_move(&mut self, screen: Point) -> Vec<Action> {
        let was_dragging = self.gesture.is_dragging();
        let GestureOutcome::Pan { dx, dy } = self.gesture.pointer_move(screen) else {
            return Vec::new();
        };
        self.viewport.pan_by(dx, dy);
        let mut actions = Vec::new();
        if !was_dragging {
            actions.push(Action::SetCursor("grabbing".into()));
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn on_pointer_up(&mut self, screen: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let was_dragging = self.gesture.is_dragging();
        let target = self.target_at(screen);
        let mut actions = Vec::new();
        if was_dragging {
            actions.push(Action::SetCursor("grab".into()));
        }
        if let GestureOutcome::HexClicked(coord) = self.gesture.pointer_up(target) {
            actions.extend(self.select(coord.col, coord.row));
        }
        actions
    }

    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        let was_dragging = self.gesture.is_dragging();
        self.gesture.pointer_leave();
        if was_dragging { vec![Action::SetCursor("grab".into())] } else { Vec::new() }
    }

    /// One wheel tick zooms one step, regardless of gesture phase.
    pub fn on_wheel(&mut self, screen: Point, delta: WheelDelta) -> Vec<Action> {
        self.viewport.zoom_at(screen.x, screen.y, ZoomDirection::from_wheel(delta.dy));
        vec![Action::RenderNeeded]
    }

    fn target_at(&self, screen: Point) -> PointerTarget {
        let map_pt = self.viewport.screen_to_map(screen);
        hit::hex_at(map_pt, &self.config, &self.grid).into()
    }

    // --- Detail panel ---

    pub fn select(&mut self, col: u32, row: u32) -> Vec<Action> {
        let result = self.presenter.select(&self.grid, col, row);
        notice_on_err(result)
    }

    pub fn close_detail(&mut self) -> Vec<Action> {
        self.presenter.close()
    }

    pub fn toggle_explored(&mut self) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.toggle_explored(&mut self.grid, access))
    }

    pub fn toggle_controlled(&mut self) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.toggle_controlled(&mut self.grid, access))
    }

    pub fn toggle_visibility(&mut self) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.toggle_visibility(&mut self.grid, access))
    }

    pub fn restore_surrounding(&mut self) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.restore_surrounding(&mut self.grid, access))
    }

    pub fn add_note(&mut self, text: &str, now_ms: i64) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.add_note(&mut self.grid, access, text, now_ms))
    }

    pub fn rename(&mut self, name: &str) -> Vec<Action> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        notice_on_err(self.presenter.rename(&mut self.grid, access, name))
    }

    /// View model for the selected hex.
    #[must_use]
    pub fn detail(&self) -> Option<HexDetail> {
        let access = Access { user: self.user.as_ref(), busy: self.busy };
        self.presenter.detail(&self.grid, access)
    }

    // --- Persistence results ---

    /// Server detail for `coord`, fetched when the cell's edit counter was `seq`.
    ///
    /// Ignored when the cell has been edited since.
    pub fn apply_hex_detail(&mut self, coord: HexCoord, seq: u64, record: &HexRecord) -> Vec<Action> {
        if record.coord() != coord || !self.grid.apply_if_current(record, seq) {
            return Vec::new();
        }
        self.render_if_selected(coord)
    }

    /// The server has no row for `coord`; the local default stands.
    pub fn apply_hex_detail_missing(&mut self, coord: HexCoord) -> Vec<Action> {
        self.render_if_selected(coord)
    }

    /// A write for `coord` failed after retries. The optimistic value is kept.
    pub fn apply_persist_failed(&mut self, coord: HexCoord, reason: &str) -> Vec<Action> {
        self.grid.mark_unsynced(coord);
        vec![Action::Notice(format!("Could not save hex ({}, {}): {reason}", coord.col, coord.row))]
    }

    /// A full write for `coord` landed; the cell matches the server again.
    pub fn apply_full_sync(&mut self, coord: HexCoord) {
        self.grid.mark_synced(coord);
    }

    /// A full write issued when the cell's edit counter was `seq` landed.
    ///
    /// The unsynced flag stays if the cell has been edited since.
    pub fn apply_full_sync_at(&mut self, coord: HexCoord, seq: u64) -> bool {
        self.grid.mark_synced_if_current(coord, seq)
    }

    // --- Queries ---

    /// Full records for every cell whose last write failed.
    #[must_use]
    pub fn unsynced_records(&self) -> Vec<HexRecord> {
        self.grid.unsynced().into_iter().filter_map(|c| self.grid.cell(c)).map(HexRecord::from_cell).collect()
    }

    /// Full record for `coord` if its last write failed.
    #[must_use]
    pub fn unsynced_record(&self, coord: HexCoord) -> Option<HexRecord> {
        self.grid.cell(coord).filter(|c| c.unsynced).map(HexRecord::from_cell)
    }

    /// Full records for every cell, row-major.
    #[must_use]
    pub fn records(&self) -> Vec<HexRecord> {
        self.grid.iter().map(HexRecord::from_cell).collect()
    }

    #[must_use]
    pub fn selection(&self) -> Option<HexCoord> {
        self.presenter.selected()
    }

    fn render_if_selected(&self, coord: HexCoord) -> Vec<Action> {
        if self.presenter.selected() == Some(coord) { vec![Action::RenderNeeded] } else { Vec::new() }
    }
}

fn notice_on_err(result: Result<Vec<Action>, ValidationError>) -> Vec<Action> {
    result.unwrap_or_else(|e| vec![Action::Notice(e.to_string())])
}

/// Encode `actions` as the JSON array handed to the browser host.
///
/// # Errors
///
/// Returns the serializer error.
pub fn actions_json(actions: &[Action]) -> Result<String, serde_json::Error> {
    serde_json::to_string(actions)
}

/// The full canvas engine. Wraps `MapSession` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    background: Option<HtmlImageElement>,
    dpr: f64,
    pub core: MapSession,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, core: MapSession) -> Self {
        Self { canvas, background: None, dpr: 1.0, core }
    }

    /// Update viewport dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        self.dpr = dpr;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.canvas.set_width((width_css * dpr).round() as u32);
            self.canvas.set_height((height_css * dpr).round() as u32);
        }
        self.core.set_container_size(width_css, height_css)
    }

    /// Use a loaded image as the map background; its natural size widens the map extent.
    pub fn set_background(&mut self, image: HtmlImageElement) -> Vec<Action> {
        self.core.set_image_size(f64::from(image.natural_width()), f64::from(image.natural_height()));
        self.background = Some(image);
        vec![Action::RenderNeeded]
    }

    /// Append a note stamped with the browser clock.
    pub fn add_note(&mut self, text: &str) -> Vec<Action> {
        #[allow(clippy::cast_possible_truncation)]
        let now_ms = js_sys::Date::now() as i64;
        self.core.add_note(text, now_ms)
    }

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the 2D context is unavailable or a `Canvas2D` call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        let ctx = self
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        render::draw(&ctx, &render::scene(&self.core), self.background.as_ref(), self.dpr)
    }
}

// =============================================================
// Browser mount
// =============================================================

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// JS-facing handle: forwards DOM input to the engine, redraws on demand,
/// and hands every resulting action to `on_actions` as a JSON array.
///
/// The page owns persistence. It performs the reads and writes the actions
/// ask for and reports back through the `apply_*` methods.
#[wasm_bindgen]
pub struct MapCanvas {
    engine: Engine,
    on_actions: js_sys::Function,
}

#[wasm_bindgen]
impl MapCanvas {
    /// Mount a map on `canvas`. `hexes_json` is the stored rows (may be `"[]"`),
    /// `user_json` the signed-in person, if any.
    ///
    /// # Errors
    ///
    /// Returns a JS error string for malformed JSON or an invalid map config.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        map_json: &str,
        hexes_json: &str,
        user_json: Option<String>,
        on_actions: js_sys::Function,
    ) -> Result<MapCanvas, JsValue> {
        let config: MapConfig = serde_json::from_str(map_json).map_err(js_error)?;
        config.validate().map_err(js_error)?;
        let records: Vec<HexRecord> = serde_json::from_str(hexes_json).map_err(js_error)?;
        let user = match user_json {
            Some(json) => Some(serde_json::from_str::<Person>(&json).map_err(js_error)?),
            None => None,
        };
        let core = MapSession::load(config, &records, user);
        Ok(Self { engine: Engine::new(canvas, core), on_actions })
    }

    // --- DOM input ---

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn resize(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Result<(), JsValue> {
        let actions = self.engine.set_viewport(width_css, height_css, dpr);
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn set_background(&mut self, image: HtmlImageElement) -> Result<(), JsValue> {
        let actions = self.engine.set_background(image);
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn pointer_down(&mut self, x: f64, y: f64, button: i16) -> Result<(), JsValue> {
        let actions = self.engine.core.on_pointer_down(Point::new(x, y), Button::from_dom(button));
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        let actions = self.engine.core.on_pointer_move(Point::new(x, y));
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn pointer_up(&mut self, x: f64, y: f64, button: i16) -> Result<(), JsValue> {
        let actions = self.engine.core.on_pointer_up(Point::new(x, y), Button::from_dom(button));
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when the callback fails.
    pub fn pointer_leave(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.on_pointer_leave();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn wheel(&mut self, x: f64, y: f64, dx: f64, dy: f64) -> Result<(), JsValue> {
        let actions = self.engine.core.on_wheel(Point::new(x, y), WheelDelta { dx, dy });
        self.dispatch(actions)
    }

    // --- Detail panel ---

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn select(&mut self, col: u32, row: u32) -> Result<(), JsValue> {
        let actions = self.engine.core.select(col, row);
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn close_detail(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.close_detail();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn toggle_explored(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.toggle_explored();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn toggle_controlled(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.toggle_controlled();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn toggle_visibility(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.toggle_visibility();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn restore_surrounding(&mut self) -> Result<(), JsValue> {
        let actions = self.engine.core.restore_surrounding();
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn add_note(&mut self, text: &str) -> Result<(), JsValue> {
        let actions = self.engine.add_note(text);
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn rename(&mut self, name: &str) -> Result<(), JsValue> {
        let actions = self.engine.core.rename(name);
        self.dispatch(actions)
    }

    /// The selected hex's panel as JSON, or `null`.
    ///
    /// # Errors
    ///
    /// Returns a JS error if the view model cannot be encoded.
    pub fn detail_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.core.detail()).map_err(js_error)
    }

    // --- Persistence results ---

    /// # Errors
    ///
    /// Returns a JS error for a malformed record, or when drawing or the callback fails.
    pub fn apply_hex_detail(&mut self, col: u32, row: u32, seq: u64, record_json: &str) -> Result<(), JsValue> {
        let record: HexRecord = serde_json::from_str(record_json).map_err(js_error)?;
        let actions = self.engine.core.apply_hex_detail(HexCoord::new(col, row), seq, &record);
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when drawing or the callback fails.
    pub fn apply_hex_detail_missing(&mut self, col: u32, row: u32) -> Result<(), JsValue> {
        let actions = self.engine.core.apply_hex_detail_missing(HexCoord::new(col, row));
        self.dispatch(actions)
    }

    /// # Errors
    ///
    /// Returns a JS error when the callback fails.
    pub fn apply_persist_failed(&mut self, col: u32, row: u32, reason: &str) -> Result<(), JsValue> {
        let actions = self.engine.core.apply_persist_failed(HexCoord::new(col, row), reason);
        self.dispatch(actions)
    }

    /// Returns whether the cell is back in sync.
    pub fn apply_full_sync_at(&mut self, col: u32, row: u32, seq: u64) -> bool {
        self.engine.core.apply_full_sync_at(HexCoord::new(col, row), seq)
    }

    /// Full JSON record for a cell whose last write failed, or `null`.
    ///
    /// # Errors
    ///
    /// Returns a JS error if the record cannot be encoded.
    pub fn unsynced_record_json(&self, col: u32, row: u32) -> Result<String, JsValue> {
        serde_json::to_string(&self.engine.core.unsynced_record(HexCoord::new(col, row))).map_err(js_error)
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.engine.core.set_busy(busy);
    }

    pub fn set_map_id(&mut self, map_id: i64) {
        self.engine.core.set_map_id(map_id);
    }

    /// # Errors
    ///
    /// Returns a JS error if the 2D context is unavailable or a draw call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        self.engine.render()
    }
}

impl MapCanvas {
    /// Redraw once if any action asks for it, then pass the batch to the page.
    fn dispatch(&self, actions: Vec<Action>) -> Result<(), JsValue> {
        if actions.is_empty() {
            return Ok(());
        }
        if actions.contains(&Action::RenderNeeded) {
            self.engine.render()?;
        }
        let payload = actions_json(&actions).map_err(js_error)?;
        self.on_actions.call1(&JsValue::NULL, &JsValue::from_str(&payload))?;
        Ok(())
    }
}
