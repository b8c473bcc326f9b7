#![allow(clippy::float_cmp)]

use super::*;
use crate::consts::HEX_SIZE;
use crate::geometry::hex_center;

// =============================================================
// Helpers
// =============================================================

fn dm() -> Person {
    Person { id: 1, username: "gm".to_owned(), is_dm: true }
}

fn player() -> Person {
    Person { id: 2, username: "kyra".to_owned(), is_dm: false }
}

/// 30x40 map (larger than the container) in an 800x600 viewport.
fn session_as(user: Person) -> MapSession {
    let config = MapConfig { rows: 30, cols: 40, ..MapConfig::default() };
    let mut s = MapSession::new(config, Some(user));
    s.set_container_size(800.0, 600.0);
    s
}

fn session() -> MapSession {
    session_as(dm())
}

fn screen_of(s: &MapSession, col: u32, row: u32) -> Point {
    s.viewport.map_to_screen(hex_center(col, row, HEX_SIZE))
}

fn offset(p: Point, dx: f64, dy: f64) -> Point {
    Point::new(p.x + dx, p.y + dy)
}

fn click(s: &mut MapSession, at: Point) -> Vec<Action> {
    let mut actions = s.on_pointer_down(at, Button::Primary);
    actions.extend(s.on_pointer_up(at, Button::Primary));
    actions
}

fn selections(actions: &[Action]) -> usize {
    actions.iter().filter(|a| matches!(a, Action::HexSelected(_))).count()
}

fn notices(actions: &[Action]) -> usize {
    actions.iter().filter(|a| matches!(a, Action::Notice(_))).count()
}

// =============================================================
// construction
// =============================================================

#[test]
fn new_session_has_blank_grid_and_extent() {
    let s = session();
    assert_eq!(s.grid.len(), 1200);
    assert_eq!(s.viewport.map_size(), s.config.extent(None));
    assert!(!s.is_busy());
    assert_eq!(s.selection(), None);
}

#[test]
fn load_hydrates_records() {
    let config = MapConfig { rows: 2, cols: 2, ..MapConfig::default() };
    let mut record = HexRecord::from_cell(GridModel::build(2, 2).get(1, 0).unwrap());
    record.is_controlled = true;
    let s = MapSession::load(config, &[record], None);
    assert!(s.grid.get(1, 0).unwrap().is_controlled);
}

#[test]
fn image_size_widens_extent() {
    let mut s = session();
    s.set_image_size(20_000.0, 12_000.0);
    assert_eq!(s.viewport.map_size(), (20_000.0 * 0.264, 12_000.0 * 0.265));
    assert_eq!(s.image_size(), Some((20_000.0, 12_000.0)));
}

#[test]
fn set_map_id_marks_saved() {
    let mut s = session();
    assert!(s.config.is_unsaved());
    s.set_map_id(17);
    assert!(!s.config.is_unsaved());
}

// =============================================================
// gesture disambiguation
// =============================================================

#[test]
fn click_on_hex_selects_once_without_panning() {
    let mut s = session();
    let before = s.viewport.translate();
    let at = screen_of(&s, 3, 2);
    let actions = click(&mut s, at);
    assert_eq!(selections(&actions), 1);
    assert!(actions.contains(&Action::HexSelected(HexCoord::new(3, 2))));
    assert!(actions.contains(&Action::FetchHexDetail { coord: HexCoord::new(3, 2), seq: 0 }));
    assert_eq!(s.viewport.translate(), before);
    assert_eq!(s.selection(), Some(HexCoord::new(3, 2)));
}

#[test]
fn small_jitter_still_clicks() {
    let mut s = session();
    let at = screen_of(&s, 3, 2);
    s.on_pointer_down(at, Button::Primary);
    assert!(s.on_pointer_move(offset(at, 2.0, -2.0)).is_empty());
    let actions = s.on_pointer_up(offset(at, 2.0, -2.0), Button::Primary);
    assert_eq!(selections(&actions), 1);
}

#[test]
fn drag_from_hex_pans_and_never_clicks() {
    let mut s = session();
    s.viewport.pan_by(-400.0, -300.0);
    let before = s.viewport.translate();
    let at = screen_of(&s, 8, 8);
    let mut actions = s.on_pointer_down(at, Button::Primary);
    actions.extend(s.on_pointer_move(offset(at, 10.0, 0.0)));
    actions.extend(s.on_pointer_move(offset(at, 25.0, 5.0)));
    actions.extend(s.on_pointer_up(offset(at, 25.0, 5.0), Button::Primary));

    assert_eq!(selections(&actions), 0);
    assert_eq!(s.selection(), None);
    let after = s.viewport.translate();
    assert_eq!((after.0 - before.0, after.1 - before.1), (25.0, 5.0));
    assert!(actions.contains(&Action::SetCursor("grabbing".into())));
    assert_eq!(actions.last(), Some(&Action::SetCursor("grab".into())));
}

#[test]
fn drag_back_onto_start_hex_does_not_click() {
    let mut s = session();
    let at = screen_of(&s, 5, 5);
    s.on_pointer_down(at, Button::Primary);
    s.on_pointer_move(offset(at, 40.0, 0.0));
    s.on_pointer_move(at);
    let actions = s.on_pointer_up(at, Button::Primary);
    assert_eq!(selections(&actions), 0);
}

#[test]
fn release_over_neighbor_does_not_click() {
    let mut s = session();
    let down = screen_of(&s, 5, 5);
    let up = screen_of(&s, 6, 5);
    s.on_pointer_down(down, Button::Primary);
    let actions = s.on_pointer_up(up, Button::Primary);
    assert_eq!(selections(&actions), 0);
}

#[test]
fn background_press_pans_immediately() {
    let mut s = session();
    s.viewport.pan_by(-400.0, -300.0);
    let before = s.viewport.translate();
    // Far outside the grid in map-space.
    let at = s.viewport.map_to_screen(Point::new(-10.0, -10.0));
    s.on_pointer_down(at, Button::Primary);
    let actions = s.on_pointer_move(offset(at, 1.0, 1.0));
    assert!(actions.contains(&Action::RenderNeeded));
    let after = s.viewport.translate();
    assert_eq!((after.0 - before.0, after.1 - before.1), (1.0, 1.0));
}

#[test]
fn hidden_hex_press_is_background() {
    let mut s = session();
    s.grid.set_visible(3, 2, false).unwrap();
    let at = screen_of(&s, 3, 2);
    let actions = click(&mut s, at);
    assert_eq!(selections(&actions), 0);
}

#[test]
fn secondary_button_is_ignored() {
    let mut s = session();
    let at = screen_of(&s, 1, 1);
    assert!(s.on_pointer_down(at, Button::Secondary).is_empty());
    assert!(s.on_pointer_up(at, Button::Secondary).is_empty());
    assert_eq!(s.selection(), None);
}

#[test]
fn leave_during_drag_resets_cursor() {
    let mut s = session();
    let at = screen_of(&s, 1, 1);
    s.on_pointer_down(at, Button::Primary);
    s.on_pointer_move(offset(at, 30.0, 30.0));
    assert_eq!(s.on_pointer_leave(), vec![Action::SetCursor("grab".into())]);
    assert!(s.on_pointer_leave().is_empty());
}

// =============================================================
// wheel
// =============================================================

#[test]
fn wheel_up_zooms_in_at_cursor() {
    let mut s = session();
    s.viewport.pan_by(-400.0, -300.0);
    let at = Point::new(300.0, 200.0);
    let fixed = s.viewport.screen_to_map(at);
    let actions = s.on_wheel(at, WheelDelta { dx: 0.0, dy: -120.0 });
    assert_eq!(actions, vec![Action::RenderNeeded]);
    assert!((s.viewport.scale() - 1.2).abs() < 1e-9);
    let now = s.viewport.screen_to_map(at);
    assert!((now.x - fixed.x).abs() < 1e-6);
    assert!((now.y - fixed.y).abs() < 1e-6);
}

#[test]
fn wheel_ignores_gesture_phase() {
    let mut s = session();
    let at = screen_of(&s, 2, 2);
    s.on_pointer_down(at, Button::Primary);
    s.on_wheel(at, WheelDelta { dx: 0.0, dy: 120.0 });
    assert!((s.viewport.scale() - 0.8).abs() < 1e-9);
}

// =============================================================
// presenter routing
// =============================================================

#[test]
fn player_toggle_becomes_notice() {
    let mut s = session_as(player());
    s.select(1, 1);
    let actions = s.toggle_explored();
    assert_eq!(notices(&actions), 1);
    assert!(!s.grid.get(1, 1).unwrap().is_explored);
}

#[test]
fn busy_session_rejects_edits() {
    let mut s = session();
    s.select(1, 1);
    s.set_busy(true);
    assert_eq!(notices(&s.toggle_controlled()), 1);
    assert_eq!(notices(&s.rename("x")), 1);
    assert_eq!(notices(&s.add_note("x", 1)), 1);
    s.set_busy(false);
    assert_eq!(notices(&s.toggle_controlled()), 0);
}

#[test]
fn select_out_of_range_is_notice() {
    let mut s = session();
    assert_eq!(notices(&s.select(400, 0)), 1);
}

#[test]
fn session_edits_flow_through_presenter() {
    let mut s = session();
    s.select(2, 3);
    s.toggle_visibility();
    assert!(!s.grid.get(2, 3).unwrap().is_visible);
    assert_eq!(s.selection(), None);

    s.select(2, 2);
    s.restore_surrounding();
    assert!(s.grid.get(2, 3).unwrap().is_visible);

    s.rename("Thorn River");
    s.add_note("camp here", 5);
    let detail = s.detail().unwrap();
    assert_eq!(detail.name, "Thorn River");
    assert_eq!(detail.notes.len(), 1);
    assert!(detail.dm_controls.is_some());
    assert_eq!(s.close_detail(), vec![Action::SelectionCleared, Action::RenderNeeded]);
}

// =============================================================
// persistence results
// =============================================================

#[test]
fn current_detail_is_applied() {
    let mut s = session();
    let coord = HexCoord::new(4, 4);
    let actions = s.select(4, 4);
    let Some(Action::FetchHexDetail { seq, .. }) = actions.iter().find(|a| matches!(a, Action::FetchHexDetail { .. }))
    else {
        panic!("no fetch requested");
    };
    let mut record = HexRecord::from_cell(s.grid.cell(coord).unwrap());
    record.name = "Lonely Barrow".to_owned();
    assert_eq!(s.apply_hex_detail(coord, *seq, &record), vec![Action::RenderNeeded]);
    assert_eq!(s.grid.cell(coord).unwrap().name, "Lonely Barrow");
}

#[test]
fn stale_detail_does_not_overwrite_local_edit() {
    let mut s = session();
    let coord = HexCoord::new(4, 4);
    s.select(4, 4);
    let stale = HexRecord::from_cell(s.grid.cell(coord).unwrap());
    s.toggle_explored();
    assert!(s.apply_hex_detail(coord, 0, &stale).is_empty());
    assert!(s.grid.cell(coord).unwrap().is_explored);
}

#[test]
fn mismatched_record_is_ignored() {
    let mut s = session();
    let record = HexRecord::from_cell(s.grid.cell(HexCoord::new(1, 1)).unwrap());
    assert!(s.apply_hex_detail(HexCoord::new(2, 2), 0, &record).is_empty());
}

#[test]
fn missing_detail_keeps_default() {
    let mut s = session();
    s.select(0, 0);
    assert_eq!(s.apply_hex_detail_missing(HexCoord::new(0, 0)), vec![Action::RenderNeeded]);
    assert!(s.apply_hex_detail_missing(HexCoord::new(1, 0)).is_empty());
    assert_eq!(s.detail().unwrap().name, "unnamed");
}

#[test]
fn failed_write_keeps_value_and_marks_unsynced() {
    let mut s = session();
    let coord = HexCoord::new(6, 1);
    s.select(6, 1);
    s.toggle_controlled();
    let actions = s.apply_persist_failed(coord, "connection refused");
    assert_eq!(notices(&actions), 1);
    assert!(s.grid.cell(coord).unwrap().is_controlled);
    let pending = s.unsynced_records();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_controlled);

    s.apply_full_sync(coord);
    assert!(s.unsynced_records().is_empty());
}

#[test]
fn records_cover_every_cell() {
    let s = session();
    let records = s.records();
    assert_eq!(records.len(), 1200);
    assert_eq!(records[41].coord(), HexCoord::new(1, 1));
}

#[test]
fn detail_for_unsynced_cell_is_not_overwritten() {
    let mut s = session();
    let coord = HexCoord::new(4, 4);
    s.select(4, 4);
    s.toggle_explored();
    s.apply_persist_failed(coord, "bad request");
    let seq = s.grid.edit_seq(coord).unwrap();

    let blank = GridModel::build(5, 5);
    let server = HexRecord::from_cell(blank.get(4, 4).unwrap());
    assert!(s.apply_hex_detail(coord, seq, &server).is_empty());
    assert!(s.grid.cell(coord).unwrap().is_explored);
    assert!(s.unsynced_record(coord).unwrap().is_explored);
}

#[test]
fn full_sync_at_stale_seq_keeps_flag() {
    let mut s = session();
    let coord = HexCoord::new(2, 3);
    s.select(2, 3);
    s.toggle_controlled();
    s.apply_persist_failed(coord, "timeout");
    let seq = s.grid.edit_seq(coord).unwrap();
    s.rename("Nomen Heights");

    assert!(!s.apply_full_sync_at(coord, seq));
    assert!(s.unsynced_record(coord).is_some());
    assert!(s.apply_full_sync_at(coord, seq + 1));
    assert_eq!(s.unsynced_record(coord), None);
}

#[test]
fn actions_encode_as_tagged_json() {
    let coord = HexCoord::new(3, 1);
    let actions = [
        Action::RenderNeeded,
        Action::FetchHexDetail { coord, seq: 2 },
        Action::PersistHex { coord, seq: 3, change: HexChange::Explored(true) },
        Action::Notice("saved".into()),
    ];

    let value: serde_json::Value = serde_json::from_str(&actions_json(&actions).unwrap()).unwrap();

    assert_eq!(
        value,
        serde_json::json!([
            { "type": "renderNeeded" },
            { "type": "fetchHexDetail", "data": { "coord": { "col": 3, "row": 1 }, "seq": 2 } },
            {
                "type": "persistHex",
                "data": { "coord": { "col": 3, "row": 1 }, "seq": 3, "change": { "field": "explored", "value": true } }
            },
            { "type": "notice", "data": "saved" },
        ])
    );
}
