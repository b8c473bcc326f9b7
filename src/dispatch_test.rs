use canvas::grid::{MapConfig, Note};

use super::*;
use crate::api::memory::MemoryStore;

const MAP_ID: i64 = 5;

fn dm() -> Person {
    Person { id: 1, username: "gm".into(), is_dm: true }
}

fn player() -> Person {
    Person { id: 2, username: "valeros".into(), is_dm: false }
}

fn config() -> MapConfig {
    MapConfig { map_id: MAP_ID, rows: 3, cols: 3, ..MapConfig::default() }
}

fn rows() -> Vec<HexRecord> {
    let session = MapSession::new(config(), None);
    session.records()
}

/// A host with a saved 3x3 map open, every row stored server-side.
fn host_as(user: Person) -> Host<MemoryStore> {
    let store = MemoryStore::with_map(config(), &rows());
    store.state.lock().unwrap().people = vec![dm(), player()];
    let mut host = Host::new(store, RetryPolicy { attempts: 3, base_ms: 1 });
    host.user = Some(user.clone());
    host.session = Some(MapSession::load(config(), &rows(), Some(user)));
    host
}

fn write_calls(host: &Host<MemoryStore>) -> Vec<String> {
    host.store().calls().into_iter().filter(|c| !c.starts_with("get_")).collect()
}

async fn select(host: &mut Host<MemoryStore>, col: u32, row: u32) {
    host.handle(|s| s.select(col, row)).await;
}

// =============================================================================
// ROUTING
// =============================================================================

#[tokio::test]
async fn select_fetches_detail_and_notes() {
    let mut host = host_as(dm());
    {
        let mut state = host.store().state.lock().unwrap();
        let record = state.hexes.get_mut(&(MAP_ID, HexCoord::new(1, 1))).unwrap();
        record.name = "Candlemere".into();
        record.notes = vec![Note { author: "gm".into(), timestamp_ms: 10, text: "lake".into() }];
    }

    select(&mut host, 1, 1).await;

    assert_eq!(host.store().calls(), ["get_hex 1 1", "get_hex_notes 1 1"]);
    let detail = host.session().unwrap().detail().unwrap();
    assert_eq!(detail.name, "Candlemere");
    assert_eq!(detail.notes.len(), 1);
    assert!(host.renders() >= 1);
    assert!(host.take_notices().is_empty());
}

#[tokio::test]
async fn missing_hex_keeps_defaults_without_notice() {
    let mut host = host_as(dm());
    host.store().state.lock().unwrap().hexes.remove(&(MAP_ID, HexCoord::new(2, 2)));

    select(&mut host, 2, 2).await;

    let detail = host.session().unwrap().detail().unwrap();
    assert_eq!(detail.name, "unnamed");
    assert!(host.take_notices().is_empty());
}

#[tokio::test]
async fn dm_toggle_writes_narrow_update() {
    let mut host = host_as(dm());
    select(&mut host, 0, 1).await;

    host.handle(MapSession::toggle_explored).await;

    assert_eq!(write_calls(&host), ["update_hex_explored 0 1 true"]);
    assert!(host.store().hex(MAP_ID, HexCoord::new(0, 1)).unwrap().is_explored);
}

#[tokio::test]
async fn player_toggle_is_rejected_locally() {
    let mut host = host_as(player());
    select(&mut host, 0, 1).await;

    host.handle(MapSession::toggle_visibility).await;

    assert!(write_calls(&host).is_empty());
    assert_eq!(host.take_notices(), ["only the DM may change visibility"]);
}

#[tokio::test]
async fn rename_and_note_carry_payloads() {
    let mut host = host_as(player());
    select(&mut host, 2, 0).await;

    host.handle(|s| s.rename("  Fangberry Thicket ")).await;
    host.handle(|s| s.add_note("owlbear tracks", 1_000)).await;

    assert_eq!(write_calls(&host), ["update_hex_name 2 0 Fangberry Thicket", "add_note_to_hex 2 0 2"]);
    let stored = host.store().hex(MAP_ID, HexCoord::new(2, 0)).unwrap();
    assert_eq!(stored.notes[0].text, "owlbear tracks");
    assert_eq!(stored.notes[0].author, "valeros");
}

#[tokio::test]
async fn restore_surrounding_persists_each_revealed_neighbour() {
    let mut host = host_as(dm());
    for (col, row) in [(0, 1), (2, 1)] {
        host.session_mut().unwrap().grid.set_visible(col, row, false).unwrap();
    }
    select(&mut host, 1, 1).await;

    host.handle(MapSession::restore_surrounding).await;

    let mut calls = write_calls(&host);
    calls.sort();
    assert_eq!(calls, ["update_hex_visibility 0 1 true", "update_hex_visibility 2 1 true"]);
}

#[tokio::test]
async fn no_open_map_ignores_input() {
    let mut host = Host::new(MemoryStore::default(), RetryPolicy { attempts: 1, base_ms: 1 });
    host.handle(|s| s.select(0, 0)).await;
    assert!(host.store().calls().is_empty());
    assert_eq!(host.renders(), 0);
}

#[tokio::test]
async fn unsaved_map_skips_persistence() {
    let mut host = host_as(dm());
    host.session_mut().unwrap().set_map_id(canvas::consts::UNSAVED_MAP_ID);

    select(&mut host, 1, 1).await;
    host.handle(MapSession::toggle_controlled).await;

    assert!(host.store().calls().is_empty());
    assert!(host.session().unwrap().grid.get(1, 1).unwrap().is_controlled);
}

// =============================================================================
// RETRIES
// =============================================================================

#[tokio::test]
async fn transient_failures_are_retried() {
    let mut host = host_as(dm());
    select(&mut host, 1, 2).await;
    host.store().fail_next([StoreError::Network("reset".into()), StoreError::from_status(503, String::new())]);

    host.handle(MapSession::toggle_controlled).await;

    assert_eq!(write_calls(&host).len(), 3);
    assert!(host.take_notices().is_empty());
    assert!(host.session().unwrap().grid.unsynced().is_empty());
    assert!(host.store().hex(MAP_ID, HexCoord::new(1, 2)).unwrap().is_controlled);
}

#[tokio::test]
async fn exhausted_retries_mark_cell_unsynced_and_keep_value() {
    let mut host = host_as(dm());
    select(&mut host, 1, 2).await;
    host.store().fail_next((0..3).map(|_| StoreError::Network("down".into())));

    host.handle(MapSession::toggle_explored).await;

    assert_eq!(write_calls(&host).len(), 3);
    let notices = host.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].starts_with("Could not save hex (1, 2)"));
    let session = host.session().unwrap();
    assert!(session.grid.get(1, 2).unwrap().is_explored);
    assert_eq!(session.grid.unsynced(), [HexCoord::new(1, 2)]);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let mut host = host_as(dm());
    select(&mut host, 0, 0).await;
    host.store().fail_next([StoreError::from_status(400, "bad".into())]);

    host.handle(MapSession::toggle_explored).await;

    assert_eq!(write_calls(&host).len(), 1);
    assert_eq!(host.session().unwrap().grid.unsynced(), [HexCoord::new(0, 0)]);
}

#[tokio::test]
async fn auth_failure_signs_out_and_drops_map() {
    let mut host = host_as(dm());
    select(&mut host, 0, 0).await;
    host.store().fail_next([StoreError::Auth { status: 401 }]);

    host.handle(MapSession::toggle_explored).await;

    assert!(host.session().is_none());
    assert!(host.user().is_none());
    assert_eq!(host.take_notices(), [SESSION_EXPIRED_NOTICE]);
}

#[tokio::test]
async fn detail_fetch_failure_becomes_notice() {
    let mut host = host_as(dm());
    host.store().fail_next([StoreError::from_status(500, "boom".into())]);

    select(&mut host, 0, 0).await;

    assert_eq!(host.take_notices(), ["Could not load hex details: server error 500: boom"]);
    assert!(host.session().is_some());
}

#[tokio::test]
async fn reselect_after_failed_write_keeps_local_value() {
    let mut host = host_as(dm());
    select(&mut host, 1, 1).await;
    host.store().fail_matching("update_hex_explored", StoreError::from_status(400, String::new()));
    host.handle(MapSession::toggle_explored).await;
    assert!(host.session().unwrap().grid.get(1, 1).unwrap().is_explored);

    select(&mut host, 1, 1).await;

    let session = host.session().unwrap();
    assert!(session.grid.get(1, 1).unwrap().is_explored);
    let pending = session.unsynced_records();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_explored);

    assert_eq!(host.reconcile().await, 1);
    assert!(host.store().hex(MAP_ID, HexCoord::new(1, 1)).unwrap().is_explored);
}

#[tokio::test]
async fn edit_after_failed_write_sends_full_update() {
    let mut host = host_as(dm());
    select(&mut host, 0, 2).await;
    host.store().fail_matching("update_hex_controlled", StoreError::from_status(400, String::new()));
    host.handle(MapSession::toggle_controlled).await;

    host.handle(|s| s.rename("Sootscale Caverns")).await;

    assert_eq!(write_calls(&host), ["update_hex_controlled 0 2 true", "update_hex 0 2"]);
    let stored = host.store().hex(MAP_ID, HexCoord::new(0, 2)).unwrap();
    assert!(stored.is_controlled);
    assert_eq!(stored.name, "Sootscale Caverns");
    assert!(host.session().unwrap().grid.unsynced().is_empty());
}

#[tokio::test]
async fn full_update_after_newer_edit_stays_unsynced() {
    let mut host = host_as(dm());
    let coord = HexCoord::new(2, 2);
    let session = host.session_mut().unwrap();
    session.grid.set_explored(2, 2, true).unwrap();
    session.grid.mark_unsynced(coord);
    let stale = session.grid.edit_seq(coord).unwrap();
    session.grid.set_name(2, 2, "Tuskwater".into()).unwrap();

    let change = HexChange::Name("Tuskwater".into());
    host.run(vec![Action::PersistHex { coord, seq: stale, change }]).await;

    assert_eq!(write_calls(&host), ["update_hex 2 2"]);
    assert_eq!(host.session().unwrap().grid.unsynced(), [coord]);
}

// =============================================================================
// RECONCILIATION
// =============================================================================

#[tokio::test]
async fn reconcile_pushes_unsynced_cells_with_local_values() {
    let mut host = host_as(dm());
    select(&mut host, 2, 1).await;
    host.store().fail_next([StoreError::from_status(400, String::new())]);
    host.handle(MapSession::toggle_controlled).await;
    assert!(!host.store().hex(MAP_ID, HexCoord::new(2, 1)).unwrap().is_controlled);

    let synced = host.reconcile().await;

    assert_eq!(synced, 1);
    assert!(host.store().hex(MAP_ID, HexCoord::new(2, 1)).unwrap().is_controlled);
    assert!(host.session().unwrap().grid.unsynced().is_empty());
    assert_eq!(write_calls(&host).last().map(String::as_str), Some("update_hex 2 1"));
}

#[tokio::test]
async fn reconcile_creates_rows_the_server_lacks() {
    let mut host = host_as(dm());
    let coord = HexCoord::new(0, 2);
    host.store().state.lock().unwrap().hexes.remove(&(MAP_ID, coord));
    host.session_mut().unwrap().grid.set_explored(0, 2, true).unwrap();
    host.session_mut().unwrap().grid.mark_unsynced(coord);

    assert_eq!(host.reconcile().await, 1);

    assert_eq!(write_calls(&host), ["update_hex 0 2", "create_hex 0 2"]);
    assert!(host.store().hex(MAP_ID, coord).unwrap().is_explored);
    assert!(host.take_notices().is_empty());
}

#[tokio::test]
async fn reconcile_failure_leaves_cell_unsynced() {
    let mut host = host_as(dm());
    host.session_mut().unwrap().grid.mark_unsynced(HexCoord::new(0, 2));
    host.store().fail_next([StoreError::Network("down".into())]);

    assert_eq!(host.reconcile().await, 0);
    assert_eq!(host.session().unwrap().grid.unsynced(), [HexCoord::new(0, 2)]);
    assert_eq!(host.take_notices().len(), 1);
}

// =============================================================================
// SIGN IN
// =============================================================================

#[tokio::test]
async fn sign_in_updates_open_session() {
    let mut host = host_as(player());
    let person = host.sign_in("gm").await.unwrap();
    assert!(person.is_dm);
    assert_eq!(host.session().unwrap().user.as_ref(), Some(&dm()));
}

#[tokio::test]
async fn sign_in_unknown_user_is_not_found() {
    let mut host = host_as(player());
    let err = host.sign_in("nobody").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
    assert_eq!(host.user(), Some(&player()));
}
