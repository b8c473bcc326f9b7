//! In-memory [`MapStore`] used by host tests.
//!
//! Records every call by name, and can be told to fail the next N calls.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use canvas::geometry::HexCoord;
use canvas::grid::{HexRecord, MapConfig, Note, Person};

use super::{MapStore, StoreError};

#[derive(Default)]
pub(crate) struct State {
    pub maps: BTreeMap<i64, MapConfig>,
    pub hexes: BTreeMap<(i64, HexCoord), HexRecord>,
    pub links: BTreeMap<i64, String>,
    pub people: Vec<Person>,
    pub calls: Vec<String>,
    pub next_map_id: i64,
    /// Errors handed out, one per call, before any call succeeds.
    pub failures: VecDeque<StoreError>,
    /// Errors handed out once to the first call whose log line starts with the prefix.
    pub failing: Vec<(String, StoreError)>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_map(config: MapConfig, records: &[HexRecord]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            let map_id = config.map_id;
            state.next_map_id = map_id + 1;
            state.maps.insert(map_id, config);
            for record in records {
                state.hexes.insert((map_id, record.coord()), record.clone());
            }
        }
        store
    }

    pub fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.state.lock().unwrap().failures.extend(errors);
    }

    pub fn fail_matching(&self, prefix: &str, error: StoreError) {
        self.state.lock().unwrap().failing.push((prefix.to_owned(), error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn hex(&self, map_id: i64, coord: HexCoord) -> Option<HexRecord> {
        self.state.lock().unwrap().hexes.get(&(map_id, coord)).cloned()
    }

    /// Log the call, then hand out a queued failure if there is one.
    fn enter(&self, call: String) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(i) = state.failing.iter().position(|(prefix, _)| call.starts_with(prefix.as_str())) {
            state.calls.push(call);
            return Err(state.failing.remove(i).1);
        }
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn edit_hex(
        &self,
        call: String,
        map_id: i64,
        coord: HexCoord,
        f: impl FnOnce(&mut HexRecord),
    ) -> Result<(), StoreError> {
        let mut state = self.enter(call)?;
        let record = state.hexes.get_mut(&(map_id, coord)).ok_or(StoreError::NotFound)?;
        f(record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MapStore for MemoryStore {
    async fn create_map(&self, config: &MapConfig) -> Result<i64, StoreError> {
        config.validate()?;
        let mut state = self.enter("create_map".into())?;
        state.next_map_id = state.next_map_id.max(1);
        let map_id = state.next_map_id;
        state.next_map_id += 1;
        state.maps.insert(map_id, MapConfig { map_id, ..config.clone() });
        Ok(map_id)
    }

    async fn update_map(&self, map_id: i64, config: &MapConfig) -> Result<i64, StoreError> {
        config.validate()?;
        let mut state = self.enter(format!("update_map {map_id}"))?;
        let stored = state.maps.get_mut(&map_id).ok_or(StoreError::NotFound)?;
        *stored = MapConfig { map_id, ..config.clone() };
        Ok(map_id)
    }

    async fn get_map(&self, map_id: i64) -> Result<MapConfig, StoreError> {
        let state = self.enter(format!("get_map {map_id}"))?;
        state.maps.get(&map_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_map_share_link(&self, map_id: i64) -> Result<Option<String>, StoreError> {
        let state = self.enter(format!("get_map_share_link {map_id}"))?;
        Ok(state.links.get(&map_id).cloned())
    }

    async fn create_map_share_link(&self, map_id: i64) -> Result<String, StoreError> {
        let mut state = self.enter(format!("create_map_share_link {map_id}"))?;
        let code = format!("link-{map_id}");
        state.links.insert(map_id, code.clone());
        Ok(code)
    }

    async fn get_hexes_by_map(&self, map_id: i64) -> Result<Vec<HexRecord>, StoreError> {
        let state = self.enter(format!("get_hexes_by_map {map_id}"))?;
        Ok(state.hexes.iter().filter(|((m, _), _)| *m == map_id).map(|(_, r)| r.clone()).collect())
    }

    async fn get_hex(&self, map_id: i64, coord: HexCoord) -> Result<HexRecord, StoreError> {
        let state = self.enter(format!("get_hex {} {}", coord.col, coord.row))?;
        state.hexes.get(&(map_id, coord)).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError> {
        let mut state = self.enter(format!("create_hex {} {}", record.col, record.row))?;
        state.hexes.insert((map_id, record.coord()), record.clone());
        Ok(())
    }

    async fn update_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError> {
        let mut state = self.enter(format!("update_hex {} {}", record.col, record.row))?;
        let stored = state.hexes.get_mut(&(map_id, record.coord())).ok_or(StoreError::NotFound)?;
        *stored = record.clone();
        Ok(())
    }

    async fn update_hex_visibility(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let call = format!("update_hex_visibility {} {} {value}", coord.col, coord.row);
        self.edit_hex(call, map_id, coord, |r| r.is_visible = value)
    }

    async fn update_hex_explored(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let call = format!("update_hex_explored {} {} {value}", coord.col, coord.row);
        self.edit_hex(call, map_id, coord, |r| r.is_explored = value)
    }

    async fn update_hex_controlled(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let call = format!("update_hex_controlled {} {} {value}", coord.col, coord.row);
        self.edit_hex(call, map_id, coord, |r| r.is_controlled = value)
    }

    async fn update_hex_name(&self, map_id: i64, coord: HexCoord, name: &str) -> Result<(), StoreError> {
        let call = format!("update_hex_name {} {} {name}", coord.col, coord.row);
        self.edit_hex(call, map_id, coord, |r| r.name = name.to_owned())
    }

    async fn get_hex_notes(&self, map_id: i64, coord: HexCoord) -> Result<Vec<Note>, StoreError> {
        let state = self.enter(format!("get_hex_notes {} {}", coord.col, coord.row))?;
        Ok(state.hexes.get(&(map_id, coord)).map(|r| r.notes.clone()).unwrap_or_default())
    }

    async fn add_note_to_hex(
        &self,
        map_id: i64,
        coord: HexCoord,
        author_id: i64,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.enter(format!("add_note_to_hex {} {} {author_id}", coord.col, coord.row))?;
        let author = state.people.iter().find(|p| p.id == author_id).map(|p| p.username.clone()).unwrap_or_default();
        let record = state.hexes.get_mut(&(map_id, coord)).ok_or(StoreError::NotFound)?;
        record.notes.push(Note { author, timestamp_ms: 0, text: text.to_owned() });
        Ok(())
    }

    async fn get_person(&self, who: &str) -> Result<Person, StoreError> {
        let state = self.enter(format!("get_person {who}"))?;
        state
            .people
            .iter()
            .find(|p| p.username == who || p.id.to_string() == who)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}
