//! Opening, creating, and saving whole maps.
//!
//! A full save is strictly sequential: the map row first, then one hex call
//! per cell in row-major order. Cells the server already has are updated and
//! the rest are created. The open session is marked busy for the
//! duration so the engine rejects edits, and the flag is cleared on every
//! exit path.

#[cfg(test)]
#[path = "maps_test.rs"]
mod maps_test;

use std::collections::BTreeSet;

use tracing::info;

use canvas::consts::UNSAVED_MAP_ID;
use canvas::engine::MapSession;
use canvas::geometry::HexCoord;
use canvas::grid::{HexRecord, MapConfig, ValidationError};

use crate::api::{MapStore, StoreError};
use crate::dispatch::Host;

impl<S: MapStore> Host<S> {
    /// Load a stored map and make it the open session.
    ///
    /// Unsynced cells of the currently open map are pushed first.
    ///
    /// # Errors
    ///
    /// Returns the store error; `Auth` also signs out. The current session is
    /// kept on any failure other than `Auth`.
    pub async fn open_map(&mut self, map_id: i64) -> Result<(), StoreError> {
        self.reconcile().await;

        let result = self.fetch_map(map_id).await;
        let (config, records) = self.observe(result)?;
        config.validate()?;

        let session = MapSession::load(config, &records, self.user.clone());
        info!(map_id, hexes = records.len(), "map opened");
        self.replace_session(session);
        Ok(())
    }

    async fn fetch_map(&self, map_id: i64) -> Result<(MapConfig, Vec<HexRecord>), StoreError> {
        let config = self.store.get_map(map_id).await?;
        let records = self.store.get_hexes_by_map(map_id).await?;
        Ok((config, records))
    }

    /// Start a blank, unsaved map.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the config is incomplete.
    pub fn new_map(&mut self, config: MapConfig) -> Result<(), StoreError> {
        config.validate()?;
        let config = MapConfig { map_id: UNSAVED_MAP_ID, ..config };
        info!(name = %config.name, rows = config.rows, cols = config.cols, "new map");
        self.replace_session(MapSession::new(config, self.user.clone()));
        Ok(())
    }

    /// Swap in a new session, keeping the container size of the old one.
    fn replace_session(&mut self, mut session: MapSession) {
        if let Some(old) = &self.session {
            let (w, h) = old.viewport.container_size();
            session.set_container_size(w, h);
        }
        self.session = Some(session);
    }

    /// Write the open map and every cell to the store; returns the map id.
    ///
    /// # Errors
    ///
    /// `Validation(NoMap)` with nothing open, `Validation(Busy)` while
    /// another save runs, otherwise the first store error.
    pub async fn save_map(&mut self) -> Result<i64, StoreError> {
        let session = self.session.as_mut().ok_or(ValidationError::NoMap)?;
        if session.is_busy() {
            return Err(ValidationError::Busy.into());
        }
        session.set_busy(true);
        let config = session.config.clone();
        let records = session.records();

        let result = self.write_map(config, &records).await;

        if let Some(session) = self.session.as_mut() {
            session.set_busy(false);
            if result.is_ok() {
                for record in &records {
                    session.apply_full_sync(record.coord());
                }
            }
        }
        self.observe(result)
    }

    async fn write_map(&mut self, config: MapConfig, records: &[HexRecord]) -> Result<i64, StoreError> {
        config.validate()?;

        if config.is_unsaved() {
            let map_id = self.store.create_map(&config).await?;
            if let Some(session) = self.session.as_mut() {
                session.set_map_id(map_id);
            }
            info!(map_id, "map created");
            for record in records {
                self.store.create_hex(map_id, record).await?;
            }
            info!(map_id, hexes = records.len(), "hexes created");
            return Ok(map_id);
        }

        let map_id = self.store.update_map(config.map_id, &config).await?;
        let stored: BTreeSet<HexCoord> =
            self.store.get_hexes_by_map(map_id).await?.iter().map(HexRecord::coord).collect();
        let mut created = 0;
        for record in records {
            if stored.contains(&record.coord()) {
                self.store.update_hex(map_id, record).await?;
            } else {
                self.store.create_hex(map_id, record).await?;
                created += 1;
            }
        }
        info!(map_id, updated = records.len() - created, created, "hexes saved");
        Ok(map_id)
    }

    /// Share code for the open map, creating one when asked and none exists.
    ///
    /// # Errors
    ///
    /// `Validation(Unsaved)` before the first save, otherwise the store error.
    pub async fn share_link(&mut self, create: bool) -> Result<Option<String>, StoreError> {
        let map_id = match &self.session {
            None => return Err(ValidationError::NoMap.into()),
            Some(_) => self.saved_map_id().ok_or(ValidationError::Unsaved)?,
        };
        let result = self.find_or_create_link(map_id, create).await;
        self.observe(result)
    }

    async fn find_or_create_link(&self, map_id: i64, create: bool) -> Result<Option<String>, StoreError> {
        if let Some(code) = self.store.get_map_share_link(map_id).await? {
            return Ok(Some(code));
        }
        if !create {
            return Ok(None);
        }
        let code = self.store.create_map_share_link(map_id).await?;
        info!(map_id, "share link created");
        Ok(Some(code))
    }
}
