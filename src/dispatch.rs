//! Host-side action dispatcher.
//!
//! DESIGN
//! ======
//! The engine never performs I/O. Each input handler returns a list of
//! [`Action`]s; [`Host::run`] executes them in issue order against a
//! [`MapStore`] and feeds the results back into the open [`MapSession`].
//! Results can produce further actions, which are queued behind the rest.
//!
//! ERROR HANDLING
//! ==============
//! No `StoreError` escapes `run`. Each becomes a notice for the user.
//! Writes that fail with a retryable error are retried with linear backoff;
//! once retries are spent the cell is marked unsynced and the optimistic
//! local value stays. Any later write to an unsynced cell goes out as a full
//! update, and clears the flag only if the cell is unchanged since that edit.
//! An auth failure signs the user out and drops the open map entirely.

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use canvas::engine::{Action, MapSession};
use canvas::geometry::HexCoord;
use canvas::grid::{HexRecord, Person};
use canvas::presenter::HexChange;

use crate::api::{MapStore, StoreError};
use crate::config::RetryPolicy;

pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please sign in again.";

/// One server write requested by the engine.
#[derive(Debug, Clone)]
enum Write {
    Hex { coord: HexCoord, seq: u64, change: HexChange },
    Note { coord: HexCoord, author_id: i64, text: String },
}

impl Write {
    fn coord(&self) -> HexCoord {
        match self {
            Self::Hex { coord, .. } | Self::Note { coord, .. } => *coord,
        }
    }
}

// =============================================================================
// HOST
// =============================================================================

pub struct Host<S> {
    pub(crate) store: S,
    pub(crate) retry: RetryPolicy,
    pub(crate) user: Option<Person>,
    pub(crate) session: Option<MapSession>,
    notices: Vec<String>,
    renders: u64,
}

impl<S: MapStore> Host<S> {
    #[must_use]
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry, user: None, session: None, notices: Vec::new(), renders: 0 }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn user(&self) -> Option<&Person> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&MapSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut MapSession> {
        self.session.as_mut()
    }

    /// Notices raised since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Frames requested so far.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders
    }

    // --- Session ---

    /// Resolve `who` to a person and act as them from now on.
    ///
    /// # Errors
    ///
    /// Returns the store error; `Auth` also signs out.
    pub async fn sign_in(&mut self, who: &str) -> Result<Person, StoreError> {
        let result = self.store.get_person(who).await;
        let person = self.observe(result)?;
        info!(user = %person.username, is_dm = person.is_dm, "signed in");
        self.user = Some(person.clone());
        if let Some(session) = self.session.as_mut() {
            session.user = Some(person.clone());
        }
        Ok(person)
    }

    /// Forget the user and the open map.
    pub fn sign_out(&mut self) {
        self.user = None;
        self.session = None;
    }

    /// Sign out on `Auth`, then hand the result back.
    pub(crate) fn observe<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(e) = &result {
            if e.is_auth() {
                warn!(error = %e, "session rejected; signing out");
                self.sign_out();
            }
        }
        result
    }

    // --- Dispatch ---

    /// Feed one input to the open map, then execute what it asks for.
    ///
    /// Does nothing when no map is open.
    pub async fn handle(&mut self, input: impl FnOnce(&mut MapSession) -> Vec<Action>) {
        let Some(session) = self.session.as_mut() else {
            debug!("input ignored; no map is open");
            return;
        };
        let actions = input(session);
        self.run(actions).await;
    }

    /// Execute `actions` in order, including any follow-ups they produce.
    pub async fn run(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            queue.extend(self.execute(action).await);
        }
    }

    async fn execute(&mut self, action: Action) -> Vec<Action> {
        match action {
            Action::RenderNeeded => {
                self.renders += 1;
                Vec::new()
            }
            Action::SetCursor(cursor) => {
                debug!(%cursor, "cursor");
                Vec::new()
            }
            Action::HexSelected(coord) => {
                debug!(col = coord.col, row = coord.row, "hex selected");
                Vec::new()
            }
            Action::SelectionCleared => {
                debug!("selection cleared");
                Vec::new()
            }
            Action::Notice(message) => {
                self.notify(message);
                Vec::new()
            }
            Action::FetchHexDetail { coord, seq } => self.fetch_detail(coord, seq).await,
            Action::PersistHex { coord, seq, change } => {
                let change = self.widen_if_unsynced(coord, change);
                self.persist(Write::Hex { coord, seq, change }).await
            }
            Action::PersistNote { coord, note } => {
                let Some(author_id) = self.user.as_ref().map(|u| u.id) else {
                    self.notify("Sign in to add notes.".to_owned());
                    return Vec::new();
                };
                self.persist(Write::Note { coord, author_id, text: note.text }).await
            }
        }
    }

    fn notify(&mut self, message: String) {
        info!(%message, "notice");
        self.notices.push(message);
    }

    /// Surface a failed call: auth failures sign out, anything else becomes a notice.
    fn report(&mut self, context: &str, err: &StoreError) {
        if err.is_auth() {
            warn!(error = %err, "session rejected; signing out");
            self.sign_out();
            self.notify(SESSION_EXPIRED_NOTICE.to_owned());
        } else {
            warn!(error = %err, context, "store call failed");
            self.notify(format!("{context}: {err}"));
        }
    }

    /// Id of the open map, if it has ever been saved.
    pub(crate) fn saved_map_id(&self) -> Option<i64> {
        self.session.as_ref().filter(|s| !s.config.is_unsaved()).map(|s| s.config.map_id)
    }

    // --- Reads ---

    async fn fetch_detail(&mut self, coord: HexCoord, seq: u64) -> Vec<Action> {
        let Some(map_id) = self.saved_map_id() else {
            return Vec::new();
        };
        let result = self.load_hex(map_id, coord).await;
        match result {
            Ok(record) => {
                self.session.as_mut().map(|s| s.apply_hex_detail(coord, seq, &record)).unwrap_or_default()
            }
            Err(StoreError::NotFound) => {
                debug!(col = coord.col, row = coord.row, "no stored row; keeping defaults");
                self.session.as_mut().map(|s| s.apply_hex_detail_missing(coord)).unwrap_or_default()
            }
            Err(e) => {
                self.report("Could not load hex details", &e);
                Vec::new()
            }
        }
    }

    async fn load_hex(&self, map_id: i64, coord: HexCoord) -> Result<HexRecord, StoreError> {
        let mut record = self.store.get_hex(map_id, coord).await?;
        record.notes = self.store.get_hex_notes(map_id, coord).await?;
        Ok(record)
    }

    // --- Writes ---

    async fn persist(&mut self, write: Write) -> Vec<Action> {
        let Some(map_id) = self.saved_map_id() else {
            debug!("map not saved yet; change goes out with the next save");
            return Vec::new();
        };
        let coord = write.coord();
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            let result = self.write(map_id, &write).await;
            match result {
                Ok(()) => {
                    if let Write::Hex { seq, change: HexChange::Full(_), .. } = &write {
                        if let Some(session) = self.session.as_mut() {
                            session.apply_full_sync_at(coord, *seq);
                        }
                    }
                    return Vec::new();
                }
                Err(e) if e.retryable() && attempt < attempts => {
                    warn!(error = %e, attempt, total = attempts, "hex write failed; retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(e) if e.is_auth() => {
                    self.report("Could not save hex", &e);
                    return Vec::new();
                }
                Err(e) => {
                    warn!(error = %e, col = coord.col, row = coord.row, "hex write failed after retries");
                    let reason = e.to_string();
                    return self.session.as_mut().map(|s| s.apply_persist_failed(coord, &reason)).unwrap_or_default();
                }
            }
        }
        Vec::new()
    }

    /// A narrow change to a cell with a failed earlier write carries every field instead.
    fn widen_if_unsynced(&self, coord: HexCoord, change: HexChange) -> HexChange {
        match self.session.as_ref().and_then(|s| s.unsynced_record(coord)) {
            Some(record) => {
                debug!(col = coord.col, row = coord.row, "cell unsynced; sending full update");
                HexChange::Full(record)
            }
            None => change,
        }
    }

    async fn write(&self, map_id: i64, write: &Write) -> Result<(), StoreError> {
        match write {
            Write::Hex { coord, change, .. } => match change {
                HexChange::Explored(v) => self.store.update_hex_explored(map_id, *coord, *v).await,
                HexChange::Controlled(v) => self.store.update_hex_controlled(map_id, *coord, *v).await,
                HexChange::Visible(v) => self.store.update_hex_visibility(map_id, *coord, *v).await,
                HexChange::Name(name) => self.store.update_hex_name(map_id, *coord, name).await,
                HexChange::Full(record) => self.push_full(map_id, record).await,
            },
            Write::Note { coord, author_id, text } => {
                self.store.add_note_to_hex(map_id, *coord, *author_id, text).await
            }
        }
    }

    /// Full update, creating the row when the server has none.
    async fn push_full(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError> {
        match self.store.update_hex(map_id, record).await {
            Err(StoreError::NotFound) => {
                debug!(col = record.col, row = record.row, "no stored row; creating");
                self.store.create_hex(map_id, record).await
            }
            other => other,
        }
    }

    // --- Reconciliation ---

    /// Push every unsynced cell of the open map with a full update; local values win.
    ///
    /// Returns the number of cells now back in sync.
    pub async fn reconcile(&mut self) -> usize {
        let Some(map_id) = self.saved_map_id() else {
            return 0;
        };
        let pending = self.session.as_ref().map(MapSession::unsynced_records).unwrap_or_default();
        let mut synced = 0;
        for record in pending {
            let result = self.push_full(map_id, &record).await;
            match result {
                Ok(()) => {
                    if let Some(session) = self.session.as_mut() {
                        session.apply_full_sync(record.coord());
                    }
                    synced += 1;
                }
                Err(e) => {
                    self.report("Could not reconcile hex", &e);
                    if self.session.is_none() {
                        break;
                    }
                }
            }
        }
        if synced > 0 {
            info!(map_id, synced, "reconciled unsynced hexes");
        }
        synced
    }
}
