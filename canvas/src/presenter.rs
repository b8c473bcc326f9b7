//! Hex detail presenter: the selected hex, its view model, and edit requests.
//!
//! Every edit is optimistic. The grid is mutated first and the returned
//! actions carry the persistence request plus the cell's post-edit
//! `edit_seq`, so the host can recognise a late response as stale. Failed
//! writes are never rolled back here.
//!
//! ACCESS
//! ======
//! Visibility, explored, controlled and restore-surrounding are DM-only.
//! Notes and rename need a signed-in user. While a full-map save is in
//! flight every edit is rejected.

#[cfg(test)]
#[path = "presenter_test.rs"]
mod presenter_test;

use serde::Serialize;

use crate::engine::Action;
use crate::geometry::{HexCoord, hex_neighbors};
use crate::grid::{GridModel, HexCell, HexRecord, Note, Person, ValidationError};

/// One field-level persistence request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum HexChange {
    Explored(bool),
    Controlled(bool),
    Visible(bool),
    Name(String),
    /// Every persisted field; used when reconciling an unsynced cell.
    Full(HexRecord),
}

/// Who is acting, and whether edits are currently allowed at all.
#[derive(Debug, Clone, Copy)]
pub struct Access<'a> {
    pub user: Option<&'a Person>,
    /// A full-map save is in flight.
    pub busy: bool,
}

impl Access<'_> {
    fn editor(&self) -> Result<&Person, ValidationError> {
        if self.busy {
            return Err(ValidationError::Busy);
        }
        self.user.ok_or(ValidationError::NotPermitted("edit without signing in"))
    }

    fn dm(&self, what: &'static str) -> Result<&Person, ValidationError> {
        let user = self.editor()?;
        if user.is_dm { Ok(user) } else { Err(ValidationError::NotPermitted(what)) }
    }

    fn is_dm(&self) -> bool {
        self.user.is_some_and(|u| u.is_dm)
    }
}

/// Labels for the DM-only controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmControls {
    pub visibility: &'static str,
    pub explored: &'static str,
    pub controlled: &'static str,
}

/// Everything the detail panel shows for one hex.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexDetail {
    pub coord: HexCoord,
    pub name: String,
    pub status: &'static str,
    pub resources: String,
    /// Oldest first.
    pub notes: Vec<Note>,
    /// `None` for non-DM users.
    pub dm_controls: Option<DmControls>,
}

impl HexDetail {
    fn from_cell(cell: &HexCell, is_dm: bool) -> Self {
        let status = if cell.is_controlled {
            "Controlled"
        } else if cell.is_explored {
            "Explored"
        } else {
            "Unexplored"
        };
        let resources = match &cell.resources {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let dm_controls = is_dm.then(|| DmControls {
            visibility: if cell.is_visible { "Hide This Hex" } else { "Show This Hex" },
            explored: if cell.is_explored { "Mark as Unexplored" } else { "Mark as Explored" },
            controlled: if cell.is_controlled { "Mark Not Controlled" } else { "Mark as Controlled" },
        });
        Self {
            coord: cell.coord,
            name: if cell.name.is_empty() { "unnamed".to_owned() } else { cell.name.clone() },
            status,
            resources,
            notes: cell.notes.clone(),
            dm_controls,
        }
    }
}

/// Selection state for the detail panel.
#[derive(Debug, Clone, Default)]
pub struct Presenter {
    selected: Option<HexCoord>,
}

impl Presenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<HexCoord> {
        self.selected
    }

    /// View model for the current selection.
    #[must_use]
    pub fn detail(&self, grid: &GridModel, access: Access<'_>) -> Option<HexDetail> {
        let cell = grid.cell(self.selected?)?;
        Some(HexDetail::from_cell(cell, access.is_dm()))
    }

    /// Select a hex and ask the host for its server-side detail and notes.
    ///
    /// # Errors
    ///
    /// Returns `Grid(OutOfRange)` for a coordinate outside the grid.
    pub fn select(&mut self, grid: &GridModel, col: u32, row: u32) -> Result<Vec<Action>, ValidationError> {
        let cell = grid.get(col, row)?;
        self.selected = Some(cell.coord);
        Ok(vec![
            Action::HexSelected(cell.coord),
            Action::FetchHexDetail { coord: cell.coord, seq: cell.edit_seq },
            Action::RenderNeeded,
        ])
    }

    pub fn close(&mut self) -> Vec<Action> {
        match self.selected.take() {
            Some(_) => vec![Action::SelectionCleared, Action::RenderNeeded],
            None => Vec::new(),
        }
    }

    /// Drop the selection if it no longer addresses a cell (after a grid rebuild).
    pub fn revalidate(&mut self, grid: &GridModel) -> Vec<Action> {
        match self.selected {
            Some(coord) if grid.cell(coord).is_none() => self.close(),
            _ => Vec::new(),
        }
    }

    // --- DM toggles ---

    /// # Errors
    ///
    /// `NotPermitted` for non-DM users, `Busy` during a save, `NoSelection` with nothing selected.
    pub fn toggle_explored(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
    ) -> Result<Vec<Action>, ValidationError> {
        access.dm("change exploration")?;
        let coord = self.current()?;
        let next = !grid.get(coord.col, coord.row)?.is_explored;
        grid.set_explored(coord.col, coord.row, next)?;
        Ok(persist(grid, coord, HexChange::Explored(next)))
    }

    /// # Errors
    ///
    /// `NotPermitted` for non-DM users, `Busy` during a save, `NoSelection` with nothing selected.
    pub fn toggle_controlled(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
    ) -> Result<Vec<Action>, ValidationError> {
        access.dm("change control")?;
        let coord = self.current()?;
        let next = !grid.get(coord.col, coord.row)?.is_controlled;
        grid.set_controlled(coord.col, coord.row, next)?;
        Ok(persist(grid, coord, HexChange::Controlled(next)))
    }

    /// Hiding the selected hex also closes the detail panel.
    ///
    /// # Errors
    ///
    /// `NotPermitted` for non-DM users, `Busy` during a save, `NoSelection` with nothing selected.
    pub fn toggle_visibility(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
    ) -> Result<Vec<Action>, ValidationError> {
        access.dm("change visibility")?;
        let coord = self.current()?;
        let next = !grid.get(coord.col, coord.row)?.is_visible;
        grid.set_visible(coord.col, coord.row, next)?;
        let mut actions = persist(grid, coord, HexChange::Visible(next));
        if !next {
            actions.extend(self.close());
        }
        Ok(actions)
    }

    /// Make the six neighbours of the selected hex visible. Out-of-range and
    /// already-visible neighbours are skipped.
    ///
    /// # Errors
    ///
    /// `NotPermitted` for non-DM users, `Busy` during a save, `NoSelection` with nothing selected.
    pub fn restore_surrounding(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
    ) -> Result<Vec<Action>, ValidationError> {
        access.dm("restore surrounding hexes")?;
        let coord = self.current()?;
        let mut writes = Vec::new();
        for (col, row) in hex_neighbors(coord) {
            let (Ok(col), Ok(row)) = (u32::try_from(col), u32::try_from(row)) else {
                continue;
            };
            let Ok(cell) = grid.get(col, row) else {
                continue;
            };
            if cell.is_visible {
                continue;
            }
            grid.set_visible(col, row, true)?;
            let neighbor = HexCoord::new(col, row);
            let seq = grid.edit_seq(neighbor).unwrap_or_default();
            writes.push(Action::PersistHex { coord: neighbor, seq, change: HexChange::Visible(true) });
        }
        if writes.is_empty() {
            return Ok(writes);
        }
        writes.insert(0, Action::RenderNeeded);
        Ok(writes)
    }

    // --- Open to any signed-in user ---

    /// Append a note authored by the current user.
    ///
    /// # Errors
    ///
    /// `EmptyNote` for blank text, `Busy` during a save, `NoSelection` with
    /// nothing selected, `NotPermitted` when signed out.
    pub fn add_note(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
        text: &str,
        now_ms: i64,
    ) -> Result<Vec<Action>, ValidationError> {
        let author = access.editor()?;
        let coord = self.current()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyNote);
        }
        let note = Note { author: author.username.clone(), timestamp_ms: now_ms, text: text.to_owned() };
        grid.append_note(coord.col, coord.row, note.clone())?;
        Ok(vec![Action::RenderNeeded, Action::PersistNote { coord, note }])
    }

    /// Rename the selected hex. Only the label changes.
    ///
    /// # Errors
    ///
    /// `Busy` during a save, `NoSelection` with nothing selected, `NotPermitted` when signed out.
    pub fn rename(
        &mut self,
        grid: &mut GridModel,
        access: Access<'_>,
        name: &str,
    ) -> Result<Vec<Action>, ValidationError> {
        access.editor()?;
        let coord = self.current()?;
        let name = name.trim().to_owned();
        grid.set_name(coord.col, coord.row, name.clone())?;
        Ok(persist(grid, coord, HexChange::Name(name)))
    }

    fn current(&self) -> Result<HexCoord, ValidationError> {
        self.selected.ok_or(ValidationError::NoSelection)
    }
}

fn persist(grid: &GridModel, coord: HexCoord, change: HexChange) -> Vec<Action> {
    let seq = grid.edit_seq(coord).unwrap_or_default();
    vec![Action::RenderNeeded, Action::PersistHex { coord, seq, change }]
}
