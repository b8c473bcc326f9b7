//! Persistence adapter: the server calls the host makes on behalf of the engine.
//!
//! DESIGN
//! ======
//! `MapStore` is the seam between the dispatcher and the network. The engine
//! never calls it directly; it emits actions and the dispatcher translates
//! them into store calls. `HttpMapStore` is the production implementation.
//! Tests substitute an in-memory fake.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns `StoreError`. HTTP status codes are classified once, in
//! [`StoreError::from_status`], so callers only branch on the variant:
//! `Auth` ends the session, `NotFound` falls back to a default, and
//! `retryable()` errors are retried by the dispatcher before giving up.

pub mod http;

#[cfg(test)]
pub(crate) mod memory;


use canvas::geometry::HexCoord;
use canvas::grid::{HexRecord, MapConfig, Note, Person, ValidationError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Network(String),
    #[error("session rejected (HTTP {status})")]
    Auth { status: u16 },
    #[error("not found")]
    NotFound,
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Classify a non-success HTTP response.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            404 => Self::NotFound,
            _ => Self::Server { status, message },
        }
    }

    /// Whether repeating the same call may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { status: 429 | 500..=599, .. })
    }

    /// Whether the session is no longer valid.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { Self::Decode(e.to_string()) } else { Self::Network(e.to_string()) }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Server-side storage for maps, hexes, notes, and people.
///
/// Every hex operation is scoped by `map_id`.
#[async_trait::async_trait]
pub trait MapStore: Send + Sync {
    /// Persist a new map; returns its assigned id.
    async fn create_map(&self, config: &MapConfig) -> Result<i64, StoreError>;

    /// Overwrite the stored config; returns the map id.
    async fn update_map(&self, map_id: i64, config: &MapConfig) -> Result<i64, StoreError>;

    async fn get_map(&self, map_id: i64) -> Result<MapConfig, StoreError>;

    /// Existing share code, if one was ever created.
    async fn get_map_share_link(&self, map_id: i64) -> Result<Option<String>, StoreError>;

    async fn create_map_share_link(&self, map_id: i64) -> Result<String, StoreError>;

    /// Every stored hex row for the map. Maps without rows return an empty list.
    async fn get_hexes_by_map(&self, map_id: i64) -> Result<Vec<HexRecord>, StoreError>;

    async fn get_hex(&self, map_id: i64, coord: HexCoord) -> Result<HexRecord, StoreError>;

    async fn create_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError>;

    /// Full-field update.
    async fn update_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError>;

    async fn update_hex_visibility(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError>;

    async fn update_hex_explored(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError>;

    async fn update_hex_controlled(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError>;

    async fn update_hex_name(&self, map_id: i64, coord: HexCoord, name: &str) -> Result<(), StoreError>;

    async fn get_hex_notes(&self, map_id: i64, coord: HexCoord) -> Result<Vec<Note>, StoreError>;

    async fn add_note_to_hex(&self, map_id: i64, coord: HexCoord, author_id: i64, text: &str)
    -> Result<(), StoreError>;

    /// Look up a person by username or numeric id.
    async fn get_person(&self, who: &str) -> Result<Person, StoreError>;
}
