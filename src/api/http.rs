//! HTTP implementation of [`MapStore`].
//!
//! Every operation is a JSON `POST` to a fixed path. Successful responses wrap
//! their payload as `{ "data": ... }`; failures carry `{ "error": "..." }`
//! with a non-2xx status. Hex payloads use the server's field names
//! (`mapID`, `x`, `y`, `isVisible`, ...).

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use canvas::geometry::HexCoord;
use canvas::grid::{HexRecord, MapConfig, Note, Person};

use super::{MapStore, StoreError};
use crate::config::HostConfig;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpMapStore {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpMapStore {
    /// # Errors
    ///
    /// Returns `Network` if the TLS backend cannot be initialised.
    pub fn new(config: &HostConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(format!("client build failed: {e}")))?;
        Ok(Self { http, base_url: config.base_url.clone(), auth_token: config.auth_token.clone() })
    }

    /// POST `body` and return the raw response text of a 2xx reply.
    async fn send<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, StoreError> {
        let mut request = self.http.post(format!("{}{path}", self.base_url)).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(path, status, "store call");

        if !(200..300).contains(&status) {
            return Err(StoreError::from_status(status, error_message(&text)));
        }
        Ok(text)
    }

    /// POST `body` and unwrap the `data` envelope of the reply.
    async fn fetch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, StoreError> {
        let text = self.send(path, body).await?;
        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.data)
    }
}

/// Server-supplied message from an error body, or the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(|_| body.trim().to_owned(), |e| e.error)
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct MapKey {
    #[serde(rename = "mapID")]
    map_id: i64,
}

#[derive(serde::Deserialize)]
struct MapRef {
    #[serde(rename = "mapID")]
    map_id: i64,
}

#[derive(Serialize)]
struct HexKey {
    #[serde(rename = "mapID")]
    map_id: i64,
    x: u32,
    y: u32,
}

impl HexKey {
    fn new(map_id: i64, coord: HexCoord) -> Self {
        Self { map_id, x: coord.col, y: coord.row }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HexBody<'a> {
    #[serde(rename = "mapID")]
    map_id: i64,
    x: u32,
    y: u32,
    name: &'a str,
    is_explored: bool,
    is_controlled: bool,
    is_visible: bool,
    resources: &'a Option<serde_json::Value>,
    notes: &'a [Note],
}

impl<'a> HexBody<'a> {
    fn new(map_id: i64, record: &'a HexRecord) -> Self {
        Self {
            map_id,
            x: record.col,
            y: record.row,
            name: &record.name,
            is_explored: record.is_explored,
            is_controlled: record.is_controlled,
            is_visible: record.is_visible,
            resources: &record.resources,
            notes: &record.notes,
        }
    }
}

#[derive(serde::Deserialize)]
struct HexRows {
    rows: Vec<HexRecord>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareLink {
    link_code: Option<String>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[async_trait::async_trait]
impl MapStore for HttpMapStore {
    async fn create_map(&self, config: &MapConfig) -> Result<i64, StoreError> {
        config.validate()?;
        let created: MapRef = self.fetch("/api/map/create_map", config).await?;
        Ok(created.map_id)
    }

    async fn update_map(&self, map_id: i64, config: &MapConfig) -> Result<i64, StoreError> {
        config.validate()?;
        let body = MapConfig { map_id, ..config.clone() };
        let updated: MapRef = self.fetch("/api/map/update_map", &body).await?;
        Ok(updated.map_id)
    }

    async fn get_map(&self, map_id: i64) -> Result<MapConfig, StoreError> {
        self.fetch("/api/map/get_map", &MapKey { map_id }).await
    }

    async fn get_map_share_link(&self, map_id: i64) -> Result<Option<String>, StoreError> {
        let link: ShareLink = self.fetch("/api/map/get_share_link", &MapKey { map_id }).await?;
        Ok(link.link_code)
    }

    async fn create_map_share_link(&self, map_id: i64) -> Result<String, StoreError> {
        let link: ShareLink = self.fetch("/api/map/create_share_link", &MapKey { map_id }).await?;
        link.link_code.ok_or_else(|| StoreError::Decode("share link response has no linkCode".into()))
    }

    async fn get_hexes_by_map(&self, map_id: i64) -> Result<Vec<HexRecord>, StoreError> {
        let hexes: HexRows = self.fetch("/api/hexes/get_hexes_by_map_id", &MapKey { map_id }).await?;
        Ok(hexes.rows)
    }

    async fn get_hex(&self, map_id: i64, coord: HexCoord) -> Result<HexRecord, StoreError> {
        self.fetch("/api/hexes/get_hex", &HexKey::new(map_id, coord)).await
    }

    async fn create_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError> {
        self.send("/api/hexes/create_hex", &HexBody::new(map_id, record)).await?;
        Ok(())
    }

    async fn update_hex(&self, map_id: i64, record: &HexRecord) -> Result<(), StoreError> {
        self.send("/api/hexes/update_hex", &HexBody::new(map_id, record)).await?;
        Ok(())
    }

    async fn update_hex_visibility(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let body = json!({ "mapID": map_id, "x": coord.col, "y": coord.row, "isVisible": value });
        self.send("/api/hexes/update_hex_visibility", &body).await?;
        Ok(())
    }

    async fn update_hex_explored(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let body = json!({ "mapID": map_id, "x": coord.col, "y": coord.row, "isExplored": value });
        self.send("/api/hexes/update_hex_explored", &body).await?;
        Ok(())
    }

    async fn update_hex_controlled(&self, map_id: i64, coord: HexCoord, value: bool) -> Result<(), StoreError> {
        let body = json!({ "mapID": map_id, "x": coord.col, "y": coord.row, "isControlled": value });
        self.send("/api/hexes/update_hex_controlled", &body).await?;
        Ok(())
    }

    async fn update_hex_name(&self, map_id: i64, coord: HexCoord, name: &str) -> Result<(), StoreError> {
        let body = json!({ "mapID": map_id, "x": coord.col, "y": coord.row, "name": name });
        self.send("/api/hexes/update_hex_name", &body).await?;
        Ok(())
    }

    async fn get_hex_notes(&self, map_id: i64, coord: HexCoord) -> Result<Vec<Note>, StoreError> {
        self.fetch("/api/hexes/get_hex_notes", &HexKey::new(map_id, coord)).await
    }

    async fn add_note_to_hex(
        &self,
        map_id: i64,
        coord: HexCoord,
        author_id: i64,
        text: &str,
    ) -> Result<(), StoreError> {
        let body = json!({ "mapID": map_id, "x": coord.col, "y": coord.row, "authorID": author_id, "text": text });
        self.send("/api/hexes/add_note", &body).await?;
        Ok(())
    }

    async fn get_person(&self, who: &str) -> Result<Person, StoreError> {
        self.fetch("/api/person/get_person", &json!({ "who": who })).await
    }
}
