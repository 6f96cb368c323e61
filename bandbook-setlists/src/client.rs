//! HTTP client for a running bandbook-setlists service
//!
//! Implements [`SongCatalog`] and [`SetlistStore`] so a [`BuilderSession`]
//! can run against a remote service the same way it runs against the local
//! database.
//!
//! [`BuilderSession`]: crate::builder::BuilderSession

use std::time::Duration;

use async_trait::async_trait;
use bandbook_common::db::{Band, Setlist, SetlistSummary, Song};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::api::health::HealthResponse;
use crate::api::setlists::SavedSetlist;
use crate::builder::{SetlistDraft, SetlistStore, SubmitPayload};
use crate::catalog::SongCatalog;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    field: Option<String>,
}

pub struct BandbookClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BandbookClient {
    /// `base_url` like `http://127.0.0.1:5790`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("bandbook-setlists/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.http_client.get(self.url("/health")).send().await?;
        decode(response).await
    }

    pub async fn create_band(&self, name: &str) -> Result<Band> {
        let response = self
            .http_client
            .post(self.url("/api/bands"))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn add_song(&self, band_id: Uuid, title: &str, artist: &str) -> Result<Song> {
        let response = self
            .http_client
            .post(self.url(&format!("/api/bands/{}/songs", band_id)))
            .json(&json!({ "title": title, "artist": artist }))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_setlist(&self, setlist_id: Uuid) -> Result<Setlist> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/setlists/{}", setlist_id)))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_setlists(&self, band_id: Uuid) -> Result<Vec<SetlistSummary>> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/bands/{}/setlists", band_id)))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_setlist(&self, setlist_id: Uuid) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url(&format!("/api/setlists/{}", setlist_id)))
            .send()
            .await?;
        check(response).await.map(|_| ())
    }
}

#[async_trait]
impl SongCatalog for BandbookClient {
    async fn list_songs(&self, band_id: Uuid) -> Result<Vec<Song>> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/bands/{}/songs", band_id)))
            .send()
            .await?;
        decode(response).await
    }

    async fn search_songs(&self, band_id: Uuid, query: &str) -> Result<Vec<Song>> {
        debug!(band_id = %band_id, "Searching songs for '{}'", query);
        let response = self
            .http_client
            .get(self.url(&format!("/api/bands/{}/songs/search", band_id)))
            .query(&[("q", query)])
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl SetlistStore for BandbookClient {
    async fn create_setlist(&self, band_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
        let payload = SubmitPayload::from_draft(draft)?;
        let response = self
            .http_client
            .post(self.url(&format!("/api/bands/{}/setlists", band_id)))
            .json(&payload)
            .send()
            .await?;
        let saved: SavedSetlist = decode(response).await?;
        Ok(saved.id)
    }

    async fn replace_setlist(&self, setlist_id: Uuid, draft: &SetlistDraft) -> Result<Uuid> {
        let payload = SubmitPayload::from_draft(draft)?;
        let response = self
            .http_client
            .put(self.url(&format!("/api/setlists/{}", setlist_id)))
            .json(&payload)
            .send()
            .await?;
        let saved: SavedSetlist = decode(response).await?;
        Ok(saved.id)
    }
}

/// Turn a non-success status into the matching [`Error`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or(ErrorBody {
        error: text,
        field: None,
    });

    Err(match status {
        StatusCode::UNPROCESSABLE_ENTITY => Error::Validation {
            field: body.field.unwrap_or_default(),
            message: body.error,
        },
        StatusCode::NOT_FOUND => Error::NotFound(body.error),
        StatusCode::CONFLICT => Error::InvalidOperation(body.error),
        other => Error::Transport(format!("HTTP {}: {}", other.as_u16(), body.error)),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    Ok(response.json().await?)
}
