//! Supabase (PostgREST) implementation of the event store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sclip_models::{Clip, StreamContext, StreamEvent, Streamer};

use crate::error::{StoreError, StoreResult};
use crate::store::EventStore;

const STREAMERS_TABLE: &str = "streamers";
const CONTEXTS_TABLE: &str = "stream_contexts";
const EVENTS_TABLE: &str = "stream_events";
const CLIPS_TABLE: &str = "clips";

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL (e.g. `https://xyz.supabase.co`)
    pub base_url: String,
    /// Service-role API key
    pub service_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SupabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self {
            base_url: std::env::var("SUPABASE_URL")
                .map_err(|_| StoreError::config("SUPABASE_URL not set"))?,
            service_key: std::env::var("SUPABASE_SERVICE_KEY")
                .map_err(|_| StoreError::config("SUPABASE_SERVICE_KEY not set"))?,
            timeout: Duration::from_secs(30),
        })
    }
}

/// Supabase REST API client.
#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    config: SupabaseConfig,
}

/// The only column PostgREST needs to echo back on inserts.
#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: i64,
}

impl SupabaseStore {
    /// Create a new store client.
    pub fn new(config: SupabaseConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StoreError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    /// Insert rows into `table`, returning the representation PostgREST
    /// echoes back.
    async fn insert<T, R>(&self, table: &str, rows: &T) -> StoreResult<Vec<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.table_url(table);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Run a filtered select against `table`.
    async fn select<R>(&self, table: &str, query: &[(&str, String)]) -> StoreResult<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let url = self.table_url(table);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl EventStore for SupabaseStore {
    async fn get_streamer(&self, streamer_id: i64) -> StoreResult<Streamer> {
        let rows: Vec<Streamer> = self
            .select(STREAMERS_TABLE, &[("id", format!("eq.{streamer_id}"))])
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("streamer {streamer_id}")))
    }

    async fn create_stream_context(&self, context: &StreamContext) -> StoreResult<i64> {
        let rows: Vec<InsertedRow> = self.insert(CONTEXTS_TABLE, &[context]).await?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::invalid_response("insert returned no context row"))
    }

    async fn create_stream_events(&self, events: &[StreamEvent]) -> StoreResult<Vec<i64>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<InsertedRow> = self.insert(EVENTS_TABLE, events).await?;
        if rows.len() != events.len() {
            return Err(StoreError::invalid_response(format!(
                "inserted {} events but {} rows came back",
                events.len(),
                rows.len()
            )));
        }
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn stream_events_after(
        &self,
        start_secs: i64,
        stream_id: i64,
    ) -> StoreResult<Vec<StreamEvent>> {
        self.select(
            EVENTS_TABLE,
            &[
                ("stream_id", format!("eq.{stream_id}")),
                ("start_secs", format!("gte.{start_secs}")),
                ("order", "start_secs.asc".to_string()),
            ],
        )
        .await
    }

    async fn create_clip(&self, clip: &Clip) -> StoreResult<i64> {
        let rows: Vec<InsertedRow> = self.insert(CLIPS_TABLE, &[clip]).await?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::invalid_response("insert returned no clip row"))
    }
}
