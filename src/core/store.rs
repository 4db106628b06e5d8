// storage backend - read-only access to supabase's postgrest api

use super::record::{Record, parse_records};
use crate::Error;
use async_trait::async_trait;
use tracing::debug;

/// Hard cap on rows per read.
pub const MAX_ROWS: u32 = 50;

/// A bounded, ordered read of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub table: String,
    pub limit: u32,
    pub offset: u32,
    pub order_by: String,
    pub descending: bool,
}

impl ReadRequest {
    /// Most recent first by `created_at`, capped at [`MAX_ROWS`].
    pub fn latest(table: &str, limit: u32) -> Self {
        Self {
            table: table.to_string(),
            limit: limit.min(MAX_ROWS),
            offset: 0,
            order_by: "created_at".to_string(),
            descending: true,
        }
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = field.to_string();
        self
    }

    // postgrest query string pairs
    fn params(&self) -> Vec<(&'static str, String)> {
        let direction = if self.descending { "desc" } else { "asc" };
        vec![
            ("select", "*".to_string()),
            ("limit", self.limit.min(MAX_ROWS).to_string()),
            ("offset", self.offset.to_string()),
            ("order", format!("{}.{direction}", self.order_by)),
        ]
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, request: ReadRequest) -> Result<Vec<Record>, Error>;
}

pub struct Supabase {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl Supabase {
    /// Credentials are checked per read.
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for Supabase {
    async fn read(&self, request: ReadRequest) -> Result<Vec<Record>, Error> {
        if self.url.is_empty() || self.api_key.is_empty() {
            return Err(Error::MissingStorage);
        }

        let url = format!("{}/rest/v1/{}", self.url, request.table);
        debug!(table = %request.table, limit = request.limit, "supabase read");

        let response = self
            .client
            .get(&url)
            .query(&request.params())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(Error::Storage(body));
        }

        Ok(parse_records(&body)?)
    }
}
