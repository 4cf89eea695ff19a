// src/target.rs
//! Target side of the pipeline: insert/select rows in a named table.
//!
//! The relational schema is assumed to exist already; this module only
//! inserts rows and reads back `(id, source_id)` pairs for identifier maps.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};
use tracing::debug;

/// A target row, keyed by column name.
pub type Row = Map<String, Value>;

/// Write access to the target tables.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert one parent row and return the generated identifier.
    async fn insert_returning_id(&self, table: &str, row: &Row) -> Result<i64>;

    /// Insert a batch of child rows. No identifiers are read back.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()>;

    /// Read back `(id, source_id)` pairs, used to rebuild identifier maps.
    async fn select_id_pairs(&self, table: &str) -> Result<Vec<(i64, String)>>;
}

// ===== Supabase (PostgREST) adapter =====

const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub struct SupabaseTarget {
    client: reqwest::Client,
    base_url: String,
}

impl SupabaseTarget {
    pub fn new(base_url: String, service_role_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", service_role_key))
            .context("Service role key contains invalid header characters")?;
        bearer.set_sensitive(true);
        let mut apikey = HeaderValue::from_str(service_role_key)
            .context("Service role key contains invalid header characters")?;
        apikey.set_sensitive(true);

        headers.insert(AUTHORIZATION, bearer);
        headers.insert("apikey", apikey);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn post_rows(&self, table: &str, body: &Value) -> Result<Vec<Value>> {
        let url = self.table_url(table);
        let response = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to insert into '{}'", table))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Insert into '{}' failed with {}: {}", table, status, error_text);
        }

        response
            .json::<Vec<Value>>()
            .await
            .with_context(|| format!("Failed to parse insert response for '{}'", table))
    }
}

#[async_trait]
impl RecordSink for SupabaseTarget {
    async fn insert_returning_id(&self, table: &str, row: &Row) -> Result<i64> {
        let inserted = self.post_rows(table, &Value::Object(row.clone())).await?;

        let id = inserted
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                anyhow::anyhow!("Insert into '{}' returned no generated id", table)
            })?;

        debug!("Inserted row {} into '{}'", id, table);
        Ok(id)
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.post_rows(table, &Value::from(rows.to_vec())).await?;
        debug!("Inserted {} rows into '{}'", rows.len(), table);
        Ok(())
    }

    async fn select_id_pairs(&self, table: &str) -> Result<Vec<(i64, String)>> {
        let url = self.table_url(table);
        let response = self
            .client
            .get(&url)
            .query(&[("select", "id,source_id")])
            .send()
            .await
            .with_context(|| format!("Failed to select id pairs from '{}'", table))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!(
                "Select from '{}' failed with {}: {}",
                table,
                status,
                error_text
            );
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse id pairs for '{}'", table))?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("Row in '{}' is missing an id", table))?;
            let source_id = row
                .get("source_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    anyhow::anyhow!("Row {} in '{}' is missing a source_id", id, table)
                })?;
            pairs.push((id, source_id.to_string()));
        }

        Ok(pairs)
    }
}
