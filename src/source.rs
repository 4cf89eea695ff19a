// src/source.rs
//! Source side of the pipeline: bulk-read a named document collection.
//!
//! Phase logic only ever sees [`SourceDocument`] values with plain JSON
//! fields, so the Firestore wire encoding stays contained in this module.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// One document read from the source store, with its vendor value envelope
/// already decoded into plain JSON.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// The document key (last segment of the Firestore resource name).
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Read-only access to the source collections.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch every document in the named collection, preserving the order
    /// the backend returns them in. A failure here is phase-fatal.
    async fn read_all(&self, collection: &str) -> Result<Vec<SourceDocument>>;
}

// ===== Firestore REST adapter =====

pub struct FirestoreSource {
    client: reqwest::Client,
    project_id: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreSource {
    pub fn new(project_id: String, access_token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            project_id,
            access_token,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            FIRESTORE_BASE_URL, self.project_id, collection
        )
    }

    async fn fetch_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse> {
        let url = self.collection_url(collection);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("pageSize", PAGE_SIZE.to_string())]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to list documents in '{}'", collection))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!(
                "Firestore returned {} for collection '{}': {}",
                status,
                collection,
                error_text
            );
        }

        response
            .json::<ListDocumentsResponse>()
            .await
            .with_context(|| format!("Failed to parse document list for '{}'", collection))
    }
}

#[async_trait]
impl DocumentSource for FirestoreSource {
    async fn read_all(&self, collection: &str) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(collection, page_token.as_deref()).await?;
            debug!(
                "Fetched {} documents from '{}'",
                page.documents.len(),
                collection
            );

            for doc in page.documents {
                documents.push(SourceDocument {
                    id: document_key(&doc.name),
                    fields: decode_fields(doc.fields),
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(
            "Loaded {} documents from collection '{}'",
            documents.len(),
            collection
        );
        Ok(documents)
    }
}

/// Last path segment of a Firestore resource name, e.g.
/// `projects/p/databases/(default)/documents/users/abc123` -> `abc123`.
fn document_key(resource_name: &str) -> String {
    resource_name
        .rsplit('/')
        .next()
        .unwrap_or(resource_name)
        .to_string()
}

/// Decode a map of Firestore typed values into plain JSON.
fn decode_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key, decode_value(value)))
        .collect()
}

/// Firestore wraps every value in a single-key type envelope
/// (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Integers arrive
/// as strings on the wire; timestamps stay RFC 3339 strings here and are
/// coerced later by the transform layer.
fn decode_value(value: Value) -> Value {
    let mut envelope = match value {
        Value::Object(envelope) => envelope,
        other => return other,
    };

    if let Some(s) = envelope.remove("stringValue") {
        return s;
    }
    if let Some(v) = envelope.remove("integerValue") {
        // Integers come over the wire as strings.
        return match v {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or(Value::String(s)),
            other => other,
        };
    }
    if let Some(n) = envelope.remove("doubleValue") {
        return n;
    }
    if let Some(b) = envelope.remove("booleanValue") {
        return b;
    }
    if let Some(ts) = envelope.remove("timestampValue") {
        return ts;
    }
    if envelope.remove("nullValue").is_some() {
        return Value::Null;
    }
    if let Some(Value::Object(mut array)) = envelope.remove("arrayValue") {
        let values = match array.remove("values") {
            Some(Value::Array(values)) => values,
            _ => Vec::new(),
        };
        return Value::Array(values.into_iter().map(decode_value).collect());
    }
    if let Some(Value::Object(mut map)) = envelope.remove("mapValue") {
        let fields = match map.remove("fields") {
            Some(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        return Value::Object(decode_fields(fields));
    }
    if let Some(point) = envelope.remove("geoPointValue") {
        return point;
    }

    // Not a recognized envelope; pass through as-is.
    Value::Object(envelope)
}
