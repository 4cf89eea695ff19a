// src/migrate/testutil.rs
//! In-memory source and sink fakes shared by the pipeline tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::source::{DocumentSource, SourceDocument};
use crate::target::{RecordSink, Row};

// ===== Source fake =====

#[derive(Default)]
pub(crate) struct MemorySource {
    collections: HashMap<String, Vec<SourceDocument>>,
    failing: HashSet<String>,
}

impl MemorySource {
    pub fn put(&mut self, collection: &str, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("test documents must be JSON objects");
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(SourceDocument {
                id: id.to_string(),
                fields,
            });
    }

    /// Make `read_all` fail for the named collection (phase-fatal path).
    pub fn fail_collection(&mut self, collection: &str) {
        self.failing.insert(collection.to_string());
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn read_all(&self, collection: &str) -> Result<Vec<SourceDocument>> {
        if self.failing.contains(collection) {
            anyhow::bail!("simulated read failure for '{}'", collection);
        }
        Ok(self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

// ===== Sink fake =====

/// Records rows in insertion order; ids are generated from a single counter.
/// Tables registered via [`MemorySink::require_column`] reject rows missing
/// that column, standing in for a NOT NULL constraint violation.
#[derive(Default)]
pub(crate) struct MemorySink {
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    tables: HashMap<String, Vec<Row>>,
    required: HashMap<String, Vec<String>>,
    next_id: i64,
}

impl MemorySink {
    pub fn require_column(&self, table: &str, column: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .required
            .entry(table.to_string())
            .or_default()
            .push(column.to_string());
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    /// Values of one column across a table, in insertion order.
    pub fn column(&self, table: &str, column: &str) -> Vec<Value> {
        self.rows(table)
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

fn check_required(state: &SinkState, table: &str, row: &Row) -> Result<()> {
    if let Some(columns) = state.required.get(table) {
        for column in columns {
            match row.get(column) {
                Some(value) if !value.is_null() => {}
                _ => anyhow::bail!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    column,
                    table
                ),
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn insert_returning_id(&self, table: &str, row: &Row) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        check_required(&state, table, row)?;

        state.next_id += 1;
        let id = state.next_id;

        let mut stored = row.clone();
        stored.insert("id".to_string(), json!(id));
        state.tables.entry(table.to_string()).or_default().push(stored);
        Ok(id)
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            check_required(&state, table, row)?;
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }

    async fn select_id_pairs(&self, table: &str) -> Result<Vec<(i64, String)>> {
        let state = self.state.lock().unwrap();
        let rows = match state.tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get("id").and_then(Value::as_i64).unwrap_or_default();
            let source_id = row
                .get("source_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            pairs.push((id, source_id.to_string()));
        }
        Ok(pairs)
    }
}
