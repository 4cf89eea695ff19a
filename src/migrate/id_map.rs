// src/migrate/id_map.rs
//! Source-id to target-id lookups bridging phases.

use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

use crate::target::RecordSink;

/// Lookup from a source document key to the identifier the target database
/// generated for it. Rebuilt from the target at the start of any phase that
/// needs it; nothing is persisted between runs.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: HashMap<String, i64>,
}

impl IdMap {
    pub async fn load<T: RecordSink>(sink: &T, table: &str) -> Result<Self> {
        let pairs = sink.select_id_pairs(table).await?;
        let entries: HashMap<String, i64> = pairs
            .into_iter()
            .map(|(id, source_id)| (source_id, id))
            .collect();

        info!("Loaded {} id mappings from '{}'", entries.len(), table);
        Ok(Self { entries })
    }

    pub fn get(&self, source_id: &str) -> Option<i64> {
        self.entries.get(source_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_source_keys_to_target_ids() {
        let mut map = IdMap::default();
        map.entries.insert("doc-a".to_string(), 11);
        map.entries.insert("doc-b".to_string(), 12);

        assert_eq!(map.get("doc-a"), Some(11));
        assert_eq!(map.get("doc-b"), Some(12));
        assert_eq!(map.get("doc-c"), None);
        assert_eq!(map.len(), 2);
    }
}
