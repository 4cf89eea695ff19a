// src/migrate/mod.rs
//! The migration pipeline: five sequential phases moving denormalized
//! documents into the normalized relational schema.
//!
//! Phase order is load-bearing. Companies must exist before Jobs can resolve
//! `company_id`, and Users must exist before either application phase can
//! resolve talent/applicant references. Each phase returns its own
//! [`TableStats`]; the driver owns no mutable counters.

pub mod id_map;
pub mod transform;

mod applications;
mod companies;
mod jobs;
mod users;

#[cfg(test)]
pub(crate) mod testutil;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

use crate::source::DocumentSource;
use crate::target::{RecordSink, Row};

/// Build a [`Row`] from a `json!` object literal.
pub(crate) fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// Insert one child-table batch under an already-inserted parent.
///
/// Child failures do not show up in the phase counters and never roll the
/// parent back; they are logged with the parent's source id so an operator
/// can find them.
pub(crate) async fn insert_child_batch<T: RecordSink>(
    sink: &T,
    table: &str,
    rows: Vec<Row>,
    parent_source_id: &str,
) {
    if rows.is_empty() {
        return;
    }
    if let Err(e) = sink.insert_rows(table, &rows).await {
        warn!(
            "Failed to insert {} rows into '{}' for source document {}: {:#}",
            rows.len(),
            table,
            parent_source_id,
            e
        );
    }
}

// ===== Per-table statistics =====

/// Outcome of one phase: documents seen, parent rows inserted, records that
/// failed (bad data, failed insert, or unresolvable required reference).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl TableStats {
    pub fn with_total(total: usize) -> Self {
        Self {
            total,
            success: 0,
            failed: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}

// ===== Final report =====

/// Ordered per-table results, printed once at the end of the run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    tables: Vec<(&'static str, TableStats)>,
}

impl MigrationReport {
    fn push(&mut self, table: &'static str, stats: TableStats) {
        self.tables.push((table, stats));
    }

    pub fn tables(&self) -> &[(&'static str, TableStats)] {
        &self.tables
    }

    pub fn totals(&self) -> TableStats {
        self.tables.iter().fold(
            TableStats::default(),
            |acc, (_, stats)| TableStats {
                total: acc.total + stats.total,
                success: acc.success + stats.success,
                failed: acc.failed + stats.failed,
            },
        )
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration report:")?;
        for (table, stats) in &self.tables {
            writeln!(
                f,
                "  {:<20} {}/{} (failed: {})",
                table, stats.success, stats.total, stats.failed
            )?;
        }
        let totals = self.totals();
        write!(
            f,
            "  {:<20} {}/{} (failed: {})",
            "total", totals.success, totals.total, totals.failed
        )
    }
}

// ===== Driver =====

pub struct Migrator<S, T> {
    source: S,
    sink: T,
    /// Fallback instant for absent or malformed timestamps, fixed once so
    /// the whole run shares the same default.
    run_at: DateTime<Utc>,
}

impl<S: DocumentSource, T: RecordSink> Migrator<S, T> {
    pub fn new(source: S, sink: T) -> Self {
        Self {
            source,
            sink,
            run_at: Utc::now(),
        }
    }

    /// Run every phase in dependency order. A failed collection read aborts
    /// the whole run; per-record failures only show up in the report.
    pub async fn run(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        info!("Starting migration run");

        let stats = users::migrate_users(&self.source, &self.sink, self.run_at)
            .await
            .context("Users phase failed")?;
        report.push("users", stats);

        let stats = companies::migrate_companies(&self.source, &self.sink, self.run_at)
            .await
            .context("Companies phase failed")?;
        report.push("companies", stats);

        let stats = jobs::migrate_jobs(&self.source, &self.sink, self.run_at)
            .await
            .context("Jobs phase failed")?;
        report.push("jobs", stats);

        let stats =
            applications::migrate_talent_applications(&self.source, &self.sink, self.run_at)
                .await
                .context("TalentApplications phase failed")?;
        report.push("talent_applications", stats);

        let stats = applications::migrate_job_applications(&self.source, &self.sink, self.run_at)
            .await
            .context("JobApplications phase failed")?;
        report.push("job_applications", stats);

        info!("Migration run complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{MemorySink, MemorySource};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_collections_report_zero_everywhere() {
        let source = MemorySource::default();
        let sink = MemorySink::default();
        let report = Migrator::new(source, sink).run().await.unwrap();

        for (table, stats) in report.tables() {
            assert_eq!(
                *stats,
                TableStats::with_total(0),
                "unexpected stats for {}",
                table
            );
        }
        assert_eq!(report.totals(), TableStats::with_total(0));
    }

    #[tokio::test]
    async fn phases_run_in_dependency_order() {
        let mut source = MemorySource::default();
        source.put("users", "u1", json!({"fullName": "Kim Jiyoung"}));
        source.put("companies", "c1", json!({"name": "Hanbit Soft"}));
        source.put(
            "jobs",
            "j1",
            json!({"title": "Backend Engineer", "companyId": "c1"}),
        );

        let sink = MemorySink::default();
        let report = Migrator::new(source, sink).run().await.unwrap();

        let tables: Vec<&str> = report.tables().iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tables,
            vec![
                "users",
                "companies",
                "jobs",
                "talent_applications",
                "job_applications"
            ]
        );
        assert_eq!(report.totals().success, 3);
    }

    #[tokio::test]
    async fn collection_read_failure_aborts_the_run() {
        let mut source = MemorySource::default();
        source.put("users", "u1", json!({"fullName": "Kim Jiyoung"}));
        source.put("companies", "c1", json!({"name": "Hanbit Soft"}));
        source.fail_collection("jobs");

        let sink = MemorySink::default();
        let migrator = Migrator::new(source, sink);
        let err = migrator.run().await.unwrap_err();
        assert!(err.to_string().contains("Jobs phase failed"));

        // Earlier phases are not rolled back.
        assert_eq!(migrator.sink.rows("users").len(), 1);
        assert_eq!(migrator.sink.rows("companies").len(), 1);
    }

    #[test]
    fn report_formats_per_table_counts() {
        let mut report = MigrationReport::default();
        report.push(
            "users",
            TableStats {
                total: 5,
                success: 4,
                failed: 1,
            },
        );
        report.push("companies", TableStats::with_total(0));

        let rendered = report.to_string();
        assert!(rendered.contains("users"));
        assert!(rendered.contains("4/5 (failed: 1)"));
        assert!(rendered.contains("0/0 (failed: 0)"));
        assert!(rendered.contains("total"));
    }
}
